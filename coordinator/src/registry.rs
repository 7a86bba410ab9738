//! In-memory chunk server registry.
//!
//! The registry owns the port allocator: a registration draws its port and
//! stores the record under one lock, so concurrent registrations can never
//! observe the same counter value. Nothing here is persisted; a restarted
//! coordinator starts empty and every chunk server has to register again.

use crate::error::CoordinatorError;
use crate::port_allocator::PortAllocator;
use dfs_common::validation::validate_identifier;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// What to do when an identifier that is already registered registers again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ReregistrationPolicy {
    /// Always assign a fresh port. The previous port is never reclaimed.
    #[default]
    MintNew,
    /// Return the existing assignment without consuming a port.
    Reuse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkServerRecord {
    pub id: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub record: ChunkServerRecord,
    /// The record this registration overwrote, if any.
    pub replaced: Option<ChunkServerRecord>,
    /// True when the existing assignment was handed back under `Reuse`.
    pub reused: bool,
}

#[derive(Debug)]
struct RegistryState {
    chunk_servers: HashMap<String, ChunkServerRecord>,
    allocator: PortAllocator,
}

#[derive(Debug)]
pub struct Registry {
    state: Mutex<RegistryState>,
    policy: ReregistrationPolicy,
}

impl Registry {
    pub fn new(base_port: u16, policy: ReregistrationPolicy) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                chunk_servers: HashMap::new(),
                allocator: PortAllocator::new(base_port),
            }),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `id`, assigning it the next port. Invalid identifiers are
    /// rejected before the allocator is touched.
    pub fn register(&self, id: &str) -> Result<Registration, CoordinatorError> {
        validate_identifier(id).map_err(CoordinatorError::InvalidIdentifier)?;

        let mut state = self.lock();

        if self.policy == ReregistrationPolicy::Reuse {
            if let Some(existing) = state.chunk_servers.get(id) {
                return Ok(Registration {
                    record: existing.clone(),
                    replaced: None,
                    reused: true,
                });
            }
        }

        let port = state.allocator.allocate()?;
        let record = ChunkServerRecord {
            id: id.to_string(),
            port,
        };
        let replaced = state.chunk_servers.insert(id.to_string(), record.clone());

        Ok(Registration {
            record,
            replaced,
            reused: false,
        })
    }

    pub fn get(&self, id: &str) -> Option<ChunkServerRecord> {
        self.lock().chunk_servers.get(id).cloned()
    }

    /// Copy of every record, taken under the lock so callers can iterate
    /// while registrations and evictions carry on.
    pub fn snapshot(&self) -> Vec<ChunkServerRecord> {
        self.lock().chunk_servers.values().cloned().collect()
    }

    /// Removes `record` if the registry still maps its id to the same port.
    /// Returns false when the entry is already gone or has re-registered
    /// under a different port since the record was taken.
    pub fn evict(&self, record: &ChunkServerRecord) -> bool {
        let mut state = self.lock();
        match state.chunk_servers.get(&record.id) {
            Some(current) if current.port == record.port => {
                state.chunk_servers.remove(&record.id);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.lock().chunk_servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The port the next fresh registration will receive.
    pub fn next_port(&self) -> Option<u16> {
        self.lock().allocator.peek()
    }
}
