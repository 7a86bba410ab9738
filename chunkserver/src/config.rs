use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("bind host {host:?} is not an IP address")]
    InvalidHost { host: String },
}

#[derive(Debug, Clone)]
pub struct ChunkServerConfig {
    pub id: String,
    pub coordinator_addr: String,
    /// Host to bind; the port comes from the coordinator.
    pub host: String,
    pub storage_dir: PathBuf,
    pub sandboxed: bool,
    pub register_retry_interval: Duration,
    pub register_attempts: usize,
    pub max_message_size: usize,
}

impl Default for ChunkServerConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            coordinator_addr: "127.0.0.1:50051".to_string(),
            host: "127.0.0.1".to_string(),
            storage_dir: PathBuf::from("/tmp/chunkserver_data"),
            sandboxed: true,
            register_retry_interval: Duration::from_secs(2),
            register_attempts: 30,
            max_message_size: dfs_common::DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl ChunkServerConfig {
    pub fn coordinator_url(&self) -> String {
        if self.coordinator_addr.starts_with("http://") || self.coordinator_addr.starts_with("https://") {
            self.coordinator_addr.clone()
        } else {
            format!("http://{}", self.coordinator_addr)
        }
    }

    /// Checked before registering, so a bad host never costs a port.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.host.parse().map_err(|_| ConfigError::InvalidHost {
            host: self.host.clone(),
        })
    }

    pub fn bind_addr(ip: IpAddr, port: u16) -> SocketAddr {
        SocketAddr::new(ip, port)
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(id) = file.id {
            self.id = id;
        }
        if let Some(addr) = file.coordinator_addr {
            self.coordinator_addr = addr;
        }
        if let Some(host) = file.host {
            self.host = host;
        }
        if let Some(dir) = file.storage_dir {
            self.storage_dir = dir;
        }
        if let Some(sandboxed) = file.sandboxed {
            self.sandboxed = sandboxed;
        }
        if let Some(ms) = file.register_retry_interval_ms {
            self.register_retry_interval = Duration::from_millis(ms);
        }
        if let Some(n) = file.register_attempts {
            self.register_attempts = n;
        }
        if let Some(size) = file.max_message_size {
            self.max_message_size = size;
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub id: Option<String>,
    pub coordinator_addr: Option<String>,
    pub host: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub sandboxed: Option<bool>,
    pub register_retry_interval_ms: Option<u64>,
    pub register_attempts: Option<usize>,
    pub max_message_size: Option<usize>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
