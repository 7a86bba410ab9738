use crate::liveness::LivenessConfig;
use crate::registry::ReregistrationPolicy;
use serde::Deserialize;
use std::net::SocketAddr;
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
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Where the coordinator serves Register.
    pub addr: SocketAddr,
    /// Host chunk servers are reached on; only the port varies per node.
    pub chunkserver_host: String,
    pub chunkserver_base_port: u16,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub reregistration: ReregistrationPolicy,
    pub max_message_size: usize,
    /// Directory pushed files are read from.
    pub source_dir: PathBuf,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        let liveness = LivenessConfig::default();
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 50051)),
            chunkserver_host: "127.0.0.1".to_string(),
            chunkserver_base_port: 50052,
            probe_interval: liveness.probe_interval,
            probe_timeout: liveness.probe_timeout,
            reregistration: ReregistrationPolicy::default(),
            max_message_size: dfs_common::DEFAULT_MAX_MESSAGE_SIZE,
            source_dir: PathBuf::from("."),
        }
    }
}

impl CoordinatorConfig {
    pub fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            probe_interval: self.probe_interval,
            probe_timeout: self.probe_timeout,
        }
    }

    /// Overrides every field the file sets.
    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(addr) = file.addr {
            self.addr = addr;
        }
        if let Some(host) = file.chunkserver_host {
            self.chunkserver_host = host;
        }
        if let Some(port) = file.chunkserver_base_port {
            self.chunkserver_base_port = port;
        }
        if let Some(ms) = file.probe_interval_ms {
            self.probe_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = file.probe_timeout_ms {
            self.probe_timeout = Duration::from_millis(ms);
        }
        if let Some(policy) = file.reregistration {
            self.reregistration = policy;
        }
        if let Some(size) = file.max_message_size {
            self.max_message_size = size;
        }
        if let Some(dir) = file.source_dir {
            self.source_dir = dir;
        }
    }
}

/// On-disk JSON form of [`CoordinatorConfig`]. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub addr: Option<SocketAddr>,
    pub chunkserver_host: Option<String>,
    pub chunkserver_base_port: Option<u16>,
    pub probe_interval_ms: Option<u64>,
    pub probe_timeout_ms: Option<u64>,
    pub reregistration: Option<ReregistrationPolicy>,
    pub max_message_size: Option<usize>,
    pub source_dir: Option<PathBuf>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_well_known_ports() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.addr.port(), 50051);
        assert_eq!(config.chunkserver_base_port, 50052);
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert_eq!(config.reregistration, ReregistrationPolicy::MintNew);
    }

    #[test]
    fn test_file_overrides_only_given_fields() {
        let file = FileConfig::from_json(
            r#"{"chunkserver_base_port": 6000, "probe_interval_ms": 250, "reregistration": "reuse"}"#,
        )
        .unwrap();
        let mut config = CoordinatorConfig::default();
        config.apply_file(file);

        assert_eq!(config.chunkserver_base_port, 6000);
        assert_eq!(config.probe_interval, Duration::from_millis(250));
        assert_eq!(config.reregistration, ReregistrationPolicy::Reuse);
        assert_eq!(config.addr.port(), 50051);
        assert_eq!(config.liveness().probe_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(FileConfig::from_json(r#"{"probe_intervall_ms": 1}"#).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = FileConfig::from_file(Path::new("/nonexistent/coordinator.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
