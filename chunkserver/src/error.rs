use dfs_common::validation::ValidationError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("rejected filename: {0}")]
    InvalidFilename(#[from] ValidationError),

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create storage directory {}: {source}", .path.display())]
    StorageDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("coordinator rejected registration: {0}")]
    Rejected(tonic::Status),

    #[error("could not reach coordinator at {addr} after {attempts} attempts: {last_error}")]
    Unreachable {
        addr: String,
        attempts: usize,
        last_error: String,
    },

    #[error("coordinator assigned out-of-range port {0}")]
    InvalidPort(u32),
}
