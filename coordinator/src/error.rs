use dfs_common::validation::ValidationError;
use std::path::PathBuf;
use tonic::Status;

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("invalid chunk server identifier: {0}")]
    InvalidIdentifier(ValidationError),

    #[error("invalid filename: {0}")]
    InvalidFilename(ValidationError),

    /// Never registered, or already evicted by the liveness monitor.
    #[error("chunk server {id} is not registered")]
    TargetUnknown { id: String },

    #[error("no ports left: {allocated} assigned starting at {base_port}")]
    PortsExhausted { base_port: u16, allocated: u32 },

    #[error("failed to read {}: {source}", .path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<CoordinatorError> for Status {
    fn from(err: CoordinatorError) -> Self {
        match err {
            CoordinatorError::InvalidIdentifier(_) | CoordinatorError::InvalidFilename(_) => {
                Status::invalid_argument(err.to_string())
            }
            CoordinatorError::TargetUnknown { .. } => Status::not_found(err.to_string()),
            CoordinatorError::PortsExhausted { .. } => Status::resource_exhausted(err.to_string()),
            CoordinatorError::LocalIo { .. } => Status::internal(err.to_string()),
        }
    }
}
