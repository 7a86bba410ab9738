//! Pushes a whole local file to one registered chunk server.

use crate::dfs::StoreFileRequest;
use crate::error::CoordinatorError;
use crate::registry::Registry;
use crate::remote::ChunkServerRpc;
use dfs_common::telemetry;
use dfs_common::validation::validate_filename;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// How a push ended once it got as far as the remote call. Neither variant
/// is an error for the caller: remote failures stay local diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The chunk server answered. The message may still describe a failed write.
    Delivered { message: String },
    /// The StoreFile call itself could not complete.
    TransportFailed { reason: String },
}

pub struct FilePusher<R: ChunkServerRpc> {
    registry: Arc<Registry>,
    rpc: Arc<R>,
    source_dir: PathBuf,
}

impl<R: ChunkServerRpc> FilePusher<R> {
    /// `source_dir` is where the coordinator reads files to push from.
    pub fn new(registry: Arc<Registry>, rpc: Arc<R>, source_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            rpc,
            source_dir: source_dir.into(),
        }
    }

    /// Reads `filename` and sends it to `target_id` in one StoreFile call.
    ///
    /// Errors are returned only for failures on this side: a bad filename, an
    /// unknown target (in which case no remote call is made) or a failed local
    /// read. Anything that goes wrong remotely is logged and reported as a
    /// [`PushOutcome`]. Nothing is retried.
    pub async fn send_file_to_chunk_server(
        &self,
        target_id: &str,
        filename: &str,
    ) -> Result<PushOutcome, CoordinatorError> {
        validate_filename(filename).map_err(CoordinatorError::InvalidFilename)?;

        let target = self
            .registry
            .get(target_id)
            .ok_or_else(|| CoordinatorError::TargetUnknown {
                id: target_id.to_string(),
            })?;

        let path = self.source_dir.join(filename);
        let content = tokio::fs::read(&path).await.map_err(|source| {
            tracing::error!("Error reading file {}: {}", path.display(), source);
            CoordinatorError::LocalIo {
                path: path.clone(),
                source,
            }
        })?;

        let request_id = telemetry::new_request_id();
        let span = tracing::info_span!("push_file", request_id = %request_id, target = %target.id);
        let request = StoreFileRequest {
            client_id: target.id.clone(),
            filename: filename.to_string(),
            content,
        };

        async move {
            tracing::info!(
                "Sending {} ({} bytes) to chunk server {}",
                filename,
                request.content.len(),
                target.id
            );

            match self.rpc.store_file(&target, request, request_id).await {
                Ok(response) => {
                    if dfs_common::is_store_failure(&response.message) {
                        tracing::error!(
                            "Chunk server {} could not store {}: {}",
                            target.id,
                            filename,
                            response.message
                        );
                    } else {
                        tracing::info!(
                            "File sent to chunk server {}: {}",
                            target.id,
                            response.message
                        );
                    }
                    Ok(PushOutcome::Delivered {
                        message: response.message,
                    })
                }
                Err(status) => {
                    tracing::error!(
                        "Error sending file to chunk server {}: {}",
                        target.id,
                        status
                    );
                    Ok(PushOutcome::TransportFailed {
                        reason: status.to_string(),
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Fire-and-forget variant: the push runs in its own task and its result
    /// only shows up in the logs.
    pub fn spawn_send_file(self: &Arc<Self>, target_id: String, filename: String) -> JoinHandle<()> {
        let pusher = self.clone();
        tokio::spawn(async move {
            if let Err(e) = pusher.send_file_to_chunk_server(&target_id, &filename).await {
                tracing::error!("Push of {} to {} aborted: {}", filename, target_id, e);
            }
        })
    }
}
