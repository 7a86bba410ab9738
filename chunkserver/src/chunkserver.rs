use crate::dfs::chunk_server_service_server::ChunkServerService;
use crate::dfs::{PingRequest, PingResponse, StoreFileRequest, StoreFileResponse};
use crate::error::IntakeError;
use dfs_common::validation::resolve_destination;
use dfs_common::STORE_FILE_ERROR_PREFIX;
use std::path::PathBuf;
use tonic::{Request, Response, Status};
use tracing::Instrument;

#[derive(Debug, Clone)]
pub struct MyChunkServer {
    id: String,
    storage_dir: PathBuf,
    /// When false, filenames are joined to `storage_dir` as given, including
    /// absolute paths and `..` segments.
    sandboxed: bool,
}

impl MyChunkServer {
    pub fn new(
        id: impl Into<String>,
        storage_dir: PathBuf,
        sandboxed: bool,
    ) -> Result<Self, IntakeError> {
        std::fs::create_dir_all(&storage_dir).map_err(|source| IntakeError::StorageDir {
            path: storage_dir.clone(),
            source,
        })?;
        Ok(MyChunkServer {
            id: id.into(),
            storage_dir,
            sandboxed,
        })
    }

    /// Writes `content` verbatim to the destination derived from `filename`,
    /// replacing any existing file.
    pub async fn write_file_local(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<PathBuf, IntakeError> {
        let path = resolve_destination(&self.storage_dir, filename, self.sandboxed)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(|source| IntakeError::Write {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

#[tonic::async_trait]
impl ChunkServerService for MyChunkServer {
    async fn ping(&self, request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        let span = dfs_common::telemetry::create_server_span(&request, "ping");
        async move {
            let req = request.into_inner();
            // A ping for another id means the coordinator is probing a port
            // this node was not assigned under that name.
            if req.id != self.id {
                tracing::warn!("Ping addressed to {:?}, but this is {}", req.id, self.id);
                return Err(Status::failed_precondition(format!(
                    "this is chunk server {}, not {}",
                    self.id, req.id
                )));
            }

            tracing::debug!("Ping from coordinator");
            Ok(Response::new(PingResponse {
                message: format!("Chunk server {} is alive", self.id),
            }))
        }
        .instrument(span)
        .await
    }

    async fn store_file(
        &self,
        request: Request<StoreFileRequest>,
    ) -> Result<Response<StoreFileResponse>, Status> {
        let span = dfs_common::telemetry::create_server_span(&request, "store_file");
        async move {
            let req = request.into_inner();
            tracing::info!(
                "Received file for client: {}, filename: {}, {} bytes",
                req.client_id,
                req.filename,
                req.content.len()
            );

            // Write failures are reported in the message only; the RPC succeeds.
            let message = match self.write_file_local(&req.filename, &req.content).await {
                Ok(path) => {
                    tracing::info!("File {} written to {}", req.filename, path.display());
                    format!("File {} received and written successfully", req.filename)
                }
                Err(e) => {
                    tracing::error!("Error writing file {}: {}", req.filename, e);
                    format!("{}: {} ({})", STORE_FILE_ERROR_PREFIX, req.filename, e)
                }
            };

            Ok(Response::new(StoreFileResponse { message }))
        }
        .instrument(span)
        .await
    }
}
