//! Outbound calls from the coordinator to chunk servers.

use crate::dfs::chunk_server_service_client::ChunkServerServiceClient;
use crate::dfs::{PingRequest, PingResponse, StoreFileRequest, StoreFileResponse};
use crate::registry::ChunkServerRecord;
use dfs_common::telemetry;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint};
use tonic::Status;

/// The chunk-server RPCs the coordinator issues. The liveness monitor and the
/// push client only talk to chunk servers through this trait.
#[tonic::async_trait]
pub trait ChunkServerRpc: Send + Sync + 'static {
    async fn ping(&self, target: &ChunkServerRecord) -> Result<PingResponse, Status>;

    async fn store_file(
        &self,
        target: &ChunkServerRecord,
        request: StoreFileRequest,
        request_id: String,
    ) -> Result<StoreFileResponse, Status>;
}

/// gRPC implementation. Each call opens its own channel to
/// `http://{host}:{record.port}`.
#[derive(Debug, Clone)]
pub struct GrpcChunkServerRpc {
    host: String,
    connect_timeout: Duration,
    max_message_size: usize,
}

impl GrpcChunkServerRpc {
    pub fn new(host: impl Into<String>, connect_timeout: Duration, max_message_size: usize) -> Self {
        Self {
            host: host.into(),
            connect_timeout,
            max_message_size,
        }
    }

    pub fn url_for(&self, target: &ChunkServerRecord) -> String {
        format!("http://{}:{}", self.host, target.port)
    }

    async fn connect(&self, target: &ChunkServerRecord) -> Result<Channel, Status> {
        let url = self.url_for(target);
        let endpoint = Endpoint::from_shared(url.clone())
            .map_err(|e| Status::invalid_argument(format!("Invalid URL {}: {}", url, e)))?
            .connect_timeout(self.connect_timeout);

        endpoint
            .connect()
            .await
            .map_err(|e| Status::unavailable(format!("Failed to connect to {}: {}", url, e)))
    }
}

#[tonic::async_trait]
impl ChunkServerRpc for GrpcChunkServerRpc {
    async fn ping(&self, target: &ChunkServerRecord) -> Result<PingResponse, Status> {
        let channel = self.connect(target).await?;
        let mut client =
            ChunkServerServiceClient::with_interceptor(channel, telemetry::tracing_interceptor);

        let response = client
            .ping(PingRequest {
                id: target.id.clone(),
            })
            .await?;
        Ok(response.into_inner())
    }

    async fn store_file(
        &self,
        target: &ChunkServerRecord,
        request: StoreFileRequest,
        request_id: String,
    ) -> Result<StoreFileResponse, Status> {
        let channel = self.connect(target).await?;
        let mut client = ChunkServerServiceClient::with_interceptor(
            channel,
            telemetry::propagation_interceptor(request_id),
        )
        .max_encoding_message_size(self.max_message_size)
        .max_decoding_message_size(self.max_message_size);

        let response = client.store_file(request).await?;
        Ok(response.into_inner())
    }
}

/// Scriptable stand-in for chunk servers, used by unit tests.
#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    pub enum Behavior {
        Respond,
        Fail,
        Hang,
    }

    #[derive(Debug, Default)]
    pub struct FakeChunkServers {
        behaviors: Mutex<HashMap<String, Behavior>>,
        pub pings: Mutex<Vec<ChunkServerRecord>>,
        pub stores: Mutex<Vec<(ChunkServerRecord, StoreFileRequest, String)>>,
        barrier: Option<tokio::sync::Barrier>,
    }

    impl FakeChunkServers {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every ping waits until `n` pings are in flight at once.
        pub fn with_ping_barrier(n: usize) -> Self {
            Self {
                barrier: Some(tokio::sync::Barrier::new(n)),
                ..Self::default()
            }
        }

        pub fn set(&self, id: &str, behavior: Behavior) {
            self.behaviors
                .lock()
                .unwrap()
                .insert(id.to_string(), behavior);
        }

        fn behavior(&self, id: &str) -> Behavior {
            self.behaviors
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .unwrap_or(Behavior::Respond)
        }

        pub fn ping_count(&self) -> usize {
            self.pings.lock().unwrap().len()
        }

        pub fn pings_to(&self, id: &str) -> usize {
            self.pings
                .lock()
                .unwrap()
                .iter()
                .filter(|record| record.id == id)
                .count()
        }

        pub fn store_count(&self) -> usize {
            self.stores.lock().unwrap().len()
        }
    }

    #[tonic::async_trait]
    impl ChunkServerRpc for FakeChunkServers {
        async fn ping(&self, target: &ChunkServerRecord) -> Result<PingResponse, Status> {
            self.pings.lock().unwrap().push(target.clone());
            if let Some(barrier) = &self.barrier {
                barrier.wait().await;
            }
            match self.behavior(&target.id) {
                Behavior::Respond => Ok(PingResponse {
                    message: format!("pong from {}", target.id),
                }),
                Behavior::Fail => Err(Status::unavailable("connection refused")),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(Status::deadline_exceeded("hung"))
                }
            }
        }

        async fn store_file(
            &self,
            target: &ChunkServerRecord,
            request: StoreFileRequest,
            request_id: String,
        ) -> Result<StoreFileResponse, Status> {
            let filename = request.filename.clone();
            self.stores
                .lock()
                .unwrap()
                .push((target.clone(), request, request_id));
            match self.behavior(&target.id) {
                Behavior::Respond => Ok(StoreFileResponse {
                    message: format!("File {} received and written successfully", filename),
                }),
                Behavior::Fail | Behavior::Hang => Err(Status::unavailable("connection refused")),
            }
        }
    }
}
