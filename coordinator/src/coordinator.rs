use crate::dfs::coordinator_service_server::CoordinatorService;
use crate::dfs::{RegisterRequest, RegisterResponse};
use crate::registry::Registry;
use std::sync::Arc;
use tonic::{Request, Response, Status};
use tracing::Instrument;

/// gRPC front of the coordinator. Holds the registry it shares with the
/// liveness monitor and the push client.
#[derive(Debug, Clone)]
pub struct Coordinator {
    registry: Arc<Registry>,
}

impl Coordinator {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }
}

#[tonic::async_trait]
impl CoordinatorService for Coordinator {
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let span = dfs_common::telemetry::create_server_span(&request, "register");
        async move {
            let req = request.into_inner();
            tracing::info!("Register request from chunk server: {:?}", req.id);

            let registration = self.registry.register(&req.id).map_err(|e| {
                tracing::warn!("Rejected registration of {:?}: {}", req.id, e);
                Status::from(e)
            })?;

            let record = registration.record;
            if registration.reused {
                tracing::info!(
                    "Chunk server {} already registered, keeping port {}",
                    record.id,
                    record.port
                );
            } else if let Some(previous) = registration.replaced {
                tracing::info!(
                    "Chunk server {} re-registered: port {} replaces {}",
                    record.id,
                    record.port,
                    previous.port
                );
            } else {
                tracing::info!("Chunk server {} registered on port {}", record.id, record.port);
            }

            Ok(Response::new(RegisterResponse {
                message: format!("Chunk server {} registered", record.id),
                port: u32::from(record.port),
            }))
        }
        .instrument(span)
        .await
    }
}
