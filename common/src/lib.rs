use tonic::metadata::MetadataValue;
use tonic::{Request, Status};
use uuid::Uuid;

pub mod dfs {
    tonic::include_proto!("dfs");
}

pub mod validation;

/// Default cap on encoded/decoded gRPC messages. StoreFile carries a whole
/// file in one message, so tonic's 4 MiB default is far too small.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Every StoreFile response describing a failed write starts with this.
/// The RPC itself still succeeds, so callers have to check the message.
pub const STORE_FILE_ERROR_PREFIX: &str = "Error writing file";

pub fn is_store_failure(message: &str) -> bool {
    message.starts_with(STORE_FILE_ERROR_PREFIX)
}

pub mod telemetry {
    use super::*;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    pub const REQUEST_ID_HEADER: &str = "x-request-id";

    /// Install the fmt subscriber. `RUST_LOG` overrides `default_filter`.
    pub fn init_tracing(default_filter: &str) {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_filter.into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    }

    /// Client-side interceptor that attaches a request ID, generating one if absent.
    #[allow(clippy::result_large_err)]
    pub fn tracing_interceptor(mut req: Request<()>) -> Result<Request<()>, Status> {
        let request_id = match req.metadata().get(REQUEST_ID_HEADER) {
            Some(id) => id.clone(),
            None => MetadataValue::try_from(new_request_id())
                .unwrap_or_else(|_| MetadataValue::from_static("")),
        };
        req.metadata_mut().insert(REQUEST_ID_HEADER, request_id);
        Ok(req)
    }

    /// Interceptor that stamps every call with one fixed request ID, so a
    /// push and the intake it triggers share a correlation key.
    #[allow(clippy::result_large_err)]
    pub fn propagation_interceptor(
        request_id: String,
    ) -> impl Fn(Request<()>) -> Result<Request<()>, Status> + Clone {
        move |mut req: Request<()>| {
            if let Ok(id) = MetadataValue::try_from(request_id.as_str()) {
                req.metadata_mut().insert(REQUEST_ID_HEADER, id);
            }
            Ok(req)
        }
    }

    pub fn new_request_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn get_request_id<T>(req: &Request<T>) -> String {
        req.metadata()
            .get(REQUEST_ID_HEADER)
            .and_then(|id| id.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }

    /// Server-side span for one RPC, tagged with the caller's request ID.
    pub fn create_server_span<T>(req: &Request<T>, name: &'static str) -> tracing::Span {
        let request_id = get_request_id(req);
        tracing::info_span!("server_rpc", rpc = %name, request_id = %request_id)
    }
}
