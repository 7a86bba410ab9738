use crate::dfs::coordinator_service_client::CoordinatorServiceClient;
use crate::dfs::RegisterRequest;
use crate::error::RegistrationError;
use dfs_common::telemetry;
use std::time::Duration;
use tonic::transport::Endpoint;

/// Registers `id` with the coordinator at `coordinator_url` and returns the
/// port this chunk server has to listen on.
///
/// Connection failures are retried every `retry_interval`, up to
/// `max_attempts` times. A rejection from the coordinator is returned at once.
pub async fn register_with_coordinator(
    coordinator_url: &str,
    id: &str,
    retry_interval: Duration,
    max_attempts: usize,
) -> Result<u16, RegistrationError> {
    let mut last_error = String::new();

    for attempt in 1..=max_attempts.max(1) {
        let endpoint = Endpoint::from_shared(coordinator_url.to_string()).map_err(|e| {
            RegistrationError::Unreachable {
                addr: coordinator_url.to_string(),
                attempts: attempt,
                last_error: e.to_string(),
            }
        })?;

        match endpoint.connect().await {
            Ok(channel) => {
                let mut client =
                    CoordinatorServiceClient::with_interceptor(channel, telemetry::tracing_interceptor);
                let request = RegisterRequest { id: id.to_string() };

                match client.register(request).await {
                    Ok(response) => {
                        let resp = response.into_inner();
                        tracing::info!("{} (port {})", resp.message, resp.port);
                        return u16::try_from(resp.port)
                            .map_err(|_| RegistrationError::InvalidPort(resp.port));
                    }
                    Err(status) if status.code() == tonic::Code::Unavailable => {
                        last_error = status.to_string();
                    }
                    Err(status) => return Err(RegistrationError::Rejected(status)),
                }
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }

        tracing::warn!(
            "✗ Failed to register with coordinator at {} (attempt {}/{}): {}",
            coordinator_url,
            attempt,
            max_attempts,
            last_error
        );
        if attempt < max_attempts {
            tokio::time::sleep(retry_interval).await;
        }
    }

    Err(RegistrationError::Unreachable {
        addr: coordinator_url.to_string(),
        attempts: max_attempts.max(1),
        last_error,
    })
}
