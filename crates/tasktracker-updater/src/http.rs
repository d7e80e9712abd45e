//! Shared HTTP client construction and bounded retry.

use std::future::Future;

use tracing::warn;

use crate::config::NetworkConfig;
use crate::error::UpdateError;

/// Build the HTTP client used for metadata requests and downloads.
pub fn build_client(network: &NetworkConfig) -> Result<reqwest::Client, UpdateError> {
    reqwest::Client::builder()
        .connect_timeout(network.connect_timeout())
        .read_timeout(network.timeout())
        .user_agent(&network.user_agent)
        .build()
        .map_err(|e| UpdateError::Config(format!("failed to create HTTP client: {}", e)))
}

/// Run `op`, retrying retryable failures up to `network.max_retries` times
/// with exponential backoff.
pub async fn with_retry<T, F, Fut>(
    network: &NetworkConfig,
    what: &str,
    mut op: F,
) -> Result<T, UpdateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, UpdateError>>,
{
    let mut delay = network.retry_backoff();
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < network.max_retries => {
                attempt += 1;
                warn!(
                    "{} failed ({}), retry {}/{} in {:?}",
                    what, e, attempt, network.max_retries, delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}
