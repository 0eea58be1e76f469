use tokio::time::sleep;
use tokio::time::timeout;
use tracing::debug;
use tracing::warn;

use super::ClientError;
use super::CoordinationClient;
use crate::ConnectionConfig;
use crate::ConnectivityError;
use crate::Result;

/// Connect `client`, retrying with the configured backoff.
///
/// Each attempt is bounded by the connection timeout. After
/// `max_retries + 1` failed attempts the last failure is reported.
pub(crate) async fn connect_with_backoff(
    client: &dyn CoordinationClient,
    connection: &ConnectionConfig,
) -> Result<()> {
    let policy = connection.retry;
    let timeout_duration = connection.connection_timeout();
    let attempts = policy.total_attempts();

    let mut last_error = ClientError::NotConnected;
    for attempt in 0..attempts {
        debug!("Connect attempt {} of {}", attempt + 1, attempts);
        match timeout(timeout_duration, client.connect()).await {
            Ok(Ok(())) => {
                debug!(connect_string = %connection.connect_string, "Coordination client connected");
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!("Connect attempt {} failed: {}", attempt + 1, e);
                last_error = e;
            }
            Err(_) => {
                warn!("Connect attempt {} timed out after {:?}", attempt + 1, timeout_duration);
                last_error = ClientError::Timeout(timeout_duration);
            }
        }

        if attempt + 1 < attempts {
            let delay = policy.delay_for_attempt(attempt);
            debug!("Retrying connect in {:?}...", delay);
            sleep(delay).await;
        }
    }

    warn!("Coordination client failed to connect after {} attempts", attempts);
    Err(ConnectivityError::RetryExhausted {
        attempts,
        last: last_error,
    }
    .into())
}
