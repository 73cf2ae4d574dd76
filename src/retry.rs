use std::future::Future;

use tokio::time::sleep;

use crate::{Result, RetryConfig};

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `config.retries + 1` attempts have been made.
///
/// Attempts are strictly sequential. Before retry `i` (zero based) the
/// loop waits [`RetryConfig::delay_for`]`(i)`. The last error is returned
/// once attempts are exhausted.
pub async fn retry_with<T, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.retries => {
                let delay = config.delay_for(attempt);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    attempt = attempt + 1,
                    status = err.status,
                    delay_ms = crate::client::millis(delay),
                    "retrying request after transient failure"
                );

                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
