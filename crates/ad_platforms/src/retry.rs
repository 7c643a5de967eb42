//! Bounded exponential-backoff retry for transient platform failures
//!
//! Only network errors and 5xx responses ([`PlatformError::is_transient`])
//! are retried; 4xx business errors surface immediately.

use crate::models::PlatformError;
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry budget for one adapter
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
        }
    }
}

/// Run `f`, retrying transient failures with doubling backoff
pub async fn with_retry<T, F, Fut>(
    operation: &str,
    policy: RetryPolicy,
    mut f: F,
) -> Result<T, PlatformError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PlatformError>>,
{
    let mut attempt = 0u32;
    let mut backoff = policy.initial_backoff;
    let start = Instant::now();

    loop {
        attempt += 1;

        match f().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(
                        operation,
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Platform call succeeded after retry"
                    );
                }
                break Ok(value);
            }
            Err(err) if err.is_transient() && attempt < policy.max_attempts => {
                tracing::warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    backoff_ms = backoff.as_millis() as u64,
                    "Platform call failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => {
                tracing::error!(
                    operation,
                    attempt,
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %err,
                    "Platform call failed permanently"
                );
                break Err(err);
            }
        }
    }
}
