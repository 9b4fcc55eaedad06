//! Fixed-interval polling with an explicit attempt budget

use std::future::Future;
use tracing::debug;
use crate::config::PollConfig;
use crate::errors::{SwapError, SwapErrorType, SwapResult};

/// Runs `operation` until it yields `Some`, sleeping `config.interval`
/// between attempts.
///
/// An `Err` from `operation` aborts immediately. Running out of attempts is a
/// `Timeout`.
pub async fn poll_until<F, Fut, T>(operation: F, config: &PollConfig, context: &str) -> SwapResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = SwapResult<Option<T>>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        if let Some(value) = operation().await? {
            return Ok(value);
        }

        if attempt >= config.max_attempts {
            return Err(SwapError::new(
                SwapErrorType::Timeout,
                format!("{} did not complete after {} attempts", context, attempt),
            )
            .with_details(serde_json::json!({
                "attempts": attempt,
                "intervalMs": config.interval.as_millis() as u64,
            })));
        }

        debug!(
            "{} pending ({}/{}), checking again in {}ms",
            context,
            attempt,
            config.max_attempts,
            config.interval.as_millis()
        );
        tokio::time::sleep(config.interval).await;
    }
}
