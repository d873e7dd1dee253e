//! Exponential backoff with jitter.
//!
//! The retry loop is a plain tag inspection over [`FetchError::is_retryable`]:
//! no control flow rides on panics or downcasts.

use pomscan_core::config::RetryConfig;
use pomscan_core::error::{FetchError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// `min(initial * 2^(attempt-1), max)` with ±20% jitter.
///
/// Attempt numbering starts at 1.
pub fn backoff_delay(retry: &RetryConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let base = retry
        .initial_backoff
        .saturating_mul(1u32 << exp)
        .min(retry.max_backoff);
    base.mul_f64(jitter_factor())
}

// 0.8..1.2, seeded from the clock's sub-second noise. Enough to decorrelate
// concurrent workers without pulling in a PRNG dependency.
fn jitter_factor() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.subsec_nanos());
    0.8 + f64::from(nanos % 400_000) / 1_000_000.0
}

/// Runs `op` up to `retry.max_attempts` times, sleeping between attempts.
///
/// Stops immediately on success, on a non-retryable error, on a 404 (a miss
/// belongs to the caller's tier walk, not the retry budget), or when the
/// shared cancellation flag flips.
pub async fn with_retry<T, F, Fut>(
    retry: &RetryConfig,
    cancel: &AtomicBool,
    what: &str,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if err.is_not_found() || !err.is_retryable() || attempt >= retry.max_attempts {
                    return Err(err);
                }
                if cancel.load(Ordering::SeqCst) {
                    return Err(FetchError::Unknown {
                        message: format!("{what}: cancelled before retry"),
                    });
                }
                let delay = backoff_delay(retry, attempt);
                warn!(
                    what,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                debug!(what, attempt, "retrying");
            }
        }
    }
}
