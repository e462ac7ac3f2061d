//! Retry with exponential back-off.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Retries after a failed attempt.
pub const DEFAULT_RETRIES: u32 = 3;
/// Pause before the first retry; doubles after each one.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Run `op`, retrying up to `retries` times with a delay that starts at
/// `delay` and doubles after every failure. Returns the last error.
///
/// # Errors
/// Returns the error of the final attempt.
pub async fn with_retry<T, E, F, Fut>(op: F, retries: u32, delay: Duration) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    with_retry_if(op, retries, delay, |_| true).await
}

/// [`with_retry`] that gives up at once on errors `retryable` rejects.
///
/// # Errors
/// Returns the first non-retryable error, or the error of the final attempt.
pub async fn with_retry_if<T, E, F, Fut, P>(
    mut op: F,
    retries: u32,
    delay: Duration,
    retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let mut remaining = retries;
    let mut delay = delay;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if remaining == 0 || !retryable(&err) => return Err(err),
            Err(err) => {
                warn!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    retries_left = remaining,
                    error = %err,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
                remaining -= 1;
                delay *= 2;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let started = tokio::time::Instant::now();
        let result: Result<&str, String> = with_retry(
            || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("flaky".to_string())
                    } else {
                        Ok("done")
                    }
                }
            },
            3,
            Duration::from_millis(1000),
        )
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result: Result<(), String> = with_retry_if(
            || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err("bad request".to_string()) }
            },
            3,
            Duration::from_millis(10),
            |err: &String| !err.starts_with("bad"),
        )
        .await;
        assert_eq!(result, Err("bad request".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_with_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let result: Result<(), String> = with_retry(
            || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("attempt {n}")) }
            },
            2,
            Duration::from_millis(10),
        )
        .await;
        assert_eq!(result, Err("attempt 2".to_string()));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
