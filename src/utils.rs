use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::debug;

/// Retries `operation` with Fibonacci-growing delays, up to `max_retries` extra attempts.
///
/// Only used for provisioning waits; the table access layer never retries.
pub async fn retry_with_backoff<T, E, Fut, F>(
    operation: F,
    initial_delay: Duration,
    max_retries: usize,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Debug,
{
    let mut attempt = 0;
    let (mut delay, mut next_delay) = (initial_delay, initial_delay);

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                debug!(
                    error = ?e,
                    delay = ?delay,
                    "Attempt {attempt}/{max_retries} failed, retrying"
                );
                sleep(delay).await;
                (delay, next_delay) = (next_delay, delay + next_delay);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_retry_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<usize, &str> = retry_with_backoff(
            || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err("not yet")
                } else {
                    Ok(n)
                }
            },
            Duration::from_millis(1),
            5,
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), &str> = retry_with_backoff(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("never")
            },
            Duration::from_millis(1),
            2,
        )
        .await;

        assert_eq!(result, Err("never"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
