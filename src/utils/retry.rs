//! Retry utilities with exponential backoff.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Initial delay between attempts.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Backoff multiplier (delay *= multiplier after each attempt).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Determines if an error is worth retrying.
pub trait Retryable {
    /// Returns true if the operation should be retried.
    fn is_retryable(&self) -> bool;
}

/// Execute an async operation, retrying retryable errors with backoff.
///
/// Non-retryable errors and exhausted attempts return the last error.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut delay = config.initial_delay;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempts >= config.max_attempts || !error.is_retryable() {
                    return Err(error);
                }

                // Jitter avoids a thundering herd against the provider
                let jitter_ms = rand_jitter(delay.as_millis() as u64 / 4);
                sleep(delay + Duration::from_millis(jitter_ms)).await;

                delay = Duration::from_secs_f64(delay.as_secs_f64() * config.multiplier)
                    .min(config.max_delay);
            }
        }
    }
}

/// Generate a pseudo-random jitter value below `max` milliseconds.
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);
    seed % max
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError(bool);

    impl Retryable for TestError {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn test_success_first_attempt() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::new(3), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TestError>("done")
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let counter = AtomicU32::new(0);
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(5));
        let result = with_retry(&config, || async {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                Err(TestError(true))
            } else {
                Ok("recovered")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&RetryConfig::new(3), || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError(false))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempts_exhausted() {
        let counter = AtomicU32::new(0);
        let config = RetryConfig::new(3).with_initial_delay(Duration::from_millis(5));
        let result = with_retry(&config, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(TestError(true))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
