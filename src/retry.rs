//! Exponential-backoff retry policy shared by the native-upload and
//! metadata-update drivers (§3 RetryPolicy, §4.6, §4.8).

use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub min_retry_time: Duration,
    pub max_retry_time: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 15,
            min_retry_time: Duration::from_secs(1),
            max_retry_time: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// `min(max_retry_time, min_retry_time * multiplier^attempt)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let scaled = self.min_retry_time.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max_retry_time.as_secs_f64()))
    }

    /// Runs `attempt` repeatedly until it succeeds, exhausts `max_retries`,
    /// or fails with a non-retryable error. `attempt` is handed the
    /// zero-based attempt number.
    pub async fn run<F, Fut, T>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_err = None;
        for n in 0..=self.max_retries {
            match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_zip_limit() => return Err(err),
                Err(err) if err.is_retryable() && n < self.max_retries => {
                    tokio::time::sleep(self.backoff(n)).await;
                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::transport("retries exhausted")))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_grows_exponentially_then_caps() {
        let policy = RetryPolicy {
            max_retries: 10,
            min_retry_time: Duration::from_secs(1),
            max_retry_time: Duration::from_secs(10),
            multiplier: 2.0,
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn retries_on_transport_error_then_succeeds() {
        let policy = RetryPolicy {
            max_retries: 3,
            min_retry_time: Duration::from_millis(1),
            max_retry_time: Duration::from_millis(5),
            multiplier: 2.0,
        };
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|_attempt| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::transport("flaky"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zip_limit_error_is_never_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err(Error::validation(format!(
                        "{}: too many entries",
                        crate::native::ZIP_LIMIT_PREFIX
                    )))
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(Error::not_found("gone")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
