use std::future::Future;
use std::time::Duration;

use tracing::warn;
use vk_client::VkError;

use crate::backoff;
use crate::error::CallError;

/// How hard a call site tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }
}

/// Run `op` until it succeeds, fails fatally, or the retry budget is spent.
///
/// Fatal errors are returned after the first attempt. Retriable errors are
/// retried up to `policy.max_retries` times with full-jitter backoff, so an
/// operation is invoked at most `max_retries + 1` times.
pub async fn call_with_retry<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, CallError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, VkError>>,
{
    let mut retries: u32 = 0;
    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let kind = err.kind();
        let attempts = retries + 1;
        if !kind.is_retriable() {
            return Err(CallError::Fatal {
                label: label.to_string(),
                kind,
                message: err.to_string(),
                attempts,
            });
        }
        if retries >= policy.max_retries {
            return Err(CallError::Exhausted {
                label: label.to_string(),
                kind,
                message: err.to_string(),
                attempts,
            });
        }

        retries += 1;
        let delay = backoff::delay_for(retries, policy.base_delay, policy.max_delay);
        warn!(
            call = label,
            attempt = retries,
            max_retries = policy.max_retries,
            kind = %kind,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Retriable error, backing off before retry"
        );
        backoff::pause(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use vk_client::ErrorKind;

    use super::*;

    fn instant(max_retries: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_base_delay(Duration::ZERO)
    }

    fn rate_limited() -> VkError {
        VkError::Api {
            code: 6,
            message: "Too many requests per second".into(),
        }
    }

    fn access_denied() -> VkError {
        VkError::Api {
            code: 15,
            message: "Access denied".into(),
        }
    }

    #[tokio::test]
    async fn success_returns_without_retry() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry("ok", &instant(3), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, VkError>(7)
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fatal_error_is_attempted_once_regardless_of_budget() {
        for max_retries in [0, 1, 5] {
            let calls = AtomicU32::new(0);
            let err = call_with_retry("fatal", &instant(max_retries), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(access_denied())
            })
            .await
            .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), 1);
            assert!(matches!(err, CallError::Fatal { attempts: 1, .. }));
            assert_eq!(err.kind(), ErrorKind::Fatal);
        }
    }

    #[tokio::test]
    async fn retriable_error_exhausts_after_max_retries_plus_one() {
        for max_retries in [0, 1, 4] {
            let calls = AtomicU32::new(0);
            let err = call_with_retry("flaky", &instant(max_retries), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(rate_limited())
            })
            .await
            .unwrap_err();

            assert_eq!(calls.load(Ordering::SeqCst), max_retries + 1);
            assert!(err.is_exhausted());
            assert_eq!(err.attempts(), max_retries + 1);
            assert_eq!(err.kind(), ErrorKind::RateLimited);
        }
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = call_with_retry("recovering", &instant(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(VkError::Http {
                    status: 502,
                    message: "Bad Gateway".into(),
                })
            } else {
                Ok("done")
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_after_retriable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let err = call_with_retry("mixed", &instant(10), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err::<(), _>(rate_limited())
            } else {
                Err(access_denied())
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(matches!(err, CallError::Fatal { attempts: 2, .. }));
        assert!(err.message().contains("Access denied"));
    }
}
