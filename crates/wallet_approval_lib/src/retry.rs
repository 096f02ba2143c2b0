use crate::scheduler::Scheduler;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wallet_approval_lib_common::error::TransportError;

pub const CONNECTION_FAILED_AFTER_RETRIES: &str = "Connection failed after multiple attempts";

/// Per-family marker that the user declined a wallet prompt. While set,
/// background readiness polling and status checks stand down until the next
/// explicit connect intent clears it.
#[derive(Debug, Clone, Default)]
pub struct RejectionFlag(Arc<AtomicBool>);

impl RejectionFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bookkeeping for a single executor invocation, mostly useful in logs.
#[derive(Debug, Clone)]
pub struct ConnectionAttempt {
    pub attempts_made: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub rejected: bool,
}

impl ConnectionAttempt {
    fn new(max_attempts: u32) -> Self {
        ConnectionAttempt {
            attempts_made: 0,
            max_attempts,
            last_error: None,
            rejected: false,
        }
    }

    fn exhausted(&self) -> bool {
        self.attempts_made >= self.max_attempts
    }
}

/// Runs a wallet operation up to a configured number of times. A rejection
/// or a not-ready answer ends the run on the first occurrence, anything else
/// is retried after a fixed delay until the attempt budget runs out.
#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    retry_delay: Duration,
    scheduler: Arc<dyn Scheduler>,
}

impl RetryExecutor {
    pub fn new(max_attempts: u32, retry_delay: Duration, scheduler: Arc<dyn Scheduler>) -> Self {
        RetryExecutor {
            max_attempts: max_attempts.max(1),
            retry_delay,
            scheduler,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// On success the rejection flag is cleared. On rejection it is set and
    /// the error returned untouched, the caller decides what to surface.
    pub async fn execute<T, F, Fut>(
        &self,
        rejection_flag: &RejectionFlag,
        label: &str,
        mut operation: F,
    ) -> Result<T, TransportError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, TransportError>> + Send,
    {
        let mut attempt = ConnectionAttempt::new(self.max_attempts);
        loop {
            attempt.attempts_made += 1;
            match operation().await {
                Ok(result) => {
                    if attempt.attempts_made > 1 {
                        log::debug!(
                            "{label} succeeded on attempt {}/{}",
                            attempt.attempts_made,
                            attempt.max_attempts
                        );
                    }
                    rejection_flag.clear();
                    return Ok(result);
                }
                Err(err) if err.is_rejection() => {
                    attempt.rejected = true;
                    attempt.last_error = Some(err.to_string());
                    log::info!("{label} rejected by user, giving up: {attempt:?}");
                    rejection_flag.set();
                    return Err(err);
                }
                Err(TransportError::NotReady { reason }) => {
                    // readiness is the polling loop's problem, retrying
                    // here would only hammer a provider that is not up yet
                    log::debug!("{label} aborted, provider not ready: {reason}");
                    return Err(TransportError::NotReady { reason });
                }
                Err(err) => {
                    log::warn!(
                        "{label} attempt {}/{} failed: {err}",
                        attempt.attempts_made,
                        attempt.max_attempts
                    );
                    attempt.last_error = Some(err.to_string());
                    if attempt.exhausted() {
                        return Err(TransportError::transient(CONNECTION_FAILED_AFTER_RETRIES));
                    }
                    self.scheduler.sleep(self.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicU32;

    struct NoDelay;

    #[async_trait]
    impl Scheduler for NoDelay {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn executor(max_attempts: u32) -> RetryExecutor {
        RetryExecutor::new(max_attempts, Duration::from_millis(1), Arc::new(NoDelay))
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let calls = AtomicU32::new(0);
        let flag = RejectionFlag::new();
        let result = executor(3)
            .execute(&flag, "test op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TransportError::transient("flaky"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn test_rejection_short_circuits() {
        let calls = AtomicU32::new(0);
        let flag = RejectionFlag::new();
        let result: Result<(), _> = executor(3)
            .execute(&flag, "test op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::rejected("user said no")) }
            })
            .await;
        assert!(result.unwrap_err().is_rejection());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn test_exhaustion_maps_to_connection_failed() {
        let flag = RejectionFlag::new();
        let result: Result<(), _> = executor(3)
            .execute(&flag, "test op", || async {
                Err(TransportError::transient("still flaky"))
            })
            .await;
        let err = result.unwrap_err();
        assert_eq!(err.reason(), CONNECTION_FAILED_AFTER_RETRIES);
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn test_success_clears_stale_rejection() {
        let flag = RejectionFlag::new();
        flag.set();
        let result = executor(3)
            .execute(&flag, "test op", || async { Ok(42) })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert!(!flag.is_set());
    }

    #[tokio::test]
    async fn test_not_ready_fails_fast_without_flag() {
        let calls = AtomicU32::new(0);
        let flag = RejectionFlag::new();
        let result: Result<(), _> = executor(3)
            .execute(&flag, "test op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(TransportError::not_ready("provider warming up")) }
            })
            .await;
        assert!(matches!(
            result.unwrap_err(),
            TransportError::NotReady { .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!flag.is_set());
    }
}
