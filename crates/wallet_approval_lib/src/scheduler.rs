use async_trait::async_trait;
use std::time::Duration;

/// Delay source for retry and polling loops. Injected so tests can drive
/// time-dependent flows without waiting for wall-clock delays.
#[async_trait]
pub trait Scheduler: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioScheduler;

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
