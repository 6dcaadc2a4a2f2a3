//! Time-related re-exports.

pub use std::time::{Duration, Instant};
pub use tokio::time::{sleep, timeout};

#[cfg(test)]
mod tests {
    use super::*;

    #[core_async::test]
    async fn test_sleep_waits_at_least_duration() {
        let start = Instant::now();
        sleep(Duration::from_millis(10)).await;
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[core_async::test]
    async fn test_timeout_expires() {
        let result = timeout(Duration::from_millis(5), sleep(Duration::from_secs(5))).await;
        assert!(result.is_err());
    }
}
