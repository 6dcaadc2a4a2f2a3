//! Task spawning.

pub use tokio::task::{yield_now, JoinError, JoinHandle};

/// Spawns a new asynchronous task on the current runtime.
///
/// The returned handle resolves to the task's output, or to a
/// [`JoinError`] if the task panicked.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    tokio::task::spawn(future)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[core_async::test]
    async fn test_spawn_returns_output() {
        let handles: Vec<_> = (0..4).map(|i| spawn(async move { i * 2 })).collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }

        assert_eq!(results, vec![0, 2, 4, 6]);
    }

    #[core_async::test]
    async fn test_panicking_task_reports_join_error() {
        let handle = spawn(async {
            panic!("boom");
        });

        let result: Result<(), JoinError> = handle.await;
        assert!(result.unwrap_err().is_panic());
    }
}
