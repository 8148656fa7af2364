//! Bounded waits for collaborator and storage calls.

use std::future::Future;
use std::time::Duration;

/// A bounded call did not complete within its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Elapsed {
    pub limit: Duration,
}

/// Runs `fut` to completion or gives up after `limit`.
pub(crate) async fn bounded<F: Future>(limit: Duration, fut: F) -> Result<F::Output, Elapsed> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Elapsed { limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_within_limit() {
        let value = bounded(Duration::from_secs(1), async { 7 }).await;
        assert_eq!(value, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_elapsed_limit() {
        let limit = Duration::from_millis(50);
        let result = bounded(limit, tokio::time::sleep(Duration::from_secs(5))).await;
        assert_eq!(result, Err(Elapsed { limit }));
    }
}
