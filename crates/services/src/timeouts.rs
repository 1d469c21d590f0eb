//! Bounded collaborator calls.
//!
//! Nothing dispatched to a collaborator can be cancelled once in flight, so
//! every call goes through [`bounded`].

use domains::StoreError;
use std::future::Future;
use std::time::Duration;

/// Upper bounds applied to collaborator calls.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Credential store, geo index, archive and cache calls.
    pub collaborator: Duration,
    /// Object-store uploads, which carry the media payload.
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            collaborator: Duration::from_secs(5),
            upload: Duration::from_secs(30),
        }
    }
}

/// Runs `fut`, turning an elapsed deadline into [`StoreError::Timeout`].
pub async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn elapsed_call_becomes_timeout() {
        let limit = Duration::from_millis(50);
        let result: Result<(), StoreError> = bounded(limit, async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == limit));
    }

    #[tokio::test]
    async fn fast_call_passes_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
