pub mod discovery_service;
pub mod registration_service;

pub use discovery_service::DiscoveryService;
pub use registration_service::RegistrationService;

use crate::error::{AppError, Result};
use std::future::Future;
use std::time::Duration;

/// Runs a backend call under `limit`. Only expiry is reported in the outer
/// result; the call's own outcome is returned untouched.
pub(crate) async fn with_timeout<T, E, F>(
    operation: &str,
    limit: Duration,
    call: F,
) -> Result<std::result::Result<T, E>>
where
    F: Future<Output = std::result::Result<T, E>>,
{
    tokio::time::timeout(limit, call).await.map_err(|_| {
        tracing::error!(operation, timeout_ms = limit.as_millis() as u64, "Backend call timed out");
        AppError::Timeout {
            operation: operation.to_string(),
            after_ms: limit.as_millis() as u64,
        }
    })
}

/// [`with_timeout`] with the call's error converted and logged.
pub(crate) async fn bounded<T, E, F>(operation: &str, limit: Duration, call: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
    AppError: From<E>,
{
    with_timeout(operation, limit, call).await?.map_err(|e| {
        tracing::error!(operation, error = %e, "Backend call failed");
        AppError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::StoreError;

    #[tokio::test]
    async fn test_bounded_reports_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, StoreError>(())
        };

        let err = bounded("store put", Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::Timeout { ref operation, after_ms: 10 } if operation == "store put"
        ));
    }

    #[tokio::test]
    async fn test_bounded_converts_errors() {
        let failing = async { Err::<(), _>(StoreError::Unavailable("down".into())) };
        let err = bounded("store get", Duration::from_secs(1), failing)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
    }
}
