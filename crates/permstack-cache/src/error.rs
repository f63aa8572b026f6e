//! Error types for cache and meta resolution operations

use thiserror::Error;

/// Errors that can occur while loading, recalculating or reading cached data
#[derive(Debug, Error)]
pub enum CacheError {
    /// The holder's node resolver failed to produce permissions or meta
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// An accumulator or result accessor was used in the wrong lifecycle state
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfiguration(String),

    /// A meta stack element string could not be parsed
    #[error("Invalid meta stack element: {0}")]
    InvalidStackElement(String),

    /// Configuration (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A background computation task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl CacheError {
    /// Shorthand used by resolver implementations
    pub fn resolution(message: impl Into<String>) -> Self {
        Self::Resolution(message.into())
    }

    pub(crate) fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState(message.into())
    }

    /// Whether this error came from the external resolver rather than the cache itself
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::Resolution(_))
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
#[allow(clippy::panic)]
#[allow(clippy::expect_used)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn verify_error_message(error: &CacheError, error_str: &str) {
        match error {
            CacheError::Resolution(msg) => {
                assert!(error_str.contains("Resolution failed"));
                assert!(error_str.contains(msg));
            }
            CacheError::IllegalState(msg) => {
                assert!(error_str.contains("Illegal state"));
                assert!(error_str.contains(msg));
            }
            CacheError::InvalidConfiguration(msg) => {
                assert!(error_str.contains("Invalid cache configuration"));
                assert!(error_str.contains(msg));
            }
            CacheError::InvalidStackElement(msg) => {
                assert!(error_str.contains("Invalid meta stack element"));
                assert!(error_str.contains(msg));
            }
            CacheError::Serialization(msg) => {
                assert!(error_str.contains("Serialization error"));
                assert!(error_str.contains(msg));
            }
            CacheError::Worker(_) => {
                assert!(error_str.contains("Worker task failed"));
            }
        }
    }

    #[test]
    fn test_cache_error_display() {
        let errors = vec![
            CacheError::Resolution("storage offline".to_string()),
            CacheError::IllegalState("not complete".to_string()),
            CacheError::InvalidConfiguration("bad config".to_string()),
            CacheError::InvalidStackElement("highest_sideways".to_string()),
            CacheError::Serialization("unexpected token".to_string()),
        ];

        for error in errors {
            let error_str = error.to_string();
            assert!(!error_str.is_empty(), "Error message should not be empty");
            verify_error_message(&error, &error_str);
        }
    }

    #[test]
    fn test_cache_error_from_json_error() {
        let json_error = serde_json::from_str::<u32>("not a number").unwrap_err();
        let cache_error = CacheError::from(json_error);

        match cache_error {
            CacheError::Serialization(msg) => assert!(!msg.is_empty()),
            _ => unreachable!("Expected Serialization error variant"),
        }
    }

    #[tokio::test]
    async fn test_cache_error_from_join_error() {
        let handle = tokio::spawn(async {
            panic!("worker exploded");
        });
        let join_error = handle.await.unwrap_err();
        let cache_error = CacheError::from(join_error);

        assert!(matches!(cache_error, CacheError::Worker(_)));
        verify_error_message(&cache_error, &cache_error.to_string());
    }

    #[test]
    fn test_resolution_helper() {
        let error = CacheError::resolution("group 'admin' missing");
        assert!(error.is_resolution_failure());
        assert!(!CacheError::illegal_state("x").is_resolution_failure());
        assert_eq!(
            error.to_string(),
            "Resolution failed: group 'admin' missing"
        );
    }
}
