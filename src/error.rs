//! Error types shared across the harvest pipeline.
//!
//! `FetchError` classifies individual HTTP failures so callers can tell a
//! skippable miss (404 on a crawled document) from a transport fault.
//! `HarvestError` is the fatal taxonomy: a run aborts only when the data
//! source itself is unreachable at a point the run cannot recover from.

use thiserror::Error;

/// Failure of a single HTTP fetch.
///
/// `Clone` so recorded failures can be replayed by test doubles.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("server returned status {0}")]
    Status(u16),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("request timed out")]
    TimedOut,
    #[error("request cancelled")]
    Cancelled,
}

impl FetchError {
    /// True for an HTTP 404, the one status harvesters may skip past.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status(404))
    }
}

/// Fatal harvest failure. Anything below this severity is logged and
/// recorded in the run summary instead of raised.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("data source {source} unreachable: {cause}")]
    DataSourceUnreachable {
        source: String,
        #[source]
        cause: FetchError,
    },
}

impl HarvestError {
    pub fn unreachable(source: &str, cause: FetchError) -> Self {
        HarvestError::DataSourceUnreachable {
            source: source.to_string(),
            cause,
        }
    }

    /// The underlying fetch failure that made the source unreachable.
    pub fn cause(&self) -> &FetchError {
        match self {
            HarvestError::DataSourceUnreachable { cause, .. } => cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_only_404() {
        assert!(FetchError::Status(404).is_not_found());
        assert!(!FetchError::Status(500).is_not_found());
        assert!(!FetchError::TimedOut.is_not_found());
    }

    #[test]
    fn test_unreachable_carries_source_and_cause() {
        let err = HarvestError::unreachable("jncc", FetchError::TimedOut);
        assert!(matches!(err.cause(), FetchError::TimedOut));
        assert_eq!(
            err.to_string(),
            "data source jncc unreachable: request timed out"
        );
    }
}
