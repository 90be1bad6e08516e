//! Error types for the package-feed-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. A single failing source never produces one of
//! these from a federated search: source faults are isolated by the
//! coordinator and reported through per-source [`LoadingStatus`] instead.
//!
//! [`LoadingStatus`]: crate::types::LoadingStatus

/// Errors that can occur during federated package search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A continuation or refresh token was produced by a different feed,
    /// belongs to a different query shape, or names an unknown source.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// Two metadata records with different package ids were handed to the
    /// splicer.
    #[error("cannot splice metadata for different packages: {left} vs {right}")]
    SplicerMismatch {
        /// Id of the first record.
        left: String,
        /// Id of the second record.
        right: String,
    },

    /// The caller's cancellation token fired before a result was produced.
    #[error("search cancelled")]
    Cancelled,

    /// A package source call failed.
    #[error("source error: {0}")]
    Source(String),

    /// A version string could not be parsed.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// A catalogue or config document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O error while reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for package-feed-search results.
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_token() {
        let err = SearchError::InvalidToken("token belongs to another feed".into());
        assert_eq!(
            err.to_string(),
            "invalid token: token belongs to another feed"
        );
    }

    #[test]
    fn display_splicer_mismatch() {
        let err = SearchError::SplicerMismatch {
            left: "Newtonsoft.Json".into(),
            right: "System.Text.Json".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot splice metadata for different packages: Newtonsoft.Json vs System.Text.Json"
        );
    }

    #[test]
    fn display_cancelled() {
        assert_eq!(SearchError::Cancelled.to_string(), "search cancelled");
    }

    #[test]
    fn display_source() {
        let err = SearchError::Source("connection refused".into());
        assert_eq!(err.to_string(), "source error: connection refused");
    }

    #[test]
    fn display_config() {
        let err = SearchError::Config("page_size must be greater than 0".into());
        assert_eq!(
            err.to_string(),
            "config error: page_size must be greater than 0"
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: SearchError = io.into();
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchError>();
    }
}
