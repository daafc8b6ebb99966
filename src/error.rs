//! Error types for the gateway.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Process-level errors (startup, configuration, I/O).
///
/// Per-request failures never surface here; they are folded into the
/// response envelope by [`crate::gateway::Gateway::handle`].
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration source could not be read or deserialized
    #[error("Configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Document store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::ser::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config("max_pool_size must be greater than zero".to_string());
        assert!(err.to_string().contains("max_pool_size"));

        let err: Error = StoreError::ConnectionFailed("refused".to_string()).into();
        assert_eq!(err.to_string(), "Store error: Connection failed: refused");
    }
}
