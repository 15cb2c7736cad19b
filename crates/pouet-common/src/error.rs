//! Shared error types

use thiserror::Error;

/// Result type alias for operations returning the shared [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors shared by every workspace member
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration value is missing, malformed or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_message() {
        let err = Error::config("url template must contain {id}");
        assert_eq!(
            err.to_string(),
            "Configuration error: url template must contain {id}"
        );
    }
}
