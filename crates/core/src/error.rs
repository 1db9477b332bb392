//! Error types for mozbuilds
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for mozbuilds
#[derive(Error, Debug)]
pub enum MozBuildsError {
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Result type alias for mozbuilds operations
pub type Result<T> = std::result::Result<T, MozBuildsError>;

impl MozBuildsError {
    /// Network failure without an underlying cause
    pub fn network(message: impl Into<String>) -> Self {
        MozBuildsError::Network {
            message: message.into(),
            cause: None,
        }
    }

    /// Network failure wrapping the transport error
    pub fn network_with_cause<E>(message: impl Into<String>, cause: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        MozBuildsError::Network {
            message: message.into(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MozBuildsError::Network { .. } | MozBuildsError::Timeout(_)
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            MozBuildsError::Network { message, .. } => {
                format!("Network error: {}. Please check your connection.", message)
            }
            MozBuildsError::Io(e) => format!("File operation failed: {}", e),
            MozBuildsError::Config(msg) => format!("Configuration error: {}", msg),
            MozBuildsError::Json(_) | MozBuildsError::Parse(_) => {
                "The server returned data that could not be read".to_string()
            }
            MozBuildsError::NotFound(msg) => format!("Not found: {}", msg),
            MozBuildsError::Timeout(msg) => format!("Timed out: {}", msg),
            _ => self.to_string(),
        }
    }
}

impl From<reqwest::Error> for MozBuildsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return MozBuildsError::Timeout(err.to_string());
        }
        let message = match err.url() {
            Some(url) => format!("request to {} failed", url),
            None => "request failed".to_string(),
        };
        MozBuildsError::network_with_cause(message, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable() {
        assert!(MozBuildsError::network("offline").is_recoverable());
        assert!(MozBuildsError::Timeout("slow".into()).is_recoverable());
        assert!(!MozBuildsError::Config("bad".into()).is_recoverable());
    }

    #[test]
    fn test_network_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = MozBuildsError::network_with_cause("GET failed", io);
        assert_eq!(err.to_string(), "Network error: GET failed");
        assert!(err.source().is_some());
        assert!(err.user_message().contains("check your connection"));
    }
}
