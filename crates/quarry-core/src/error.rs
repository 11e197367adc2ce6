//! Error handling for the quarry core library.
//!
//! This module defines the main error type `Error` used throughout the library,
//! along with a convenient `Result` type alias. It uses `thiserror` for easy
//! error handling and implements conversions from common error types.
//!
//! # Examples
//!
//! ```
//! use quarry_core::error::{Error, Result};
//!
//! fn resolve(endpoint: Option<&str>) -> Result<String> {
//!     endpoint.map(String::from).ok_or(Error::NoEndpoint)
//! }
//!
//! assert!(resolve(None).is_err());
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Result type for quarry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for quarry operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The leading comment block of a template is not a valid metadata document
    #[error("Malformed metadata in {}: {message}", path.display())]
    MalformedMetadata { path: PathBuf, message: String },

    /// No fixed, caller-supplied or default endpoint is available
    #[error("No SPARQL endpoint configured for this query")]
    NoEndpoint,

    /// Required parameters were absent from the request (strict mode only)
    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    /// The backend answered, but not with a usable result
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transport-level failure talking to the backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Template error
    #[error("Template error: {0}")]
    Template(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a new template error
    pub fn template<S: Into<String>>(msg: S) -> Self {
        Self::Template(msg.into())
    }

    /// Create a new malformed metadata error for the template at `path`
    pub fn malformed<P: Into<PathBuf>, S: Into<String>>(path: P, msg: S) -> Self {
        Self::MalformedMetadata {
            path: path.into(),
            message: msg.into(),
        }
    }

    /// Whether this error is caused by the caller's request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NoEndpoint | Self::MissingParameters(_))
    }

    /// Whether this error originates from executing a query against the backend
    pub fn is_backend_error(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Http(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::NoEndpoint.is_client_error());
        assert!(Error::MissingParameters(vec!["id".into()]).is_client_error());
        assert!(Error::backend("boom").is_backend_error());
        assert!(!Error::config("bad").is_client_error());
        assert!(!Error::template("bad").is_backend_error());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::MissingParameters(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Missing required parameters: a, b");

        let err = Error::malformed("queries/x.rq", "did not find expected key");
        assert_eq!(
            err.to_string(),
            "Malformed metadata in queries/x.rq: did not find expected key"
        );
    }
}
