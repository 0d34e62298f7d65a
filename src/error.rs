//! Error taxonomy for the SDK.
//!
//! Every failure surfaced by the facade is one of these variants. The
//! response normalizer ([`crate::normalize`]) is the only place that maps
//! HTTP status codes onto them; nothing in the SDK retries automatically.
//!
//! | Variant | Raised When |
//! |---------|-------------|
//! | `Configuration` | No server URL or API key resolvable, or a config file is unreadable |
//! | `Connection` | The server could not be reached (connect error, timeout) |
//! | `Authentication` | HTTP 401 |
//! | `NotFound` | HTTP 404 |
//! | `Validation` | HTTP 422, with field-level details |
//! | `Retrieval` | A knowledge-base query failed while assembling a chat prompt |
//! | `UnknownApi` | Any other non-2xx status |
//! | `InvalidInput` | A required argument was empty |
//! | `Io` | A local file or directory could not be read |
//! | `UnexpectedResponse` | A 2xx payload did not have the expected shape |

use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Error type for all SDK operations.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Credentials could not be resolved from any configuration source.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The transport could not reach the server.
    #[error("connection error: {0}")]
    Connection(String),

    /// The server rejected the API key (401).
    #[error("authentication failed during {0}: invalid or missing API key")]
    Authentication(String),

    /// The requested resource does not exist (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// The server rejected the request payload (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// A knowledge-base query failed while building an augmented prompt.
    #[error("retrieval from knowledge base '{knowledge_id}' failed: {cause}")]
    Retrieval {
        /// The knowledge base whose query failed.
        knowledge_id: String,
        /// The underlying failure, rendered.
        cause: String,
    },

    /// Any other non-success status.
    #[error("API error {status} on {label}: {message}")]
    UnknownApi {
        /// HTTP status code.
        status: u16,
        /// Operation label.
        label: String,
        /// Body excerpt or other detail.
        message: String,
    },

    /// A required argument was empty or malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A local file could not be read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A successful response whose payload could not be interpreted.
    #[error("unexpected response for {label}: {message}")]
    UnexpectedResponse {
        /// Operation label.
        label: String,
        /// What was wrong with the payload.
        message: String,
    },
}

/// Result alias for SDK operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// The HTTP status associated with this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication(_) => Some(401),
            Self::NotFound(_) => Some(404),
            Self::Validation(_) => Some(422),
            Self::UnknownApi { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Fails with [`Error::InvalidInput`] when `value` is blank.
pub(crate) fn require_non_empty(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{name} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnknownApi {
            status: 500,
            label: "folder list".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "API error 500 on folder list: boom");

        let err = Error::Retrieval {
            knowledge_id: "kb1".to_string(),
            cause: "not found: query".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "retrieval from knowledge base 'kb1' failed: not found: query"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(Error::Authentication("x".into()).status(), Some(401));
        assert_eq!(Error::NotFound("x".into()).status(), Some(404));
        assert_eq!(Error::Validation("x".into()).status(), Some(422));
        assert_eq!(Error::Connection("x".into()).status(), None);
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("name", "docs").is_ok());
        let err = require_non_empty("name", "   ").unwrap_err();
        assert_eq!(err.to_string(), "invalid input: name must not be empty");
    }
}
