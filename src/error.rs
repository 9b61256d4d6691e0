//! Error types for the RDS SSL agent.
//!
//! This module defines all error types that can occur across both pipelines,
//! including configuration errors, remote fetch errors, export errors, and
//! external tool failures.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using [`AgentError`].
pub type Result<T> = std::result::Result<T, AgentError>;

/// Errors that can occur during certificate lifecycle operations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Configuration file missing, malformed, or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP transport error during the remote fetch.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote server answered with a non-success status.
    #[error("Remote server returned HTTP {status}: {reason}")]
    RemoteStatus {
        /// HTTP status code.
        status: u16,
        /// Canonical reason phrase for the status, if known.
        reason: String,
    },

    /// Response body could not be parsed as the expected JSON shape.
    #[error("Malformed remote response: {0}")]
    MalformedResponse(String),

    /// The received certificate was rejected by the comparator.
    #[error("Certificate rejected: {0}")]
    Validation(#[from] crate::ledger::RejectReason),

    /// A certificate, key, or CA bundle file could not be written.
    #[error("Failed to export {what} to {path}: {source}")]
    Export {
        /// Which artifact failed to export (`crt`, `key`, or `cab`).
        what: &'static str,
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An external tool exited nonzero or produced unrecognized output.
    #[error("External tool failed: {command}\n{output}")]
    Tool {
        /// The command line that was executed.
        command: String,
        /// Captured output, or a description of the failure.
        output: String,
    },

    /// Platform precondition failure (privileges, wrong OS).
    #[error("Platform error: {0}")]
    Platform(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a remote status error from an HTTP status code.
    pub fn remote_status(status: u16, reason: impl Into<String>) -> Self {
        Self::RemoteStatus {
            status,
            reason: reason.into(),
        }
    }

    /// Create a malformed response error with the given message.
    pub fn malformed_response(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create an external tool error from a command line and its output.
    pub fn tool(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::Tool {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Create a platform error with the given message.
    pub fn platform(msg: impl Into<String>) -> Self {
        Self::Platform(msg.into())
    }

    /// Returns true if this error represents a comparator rejection rather
    /// than an operational failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::remote_status(503, "Service Unavailable");
        assert_eq!(
            err.to_string(),
            "Remote server returned HTTP 503: Service Unavailable"
        );

        let err = AgentError::tool("certutil -store My", "garbage");
        assert_eq!(
            err.to_string(),
            "External tool failed: certutil -store My\ngarbage"
        );
    }

    #[test]
    fn test_is_rejection() {
        let reject = AgentError::Validation(crate::ledger::RejectReason::NotYetValid {
            valid_from: 4_102_444_800,
            fingerprint: "AA".to_string(),
        });
        assert!(reject.is_rejection());
        assert!(!AgentError::config("missing field").is_rejection());
    }
}
