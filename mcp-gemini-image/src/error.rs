//! Error types for command execution.
//!
//! # Error Categories
//!
//! - `Validation`: a recognised command carried a bad or missing field
//! - `Protocol`: the transport envelope was malformed or arrived out of order
//! - `Config`: an output directory could not be resolved or created
//! - `Collaborator`: the synthesis provider failed or returned no image
//! - `Write`: the artifact could not be written after a successful synthesis
//! - `Unrecognized`: the message matched no known shape
//! - `Internal`: an unexpected fault inside command execution

use std::path::PathBuf;

use mcp_gemini_common::error::ConfigError;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::command::ValidationError;

/// Failure produced while executing a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Bad or missing field in a recognised command
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Malformed envelope or a command the lifecycle no longer accepts
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Output directory could not be resolved
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Provider failure; the reason is kept verbatim
    #[error("{0}")]
    Collaborator(String),

    /// Artifact write failed
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        /// Destination of the failed write
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The message matched no known shape
    #[error("Unrecognized command: {0}")]
    Unrecognized(Value),

    /// Unexpected fault, such as a panic in a command task
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable tag for a [`CommandError`], used for status codes and error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Protocol,
    Config,
    Collaborator,
    Write,
    Unrecognized,
    Internal,
}

impl CommandError {
    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        CommandError::Protocol(message.into())
    }

    /// Create a collaborator error carrying the provider's reason.
    pub fn collaborator(reason: impl Into<String>) -> Self {
        CommandError::Collaborator(reason.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        CommandError::Internal(message.into())
    }

    /// The stable tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Validation(_) => ErrorKind::Validation,
            CommandError::Protocol(_) => ErrorKind::Protocol,
            CommandError::Config(_) => ErrorKind::Config,
            CommandError::Collaborator(_) => ErrorKind::Collaborator,
            CommandError::Write { .. } => ErrorKind::Write,
            CommandError::Unrecognized(_) => ErrorKind::Unrecognized,
            CommandError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Detail reported to the caller.
    ///
    /// Collaborator reasons are returned untouched; everything else uses the
    /// error's display form.
    pub fn detail(&self) -> String {
        match self {
            CommandError::Collaborator(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

impl ErrorKind {
    /// Name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Config => "config",
            ErrorKind::Collaborator => "collaborator",
            ErrorKind::Write => "write",
            ErrorKind::Unrecognized => "unrecognized",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collaborator_detail_is_verbatim() {
        let err = CommandError::collaborator("safety block");
        assert_eq!(err.detail(), "safety block");
        assert_eq!(err.kind(), ErrorKind::Collaborator);
    }

    #[test]
    fn test_write_error_is_distinct_from_collaborator() {
        let err = CommandError::Write {
            path: PathBuf::from("/tmp/out/a.png"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.kind(), ErrorKind::Write);
        assert!(err.detail().contains("/tmp/out/a.png"));
        assert!(err.detail().contains("denied"));
    }

    #[test]
    fn test_validation_from() {
        let err: CommandError = ValidationError::new("prompt", "must be a non-empty string").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("prompt"));
    }

    #[test]
    fn test_config_from() {
        let err: CommandError = ConfigError::invalid_path("/nope", "denied").into();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.detail().contains("/nope"));
    }

    #[test]
    fn test_unrecognized_echoes_shape() {
        let err = CommandError::Unrecognized(json!({"foo": "bar"}));
        assert!(err.to_string().contains("\"foo\""));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(serde_json::to_value(ErrorKind::Unrecognized).unwrap(), json!("unrecognized"));
        assert_eq!(ErrorKind::Write.to_string(), "write");
    }
}
