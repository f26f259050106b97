//! Error types for the common library.
//!
//! Configuration failures are reported through [`ConfigError`], both when the
//! environment is loaded at startup and when the output directory is changed
//! at runtime.

use thiserror::Error;

/// Configuration errors.
///
/// These errors occur when loading configuration from environment variables
/// or when an output directory cannot be resolved or created.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set
    #[error("Required environment variable {0} is not set")]
    MissingEnvVar(String),

    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// An output directory could not be resolved to an absolute, existing path
    #[error("Invalid output directory '{path}': {reason}")]
    InvalidPath {
        /// The path as supplied by the caller
        path: String,
        /// Why resolution or creation failed
        reason: String,
    },
}

impl ConfigError {
    /// Create a new missing environment variable error.
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        ConfigError::MissingEnvVar(name.into())
    }

    /// Create a new invalid value error.
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue(name.into(), reason.into())
    }

    /// Create a new invalid path error.
    ///
    /// # Example
    ///
    /// ```
    /// use mcp_gemini_common::error::ConfigError;
    ///
    /// let err = ConfigError::invalid_path("/root/forbidden", "permission denied");
    /// assert!(err.to_string().contains("/root/forbidden"));
    /// assert!(err.to_string().contains("permission denied"));
    /// ```
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
