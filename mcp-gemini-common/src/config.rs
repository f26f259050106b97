//! Configuration module for loading environment variables and settings.

use std::fmt;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Default directory for generated images, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "./generated-images";

/// Default Gemini model used when a request does not name one.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

/// Default Generative Language API base URL.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default HTTP listen host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default HTTP listen port.
pub const DEFAULT_PORT: u16 = 23032;

/// Default timeout for a single synthesis request, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Load `.env` and then `.env.local` into the process environment.
///
/// Missing files are ignored. Call this before parsing CLI arguments that
/// read from the environment.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
    let _ = dotenvy::from_filename_override(".env.local");
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Gemini API key (required)
    pub api_key: String,
    /// Directory generated images are written to, as configured (may be relative)
    pub output_dir: PathBuf,
    /// Model used when a request does not specify one
    pub default_model: String,
    /// Base URL of the Generative Language API
    pub api_base: String,
    /// Timeout applied to each synthesis request
    pub request_timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("output_dir", &self.output_dir)
            .field("default_model", &self.default_model)
            .field("api_base", &self.api_base)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Config {
    /// Build configuration from a key lookup, normally the process
    /// environment after [`load_dotenv`].
    ///
    /// Empty values are treated as unset. The HTTP host and port are not
    /// part of this; they come from the transport flags.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if no API key is set, or
    /// `ConfigError::InvalidValue` if a numeric setting cannot be parsed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY")
            .or_else(|| get("GOOGLE_API_KEY"))
            .ok_or_else(|| ConfigError::missing_env_var("GEMINI_API_KEY"))?;

        let output_dir = get("OUTPUT_DIR")
            .or_else(|| get("DEFAULT_OUTPUT_DIR"))
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

        let default_model = get("DEFAULT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let api_base = get("GEMINI_API_BASE")
            .map(|base| base.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let request_timeout_secs = match get("GEMINI_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                ConfigError::invalid_value("GEMINI_TIMEOUT_SECS", format!("'{}' is not a number of seconds", raw))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_key,
            output_dir: PathBuf::from(output_dir),
            default_model,
            api_base,
            request_timeout_secs,
        })
    }

    /// Get the `generateContent` endpoint URL for a given model.
    ///
    /// The API key is not part of the returned URL; callers attach it as a
    /// query parameter so it never ends up in logs.
    pub fn generate_content_endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }
}
