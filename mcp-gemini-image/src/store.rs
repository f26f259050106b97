//! Process-wide configuration store.
//!
//! The store hands out [`Configuration`] snapshots as shared `Arc`s. Updates
//! swap in a new `Arc` rather than mutating the old one, so a command holding
//! a snapshot keeps its output directory even if `set_output_directory` runs
//! while the command is still waiting on the synthesis call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mcp_gemini_common::config::Config;
use mcp_gemini_common::error::ConfigError;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

/// Server-wide settings read by every generation command.
#[derive(Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Provider API key.
    pub api_key: String,
    /// Absolute, existing directory artifacts are written to.
    pub output_directory: PathBuf,
    /// Model used when a request does not name one.
    pub default_model: String,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("api_key", &"<redacted>")
            .field("output_directory", &self.output_directory)
            .field("default_model", &self.default_model)
            .finish()
    }
}

/// Shared, concurrently readable configuration.
#[derive(Debug)]
pub struct ConfigStore {
    current: RwLock<Arc<Configuration>>,
}

impl ConfigStore {
    /// Build a store from startup configuration.
    ///
    /// The configured output directory is resolved and created before the
    /// store is returned, so the store never holds a relative or missing path.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPath` if the directory cannot be created.
    pub async fn initialize(config: &Config) -> Result<Self, ConfigError> {
        let output_directory = resolve_output_directory(&config.output_dir).await?;
        info!(output_directory = %output_directory.display(), "Output directory ready");

        Ok(Self::from_configuration(Configuration {
            api_key: config.api_key.clone(),
            output_directory,
            default_model: config.default_model.clone(),
        }))
    }

    /// Build a store from an already-resolved configuration.
    pub fn from_configuration(configuration: Configuration) -> Self {
        Self {
            current: RwLock::new(Arc::new(configuration)),
        }
    }

    /// Return a snapshot of the current configuration.
    pub async fn get(&self) -> Arc<Configuration> {
        Arc::clone(&*self.current.read().await)
    }

    /// Replace the output directory.
    ///
    /// The path is validated, made absolute and created before the stored
    /// value is swapped. The lock is only taken for the swap itself.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidPath` if the path is empty or cannot be
    /// resolved or created.
    #[instrument(level = "debug", skip(self))]
    pub async fn set_output_directory(&self, path: &str) -> Result<PathBuf, ConfigError> {
        if path.trim().is_empty() {
            return Err(ConfigError::invalid_path(path, "path cannot be empty"));
        }

        let resolved = resolve_output_directory(Path::new(path)).await?;

        let mut guard = self.current.write().await;
        let mut next = Configuration::clone(&guard);
        next.output_directory = resolved.clone();
        *guard = Arc::new(next);
        drop(guard);

        info!(output_directory = %resolved.display(), "Output directory updated");
        Ok(resolved)
    }
}

/// Resolve `path` to an absolute directory, creating it if absent.
pub async fn resolve_output_directory(path: &Path) -> Result<PathBuf, ConfigError> {
    let display = path.display().to_string();

    let absolute = std::path::absolute(path)
        .map_err(|e| ConfigError::invalid_path(&display, e.to_string()))?;

    tokio::fs::create_dir_all(&absolute)
        .await
        .map_err(|e| ConfigError::invalid_path(&display, e.to_string()))?;

    let canonical = tokio::fs::canonicalize(&absolute)
        .await
        .map_err(|e| ConfigError::invalid_path(&display, e.to_string()))?;

    let metadata = tokio::fs::metadata(&canonical)
        .await
        .map_err(|e| ConfigError::invalid_path(&display, e.to_string()))?;
    if !metadata.is_dir() {
        return Err(ConfigError::invalid_path(&display, "not a directory"));
    }

    debug!(path = %canonical.display(), "Resolved output directory");
    Ok(canonical)
}
