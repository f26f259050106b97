//! Artifact naming.
//!
//! Generated images are named
//! `{sanitized prompt prefix}_{hash10}_{timestamp}.{ext}`, for example
//! `a_red_cube_3f1c9a04be_2025-03-01T12-30-45-123Z.png`.
//!
//! The hash is taken over the raw prompt, so two prompts that sanitize to the
//! same 20-character prefix still get different names. The timestamp carries
//! no `:` or `.` so the name is valid on every common filesystem. Names are
//! reproducible from `(prompt, timestamp)`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Maximum length of the prompt-derived prefix.
pub const PREFIX_MAX_CHARS: usize = 20;

/// Number of hex characters of the prompt hash kept in the name.
pub const HASH_HEX_CHARS: usize = 10;

/// Prefix used when nothing of the prompt survives sanitizing.
pub const FALLBACK_PREFIX: &str = "image";

/// Extension used when the MIME type is not recognised.
pub const DEFAULT_EXTENSION: &str = "png";

/// Location of a generated artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    /// Directory the artifact is written to.
    pub directory: PathBuf,
    /// File name within `directory`.
    pub filename: String,
}

impl ArtifactName {
    /// Name an artifact from its prompt, creation time and extension.
    pub fn generate(directory: &Path, prompt: &str, at: DateTime<Utc>, extension: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            filename: artifact_filename(prompt, at, extension),
        }
    }

    /// Use a caller-supplied file name.
    pub fn explicit(directory: &Path, filename: &str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            filename: filename.to_string(),
        }
    }

    /// Full path of the artifact.
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.filename)
    }
}

/// Build the artifact file name for `prompt` created at `at`.
pub fn artifact_filename(prompt: &str, at: DateTime<Utc>, extension: &str) -> String {
    let sanitized = sanitize_prompt(prompt);
    let prefix: String = sanitized.chars().take(PREFIX_MAX_CHARS).collect();
    let prefix = match prefix.trim_end_matches('_') {
        "" => FALLBACK_PREFIX,
        trimmed => trimmed,
    };

    format!(
        "{}_{}_{}.{}",
        prefix,
        prompt_hash(prompt),
        filesystem_timestamp(at),
        extension
    )
}

/// Keep ASCII word characters and whitespace, then join words with `_`.
pub fn sanitize_prompt(prompt: &str) -> String {
    let kept: String = prompt
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    kept.split_whitespace().collect::<Vec<_>>().join("_")
}

/// First ten hex characters of the SHA-256 digest of the raw prompt.
pub fn prompt_hash(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(HASH_HEX_CHARS);
    hex
}

/// ISO-8601 UTC timestamp with `:` and `.` replaced by `-`.
pub fn filesystem_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string()
}

/// File extension for an image MIME type.
pub fn extension_for_mime(mime_type: &str) -> &'static str {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => DEFAULT_EXTENSION,
    }
}
