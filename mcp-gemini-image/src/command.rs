//! Canonical command model.
//!
//! Every inbound message, whatever transport or wire shape delivered it, is
//! turned into exactly one [`CanonicalCommand`] before dispatch.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Tool name for image generation.
pub const TOOL_GENERATE_IMAGE: &str = "generate_image";

/// Tool name for changing the output directory.
pub const TOOL_SET_OUTPUT_DIRECTORY: &str = "set_output_directory";

/// Tool name for context-style image generation.
pub const TOOL_GENERATE_FROM_CONTEXT: &str = "generate_from_context";

/// Passthrough tool that echoes a structured thinking step.
pub const TOOL_SEQUENTIAL_THINKING: &str = "sequential_thinking";

/// Internal representation of an inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum CanonicalCommand {
    /// Generate an image and write it to disk.
    GenerateImage(GenerateImageArgs),
    /// Change the default output directory.
    SetOutputDirectory(SetOutputDirectoryArgs),
    /// Return the static capability descriptor.
    LookupProperties,
    /// Protocol-level or echo-style messages answered without side effects
    /// on configuration.
    Passthrough {
        /// What is being passed through.
        kind: PassthroughKind,
        /// The message parameters, untouched.
        payload: Value,
    },
    /// A message that matched no known shape.
    Unknown {
        /// The message as received.
        raw: Value,
    },
}

impl CanonicalCommand {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CanonicalCommand::GenerateImage(_) => "generate_image",
            CanonicalCommand::SetOutputDirectory(_) => "set_output_directory",
            CanonicalCommand::LookupProperties => "lookup_properties",
            CanonicalCommand::Passthrough { kind, .. } => kind.name(),
            CanonicalCommand::Unknown { .. } => "unknown",
        }
    }
}

/// Kinds of passthrough message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassthroughKind {
    /// JSON-RPC `initialize`.
    Initialize,
    /// JSON-RPC `shutdown`.
    Shutdown,
    /// JSON-RPC `exit`.
    Exit,
    /// JSON-RPC `tools/list`.
    ListTools,
    /// An echo tool such as `sequential_thinking`.
    Tool(String),
}

impl PassthroughKind {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            PassthroughKind::Initialize => "initialize",
            PassthroughKind::Shutdown => "shutdown",
            PassthroughKind::Exit => "exit",
            PassthroughKind::ListTools => "tools/list",
            PassthroughKind::Tool(_) => "passthrough_tool",
        }
    }
}

/// Image generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageArgs {
    /// The prompt to generate an image from
    pub prompt: String,
    /// The model to use (default: the server's configured model)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Image width in pixels (default: 1024)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    /// Image height in pixels (default: 1024)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    /// Directory to save the generated image to (default: the server's output directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// File name to save the generated image as (no directory components)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
}

impl GenerateImageArgs {
    /// Parameters with only a prompt set.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: None,
            width: None,
            height: None,
            output_path: None,
            output_filename: None,
        }
    }

    /// Validate the parameters.
    ///
    /// # Returns
    /// - `Ok(())` if all parameters are valid
    /// - `Err(Vec<ValidationError>)` with every violation found
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.prompt.trim().is_empty() {
            errors.push(ValidationError::new("prompt", "must be a non-empty string"));
        }

        if self.width == Some(0) {
            errors.push(ValidationError::new("width", "must be a positive integer"));
        }

        if self.height == Some(0) {
            errors.push(ValidationError::new("height", "must be a positive integer"));
        }

        if let Some(model) = &self.model {
            if model.trim().is_empty() {
                errors.push(ValidationError::new("model", "must not be empty"));
            }
        }

        if let Some(filename) = &self.output_filename {
            if let Err(message) = check_filename(filename) {
                errors.push(ValidationError::new("outputFilename", message));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Output directory parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SetOutputDirectoryArgs {
    /// The directory path where images will be saved
    pub path: String,
}

impl SetOutputDirectoryArgs {
    /// Validate the parameters.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        if self.path.trim().is_empty() {
            Err(vec![ValidationError::new("path", "must be a non-empty string")])
        } else {
            Ok(())
        }
    }
}

/// Parameters of the `sequential_thinking` passthrough tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequentialThinkingArgs {
    /// Current thinking step
    pub thought: String,
    /// Whether another thought step is needed
    pub next_thought_needed: bool,
    /// Current thought number
    #[schemars(range(min = 1))]
    pub thought_number: u32,
    /// Estimated total thoughts needed
    #[schemars(range(min = 1))]
    pub total_thoughts: u32,
    /// Whether this revises previous thinking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_revision: Option<bool>,
    /// Which thought is being reconsidered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revises_thought: Option<u32>,
    /// Branching point thought number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_from_thought: Option<u32>,
    /// Branch identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    /// If more thoughts are needed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_more_thoughts: Option<bool>,
}

/// Validation error details for a recognised command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// The field that failed validation.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Collapse several errors into one, keeping the first field name.
    pub fn combine(errors: Vec<ValidationError>) -> Self {
        match errors.len() {
            0 => ValidationError::new("arguments", "invalid arguments"),
            1 => errors.into_iter().next().unwrap_or_else(|| ValidationError::new("arguments", "invalid arguments")),
            _ => {
                let field = errors[0].field.clone();
                let message = errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                ValidationError::new(field, message)
            }
        }
    }
}

/// A file name must name a file directly inside the output directory.
fn check_filename(filename: &str) -> Result<(), &'static str> {
    if filename.trim().is_empty() {
        return Err("must not be empty");
    }
    if filename.contains(['/', '\\']) {
        return Err("must not contain path separators");
    }
    if filename == "." || filename == ".." {
        return Err("must name a file");
    }
    if filename.contains('\0') {
        return Err("must not contain NUL bytes");
    }
    Ok(())
}
