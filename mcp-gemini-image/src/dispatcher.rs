//! Command dispatcher.
//!
//! Executes exactly one [`CanonicalCommand`] and produces exactly one
//! [`CommandResult`]. Each command runs on its own task, so a panic inside a
//! handler becomes an `Internal` failure instead of taking the transport down.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use mcp_gemini_common::server::LifecycleHandle;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use crate::command::{
    CanonicalCommand, GenerateImageArgs, PassthroughKind, SetOutputDirectoryArgs, ValidationError,
};
use crate::error::{CommandError, ErrorKind};
use crate::naming::{ArtifactName, extension_for_mime};
use crate::resources::{DEFAULT_HEIGHT, DEFAULT_WIDTH, list_tools, provider_descriptor, server_info};
use crate::store::{ConfigStore, resolve_output_directory};
use crate::synthesis::{ImageSynthesizer, SynthesisRequest};

/// Whether a command succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// The result of one command, consumed once by the originating transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Structured payload: tool data on success, `{field, reason}` for
    /// validation failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandResult {
    /// A successful result with a message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::Success,
            message: Some(message.into()),
            artifact_path: None,
            error_detail: None,
            error_kind: None,
            data: None,
        }
    }

    /// A failed result describing `error`.
    pub fn failure(error: &CommandError) -> Self {
        let data = match error {
            CommandError::Validation(v) => Some(json!({"field": v.field, "reason": v.message})),
            _ => None,
        };
        Self {
            outcome: Outcome::Failure,
            message: None,
            artifact_path: None,
            error_detail: Some(error.detail()),
            error_kind: Some(error.kind()),
            data,
        }
    }

    /// Attach the written artifact path.
    pub fn with_artifact(mut self, path: impl Into<String>) -> Self {
        self.artifact_path = Some(path.into());
        self
    }

    /// Attach structured data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Routes canonical commands to their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<ConfigStore>,
    synthesizer: Arc<dyn ImageSynthesizer>,
    lifecycle: LifecycleHandle,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("store", &self.store)
            .field("lifecycle", &self.lifecycle.state())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(
        store: Arc<ConfigStore>,
        synthesizer: Arc<dyn ImageSynthesizer>,
        lifecycle: LifecycleHandle,
    ) -> Self {
        Self {
            store,
            synthesizer,
            lifecycle,
        }
    }

    /// The shared configuration store.
    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// The server lifecycle shared with the transports.
    pub fn lifecycle(&self) -> &LifecycleHandle {
        &self.lifecycle
    }

    /// Dispatch a normalised message, reporting validation failures directly.
    pub async fn dispatch_inbound(&self, command: Result<CanonicalCommand, ValidationError>) -> CommandResult {
        match command {
            Ok(command) => self.dispatch(command).await,
            Err(validation) => {
                let error = CommandError::Validation(validation);
                warn!(kind = %error.kind(), error = %error, "Command rejected");
                CommandResult::failure(&error)
            }
        }
    }

    /// Execute one command on its own task.
    pub async fn dispatch(&self, command: CanonicalCommand) -> CommandResult {
        let name = command.name();
        let this = self.clone();
        let task = tokio::spawn(async move { this.execute(command).await });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    panic_message(join_error.into_panic())
                } else {
                    "command task was cancelled".to_string()
                };
                error!(command = name, reason = %reason, "Command task failed");
                Err(CommandError::internal(reason))
            }
        };

        match outcome {
            Ok(result) => result,
            Err(error) => {
                match error.kind() {
                    ErrorKind::Internal => error!(command = name, error = %error, "Command failed"),
                    kind => warn!(command = name, kind = %kind, error = %error, "Command failed"),
                }
                CommandResult::failure(&error)
            }
        }
    }

    async fn execute(&self, command: CanonicalCommand) -> Result<CommandResult, CommandError> {
        let is_exit = matches!(
            command,
            CanonicalCommand::Passthrough {
                kind: PassthroughKind::Exit,
                ..
            }
        );
        if !is_exit && !self.lifecycle.is_running() {
            return Err(CommandError::protocol("server is shutting down"));
        }

        match command {
            CanonicalCommand::GenerateImage(args) => self.generate_image(args).await,
            CanonicalCommand::SetOutputDirectory(args) => self.set_output_directory(args).await,
            CanonicalCommand::LookupProperties => {
                let descriptor = provider_descriptor();
                Ok(CommandResult::success(descriptor.to_string()).with_data(descriptor.clone()))
            }
            CanonicalCommand::Passthrough { kind, payload } => self.passthrough(kind, payload),
            CanonicalCommand::Unknown { raw } => Err(CommandError::Unrecognized(raw)),
        }
    }

    #[instrument(level = "info", skip(self, args), fields(prompt = %args.prompt))]
    async fn generate_image(&self, args: GenerateImageArgs) -> Result<CommandResult, CommandError> {
        args.validate().map_err(ValidationError::combine)?;

        // Latch configuration before any await on the collaborator
        let config = self.store.get().await;
        let model = args.model.clone().unwrap_or_else(|| config.default_model.clone());
        let width = args.width.unwrap_or(DEFAULT_WIDTH);
        let height = args.height.unwrap_or(DEFAULT_HEIGHT);
        let directory = match &args.output_path {
            Some(path) => resolve_output_directory(Path::new(path)).await?,
            None => config.output_directory.clone(),
        };

        info!(model = %model, width, height, "Generating image");
        let image = self
            .synthesizer
            .synthesize(SynthesisRequest {
                prompt: args.prompt.clone(),
                model: model.clone(),
                width,
                height,
            })
            .await
            .map_err(|e| CommandError::collaborator(e.to_string()))?;

        let name = match &args.output_filename {
            Some(filename) => ArtifactName::explicit(&directory, filename),
            None => ArtifactName::generate(
                &directory,
                &args.prompt,
                Utc::now(),
                extension_for_mime(&image.mime_type),
            ),
        };
        let path = name.path();

        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|source| CommandError::Write {
                path: path.clone(),
                source,
            })?;

        let image_path = path.to_string_lossy().into_owned();
        info!(path = %image_path, bytes = image.bytes.len(), "Image saved");

        Ok(CommandResult::success(format!("Image generated successfully: {}", image_path))
            .with_artifact(image_path.clone())
            .with_data(json!({
                "imagePath": image_path,
                "prompt": args.prompt,
                "model": model,
                "width": width,
                "height": height,
                "mimeType": image.mime_type,
            })))
    }

    #[instrument(level = "info", skip(self))]
    async fn set_output_directory(&self, args: SetOutputDirectoryArgs) -> Result<CommandResult, CommandError> {
        let resolved = self.store.set_output_directory(&args.path).await?;
        let resolved = resolved.to_string_lossy().into_owned();
        Ok(
            CommandResult::success(format!("Output directory successfully set to: {}", resolved))
                .with_data(json!({ "outputDirectory": resolved })),
        )
    }

    fn passthrough(&self, kind: PassthroughKind, payload: Value) -> Result<CommandResult, CommandError> {
        match kind {
            PassthroughKind::Initialize => {
                let info = serde_json::to_value(server_info())
                    .map_err(|e| CommandError::internal(format!("Failed to encode server info: {}", e)))?;
                info!("Client initialized");
                Ok(CommandResult::success("initialized").with_data(info))
            }
            PassthroughKind::Shutdown => {
                self.lifecycle.request_shutdown();
                info!("Shutdown requested");
                Ok(CommandResult::success("shutting down").with_data(Value::Null))
            }
            PassthroughKind::Exit => {
                self.lifecycle.request_exit();
                info!("Exit requested");
                Ok(CommandResult::success("exiting"))
            }
            PassthroughKind::ListTools => {
                let tools = serde_json::to_value(list_tools())
                    .map_err(|e| CommandError::internal(format!("Failed to encode tool list: {}", e)))?;
                Ok(CommandResult::success("tools").with_data(tools))
            }
            PassthroughKind::Tool(name) => {
                let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
                info!(tool = %name, "Passthrough tool");
                Ok(CommandResult::success(text).with_data(payload))
            }
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("command panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("command panicked: {}", message)
    } else {
        "command panicked".to_string()
    }
}
