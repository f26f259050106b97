//! Inbound message normalisation.
//!
//! Maps every supported wire shape onto one [`CanonicalCommand`]. Shapes are
//! tried in priority order:
//!
//! 1. a tool name (`tools/call` params, or a bare `tool` / `name` + `arguments`)
//! 2. `lookup: "properties"`
//! 3. a `call` object (`call.context.prompt`, falling back to `call.user_input`)
//! 4. a top-level `context` object
//! 5. JSON-RPC `initialize`, `shutdown`, `exit` and `tools/list`
//! 6. anything else is `Unknown`
//!
//! New shapes are added here; the dispatcher only ever sees canonical commands.

use serde_json::{Map, Value};
use tracing::debug;

use crate::command::{
    CanonicalCommand, GenerateImageArgs, PassthroughKind, SequentialThinkingArgs,
    SetOutputDirectoryArgs, TOOL_GENERATE_FROM_CONTEXT, TOOL_GENERATE_IMAGE,
    TOOL_SEQUENTIAL_THINKING, TOOL_SET_OUTPUT_DIRECTORY, ValidationError,
};
use crate::jsonrpc::{RequestId, is_jsonrpc};

/// How the reply to a message must be shaped.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// JSON-RPC 2.0. `id` is `None` for notifications, which get no reply.
    JsonRpc { id: Option<RequestId>, method: String },
    /// The `lookup` / `call` envelope, answered with `{"result": ...}`.
    Legacy,
    /// Any other shape, answered with the command result itself.
    Plain,
    /// The HTTP provider generation route.
    Provider,
}

/// A normalised inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Reply shape.
    pub envelope: Envelope,
    /// The command, or the validation failure of a recognised command.
    pub command: Result<CanonicalCommand, ValidationError>,
}

/// Normalise a parsed message.
pub fn normalize(message: &Value) -> Inbound {
    let envelope = envelope_for(message);
    let command = classify(message);
    debug!(
        envelope = ?envelope,
        command = command.as_ref().map(|c| c.name()).unwrap_or("invalid"),
        "Normalized message"
    );
    Inbound { envelope, command }
}

/// Normalise the body of `POST /v1/providers/{id}/generations`.
pub fn normalize_provider_generation(body: &Value) -> Inbound {
    let empty = Map::new();
    let context = body.get("context").and_then(Value::as_object).unwrap_or(&empty);
    let command = generate_from_fields(context, None).map(CanonicalCommand::GenerateImage);
    Inbound {
        envelope: Envelope::Provider,
        command,
    }
}

fn envelope_for(message: &Value) -> Envelope {
    if is_jsonrpc(message) {
        let id = message
            .get("id")
            .map(|v| RequestId::from_value(v).unwrap_or(RequestId::Null));
        let method = message
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Envelope::JsonRpc { id, method }
    } else if message.get("lookup").is_some() || message.get("call").is_some() {
        Envelope::Legacy
    } else {
        Envelope::Plain
    }
}

fn classify(message: &Value) -> Result<CanonicalCommand, ValidationError> {
    let unknown = || CanonicalCommand::Unknown { raw: message.clone() };

    let Some(object) = message.as_object() else {
        return Ok(unknown());
    };

    if let Some((name, arguments)) = tool_invocation(message, object) {
        return from_tool(name, arguments, message);
    }

    if let Some(lookup) = object.get("lookup") {
        return Ok(if lookup.as_str() == Some("properties") {
            CanonicalCommand::LookupProperties
        } else {
            unknown()
        });
    }

    if let Some(call) = object.get("call").and_then(Value::as_object) {
        return from_context_shape(call);
    }

    if let Some(context) = object.get("context").and_then(Value::as_object) {
        return generate_from_fields(context, object.get("user_input"))
            .map(CanonicalCommand::GenerateImage);
    }

    if is_jsonrpc(message) {
        let params = object.get("params").cloned().unwrap_or(Value::Null);
        let kind = match object.get("method").and_then(Value::as_str) {
            Some("initialize") => Some(PassthroughKind::Initialize),
            Some("shutdown") => Some(PassthroughKind::Shutdown),
            Some("exit") => Some(PassthroughKind::Exit),
            Some("tools/list") => Some(PassthroughKind::ListTools),
            _ => None,
        };
        if let Some(kind) = kind {
            return Ok(CanonicalCommand::Passthrough { kind, payload: params });
        }
    }

    Ok(unknown())
}

static NULL: Value = Value::Null;

/// Find a tool name and its arguments, if the message names a tool.
fn tool_invocation<'a>(message: &'a Value, object: &'a Map<String, Value>) -> Option<(&'a Value, Value)> {
    if is_jsonrpc(message) {
        if object.get("method").and_then(Value::as_str) == Some("tools/call") {
            let params = object.get("params");
            let name = params.and_then(|p| p.get("name")).unwrap_or(&NULL);
            let arguments = params
                .and_then(|p| p.get("arguments"))
                .cloned()
                .unwrap_or(Value::Null);
            return Some((name, arguments));
        }
        return None;
    }

    if let Some(name) = object.get("tool") {
        let arguments = object.get("arguments").cloned().unwrap_or_else(|| {
            let mut rest = object.clone();
            rest.remove("tool");
            Value::Object(rest)
        });
        return Some((name, arguments));
    }

    if let (Some(name), Some(arguments)) = (object.get("name"), object.get("arguments")) {
        return Some((name, arguments.clone()));
    }

    None
}

fn from_tool(name: &Value, arguments: Value, raw: &Value) -> Result<CanonicalCommand, ValidationError> {
    let Some(name) = name.as_str() else {
        return Ok(CanonicalCommand::Unknown { raw: raw.clone() });
    };

    let arguments = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        _ => return Err(ValidationError::new("arguments", "must be an object")),
    };

    match name {
        TOOL_GENERATE_IMAGE => {
            generate_from_fields(&arguments, None).map(CanonicalCommand::GenerateImage)
        }
        TOOL_SET_OUTPUT_DIRECTORY => {
            let args = SetOutputDirectoryArgs {
                path: required_string(&arguments, "path")?,
            };
            args.validate().map_err(ValidationError::combine)?;
            Ok(CanonicalCommand::SetOutputDirectory(args))
        }
        TOOL_GENERATE_FROM_CONTEXT => from_context_shape(&arguments),
        TOOL_SEQUENTIAL_THINKING => {
            let payload = Value::Object(arguments);
            serde_json::from_value::<SequentialThinkingArgs>(payload.clone())
                .map_err(|e| ValidationError::new("arguments", e.to_string()))?;
            Ok(CanonicalCommand::Passthrough {
                kind: PassthroughKind::Tool(name.to_string()),
                payload,
            })
        }
        _ => Ok(CanonicalCommand::Unknown { raw: raw.clone() }),
    }
}

/// `{ context: {...}, user_input? }`, or flat fields when there is no `context`.
fn from_context_shape(object: &Map<String, Value>) -> Result<CanonicalCommand, ValidationError> {
    let fallback = object.get("user_input");
    let args = match object.get("context") {
        Some(Value::Object(context)) => generate_from_fields(context, fallback)?,
        Some(Value::Null) | None => generate_from_fields(object, fallback)?,
        Some(_) => return Err(ValidationError::new("context", "must be an object")),
    };
    Ok(CanonicalCommand::GenerateImage(args))
}

/// Build and validate generation parameters from a field map.
///
/// `fallback_prompt` is used when `prompt` is absent or blank.
fn generate_from_fields(
    fields: &Map<String, Value>,
    fallback_prompt: Option<&Value>,
) -> Result<GenerateImageArgs, ValidationError> {
    let prompt = match optional_string(fields, "prompt")? {
        Some(prompt) if !prompt.trim().is_empty() => prompt,
        primary => match fallback_prompt {
            Some(Value::String(input)) => input.clone(),
            Some(Value::Null) | None => primary.unwrap_or_default(),
            Some(_) => return Err(ValidationError::new("user_input", "must be a string")),
        },
    };

    let output_path = match optional_string(fields, "outputPath")? {
        Some(path) => Some(path),
        None => optional_string(fields, "outputDir")?,
    };

    let args = GenerateImageArgs {
        prompt,
        model: optional_string(fields, "model")?,
        width: optional_dimension(fields, "width")?,
        height: optional_dimension(fields, "height")?,
        output_path,
        output_filename: optional_string(fields, "outputFilename")?,
    };

    args.validate().map_err(ValidationError::combine)?;
    Ok(args)
}

fn required_string(fields: &Map<String, Value>, field: &str) -> Result<String, ValidationError> {
    optional_string(fields, field)?.ok_or_else(|| ValidationError::new(field, "is required"))
}

/// A missing or null field is `None`; any other non-string is rejected.
fn optional_string(fields: &Map<String, Value>, field: &str) -> Result<Option<String>, ValidationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ValidationError::new(field, "must be a string")),
    }
}

fn optional_dimension(fields: &Map<String, Value>, field: &str) -> Result<Option<u32>, ValidationError> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| ValidationError::new(field, "must be a positive integer")),
    }
}

/// Recover a request id from text that failed to parse as JSON.
///
/// Scans for an `"id"` key at the top level of the outermost object and reads
/// the value after its `:`, accepting only strings and integers. Keys inside
/// nested objects or arrays, and `"id"` appearing as a string value, are
/// skipped.
pub fn recover_request_id(raw: &str) -> Option<RequestId> {
    let bytes = raw.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'{' | b'[' => depth += 1,
            b'}' | b']' => depth = depth.saturating_sub(1),
            b'"' => {
                let close = closing_quote(bytes, i + 1)?;
                if depth == 1 && &raw[i + 1..close] == "id" {
                    if let Some(value) = raw[close + 1..].trim_start().strip_prefix(':') {
                        if let Some(id) = leading_request_id(value) {
                            return Some(id);
                        }
                    }
                }
                i = close;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Index of the quote closing a string whose body starts at `from`.
fn closing_quote(bytes: &[u8], mut from: usize) -> Option<usize> {
    while from < bytes.len() {
        match bytes[from] {
            b'\\' => from += 2,
            b'"' => return Some(from),
            _ => from += 1,
        }
    }
    None
}

fn leading_request_id(text: &str) -> Option<RequestId> {
    let mut values = serde_json::Deserializer::from_str(text.trim_start()).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => RequestId::from_value(&value),
        _ => None,
    }
}
