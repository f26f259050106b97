//! Reply rendering.
//!
//! Turns a [`CommandResult`] into the envelope its message arrived in.

use rmcp::model::{CallToolResult, Content};
use serde_json::{Value, json};

use crate::dispatcher::{CommandResult, Outcome};
use crate::error::ErrorKind;
use crate::jsonrpc::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JsonRpcError, JsonRpcResponse, METHOD_NOT_FOUND,
    RequestId,
};
use crate::normalize::Envelope;

/// Render `result` for `envelope`.
///
/// Returns `None` when no reply may be sent (JSON-RPC notifications).
pub fn render(envelope: &Envelope, result: &CommandResult) -> Option<Value> {
    match envelope {
        Envelope::JsonRpc { id: None, .. } => None,
        Envelope::JsonRpc { id: Some(id), method } => Some(render_jsonrpc(id.clone(), method, result)),
        Envelope::Legacy => Some(render_legacy(result)),
        Envelope::Plain => Some(render_plain(result)),
        Envelope::Provider => Some(render_provider(result)),
    }
}

/// The command result itself.
pub fn render_plain(result: &CommandResult) -> Value {
    serde_json::to_value(result).unwrap_or_default()
}

/// JSON-RPC error for a message that could not be parsed.
pub fn parse_failure(id: RequestId, detail: &str) -> Value {
    serde_json::to_value(JsonRpcError::new(id, INTERNAL_ERROR, format!("Parse error: {}", detail)))
        .unwrap_or_default()
}

fn render_jsonrpc(id: RequestId, method: &str, result: &CommandResult) -> Value {
    let is_tool_call = method == "tools/call";

    let rendered = match (result.outcome, result.error_kind) {
        (Outcome::Success, _) if is_tool_call => {
            let text = match &result.data {
                Some(data) => serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
                None => result.message.clone().unwrap_or_default(),
            };
            let tool_result = CallToolResult::success(vec![Content::text(text)]);
            Ok(serde_json::to_value(tool_result).unwrap_or_default())
        }
        (Outcome::Success, _) => Ok(result.data.clone().unwrap_or(Value::Null)),
        (Outcome::Failure, Some(ErrorKind::Validation)) => Err((INVALID_PARAMS, result.data.clone())),
        (Outcome::Failure, Some(ErrorKind::Unrecognized)) => Err((METHOD_NOT_FOUND, None)),
        (Outcome::Failure, Some(ErrorKind::Protocol)) => Err((INVALID_REQUEST, None)),
        (Outcome::Failure, Some(ErrorKind::Internal)) | (Outcome::Failure, None) => {
            Err((INTERNAL_ERROR, None))
        }
        (Outcome::Failure, Some(_)) if is_tool_call => {
            let detail = result.error_detail.clone().unwrap_or_default();
            let tool_result = CallToolResult::error(vec![Content::text(format!("Error: {}", detail))]);
            Ok(serde_json::to_value(tool_result).unwrap_or_default())
        }
        (Outcome::Failure, Some(_)) => Err((INTERNAL_ERROR, None)),
    };

    match rendered {
        Ok(value) => serde_json::to_value(JsonRpcResponse::new(id, value)).unwrap_or_default(),
        Err((code, data)) => {
            let message = result.error_detail.clone().unwrap_or_default();
            let mut error = JsonRpcError::new(id, code, message);
            if let Some(data) = data {
                error = error.with_data(data);
            }
            serde_json::to_value(error).unwrap_or_default()
        }
    }
}

fn render_legacy(result: &CommandResult) -> Value {
    match (result.outcome, &result.artifact_path) {
        (Outcome::Success, Some(image_path)) => json!({
            "result": {
                "success": true,
                "message": "Image generated successfully",
                "imagePath": image_path,
            }
        }),
        (Outcome::Success, None) => json!({
            "result": result.data.clone().unwrap_or_else(|| json!(result.message)),
        }),
        (Outcome::Failure, _) => json!({
            "result": {
                "success": false,
                "error": result.error_detail,
            }
        }),
    }
}

fn render_provider(result: &CommandResult) -> Value {
    match result.outcome {
        Outcome::Success => {
            let data = result.data.clone().unwrap_or_default();
            json!({
                "content": result.message,
                "metadata": {
                    "imagePath": data.get("imagePath"),
                    "prompt": data.get("prompt"),
                    "width": data.get("width"),
                    "height": data.get("height"),
                    "model": data.get("model"),
                }
            })
        }
        Outcome::Failure => json!({ "error": result.error_detail }),
    }
}
