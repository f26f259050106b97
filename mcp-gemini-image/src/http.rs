//! HTTP transport.
//!
//! Routes:
//! - `/` and `/mcp`: any supported message shape, routed by body
//! - `/v1/providers/{id}`: the provider descriptor
//! - `/v1/providers/{id}/generations`: provider-style generation
//!
//! `OPTIONS` on any path answers 204 with CORS headers. Methods other than
//! `GET`, `POST` and `OPTIONS`, and unknown paths, answer 404. Bodies are read
//! in full and malformed JSON is rejected with 400 before dispatch.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
};
use mcp_gemini_common::server::ServerError;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::command::CanonicalCommand;
use crate::dispatcher::{CommandResult, Dispatcher};
use crate::error::{CommandError, ErrorKind};
use crate::normalize::{Envelope, normalize, normalize_provider_generation};
use crate::reply::{render, render_plain};
use crate::resources::PROVIDER_ID;

/// Build the HTTP router.
pub fn router(dispatcher: Dispatcher) -> Router {
    Router::new()
        .route("/", any(handle_message))
        .route("/mcp", any(handle_message))
        .route("/v1/providers/{provider_id}", any(handle_provider))
        .route("/v1/providers/{provider_id}/generations", any(handle_generation))
        .fallback(handle_fallback)
        .layer(middleware::map_response(add_cors_headers))
        .with_state(dispatcher)
}

/// Bind `addr` and serve until exit or a shutdown signal.
pub async fn serve(dispatcher: Dispatcher, addr: &str) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::BindFailed {
            addr: addr.to_string(),
            message: e.to_string(),
        })?;
    serve_with_listener(dispatcher, listener).await
}

/// Serve on an already-bound listener.
pub async fn serve_with_listener(dispatcher: Dispatcher, listener: TcpListener) -> Result<(), ServerError> {
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "HTTP server listening");

    let lifecycle = dispatcher.lifecycle().clone();
    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(async move { lifecycle.stopped().await })
        .await
        .map_err(|e| ServerError::Transport(e.to_string()))?;

    info!("HTTP server stopped");
    Ok(())
}

/// HTTP status for a command result.
pub fn status_for(result: &CommandResult) -> StatusCode {
    match result.error_kind {
        None => StatusCode::OK,
        Some(ErrorKind::Validation | ErrorKind::Protocol | ErrorKind::Config) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::Unrecognized) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Collaborator | ErrorKind::Write | ErrorKind::Internal) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn handle_message(State(dispatcher): State<Dispatcher>, method: Method, body: Bytes) -> Response {
    if let Some(response) = preflight_or_reject(&method) {
        return response;
    }

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Malformed JSON request body");
            let error = CommandError::protocol(format!("Invalid JSON request body: {}", e));
            let result = CommandResult::failure(&error);
            return (status_for(&result), Json(render_plain(&result))).into_response();
        }
    };

    let inbound = normalize(&message);
    let result = dispatcher.dispatch_inbound(inbound.command).await;
    let status = status_for(&result);

    match inbound.envelope {
        Envelope::JsonRpc { .. } => match render(&inbound.envelope, &result) {
            Some(reply) => (status, Json(reply)).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
        _ => (status, Json(render_plain(&result))).into_response(),
    }
}

async fn handle_provider(
    State(dispatcher): State<Dispatcher>,
    method: Method,
    Path(provider_id): Path<String>,
) -> Response {
    if let Some(response) = preflight_or_reject(&method) {
        return response;
    }
    if provider_id != PROVIDER_ID {
        return unknown_provider(&provider_id);
    }

    let result = dispatcher.dispatch(CanonicalCommand::LookupProperties).await;
    let status = status_for(&result);
    match result.data {
        Some(descriptor) if result.is_success() => (status, Json(descriptor)).into_response(),
        _ => (status, Json(json!({ "error": result.error_detail }))).into_response(),
    }
}

async fn handle_generation(
    State(dispatcher): State<Dispatcher>,
    method: Method,
    Path(provider_id): Path<String>,
    body: Bytes,
) -> Response {
    if let Some(response) = preflight_or_reject(&method) {
        return response;
    }
    if provider_id != PROVIDER_ID {
        return unknown_provider(&provider_id);
    }

    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Malformed JSON request body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid JSON request body: {}", e) })),
            )
                .into_response();
        }
    };

    let inbound = normalize_provider_generation(&body);
    let result = dispatcher.dispatch_inbound(inbound.command).await;
    let reply = render(&inbound.envelope, &result).unwrap_or_default();
    (status_for(&result), Json(reply)).into_response()
}

async fn handle_fallback(method: Method) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }
    not_found()
}

/// `OPTIONS` answers 204; anything but `GET`/`POST` answers 404.
fn preflight_or_reject(method: &Method) -> Option<Response> {
    if *method == Method::OPTIONS {
        Some(StatusCode::NO_CONTENT.into_response())
    } else if *method != Method::GET && *method != Method::POST {
        debug!(method = %method, "Method not routed");
        Some(not_found())
    } else {
        None
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" }))).into_response()
}

fn unknown_provider(provider_id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("Unknown provider: {}", provider_id) })),
    )
        .into_response()
}

async fn add_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::ValidationError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&CommandResult::success("ok")), StatusCode::OK);

        let cases = [
            (CommandError::Validation(ValidationError::new("prompt", "x")), StatusCode::BAD_REQUEST),
            (CommandError::protocol("x"), StatusCode::BAD_REQUEST),
            (
                CommandError::Config(mcp_gemini_common::ConfigError::invalid_path("/x", "y")),
                StatusCode::BAD_REQUEST,
            ),
            (CommandError::Unrecognized(Value::Null), StatusCode::NOT_FOUND),
            (CommandError::collaborator("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                CommandError::Write {
                    path: "/x".into(),
                    source: std::io::Error::other("disk full"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (CommandError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(status_for(&CommandResult::failure(&error)), status, "{}", error);
        }
    }

    #[test]
    fn test_preflight() {
        assert_eq!(
            preflight_or_reject(&Method::OPTIONS).unwrap().status(),
            StatusCode::NO_CONTENT
        );
        assert_eq!(
            preflight_or_reject(&Method::DELETE).unwrap().status(),
            StatusCode::NOT_FOUND
        );
        assert!(preflight_or_reject(&Method::POST).is_none());
        assert!(preflight_or_reject(&Method::GET).is_none());
    }
}
