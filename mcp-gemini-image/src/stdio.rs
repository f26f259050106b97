//! Stdio transport.
//!
//! One JSON value per input line, one JSON value per output line. Lines are
//! handled strictly in order: a line's command, including any synthesis
//! call, completes before the next line is read. Diagnostics go to stderr
//! through `tracing`; nothing but replies is written to the output stream.

use mcp_gemini_common::server::ServerError;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

use crate::dispatcher::Dispatcher;
use crate::normalize::{normalize, recover_request_id};
use crate::reply::{parse_failure, render};

/// Serve on the process's stdin and stdout.
pub async fn serve_stdio(dispatcher: Dispatcher) -> Result<(), ServerError> {
    run_stdio(&dispatcher, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
}

/// Run the line loop until end of input, `exit`, or a shutdown signal.
///
/// A signal received while a command is executing lets that command finish
/// and reply, then stops the loop.
pub async fn run_stdio<R, W>(dispatcher: &Dispatcher, input: R, mut output: W) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let signal_watcher = dispatcher.lifecycle().exit_on_signal();
    info!("Stdio transport started");

    let result = serve_lines(dispatcher, input, &mut output).await;
    signal_watcher.abort();
    result?;

    output.flush().await?;
    info!("Stdio transport stopped");
    Ok(())
}

async fn serve_lines<R, W>(dispatcher: &Dispatcher, mut input: R, output: &mut W) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let lifecycle = dispatcher.lifecycle();
    let mut buf = Vec::new();

    while !lifecycle.is_exited() {
        buf.clear();
        let read = tokio::select! {
            read = input.read_until(b'\n', &mut buf) => read?,
            _ = lifecycle.exited() => break,
        };
        if read == 0 {
            info!("EOF on stdin, shutting down");
            break;
        }

        // Invalid UTF-8 is a malformed line like any other, never fatal
        let reply = match std::str::from_utf8(&buf) {
            Ok(line) => handle_line(dispatcher, line).await,
            Err(e) => malformed_line(&String::from_utf8_lossy(&buf), &format!("invalid UTF-8: {}", e)),
        };

        if let Some(reply) = reply {
            write_line(output, &reply).await?;
        }
    }
    Ok(())
}

/// Handle one input line, returning the reply to write, if any.
pub async fn handle_line(dispatcher: &Dispatcher, line: &str) -> Option<Value> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let message: Value = match serde_json::from_str(trimmed) {
        Ok(message) => message,
        Err(e) => return malformed_line(trimmed, &e.to_string()),
    };

    let inbound = normalize(&message);
    let result = dispatcher.dispatch_inbound(inbound.command).await;
    let reply = render(&inbound.envelope, &result);
    if reply.is_none() {
        debug!("Notification handled; no reply");
    }
    reply
}

/// Answer an unparseable line if a request id can be recovered from it.
fn malformed_line(raw: &str, detail: &str) -> Option<Value> {
    let raw = raw.trim();
    match recover_request_id(raw) {
        Some(id) => {
            warn!(id = %id, error = %detail, "Malformed input line");
            Some(parse_failure(id, detail))
        }
        None => {
            error!(error = %detail, line = %raw, "Malformed input line without a request id; no reply sent");
            None
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, reply: &Value) -> Result<(), ServerError> {
    let mut framed = serde_json::to_string(reply).map_err(|e| ServerError::Transport(e.to_string()))?;
    framed.push('\n');
    output.write_all(framed.as_bytes()).await?;
    output.flush().await?;
    Ok(())
}
