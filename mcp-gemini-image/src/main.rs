//! MCP Gemini Image Server
//!
//! MCP server for image generation using the Google Gemini API.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mcp_gemini_common::config::load_dotenv;
use mcp_gemini_common::tracing::init_tracing;
use mcp_gemini_common::{Config, LifecycleHandle, TransportArgs};
use mcp_gemini_image::{ConfigStore, Dispatcher, GeminiSynthesizer, http, stdio};

/// Command-line arguments for the image server.
#[derive(Parser, Debug)]
#[command(name = "mcp-gemini-image")]
#[command(about = "MCP server for image generation using the Google Gemini API")]
struct Args {
    /// Transport configuration
    #[command(flatten)]
    transport: TransportArgs,

    /// Directory generated images are written to
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays a clean reply channel
    init_tracing()?;

    load_dotenv();
    let args = Args::parse();

    let config = Config::from_lookup(|key| match key {
        "GEMINI_API_KEY" if args.api_key.is_some() => args.api_key.clone(),
        "OUTPUT_DIR" if args.output_dir.is_some() => args
            .output_dir
            .as_ref()
            .map(|dir| dir.to_string_lossy().into_owned()),
        _ => std::env::var(key).ok(),
    })?;
    tracing::info!(
        output_dir = %config.output_dir.display(),
        default_model = %config.default_model,
        "Configuration loaded"
    );

    let store = Arc::new(ConfigStore::initialize(&config).await?);
    let synthesizer = Arc::new(GeminiSynthesizer::new(config)?);
    let dispatcher = Dispatcher::new(store, synthesizer, LifecycleHandle::new());

    let transport = args.transport.into_transport();
    tracing::info!(transport = %transport, "Starting MCP server");

    match transport.bind_addr() {
        None => stdio::serve_stdio(dispatcher).await?,
        Some(addr) => http::serve(dispatcher, &addr).await?,
    }

    tracing::info!("Server stopped");
    Ok(())
}
