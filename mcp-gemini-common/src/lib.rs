//! MCP Gemini Common Library
//!
//! Shared utilities for configuration, error handling, transport selection,
//! tracing, and server lifecycle used by the Gemini image MCP server.

pub mod config;
pub mod error;
pub mod server;
pub mod tracing;
pub mod transport;


pub use config::Config;
pub use error::ConfigError;
pub use server::{Lifecycle, LifecycleHandle, ServerError, ShutdownSignal, wait_for_shutdown_signal};
pub use transport::{Transport, TransportArgs, TransportMode};
