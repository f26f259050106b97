//! Tracing setup.
//!
//! Every diagnostic line is written to stderr. The stdio transport owns
//! stdout for replies, so the writer is not configurable.
//!
//! Filtering follows `RUST_LOG` (for example `RUST_LOG=mcp_gemini_image=debug`)
//! and falls back to [`DEFAULT_FILTER`].

use tracing_subscriber::{EnvFilter, fmt, prelude::*, util::TryInitError};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed, which happens when several
/// tests race to set one up.
pub fn init_tracing() -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry().with(filter).with(stderr).try_init()
}
