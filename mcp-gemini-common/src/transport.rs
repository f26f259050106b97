//! Transport selection.
//!
//! The server answers either on an HTTP listener (the default) or on
//! stdin/stdout, one JSON value per line. Both run the same dispatcher.
//!
//! ```ignore
//! #[derive(clap::Parser)]
//! struct Args {
//!     #[command(flatten)]
//!     transport: TransportArgs,
//! }
//!
//! let transport = Args::parse().transport.into_transport();
//! ```

use std::fmt;

use clap::{Args, ValueEnum};

use crate::config::{DEFAULT_HOST, DEFAULT_PORT};

/// Where replies are served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Newline-delimited JSON on stdin/stdout
    Stdio,
    /// JSON over HTTP
    Http { host: String, port: u16 },
}

impl Transport {
    /// `host:port` to bind, for the HTTP transport.
    pub fn bind_addr(&self) -> Option<String> {
        match self {
            Transport::Stdio => None,
            Transport::Http { host, port } => Some(format!("{}:{}", host, port)),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        TransportArgs::default().into_transport()
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Stdio => f.write_str("stdio"),
            Transport::Http { host, port } => write!(f, "http://{}:{}", host, port),
        }
    }
}

/// `--transport` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Http,
    Stdio,
}

/// Transport flags shared by server binaries.
#[derive(Args, Debug, Clone)]
pub struct TransportArgs {
    /// Transport to serve on
    #[arg(long, value_enum, ignore_case = true, default_value_t = TransportMode::Http)]
    pub transport: TransportMode,

    /// Same as `--transport stdio`
    #[arg(long)]
    pub stdio: bool,

    /// HTTP bind host
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// HTTP port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Default for TransportArgs {
    fn default() -> Self {
        Self {
            transport: TransportMode::default(),
            stdio: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl TransportArgs {
    /// Resolve the flags; `--stdio` wins over `--transport`.
    pub fn into_transport(self) -> Transport {
        match (self.stdio, self.transport) {
            (true, _) | (false, TransportMode::Stdio) => Transport::Stdio,
            (false, TransportMode::Http) => Transport::Http {
                host: self.host,
                port: self.port,
            },
        }
    }
}
