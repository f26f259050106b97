//! MCP Gemini Image Server Library
//!
//! Image generation over HTTP and stdio using the Google Gemini API. Inbound
//! messages in any supported shape are normalised into one
//! [`CanonicalCommand`](command::CanonicalCommand), executed by the
//! [`Dispatcher`](dispatcher::Dispatcher), and rendered back in the envelope
//! they arrived in.

pub mod command;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod jsonrpc;
pub mod naming;
pub mod normalize;
pub mod reply;
pub mod resources;
pub mod stdio;
pub mod store;
pub mod synthesis;

pub use command::{CanonicalCommand, GenerateImageArgs, SetOutputDirectoryArgs, ValidationError};
pub use dispatcher::{CommandResult, Dispatcher, Outcome};
pub use error::{CommandError, ErrorKind};
pub use naming::ArtifactName;
pub use normalize::{Envelope, Inbound, normalize};
pub use store::{ConfigStore, Configuration};
pub use synthesis::{CollaboratorError, GeminiSynthesizer, GeneratedImage, ImageSynthesizer, SynthesisRequest};
