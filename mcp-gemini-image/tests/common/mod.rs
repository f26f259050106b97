//! Shared test harness: a counting stub synthesizer and a dispatcher over a
//! temporary output directory.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mcp_gemini_common::LifecycleHandle;
use mcp_gemini_image::{
    CollaboratorError, ConfigStore, Configuration, Dispatcher, GeneratedImage, ImageSynthesizer,
    SynthesisRequest,
};
use tokio::sync::Mutex;

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 0];

/// What the stub answers with.
#[derive(Clone)]
pub enum StubReply {
    Image(&'static str, Vec<u8>),
    Fail(&'static str),
}

/// Synthesizer that records every request it receives.
pub struct StubSynthesizer {
    reply: StubReply,
    calls: AtomicUsize,
    requests: Mutex<Vec<SynthesisRequest>>,
}

impl StubSynthesizer {
    pub fn new(reply: StubReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn png() -> Arc<Self> {
        Self::new(StubReply::Image("image/png", PNG_BYTES.to_vec()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ImageSynthesizer for StubSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<GeneratedImage, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request);
        match &self.reply {
            StubReply::Image(mime_type, bytes) => Ok(GeneratedImage {
                mime_type: mime_type.to_string(),
                bytes: bytes.clone(),
            }),
            StubReply::Fail(reason) => Err(CollaboratorError::NoImage(reason.to_string())),
        }
    }
}

/// Dispatcher writing to `dir` with `default_model` "gemini-test".
pub fn dispatcher<S: ImageSynthesizer + 'static>(dir: &Path, synthesizer: Arc<S>) -> Dispatcher {
    let store = ConfigStore::from_configuration(Configuration {
        api_key: "test-key".to_string(),
        output_directory: dir.to_path_buf(),
        default_model: "gemini-test".to_string(),
    });
    Dispatcher::new(Arc::new(store), synthesizer, LifecycleHandle::new())
}

/// Files currently in `dir`.
pub fn files_in(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut files: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}
