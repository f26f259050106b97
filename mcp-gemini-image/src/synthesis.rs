//! Image synthesis collaborator.
//!
//! The dispatcher only sees the [`ImageSynthesizer`] trait: a prompt, model
//! and dimensions go in, image bytes with a MIME type or a failure reason come
//! out. [`GeminiSynthesizer`] implements it against the Gemini
//! `generateContent` REST endpoint, asking for the image directly
//! (`responseModalities: ["TEXT", "IMAGE"]`). No retries are made here.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use mcp_gemini_common::config::Config;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Input to a synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub model: String,
    pub width: u32,
    pub height: u32,
}

/// Raw image returned by the provider.
#[derive(Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// MIME type reported by the provider
    pub mime_type: String,
    /// Decoded image bytes
    pub bytes: Vec<u8>,
}

impl std::fmt::Debug for GeneratedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratedImage")
            .field("mime_type", &self.mime_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// Synthesis failures.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// The provider answered but produced no image; carries its explanation
    #[error("{0}")]
    NoImage(String),

    /// Non-success HTTP status from the provider
    #[error("Gemini API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The request could not be sent or timed out
    #[error("Request failed: {0}")]
    Request(String),

    /// The response could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Something that turns a prompt into image bytes.
#[async_trait]
pub trait ImageSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<GeneratedImage, CollaboratorError>;
}

/// Gemini `generateContent` client.
#[derive(Debug, Clone)]
pub struct GeminiSynthesizer {
    config: Config,
    http: reqwest::Client,
}

impl GeminiSynthesizer {
    /// Create a client using the configured request timeout.
    pub fn new(config: Config) -> Result<Self, CollaboratorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| CollaboratorError::Request(e.to_string()))?;
        Ok(Self::with_client(config, http))
    }

    /// Create a client with an existing HTTP client.
    pub fn with_client(config: Config, http: reqwest::Client) -> Self {
        Self { config, http }
    }

    fn build_request(request: &SynthesisRequest) -> GeminiImageRequest {
        GeminiImageRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart::Text {
                    text: format!(
                        "Generate an image with dimensions {}x{}: {}",
                        request.width, request.height, request.prompt
                    ),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        }
    }
}

#[async_trait]
impl ImageSynthesizer for GeminiSynthesizer {
    #[instrument(level = "info", name = "gemini_synthesize", skip(self, request), fields(model = %request.model))]
    async fn synthesize(&self, request: SynthesisRequest) -> Result<GeneratedImage, CollaboratorError> {
        let endpoint = self.config.generate_content_endpoint(&request.model);
        debug!(endpoint = %endpoint, width = request.width, height = request.height, "Calling Gemini API");

        let response = self
            .http
            .post(&endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .header("Content-Type", "application/json")
            .json(&Self::build_request(&request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CollaboratorError::Request(format!(
                        "no response within {} seconds",
                        self.config.request_timeout_secs
                    ))
                } else {
                    CollaboratorError::Request(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Gemini API returned an error");
            return Err(CollaboratorError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::InvalidResponse(e.without_url().to_string()))?;

        let image = extract_image(&api_response)?;
        info!(mime_type = %image.mime_type, bytes = image.bytes.len(), "Received image from Gemini API");
        Ok(image)
    }
}

/// Decode the first inline image, or explain why there is none.
fn extract_image(response: &GeminiResponse) -> Result<GeneratedImage, CollaboratorError> {
    let parts = response
        .candidates
        .iter()
        .filter_map(|c| c.content.as_ref())
        .flat_map(|c| c.parts.iter());

    let mut texts = Vec::new();
    for part in parts {
        match part {
            GeminiResponsePart::InlineData { inline_data } if inline_data.mime_type.starts_with("image/") => {
                let bytes = BASE64
                    .decode(&inline_data.data)
                    .map_err(|e| CollaboratorError::InvalidResponse(format!("Failed to decode image data: {}", e)))?;
                return Ok(GeneratedImage {
                    mime_type: inline_data.mime_type.clone(),
                    bytes,
                });
            }
            GeminiResponsePart::Text { text } if !text.trim().is_empty() => texts.push(text.clone()),
            _ => {}
        }
    }

    if let Some(reason) = response.prompt_feedback.as_ref().and_then(|f| f.block_reason.clone()) {
        texts.push(reason);
    }

    if texts.is_empty() {
        if let Some(finish) = response
            .candidates
            .iter()
            .filter_map(|c| c.finish_reason.as_deref())
            .find(|r| *r != "STOP")
        {
            texts.push(finish.to_string());
        }
    }

    if texts.is_empty() {
        Err(CollaboratorError::NoImage("No image data found in response".to_string()))
    } else {
        Err(CollaboratorError::NoImage(texts.join("\n")))
    }
}

// =============================================================================
// API Types
// =============================================================================

/// Gemini API request for image generation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiImageRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

/// Gemini content structure.
#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

/// Gemini content part (request).
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
}

/// Gemini generation config.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    /// Response modalities (TEXT, IMAGE)
    response_modalities: Vec<String>,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

/// Gemini response candidate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// Gemini response content.
#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

/// Gemini response part.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiResponsePart {
    /// Inline data (base64 image)
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    /// Text content
    Text { text: String },
    /// Anything else the model returns
    Other(serde::de::IgnoredAny),
}

/// Gemini inline data (base64 encoded).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

/// Why a prompt was refused.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn config(api_base: &str) -> Config {
        Config::from_lookup(|key| match key {
            "GEMINI_API_KEY" => Some("test-key".to_string()),
            "GEMINI_API_BASE" => Some(api_base.to_string()),
            "GEMINI_TIMEOUT_SECS" => Some("5".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest {
            prompt: "a red cube".to_string(),
            model: "gemini-test".to_string(),
            width: 1024,
            height: 768,
        }
    }

    #[tokio::test]
    async fn synthesize_decodes_inline_image() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseModalities": ["TEXT", "IMAGE"]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [
                        {"text": "Here is your cube"},
                        {"inlineData": {"mimeType": "image/png", "data": BASE64.encode(PNG_BYTES)}}
                    ]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let synthesizer = GeminiSynthesizer::new(config(&mock_server.uri())).unwrap();
        let image = synthesizer.synthesize(request()).await.unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.bytes, PNG_BYTES);
    }

    #[tokio::test]
    async fn synthesize_sends_dimensions_in_prompt() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "contents": [{"role": "user", "parts": [{"text": "Generate an image with dimensions 1024x768: a red cube"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "image/jpeg", "data": BASE64.encode(b"jpeg")}}
                ]}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let synthesizer = GeminiSynthesizer::new(config(&mock_server.uri())).unwrap();
        let image = synthesizer.synthesize(request()).await.unwrap();
        assert_eq!(image.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn synthesize_reports_model_text_when_no_image() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"text": "I can't create images of that."}
                ]}}]
            })))
            .mount(&mock_server)
            .await;

        let synthesizer = GeminiSynthesizer::new(config(&mock_server.uri())).unwrap();
        let err = synthesizer.synthesize(request()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::NoImage(_)));
        assert_eq!(err.to_string(), "I can't create images of that.");
    }

    #[tokio::test]
    async fn synthesize_reports_block_reason() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&mock_server)
            .await;

        let synthesizer = GeminiSynthesizer::new(config(&mock_server.uri())).unwrap();
        let err = synthesizer.synthesize(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "SAFETY");
    }

    #[tokio::test]
    async fn synthesize_reports_http_status_and_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let synthesizer = GeminiSynthesizer::new(config(&mock_server.uri())).unwrap();
        let err = synthesizer.synthesize(request()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("403"), "{}", message);
        assert!(message.contains("API key not valid"), "{}", message);
        assert!(!message.contains("test-key"), "{}", message);
    }

    #[tokio::test]
    async fn synthesize_rejects_bad_base64() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "image/png", "data": "***not base64***"}}
                ]}}]
            })))
            .mount(&mock_server)
            .await;

        let synthesizer = GeminiSynthesizer::new(config(&mock_server.uri())).unwrap();
        let err = synthesizer.synthesize(request()).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::InvalidResponse(_)));
    }

    #[test]
    fn extract_image_reports_finish_reason() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"finishReason": "IMAGE_SAFETY"}]
        }))
        .unwrap();
        let err = extract_image(&response).unwrap_err();
        assert_eq!(err.to_string(), "IMAGE_SAFETY");
    }

    #[test]
    fn extract_image_skips_unknown_parts() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [
                {"functionCall": {"name": "render", "args": {}}},
                {"thought": true},
                {"inlineData": {"mimeType": "image/png", "data": BASE64.encode(b"png")}}
            ]}}]
        }))
        .unwrap();
        assert!(matches!(response.candidates[0].content.as_ref().unwrap().parts[0], GeminiResponsePart::Other(_)));

        let image = extract_image(&response).unwrap();
        assert_eq!(image.bytes, b"png");
    }

    #[test]
    fn extract_image_without_anything() {
        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        let err = extract_image(&response).unwrap_err();
        assert_eq!(err.to_string(), "No image data found in response");
    }

    #[test]
    fn generated_image_debug_hides_bytes() {
        let image = GeneratedImage {
            mime_type: "image/png".to_string(),
            bytes: vec![0; 2048],
        };
        assert!(format!("{:?}", image).contains("<2048 bytes>"));
    }
}
