//! Static descriptors served by the image server.
//!
//! - The provider descriptor returned for `lookup: "properties"` and
//!   `GET /v1/providers/{id}`
//! - The MCP tool catalog returned for `tools/list`
//! - The MCP server info returned for `initialize`

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};

use rmcp::model::{ListToolsResult, ServerCapabilities, ServerInfo, Tool};
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{
    GenerateImageArgs, SequentialThinkingArgs, SetOutputDirectoryArgs, TOOL_GENERATE_FROM_CONTEXT,
    TOOL_GENERATE_IMAGE, TOOL_SEQUENTIAL_THINKING, TOOL_SET_OUTPUT_DIRECTORY,
};

/// Identifier used in the provider routes.
pub const PROVIDER_ID: &str = "gemini-image-generator";

/// Information about an available image generation model.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model identifier
    pub id: &'static str,
    /// Human-readable name
    pub display_name: &'static str,
    /// Short description
    pub description: &'static str,
    /// Prompt context window in tokens
    pub context_window: u32,
}

/// Provider capability flags.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub image_generation: bool,
}

/// Feature flags advertised to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub custom_output_directory: bool,
    pub custom_filename: bool,
    pub custom_dimensions: bool,
    pub default_width: u32,
    pub default_height: u32,
    pub tools: Vec<&'static str>,
    pub transports: Vec<&'static str>,
}

/// The provider capability descriptor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub description: &'static str,
    pub models: Vec<ModelInfo>,
    pub capabilities: Capabilities,
    pub features: Features,
}

/// Default image width when a request names none.
pub const DEFAULT_WIDTH: u32 = 1024;

/// Default image height when a request names none.
pub const DEFAULT_HEIGHT: u32 = 1024;

/// Available models.
pub const MODELS: &[ModelInfo] = &[
    ModelInfo {
        id: "gemini-2.0-flash-preview-image-generation",
        display_name: "Gemini 2.0 Flash",
        description: "Fast image generation model",
        context_window: 4096,
    },
    ModelInfo {
        id: "gemini-2.0-pro-001",
        display_name: "Gemini 2.0 Pro",
        description: "High quality image generation model",
        context_window: 4096,
    },
    ModelInfo {
        id: "gemini-1.5-pro-latest",
        display_name: "Gemini 1.5 Pro",
        description: "Gemini 1.5 Pro image generation capability",
        context_window: 4096,
    },
];

static DESCRIPTOR: LazyLock<Value> = LazyLock::new(|| {
    let descriptor = ProviderDescriptor {
        id: PROVIDER_ID,
        display_name: "Gemini Image Generator",
        description: "Generate images using Google Gemini API",
        models: MODELS.to_vec(),
        capabilities: Capabilities {
            image_generation: true,
        },
        features: Features {
            custom_output_directory: true,
            custom_filename: true,
            custom_dimensions: true,
            default_width: DEFAULT_WIDTH,
            default_height: DEFAULT_HEIGHT,
            tools: vec![
                TOOL_GENERATE_IMAGE,
                TOOL_SET_OUTPUT_DIRECTORY,
                TOOL_GENERATE_FROM_CONTEXT,
                TOOL_SEQUENTIAL_THINKING,
            ],
            transports: vec!["http", "stdio"],
        },
    };
    serde_json::to_value(descriptor).unwrap_or(Value::Null)
});

/// The static provider descriptor. Identical on every call.
pub fn provider_descriptor() -> &'static Value {
    &DESCRIPTOR
}

/// Schema of the generation context accepted by `generate_from_context`.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationContextParams {
    /// The prompt to generate an image from
    pub prompt: Option<String>,
    /// The model to use for image generation
    pub model: Option<String>,
    /// Image width in pixels (default: 1024)
    pub width: Option<u32>,
    /// Image height in pixels (default: 1024)
    pub height: Option<u32>,
    /// Directory to save the generated image to
    pub output_dir: Option<String>,
    /// Filename to save the generated image as
    pub output_filename: Option<String>,
}

/// Tool parameters for `generate_from_context`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GenerateFromContextToolParams {
    /// Generation context
    pub context: Option<GenerationContextParams>,
    /// Prompt used when the context carries none
    pub user_input: Option<String>,
}

fn input_schema<T: JsonSchema>() -> Arc<serde_json::Map<String, Value>> {
    let schema = schema_for!(T);
    match serde_json::to_value(&schema).unwrap_or_default() {
        Value::Object(map) => Arc::new(map),
        _ => Arc::new(serde_json::Map::new()),
    }
}

fn tool(name: &'static str, description: &'static str, input_schema: Arc<serde_json::Map<String, Value>>) -> Tool {
    Tool {
        name: Cow::Borrowed(name),
        description: Some(Cow::Borrowed(description)),
        input_schema,
        annotations: None,
        icons: None,
        meta: None,
        output_schema: None,
        title: None,
    }
}

/// The MCP tool catalog.
pub fn list_tools() -> ListToolsResult {
    ListToolsResult {
        tools: vec![
            tool(
                TOOL_GENERATE_IMAGE,
                "Generate an image using Google Gemini API and save it to the output directory. \
                 Returns the path of the written image file.",
                input_schema::<GenerateImageArgs>(),
            ),
            tool(
                TOOL_SET_OUTPUT_DIRECTORY,
                "Set the default output directory for saving generated images. \
                 The directory is created if it does not exist.",
                input_schema::<SetOutputDirectoryArgs>(),
            ),
            tool(
                TOOL_GENERATE_FROM_CONTEXT,
                "Generate an image from a context object. Uses context.prompt, \
                 falling back to user_input when the context has no prompt.",
                input_schema::<GenerateFromContextToolParams>(),
            ),
            tool(
                TOOL_SEQUENTIAL_THINKING,
                "Process complex image generation in sequential steps. \
                 The thinking step is echoed back unchanged.",
                input_schema::<SequentialThinkingArgs>(),
            ),
        ],
        next_cursor: None,
        meta: None,
    }
}

/// Server info returned for `initialize`.
pub fn server_info() -> ServerInfo {
    ServerInfo {
        instructions: Some(
            "Image generation server using the Google Gemini API. \
             Use generate_image to create an image from a text prompt, \
             and set_output_directory to choose where images are saved."
                .to_string(),
        ),
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_is_stable() {
        assert_eq!(provider_descriptor(), provider_descriptor());
        assert!(std::ptr::eq(provider_descriptor(), provider_descriptor()));
    }

    #[test]
    fn test_descriptor_contents() {
        let descriptor = provider_descriptor();
        assert_eq!(descriptor["id"], PROVIDER_ID);
        assert_eq!(descriptor["capabilities"]["imageGeneration"], true);
        let models = descriptor["models"].as_array().unwrap();
        assert_eq!(models.len(), MODELS.len());
        assert_eq!(models[0]["id"], "gemini-2.0-flash-preview-image-generation");
        assert_eq!(models[0]["contextWindow"], 4096);
        assert_eq!(descriptor["features"]["defaultWidth"], 1024);
    }

    #[test]
    fn test_list_tools() {
        let result = list_tools();
        let names: Vec<&str> = result.tools.iter().map(|t| t.name.as_ref()).collect();
        assert_eq!(
            names,
            vec!["generate_image", "set_output_directory", "generate_from_context", "sequential_thinking"]
        );
    }

    #[test]
    fn test_generate_image_schema_requires_prompt() {
        let result = list_tools();
        let schema = &result.tools[0].input_schema;
        let required = schema.get("required").and_then(Value::as_array).unwrap();
        assert!(required.iter().any(|r| r == "prompt"));
        let properties = schema.get("properties").and_then(Value::as_object).unwrap();
        assert!(properties.contains_key("outputPath"));
        assert!(properties.contains_key("outputFilename"));
    }

    #[test]
    fn test_sequential_thinking_schema() {
        let result = list_tools();
        let schema = &result.tools[3].input_schema;
        let required = schema.get("required").and_then(Value::as_array).unwrap();
        for field in ["thought", "nextThoughtNeeded", "thoughtNumber", "totalThoughts"] {
            assert!(required.iter().any(|r| r == field), "{} should be required", field);
        }
    }

    #[test]
    fn test_server_info() {
        let info = server_info();
        assert!(info.instructions.is_some());
        assert!(info.capabilities.tools.is_some());
    }
}
