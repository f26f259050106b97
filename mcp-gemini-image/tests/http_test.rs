//! HTTP transport tests against a server bound to an ephemeral port.

mod common;

use std::sync::Arc;

use common::{StubReply, StubSynthesizer, dispatcher, files_in};
use mcp_gemini_image::http::serve_with_listener;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::net::TcpListener;

struct TestServer {
    base: String,
    client: reqwest::Client,
    stub: Arc<StubSynthesizer>,
    tmp: TempDir,
}

impl TestServer {
    async fn start(stub: Arc<StubSynthesizer>) -> Self {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(tmp.path(), stub.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(serve_with_listener(dispatcher, listener));

        Self {
            base,
            client: reqwest::Client::new(),
            stub,
            tmp,
        }
    }

    async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(format!("{}{}", self.base, path))
            .json(body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test]
async fn malformed_json_is_rejected_before_dispatch() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let response = server
        .client
        .post(format!("{}/", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["outcome"], "failure");
    assert_eq!(body["errorKind"], "protocol");
    assert_eq!(server.stub.calls(), 0);
}

#[tokio::test]
async fn options_preflight_carries_cors_headers() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    for path in ["/", "/mcp", "/v1/providers/gemini-image-generator", "/anything/else"] {
        let response = server
            .client
            .request(reqwest::Method::OPTIONS, format!("{}{}", server.base, path))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT, "{}", path);
        let headers = response.headers();
        assert_eq!(headers["access-control-allow-origin"], "*");
        assert_eq!(headers["access-control-allow-methods"], "GET, POST, OPTIONS");
        assert_eq!(headers["access-control-allow-headers"], "Content-Type, Authorization");
    }
}

#[tokio::test]
async fn unknown_paths_and_methods_are_not_found() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let (status, body) = server.post("/nope", &json!({"lookup": "properties"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");

    let response = server
        .client
        .delete(format!("{}/mcp", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn lookup_returns_the_descriptor() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let (status, body) = server.post("/", &json!({"lookup": "properties"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "success");
    assert_eq!(body["data"]["id"], "gemini-image-generator");

    let (_, again) = server.post("/mcp", &json!({"lookup": "properties"})).await;
    assert_eq!(body["data"], again["data"]);
}

#[tokio::test]
async fn generate_writes_an_artifact() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let (status, body) = server
        .post("/", &json!({"tool": "generate_image", "arguments": {"prompt": "a red cube"}}))
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    let artifact = body["artifactPath"].as_str().unwrap();
    assert!(artifact.contains("a_red_cube_"));
    assert_eq!(files_in(server.tmp.path()).len(), 1);
}

#[tokio::test]
async fn validation_and_collaborator_failures_map_to_status() {
    let server = TestServer::start(StubSynthesizer::new(StubReply::Fail("safety block"))).await;

    let (status, body) = server
        .post("/", &json!({"tool": "generate_image", "arguments": {"prompt": " "}}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "validation");

    let (status, body) = server
        .post("/", &json!({"tool": "generate_image", "arguments": {"prompt": "a red cube"}}))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["errorKind"], "collaborator");
    assert_eq!(body["errorDetail"], "safety block");
}

#[tokio::test]
async fn unrecognized_shape_is_not_found() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let (status, body) = server.post("/", &json!({"hello": "world"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorKind"], "unrecognized");
}

#[tokio::test]
async fn provider_descriptor_route() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let response = server
        .client
        .get(format!("{}/v1/providers/gemini-image-generator", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], "gemini-image-generator");

    let response = server
        .client
        .get(format!("{}/v1/providers/someone-else", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Unknown provider: someone-else");
}

#[tokio::test]
async fn provider_generation_route() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let (status, body) = server
        .post(
            "/v1/providers/gemini-image-generator/generations",
            &json!({"context": {"prompt": "a red cube", "width": 512, "height": 256}}),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["content"].as_str().unwrap().starts_with("Image generated successfully: "));
    assert_eq!(body["metadata"]["width"], 512);
    assert_eq!(body["metadata"]["height"], 256);
    assert_eq!(body["metadata"]["prompt"], "a red cube");

    let requests = server.stub.requests().await;
    assert_eq!((requests[0].width, requests[0].height), (512, 256));
}

#[tokio::test]
async fn jsonrpc_tool_call_and_notification() {
    let server = TestServer::start(StubSynthesizer::png()).await;

    let (status, body) = server
        .post(
            "/mcp",
            &json!({
                "jsonrpc": "2.0",
                "id": 9,
                "method": "tools/call",
                "params": {"name": "generate_image", "arguments": {"prompt": "a red cube"}}
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 9);
    assert!(body["result"]["content"][0]["text"].as_str().unwrap().contains("imagePath"));

    let response = server
        .client
        .post(format!("{}/mcp", server.base))
        .json(&json!({"jsonrpc": "2.0", "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
}
