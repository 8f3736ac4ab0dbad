//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock recognition pipeline and teaser renderer injected, so the
//! HTTP surface can be tested without the recognition tool installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use scorebridge_core::{
    testing::{MockRecognitionPipeline, MockTeaserRenderer},
    CheckpointsConfig, Config, PipelineConfig, PredictionOrchestrator, PredictionService,
    ServerConfig,
};
use scorebridge_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use scorebridge_core::testing::fixtures;

const MULTIPART_BOUNDARY: &str = "scorebridge-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_prediction() {
///     let fixture = TestFixture::new().await;
///     let image = fixture.image("A.png");
///
///     let response = fixture.post("/api/v1/predictions", json!({ "image": image })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock pipeline - inspect requests, inject failures
    pub pipeline: MockRecognitionPipeline,
    /// Mock renderer - inspect rendered state
    pub renderer: MockTeaserRenderer,
    /// Temporary directory holding checkpoints, images and work dirs
    pub temp_dir: TempDir,
    /// Root of per-request work directories
    pub work_root: PathBuf,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Create a fixture whose checkpoints are already provisioned.
    pub async fn new() -> Self {
        Self::with_checkpoints(true).await
    }

    /// Create a fixture, optionally leaving the checkpoint sentinel missing.
    pub async fn with_checkpoints(provisioned: bool) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let checkpoint_root = temp_dir.path().join("checkpoints");
        let work_root = temp_dir.path().join("work");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            checkpoints: CheckpointsConfig {
                root: Some(checkpoint_root.clone()),
                ..Default::default()
            },
            pipeline: PipelineConfig {
                work_root: work_root.clone(),
                ..Default::default()
            },
        };

        let sentinel = checkpoint_root.join("unet_big").join("model.onnx");
        if provisioned {
            std::fs::create_dir_all(sentinel.parent().unwrap()).expect("Failed to create dirs");
            std::fs::write(&sentinel, b"weights").expect("Failed to write sentinel");
        }

        let pipeline = MockRecognitionPipeline::new();
        let renderer = MockTeaserRenderer::new();
        let predictor: Arc<dyn PredictionService> = Arc::new(PredictionOrchestrator::new(
            &work_root,
            pipeline.clone(),
            renderer.clone(),
        ));

        let state = Arc::new(AppState::new(config, predictor, sentinel));
        let router = create_router(state);

        Self {
            router,
            pipeline,
            renderer,
            temp_dir,
            work_root,
        }
    }

    /// Write a small test image and return its path.
    pub fn image(&self, name: &str) -> PathBuf {
        let dir = self.temp_dir.path().join("images");
        std::fs::create_dir_all(&dir).expect("Failed to create image dir");
        fixtures::write_image(&dir, name)
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a GET request and return the raw body text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let (status, bytes) = self.send(request).await;
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.respond(request).await
    }

    /// Send a multipart POST with an optional `image` file part and text fields.
    pub async fn post_multipart(
        &self,
        path: &str,
        image: Option<(&str, &[u8])>,
        fields: &[(&str, &str)],
    ) -> TestResponse {
        let mut body: Vec<u8> = Vec::new();
        if let Some((file_name, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    MULTIPART_BOUNDARY, file_name
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                    MULTIPART_BOUNDARY, name, value
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.respond(request).await
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.respond(request).await
    }

    async fn respond(&self, request: Request<Body>) -> TestResponse {
        let (status, body_bytes) = self.send(request).await;

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        (status, body_bytes.to_vec())
    }
}
