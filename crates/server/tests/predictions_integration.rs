//! End-to-end tests of the recognition API with a mocked pipeline.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use scorebridge_core::PipelineError;

use common::{fixtures, TestFixture};

// =============================================================================
// Basic API Tests
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert!(response.body["version"].is_string());
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/config").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["checkpoints"]["verify"], "sentinel");
    assert_eq!(response.body["checkpoints"]["artifacts"][0], "1st_model.onnx");
    assert!(response.body["checkpoints"]["user_agent"].is_null());
}

#[tokio::test]
async fn test_pipeline_status_reports_readiness() {
    let fixture = TestFixture::new().await;
    let response = fixture.get("/api/v1/pipeline").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["pipeline"], "mock");
    assert_eq!(response.body["checkpoints_ready"], true);
    assert_eq!(response.body["busy"], false);

    let fixture = TestFixture::with_checkpoints(false).await;
    let response = fixture.get("/api/v1/pipeline").await;
    assert_eq!(response.body["checkpoints_ready"], false);
}

// =============================================================================
// Predictions
// =============================================================================

#[tokio::test]
async fn test_predict_returns_notation_then_teaser() {
    let fixture = TestFixture::new().await;
    let image = fixture.image("A.png");

    let response = fixture
        .post("/api/v1/predictions", json!({ "image": image }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let outputs = response.body["output"].as_array().unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].as_str().unwrap().ends_with("A.musicxml"));
    assert!(outputs[1].as_str().unwrap().ends_with("A_teaser.png"));
    assert!(std::path::Path::new(outputs[0].as_str().unwrap()).exists());
    assert!(std::path::Path::new(outputs[1].as_str().unwrap()).exists());
    assert!(response.body["work_dir"]
        .as_str()
        .unwrap()
        .starts_with(fixture.work_root.to_str().unwrap()));

    let requests = fixture.pipeline.recorded_requests().await;
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].without_deskew);
}

#[tokio::test]
async fn test_predict_forwards_disable_deskew() {
    let fixture = TestFixture::new().await;
    let image = fixture.image("A.png");

    let response = fixture
        .post(
            "/api/v1/predictions",
            json!({ "image": image, "disable_deskew": true }),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(fixture.pipeline.recorded_requests().await[0].without_deskew);
}

#[tokio::test]
async fn test_predict_missing_image_is_unprocessable() {
    let fixture = TestFixture::new().await;
    let missing = fixture.temp_dir.path().join("nope.png");

    let response = fixture
        .post("/api/v1/predictions", json!({ "image": missing }))
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].as_str().unwrap().contains("not found"));
    assert!(fixture.pipeline.recorded_requests().await.is_empty());
}

#[tokio::test]
async fn test_predict_unsupported_format_is_unprocessable() {
    let fixture = TestFixture::new().await;
    let image = fixture.image("scan.tiff");

    let response = fixture
        .post("/api/v1/predictions", json!({ "image": image }))
        .await;

    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(response.body["error"].as_str().unwrap().contains("tiff"));
}

#[tokio::test]
async fn test_predict_malformed_json_is_bad_request() {
    let fixture = TestFixture::new().await;
    let response = fixture.post_raw("/api/v1/predictions", "{not json").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pipeline_timeout_is_internal_error() {
    let fixture = TestFixture::new().await;
    let image = fixture.image("A.png");
    fixture
        .pipeline
        .set_next_error(PipelineError::Timeout { timeout_secs: 600 })
        .await;

    let response = fixture
        .post("/api/v1/predictions", json!({ "image": image }))
        .await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.body["error"].as_str().unwrap().contains("timed out"));
}

#[tokio::test]
async fn test_failed_request_does_not_leak_into_next() {
    let fixture = TestFixture::new().await;
    let broken = fixture.image("broken.png");
    let good = fixture.image("good.png");
    fixture
        .pipeline
        .set_next_error(PipelineError::processing_failed("no staff lines", None))
        .await;

    let response = fixture
        .post("/api/v1/predictions", json!({ "image": broken }))
        .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let response = fixture
        .post("/api/v1/predictions", json!({ "image": good }))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let rendered = fixture.renderer.rendered_layers().await;
    assert_eq!(rendered, vec![vec!["good.png".to_string()]]);

    let status = fixture.get("/api/v1/pipeline").await;
    assert_eq!(status.body["total_processed"], 2);
    assert_eq!(status.body["total_failed"], 1);
}

// =============================================================================
// Uploads
// =============================================================================

#[tokio::test]
async fn test_upload_prediction() {
    let fixture = TestFixture::new().await;
    let png = fixtures::png_bytes(16, 16);

    let response = fixture
        .post_multipart(
            "/api/v1/predictions/upload",
            Some(("../score.png", png.as_slice())),
            &[("disable_deskew", "true")],
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["notation_path"]
        .as_str()
        .unwrap()
        .ends_with("score.musicxml"));

    let requests = fixture.pipeline.recorded_requests().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].without_deskew);
    assert!(requests[0]
        .img_path
        .starts_with(fixture.work_root.join("uploads")));
    // Uploaded image is removed once the request finishes
    assert!(!requests[0].img_path.exists());
    assert!(std::path::Path::new(response.body["teaser_path"].as_str().unwrap()).exists());
}

#[tokio::test]
async fn test_upload_without_image_is_bad_request() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart("/api/v1/predictions/upload", None, &[("disable_deskew", "false")])
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].as_str().unwrap().contains("image"));
}

#[tokio::test]
async fn test_upload_invalid_flag_is_bad_request() {
    let fixture = TestFixture::new().await;
    let png = fixtures::png_bytes(16, 16);

    let response = fixture
        .post_multipart(
            "/api/v1/predictions/upload",
            Some(("score.png", png.as_slice())),
            &[("disable_deskew", "sometimes")],
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(fixture.pipeline.recorded_requests().await.is_empty());
}

// =============================================================================
// Metrics
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    let image = fixture.image("A.png");
    fixture
        .post("/api/v1/predictions", json!({ "image": image }))
        .await;

    let (status, text) = fixture.get_text("/metrics").await;

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("scorebridge_predictions_total"));
    assert!(text.contains("scorebridge_http_requests_total"));
    assert!(text.contains("scorebridge_checkpoints_ready 1"));
}
