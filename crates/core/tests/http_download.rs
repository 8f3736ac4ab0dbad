//! HTTP provisioning tests against a local axum server.

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use scorebridge_core::{
    provisioner::{ArtifactProvisioner, DownloadProgress, HttpArtifactSource, ProvisionError},
    CheckpointsConfig, ManifestEntry,
};

const BODY_LEN: usize = 10_000;

fn body() -> Vec<u8> {
    (0..BODY_LEN).map(|i| (i % 251) as u8).collect()
}

async fn sized_body(Path(title): Path<String>, headers: HeaderMap) -> Response {
    let agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !agent.starts_with("scorebridge/") {
        return StatusCode::FORBIDDEN.into_response();
    }
    if title.starts_with("missing") {
        return StatusCode::NOT_FOUND.into_response();
    }
    body().into_response()
}

async fn chunked_body() -> Response {
    let chunks: Vec<Result<Bytes, std::io::Error>> = body()
        .chunks(3000)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Body::from_stream(futures::stream::iter(chunks)).into_response()
}

async fn serve() -> String {
    let router = Router::new()
        .route("/sized/{title}", get(sized_body))
        .route("/unsized/{title}", get(chunked_body));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(root: &std::path::Path, entries: Vec<ManifestEntry>) -> CheckpointsConfig {
    CheckpointsConfig {
        root: Some(root.to_path_buf()),
        chunk_size: 4096,
        artifacts: entries,
        ..Default::default()
    }
}

async fn run(
    config: &CheckpointsConfig,
) -> (Result<u64, ProvisionError>, Vec<DownloadProgress>) {
    let source = HttpArtifactSource::from_config(config).unwrap();
    let provisioner = ArtifactProvisioner::new(config, source).unwrap();

    let (tx, mut rx) = mpsc::channel(1024);
    let result = provisioner
        .ensure_artifacts_with_progress(tx)
        .await
        .map(|report| report.bytes_downloaded);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    (result, events)
}

fn chunk_events(events: &[DownloadProgress]) -> Vec<(u64, Option<f64>)> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadProgress::Chunk {
                bytes_written,
                percent,
                ..
            } => Some((*bytes_written, *percent)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_download_with_content_length() {
    let base = serve().await;
    let dir = TempDir::new().unwrap();
    let config = config(
        dir.path(),
        vec![
            ManifestEntry::new("1st_model.onnx", format!("{}/sized/1st_model.onnx", base)),
            ManifestEntry::new("2nd_model.onnx", format!("{}/sized/2nd_model.onnx", base)),
        ],
    );

    let (result, events) = run(&config).await;

    assert_eq!(result.unwrap(), (BODY_LEN * 2) as u64);
    assert_eq!(
        std::fs::read(dir.path().join("unet_big/model.onnx")).unwrap(),
        body()
    );
    assert_eq!(
        std::fs::read(dir.path().join("seg_net/model.onnx")).unwrap(),
        body()
    );

    let chunks = chunk_events(&events);
    assert!(chunks.iter().all(|(written, _)| *written <= BODY_LEN as u64));
    assert!(chunks.iter().all(|(_, percent)| percent.is_some()));
    assert!(chunks.contains(&(BODY_LEN as u64, Some(100.0))));
}

#[tokio::test]
async fn test_download_without_content_length() {
    let base = serve().await;
    let dir = TempDir::new().unwrap();
    let config = config(
        dir.path(),
        vec![ManifestEntry::new(
            "1st_model.onnx",
            format!("{}/unsized/1st_model.onnx", base),
        )],
    );

    let (result, events) = run(&config).await;

    assert_eq!(result.unwrap(), BODY_LEN as u64);
    let chunks = chunk_events(&events);
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|(_, percent)| percent.is_none()));
    assert_eq!(chunks.last().unwrap().0, BODY_LEN as u64);
}

#[tokio::test]
async fn test_not_found_aborts_without_file() {
    let base = serve().await;
    let dir = TempDir::new().unwrap();
    let config = config(
        dir.path(),
        vec![ManifestEntry::new(
            "1st_missing.onnx",
            format!("{}/sized/missing.onnx", base),
        )],
    );

    let (result, events) = run(&config).await;

    assert!(matches!(
        result,
        Err(ProvisionError::HttpStatus { status: 404, .. })
    ));
    assert!(!dir.path().join("unet_big/missing.onnx").exists());
    assert!(chunk_events(&events).is_empty());
}
