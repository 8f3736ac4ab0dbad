//! Recognition API endpoints.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use scorebridge_core::{OrchestratorError, PredictionInput, PredictionOutput};

use crate::state::AppState;

/// Prefix of per-upload directories under the upload root.
const UPLOAD_DIR_PREFIX: &str = "upload-";

/// Response for a successful prediction.
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub id: Uuid,
    /// Notation document first, then the teaser image.
    pub output: Vec<String>,
    pub notation_path: String,
    pub teaser_path: String,
    pub work_dir: String,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl From<PredictionOutput> for PredictionResponse {
    fn from(output: PredictionOutput) -> Self {
        let notation_path = output.notation_path.to_string_lossy().to_string();
        let teaser_path = output.teaser_path.to_string_lossy().to_string();
        Self {
            id: output.id,
            output: vec![notation_path.clone(), teaser_path.clone()],
            notation_path,
            teaser_path,
            work_dir: output.work_dir.to_string_lossy().to_string(),
            completed_at: output.completed_at,
            duration_ms: output.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PredictionErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<PredictionErrorResponse>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (
        status,
        Json(PredictionErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn prediction_error(e: OrchestratorError) -> ApiError {
    let status = if e.is_bad_input() {
        StatusCode::UNPROCESSABLE_ENTITY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    api_error(status, e)
}

/// Response for pipeline status endpoint.
#[derive(Debug, Serialize)]
pub struct PipelineStatusResponse {
    /// Recognition pipeline implementation.
    pub pipeline: String,
    /// Teaser renderer implementation.
    pub renderer: String,
    pub executable: String,
    /// Whether the checkpoint sentinel is on disk.
    pub checkpoints_ready: bool,
    /// Unset only before the oemer install has been located.
    pub checkpoint_root: Option<String>,
    /// Whether a request currently holds the pipeline.
    pub busy: bool,
    pub total_processed: u64,
    pub total_failed: u64,
}

/// Get pipeline status.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<PipelineStatusResponse> {
    let status = state.predictor().status();
    let config = state.config();

    Json(PipelineStatusResponse {
        pipeline: status.pipeline,
        renderer: status.renderer,
        executable: config.pipeline.executable.to_string_lossy().to_string(),
        checkpoints_ready: state.sentinel().exists(),
        checkpoint_root: config
            .checkpoints
            .root
            .as_ref()
            .map(|root| root.to_string_lossy().to_string()),
        busy: status.busy,
        total_processed: status.total_processed,
        total_failed: status.total_failed,
    })
}

/// Recognise an image already on the server's local storage.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(input): Json<PredictionInput>,
) -> Result<Json<PredictionResponse>, ApiError> {
    info!("Prediction requested for {:?}", input.image);

    let output = state
        .predictor()
        .predict(input)
        .await
        .map_err(prediction_error)?;

    Ok(Json(PredictionResponse::from(output)))
}

/// Recognise an uploaded image.
///
/// Multipart fields: `image` (file, required) and `disable_deskew`
/// (`true`/`false`, optional). The uploaded file is removed once the
/// request finishes; the outputs stay in their work directory.
pub async fn upload_prediction(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<PredictionResponse>, ApiError> {
    let upload_root = state.upload_dir();
    tokio::fs::create_dir_all(&upload_root)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    let upload = tempfile::Builder::new()
        .prefix(UPLOAD_DIR_PREFIX)
        .tempdir_in(&upload_root)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;

    let mut image: Option<PathBuf> = None;
    let mut disable_deskew = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file_name = upload_file_name(field.file_name());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
                let path = upload.path().join(file_name);
                tokio::fs::write(&path, &data)
                    .await
                    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e))?;
                image = Some(path);
            }
            Some("disable_deskew") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
                disable_deskew = parse_flag(&value).ok_or_else(|| {
                    api_error(
                        StatusCode::BAD_REQUEST,
                        format!("invalid disable_deskew value: {}", value),
                    )
                })?;
            }
            other => warn!("Ignoring unexpected multipart field {:?}", other),
        }
    }

    let image =
        image.ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing 'image' field"))?;
    info!("Prediction requested for upload {:?}", image.file_name());

    let input = PredictionInput {
        image,
        disable_deskew,
    };
    let output = state
        .predictor()
        .predict(input)
        .await
        .map_err(prediction_error)?;

    Ok(Json(PredictionResponse::from(output)))
}

/// File name an upload is stored under, stripped of any directory parts.
fn upload_file_name(client_name: Option<&str>) -> PathBuf {
    client_name
        .and_then(|n| Path::new(n).file_name())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("upload"))
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
