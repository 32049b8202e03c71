//! Detection Control Routes
//!
//! Source upload, loop start/stop/status and single-frame processing.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use detection_loop::{LoopState, StartOutcome};
use frame_source::open_source;
use occupancy::DetectionEvent;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::MessageResponse;
use crate::{ApiError, AppState};

const PROCESS_FAILED: &str = "Failed to process frame";

/// Multipart field carrying the uploaded source
pub const UPLOAD_FIELD: &str = "video";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    /// `None` for sources that cannot tell ahead of time
    pub total_frames: Option<u64>,
    /// Nominal frame rate, `None` unless the container records one
    pub fps: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: LoopState,
    pub last_error: Option<String>,
    pub total_spaces: usize,
}

#[derive(Debug, Deserialize)]
pub struct FrameRequest {
    /// Base64 image, optionally as a `data:` URL
    #[serde(default)]
    pub frame: Option<String>,
}

/// Keep the final path component with only safe characters
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = Path::new(name).file_name()?.to_str()?;
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// Read the `video` part of a multipart form as (client file name, contents)
async fn read_upload(mut multipart: Multipart) -> Result<(Option<String>, Bytes), ApiError> {
    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("Invalid upload: {}", e))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let data = field.bytes().await.map_err(bad_form)?;
        return Ok((filename, data));
    }
    Err(ApiError::bad_request("No video file provided"))
}

/// Save an uploaded source and bind it to the loop
pub async fn upload(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (client_name, body) = read_upload(multipart).await?;
    let filename = client_name
        .as_deref()
        .and_then(sanitize_filename)
        .ok_or_else(|| ApiError::bad_request("No file selected"))?;
    if body.is_empty() {
        return Err(ApiError::bad_request("No video file provided"));
    }

    let dir = &state.settings.storage.uploads_dir;
    let path = dir.join(&filename);
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::internal(format!("Could not save upload: {}", e)))?;
    tokio::fs::write(&path, &body)
        .await
        .map_err(|e| ApiError::internal(format!("Could not save upload: {}", e)))?;

    state.detection.stop().await;

    let source = tokio::task::spawn_blocking(move || open_source(&path))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(|e| ApiError::bad_request(format!("Could not open video: {}", e)))?;
    let total_frames = source.frame_count();
    let fps = source.fps();
    state.detection.bind_source(source).await;

    info!("Uploaded {} ({} bytes)", filename, body.len());
    Ok(Json(UploadResponse {
        message: "Video uploaded successfully".to_string(),
        filename,
        total_frames,
        fps,
    }))
}

pub async fn start_detection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<MessageResponse>, ApiError> {
    let message = match state.detection.start().await? {
        StartOutcome::Started => "Detection started",
        StartOutcome::AlreadyRunning => "Detection already running",
    };
    Ok(Json(MessageResponse::new(message)))
}

pub async fn stop_detection(State(state): State<Arc<AppState>>) -> Json<MessageResponse> {
    state.detection.stop().await;
    Json(MessageResponse::new("Detection stopped"))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = state.detection.status().await;
    Json(StatusResponse {
        state: status.state,
        last_error: status.last_error,
        total_spaces: state.regions.len(),
    })
}

/// Strip an optional `data:<mime>;base64,` prefix and decode
fn decode_frame_data(data: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = data
        .split_once(";base64,")
        .map(|(_, rest)| rest)
        .unwrap_or(data);
    STANDARD.decode(payload.trim())
}

/// Classify one uploaded frame without touching the loop
pub async fn process_frame(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FrameRequest>, JsonRejection>,
) -> Result<Json<DetectionEvent>, ApiError> {
    let frame = payload
        .ok()
        .and_then(|Json(request)| request.frame)
        .filter(|frame| !frame.is_empty())
        .ok_or_else(|| ApiError::bad_request("No frame data provided"))?;

    let bytes = decode_frame_data(&frame).map_err(|e| {
        warn!("Frame payload is not base64: {}", e);
        ApiError::internal(PROCESS_FAILED)
    })?;

    state.detection.process_bytes(bytes).await.map(Json).map_err(|e| {
        warn!("Single frame failed: {}", e);
        ApiError::internal(PROCESS_FAILED)
    })
}
