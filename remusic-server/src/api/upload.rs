//! Score upload handler
//!
//! POST /api/scores (multipart: `name` text field + `file` image field)
//!
//! The score row exists and is `queued` before the response is sent; the
//! pipeline then runs in the background and clients poll for the outcome.

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use remusic_common::{EventKind, Score};
use tracing::{error, info};

use crate::db::{events, scores};
use crate::error::{ApiError, ApiResult};
use crate::storage::{detect_extension, upload_file_name};
use crate::AppState;

/// File part of the upload form
#[derive(Debug)]
struct UploadedFile {
    file_name: Option<String>,
    bytes: Bytes,
}

/// POST /api/scores
///
/// Returns 201 with the queued score.
pub async fn create_score(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<(StatusCode, Json<Score>)> {
    let mut multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let mut name: Option<String> = None;
    let mut file: Option<UploadedFile> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "name" => name = Some(field.text().await?),
            "file" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some(UploadedFile { file_name, bytes });
            }
            _ => {} // ignore unknown fields
        }
    }

    let name = name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::BadRequest("A name is required.".to_string()))?;
    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or_else(|| ApiError::BadRequest("An image file is required.".to_string()))?;

    let score_id = scores::create_score(&state.db, &name, scores::PENDING_IMAGE_PATH).await?;

    let score = match persist_upload(&state, score_id, &name, &file).await {
        Ok(score) => score,
        Err(e) => {
            discard_upload(&state, score_id).await;
            return Err(ApiError::Internal(format!("Failed to upload score: {}", e)));
        }
    };

    info!(
        score_id,
        name = %score.name,
        image_path = %score.image_path,
        bytes = file.bytes.len(),
        "Score uploaded"
    );

    state.jobs.enqueue(score_id);

    Ok((StatusCode::CREATED, Json(score)))
}

/// Write the image, queue the row and read it back
async fn persist_upload(
    state: &AppState,
    score_id: i64,
    name: &str,
    file: &UploadedFile,
) -> ApiResult<Score> {
    let dir = state.storage.ensure_score_dir(score_id).await?;

    let extension = detect_extension(&file.bytes, file.file_name.as_deref());
    let stored_name = upload_file_name(Utc::now().timestamp_millis(), name, &extension);
    tokio::fs::write(dir.join(&stored_name), &file.bytes).await?;

    let image_path = state.storage.relative_path(score_id, &stored_name);
    scores::mark_queued(&state.db, score_id, &image_path).await?;
    events::add_message(&state.db, score_id, EventKind::Status, "Upload received").await?;

    scores::find_score(&state.db, score_id)
        .await?
        .ok_or_else(ApiError::score_not_found)
}

/// Best-effort removal of a half-created score
async fn discard_upload(state: &AppState, score_id: i64) {
    if let Err(e) = state.storage.remove_score_dir(score_id).await {
        error!(score_id, error = %e, "Failed to remove upload directory");
    }
    if let Err(e) = scores::delete_score(&state.db, score_id).await {
        error!(score_id, error = %e, "Failed to remove score row");
    }
}
