//! Score query and delete handlers
//!
//! GET /api/scores, GET /api/scores/:id, GET /api/scores/:id/progress,
//! GET /api/scores/:id/events, DELETE /api/scores/:id
//! (POST /api/scores lives in `upload`)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use remusic_common::{Score, ScoreEvent, ScoreStatus};
use serde::Serialize;
use tracing::{info, warn};

use crate::db::{events, scores};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/scores/:id/progress response
#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub progress: i64,
    pub status: ScoreStatus,
    pub error: Option<String>,
}

/// GET /api/scores
///
/// All scores, newest first.
pub async fn list_scores(State(state): State<AppState>) -> ApiResult<Json<Vec<Score>>> {
    Ok(Json(scores::list_scores(&state.db).await?))
}

/// GET /api/scores/:id
pub async fn get_score(
    State(state): State<AppState>,
    Path(score_id): Path<i64>,
) -> ApiResult<Json<Score>> {
    Ok(Json(load_score(&state, score_id).await?))
}

/// GET /api/scores/:id/progress
///
/// Lightweight polling endpoint.
pub async fn get_progress(
    State(state): State<AppState>,
    Path(score_id): Path<i64>,
) -> ApiResult<Json<ProgressResponse>> {
    let score = load_score(&state, score_id).await?;

    Ok(Json(ProgressResponse {
        progress: score.progress,
        status: score.status,
        error: score.error,
    }))
}

/// GET /api/scores/:id/events
pub async fn list_events(
    State(state): State<AppState>,
    Path(score_id): Path<i64>,
) -> ApiResult<Json<Vec<ScoreEvent>>> {
    let score = load_score(&state, score_id).await?;
    Ok(Json(events::list_events(&state.db, score.id).await?))
}

/// DELETE /api/scores/:id
///
/// Removes the row (events cascade) and the score directory.
pub async fn delete_score(
    State(state): State<AppState>,
    Path(score_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let score = load_score(&state, score_id).await?;

    if state.jobs.is_active(score.id) {
        warn!(score_id, "Deleting score while its pipeline is still queued or running");
    }

    scores::delete_score(&state.db, score.id).await?;
    state.storage.remove_score_dir(score.id).await?;

    info!(score_id, name = %score.name, "Score deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn load_score(state: &AppState, score_id: i64) -> ApiResult<Score> {
    scores::find_score(&state.db, score_id)
        .await?
        .ok_or_else(ApiError::score_not_found)
}

/// Build score routes
pub fn score_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/scores",
            get(list_scores).post(super::upload::create_score),
        )
        .route("/api/scores/:id", get(get_score).delete(delete_score))
        .route("/api/scores/:id/progress", get(get_progress))
        .route("/api/scores/:id/events", get(list_events))
}
