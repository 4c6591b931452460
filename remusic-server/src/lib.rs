//! remusic-server library
//!
//! HTTP job-status API over the score database, plus the pipeline that turns
//! an uploaded sheet-music photo into MusicXML and MIDI.

pub mod api;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod storage;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use remusic_common::config::ServerConfig;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::pipeline::{JobQueue, PipelineTools, ScoreProcessor};
use crate::storage::Storage;

/// Room for multipart boundaries and the `name` field on top of the file
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Score/event database
    pub db: SqlitePool,
    /// Resolved configuration
    pub config: Arc<ServerConfig>,
    /// Per-score file storage (also served under /files)
    pub storage: Storage,
    /// Pipeline dispatch
    pub jobs: JobQueue,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, storage: Storage, jobs: JobQueue) -> Self {
        Self {
            db,
            config,
            storage,
            jobs,
            startup_time: Utc::now(),
        }
    }
}

/// Create directories, open the database and start the job queue
pub async fn init_state(config: ServerConfig, tools: PipelineTools) -> anyhow::Result<AppState> {
    config
        .ensure_directories()
        .context("Failed to create storage/data directories")?;

    let db_path = config.database_path();
    info!("Database: {}", db_path.display());
    let db = db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let storage = Storage::new(config.storage_dir.clone());
    let processor = ScoreProcessor::new(db.clone(), storage.clone(), tools);
    let jobs = JobQueue::start(processor, config.max_concurrent_jobs);

    Ok(AppState::new(db, Arc::new(config), storage, jobs))
}

/// Build application router
///
/// - `/api/...` JSON API
/// - `/files/...` generated artifacts and uploads from the storage root
/// - everything else: the single-page app, when `spa_root` is configured
pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let mut router = Router::new()
        .merge(api::health_routes())
        .merge(api::score_routes())
        .nest_service("/files", ServeDir::new(state.storage.root()));

    if let Some(spa_root) = &state.config.spa_root {
        let index = ServeFile::new(spa_root.join("index.html"));
        router = router.fallback_service(ServeDir::new(spa_root).fallback(index));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
