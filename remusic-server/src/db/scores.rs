//! Score row queries
//!
//! Progress and status only move forward: progress updates keep the larger
//! of the stored and new value, and rows in `ready` or `error` ignore every
//! update (only deletion changes them).

use remusic_common::time::now_rfc3339;
use remusic_common::{Result, Score, ScoreStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Placeholder image path between row creation and file persist
pub const PENDING_IMAGE_PATH: &str = "pending";

const SELECT_COLUMNS: &str = "SELECT id, name, image_path, musicxml_path, midi_path, \
     status, progress, error, created_at, updated_at FROM scores";

/// Insert a new score in `pending` state and return its id
pub async fn create_score(pool: &SqlitePool, name: &str, image_path: &str) -> Result<i64> {
    let timestamp = now_rfc3339();

    let result = sqlx::query(
        r#"
        INSERT INTO scores (name, image_path, status, progress, created_at, updated_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(name)
    .bind(image_path)
    .bind(ScoreStatus::Pending.as_str())
    .bind(&timestamp)
    .bind(&timestamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Load one score
pub async fn find_score(pool: &SqlitePool, id: i64) -> Result<Option<Score>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(score_from_row).transpose()
}

/// All scores, newest first
pub async fn list_scores(pool: &SqlitePool) -> Result<Vec<Score>> {
    let rows = sqlx::query(&format!(
        "{} ORDER BY created_at DESC, id DESC",
        SELECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(score_from_row).collect()
}

/// Record the persisted upload and hand the score to the pipeline
pub async fn mark_queued(pool: &SqlitePool, id: i64, image_path: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE scores
        SET image_path = ?, status = ?, progress = MAX(progress, 1), updated_at = ?
        WHERE id = ? AND status NOT IN ('ready', 'error')
        "#,
    )
    .bind(image_path)
    .bind(ScoreStatus::Queued.as_str())
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Advance a running score. Returns false if the row is missing or terminal.
pub async fn update_progress(
    pool: &SqlitePool,
    id: i64,
    status: ScoreStatus,
    progress: i64,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE scores
        SET status = ?, progress = MAX(progress, ?), updated_at = ?
        WHERE id = ? AND status NOT IN ('ready', 'error')
        "#,
    )
    .bind(status.as_str())
    .bind(progress.clamp(0, 100))
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Terminal success: store artifact paths, clear any error
pub async fn mark_ready(
    pool: &SqlitePool,
    id: i64,
    musicxml_path: &str,
    midi_path: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE scores
        SET musicxml_path = ?, midi_path = ?, status = ?, progress = 100,
            error = NULL, updated_at = ?
        WHERE id = ? AND status NOT IN ('ready', 'error')
        "#,
    )
    .bind(musicxml_path)
    .bind(midi_path)
    .bind(ScoreStatus::Ready.as_str())
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Terminal failure: progress goes to 100 so the job never looks stuck
pub async fn mark_failed(pool: &SqlitePool, id: i64, message: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE scores
        SET status = ?, progress = 100, error = ?, updated_at = ?
        WHERE id = ? AND status NOT IN ('ready', 'error')
        "#,
    )
    .bind(ScoreStatus::Error.as_str())
    .bind(message)
    .bind(now_rfc3339())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a score; its events go with it (ON DELETE CASCADE)
pub async fn delete_score(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM scores WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn score_from_row(row: &SqliteRow) -> Result<Score> {
    let status: String = row.try_get("status")?;

    Ok(Score {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        image_path: row.try_get("image_path")?,
        musicxml_path: row.try_get("musicxml_path")?,
        midi_path: row.try_get("midi_path")?,
        status: status.parse()?,
        progress: row.try_get("progress")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
