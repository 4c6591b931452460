//! Score event log (append-only)

use remusic_common::time::now_rfc3339;
use remusic_common::{EventKind, Result, ScoreEvent};
use serde_json::{json, Value};
use sqlx::{Row, SqlitePool};

/// Append an event with an optional JSON payload
pub async fn add_event(
    pool: &SqlitePool,
    score_id: i64,
    kind: EventKind,
    payload: Option<&Value>,
) -> Result<i64> {
    let payload = payload.map(Value::to_string);

    let result = sqlx::query(
        "INSERT INTO events (score_id, kind, payload, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(score_id)
    .bind(kind.as_str())
    .bind(payload)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Append an event whose payload is `{"message": <message>}`
pub async fn add_message(
    pool: &SqlitePool,
    score_id: i64,
    kind: EventKind,
    message: &str,
) -> Result<i64> {
    add_event(pool, score_id, kind, Some(&json!({ "message": message }))).await
}

/// Events of one score, oldest first
pub async fn list_events(pool: &SqlitePool, score_id: i64) -> Result<Vec<ScoreEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, score_id, kind, payload, created_at
        FROM events
        WHERE score_id = ?
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(score_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<ScoreEvent> {
            let kind: String = row.try_get("kind")?;
            let payload: Option<String> = row.try_get("payload")?;

            Ok(ScoreEvent {
                id: row.try_get("id")?,
                score_id: row.try_get("score_id")?,
                kind: kind.parse()?,
                // Rows written by older tools may hold plain text
                payload: payload.map(|text| {
                    serde_json::from_str(&text).unwrap_or(Value::String(text))
                }),
                created_at: row.try_get("created_at")?,
            })
        })
        .collect()
}
