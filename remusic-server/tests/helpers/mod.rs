//! Test helpers for remusic-server integration tests
//!
//! - Fake OCR/conversion tools written as `sh` scripts
//! - Test app backed by a temporary storage root and database
//! - Multipart request builder and JSON response reader

#![allow(dead_code)]

pub mod tools;

use std::path::Path;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use remusic_common::config::ServerConfig;
use remusic_common::{Score, ScoreStatus};
use remusic_server::db::scores;
use remusic_server::pipeline::{PipelineTools, ToolCommand};
use remusic_server::{build_router, init_state, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub use tools::*;

/// Minimal PNG signature so uploads sniff as `png`
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D, b'I', b'H', b'D', b'R',
];

const BOUNDARY: &str = "remusic-test-boundary";

/// App under test; the temp dir lives as long as the struct
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub temp: TempDir,
}

impl TestApp {
    /// Send a request and return status plus parsed JSON body (Null if empty)
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(request("GET", uri)).await
    }

    /// Raw body of a GET, for static file checks
    pub async fn get_bytes(&self, uri: &str) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request("GET", uri)).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    /// Poll the database until the score reaches `ready` or `error`
    pub async fn wait_for_terminal(&self, score_id: i64) -> Score {
        wait_for_terminal(&self.state.db, score_id).await
    }
}

/// Build the app with the given fake tool scripts
pub async fn create_test_app(ocr_script: &str, converter_script: &str) -> TestApp {
    create_test_app_with(ocr_script, converter_script, |_, _| {}).await
}

/// Like [`create_test_app`], with a hook to adjust the config; the hook also
/// gets the temp dir for any files it needs
pub async fn create_test_app_with(
    ocr_script: &str,
    converter_script: &str,
    configure: impl FnOnce(&mut ServerConfig, &Path),
) -> TestApp {
    let temp = tempfile::tempdir().expect("Failed to create temp dir");

    let mut config = ServerConfig {
        storage_dir: temp.path().join("storage"),
        data_dir: temp.path().join("data"),
        max_concurrent_jobs: 2,
        ..ServerConfig::default()
    };
    configure(&mut config, temp.path());
    let tools = fake_tools(temp.path(), ocr_script, converter_script);

    let state = init_state(config, tools).await.expect("Failed to init state");
    let router = build_router(state.clone());

    TestApp {
        router,
        state,
        temp,
    }
}

/// Write the scripts under `<dir>/tools` and run them through `sh`
pub fn fake_tools(dir: &Path, ocr_script: &str, converter_script: &str) -> PipelineTools {
    let tools_dir = dir.join("tools");
    std::fs::create_dir_all(&tools_dir).unwrap();

    let ocr_path = tools_dir.join("ocr.sh");
    let converter_path = tools_dir.join("convert.sh");
    std::fs::write(&ocr_path, ocr_script).unwrap();
    std::fs::write(&converter_path, converter_script).unwrap();

    PipelineTools {
        ocr: ToolCommand::new("sh").with_leading_arg(ocr_path),
        converter: ToolCommand::new("sh").with_leading_arg(converter_path),
    }
}

pub fn request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// POST /api/scores with optional `name` and `file` parts
pub fn upload_request(name: Option<&str>, file: Option<(&str, &[u8])>) -> Request<Body> {
    let mut body: Vec<u8> = Vec::new();

    if let Some(name) = name {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
            )
            .as_bytes(),
        );
    }

    if let Some((file_name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/scores")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Poll until terminal; panics after 20 seconds
pub async fn wait_for_terminal(pool: &sqlx::SqlitePool, score_id: i64) -> Score {
    for _ in 0..400 {
        let score = scores::find_score(pool, score_id)
            .await
            .unwrap()
            .expect("score should exist");
        if score.status.is_terminal() {
            return score;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("score {} did not reach a terminal state", score_id);
}

/// Poll until the score reaches `status`; panics on a terminal state or after 20 seconds
pub async fn wait_for_status(pool: &sqlx::SqlitePool, score_id: i64, status: ScoreStatus) -> Score {
    for _ in 0..2000 {
        let score = scores::find_score(pool, score_id)
            .await
            .unwrap()
            .expect("score should exist");
        if score.status == status {
            return score;
        }
        assert!(
            !score.status.is_terminal(),
            "score {} finished as {} before reaching {}",
            score_id,
            score.status,
            status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("score {} never reached {}", score_id, status);
}

/// Poll until the job queue lets go of the score; panics after 20 seconds
pub async fn wait_until_idle(app: &TestApp, score_id: i64) {
    for _ in 0..400 {
        if !app.state.jobs.is_active(score_id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("score {} still active in the job queue", score_id);
}

/// Extract the `message` of every event in a list response
pub fn event_messages(events: &Value) -> Vec<String> {
    events
        .as_array()
        .expect("events should be an array")
        .iter()
        .map(|e| e["payload"]["message"].as_str().unwrap_or_default().to_string())
        .collect()
}
