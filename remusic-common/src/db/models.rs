//! Database models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Lifecycle of a digitization job
///
/// `Pending → Queued → Processing → Ready | Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreStatus {
    /// Row created, upload not yet persisted
    Pending,
    /// Upload stored, waiting for the pipeline
    Queued,
    /// Pipeline running
    Processing,
    /// MusicXML and MIDI generated
    Ready,
    /// Pipeline failed, see `Score::error`
    Error,
}

impl ScoreStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreStatus::Pending => "pending",
            ScoreStatus::Queued => "queued",
            ScoreStatus::Processing => "processing",
            ScoreStatus::Ready => "ready",
            ScoreStatus::Error => "error",
        }
    }

    /// Terminal rows are only changed by deletion
    pub fn is_terminal(&self) -> bool {
        matches!(self, ScoreStatus::Ready | ScoreStatus::Error)
    }
}

impl fmt::Display for ScoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoreStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScoreStatus::Pending),
            "queued" => Ok(ScoreStatus::Queued),
            "processing" => Ok(ScoreStatus::Processing),
            "ready" => Ok(ScoreStatus::Ready),
            "error" => Ok(ScoreStatus::Error),
            other => Err(Error::InvalidRecord {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// One digitization job
///
/// Paths are relative to the storage root, e.g. `scores/7/1700000000000-test.png`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub id: i64,
    pub name: String,
    pub image_path: String,
    pub musicxml_path: Option<String>,
    pub midi_path: Option<String>,
    pub status: ScoreStatus,
    pub progress: i64,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Kind tag of a score event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Status => "status",
            EventKind::Error => "error",
        }
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status" => Ok(EventKind::Status),
            "error" => Ok(EventKind::Error),
            other => Err(Error::InvalidRecord {
                column: "kind",
                value: other.to_string(),
            }),
        }
    }
}

/// Append-only progress timeline entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub id: i64,
    pub score_id: i64,
    pub kind: EventKind,
    pub payload: Option<serde_json::Value>,
    pub created_at: String,
}
