//! Score pipeline runner
//!
//! Drives one score from `queued` to `ready` or `error`:
//!
//! 1. OCR: `<ocr> -o <score_dir> <image>` produces MusicXML
//! 2. Locate the MusicXML (expected name, else any `.musicxml`/`.xml`) and
//!    move it to the canonical `<stem>.musicxml`
//! 3. Convert: `<python> <script> <musicxml> <midi>`, then check the MIDI exists
//!
//! Every failure ends the run in `error` with progress 100 and the failure
//! text stored verbatim. Partial files are left in the score directory.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use remusic_common::config::ServerConfig;
use remusic_common::{EventKind, Score, ScoreStatus};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};

use super::command::{ToolCommand, ToolError};
use crate::db::{events, scores};
use crate::storage::Storage;

/// Progress checkpoints
pub const PROGRESS_OCR_STARTED: i64 = 5;
pub const PROGRESS_MUSICXML_GENERATED: i64 = 60;
pub const PROGRESS_CONVERSION_STARTED: i64 = 75;
pub const PROGRESS_VALIDATING: i64 = 95;

/// Extensions accepted when the OCR output has an unexpected name
const MUSICXML_EXTENSIONS: [&str; 2] = [".musicxml", ".xml"];

/// Pipeline failure; the `Display` text is what clients see in `Score.error`
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Expected MusicXML at {} but it was not created.", .0.display())]
    MissingMusicXml(PathBuf),

    #[error("Expected MIDI at {} but it was not created.", .0.display())]
    MissingMidi(PathBuf),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Database(#[from] remusic_common::Error),

    /// The row disappeared mid-run; never stored, the run is dropped
    #[error("Score {0} was deleted during processing")]
    ScoreDeleted(i64),
}

/// The two external collaborators
#[derive(Debug, Clone)]
pub struct PipelineTools {
    /// Optical music recognition, image → MusicXML
    pub ocr: ToolCommand,
    /// MusicXML → MIDI conversion script
    pub converter: ToolCommand,
}

impl PipelineTools {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            ocr: ToolCommand::new(config.ocr_bin.clone()),
            converter: ToolCommand::new(config.python_bin.clone())
                .with_leading_arg(config.midi_script.as_os_str()),
        }
    }
}

/// Runs the pipeline for individual scores
#[derive(Clone)]
pub struct ScoreProcessor {
    db: SqlitePool,
    storage: Storage,
    tools: Arc<PipelineTools>,
}

impl ScoreProcessor {
    pub fn new(db: SqlitePool, storage: Storage, tools: PipelineTools) -> Self {
        Self {
            db,
            storage,
            tools: Arc::new(tools),
        }
    }

    /// Run the pipeline for one score.
    ///
    /// Returns the terminal status, or `None` if the score no longer exists.
    /// A score deleted mid-run has its directory removed again, since the
    /// tools may have written into it after the delete.
    /// An `Err` means the failure itself could not be recorded.
    pub async fn process(&self, score_id: i64) -> remusic_common::Result<Option<ScoreStatus>> {
        let Some(score) = scores::find_score(&self.db, score_id).await? else {
            warn!(score_id, "Score vanished before processing");
            return Ok(None);
        };

        match self.run_steps(&score).await {
            Ok(()) => {
                info!(score_id, "Digitization complete");
                Ok(Some(ScoreStatus::Ready))
            }
            Err(e) => {
                // Tool failures and FK errors are expected once the row is gone
                if matches!(e, PipelineError::ScoreDeleted(_))
                    || scores::find_score(&self.db, score_id).await?.is_none()
                {
                    self.discard(score_id).await;
                    return Ok(None);
                }

                let message = e.to_string();
                warn!(score_id, error = %message, "Digitization failed");
                // Event first: a terminal row means the timeline is complete
                events::add_message(&self.db, score_id, EventKind::Error, &message).await?;
                scores::mark_failed(&self.db, score_id, &message).await?;
                Ok(Some(ScoreStatus::Error))
            }
        }
    }

    async fn run_steps(&self, score: &Score) -> Result<(), PipelineError> {
        let score_id = score.id;

        let score_dir = self
            .storage
            .ensure_score_dir(score_id)
            .await
            .map_err(|source| PipelineError::Io {
                context: format!("Failed to create {}", self.storage.score_dir(score_id).display()),
                source,
            })?;

        let source_image = self.storage.absolute(&score.image_path);
        let stem = source_image
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "score".to_string());

        let musicxml_rel = self.storage.relative_path(score_id, &format!("{}.musicxml", stem));
        let midi_rel = self.storage.relative_path(score_id, &format!("{}.mid", stem));
        let musicxml_path = self.storage.absolute(&musicxml_rel);
        let midi_path = self.storage.absolute(&midi_rel);

        // Step 1: OCR
        self.advance(score_id, PROGRESS_OCR_STARTED, "OCR started").await?;
        self.tools
            .ocr
            .run([
                OsStr::new("-o"),
                score_dir.as_os_str(),
                source_image.as_os_str(),
            ])
            .await?;
        self.ensure_present(score_id).await?;
        self.advance(score_id, PROGRESS_MUSICXML_GENERATED, "MusicXML generated")
            .await?;

        // Step 2: locate and normalize the MusicXML name
        let generated = locate_musicxml(&score_dir, &stem).await?;
        if generated != musicxml_path {
            tokio::fs::rename(&generated, &musicxml_path)
                .await
                .map_err(|source| PipelineError::Io {
                    context: format!(
                        "Failed to move {} to {}",
                        generated.display(),
                        musicxml_path.display()
                    ),
                    source,
                })?;
        }

        // Step 3: MIDI conversion
        self.advance(score_id, PROGRESS_CONVERSION_STARTED, "Starting MIDI conversion")
            .await?;
        self.tools
            .converter
            .run([musicxml_path.as_os_str(), midi_path.as_os_str()])
            .await?;
        self.ensure_present(score_id).await?;

        self.advance(score_id, PROGRESS_VALIDATING, "Validating output").await?;
        if tokio::fs::metadata(&midi_path).await.is_err() {
            return Err(PipelineError::MissingMidi(midi_path));
        }

        events::add_message(&self.db, score_id, EventKind::Status, "Digitization complete")
            .await?;
        if !scores::mark_ready(&self.db, score_id, &musicxml_rel, &midi_rel).await? {
            self.ensure_present(score_id).await?;
        }

        Ok(())
    }

    async fn advance(&self, score_id: i64, progress: i64, message: &str) -> Result<(), PipelineError> {
        if !scores::update_progress(&self.db, score_id, ScoreStatus::Processing, progress).await? {
            self.ensure_present(score_id).await?;
            warn!(score_id, progress, "Score already finished, progress not recorded");
            return Ok(());
        }
        events::add_message(&self.db, score_id, EventKind::Status, message).await?;
        info!(score_id, progress, "{}", message);
        Ok(())
    }

    async fn ensure_present(&self, score_id: i64) -> Result<(), PipelineError> {
        match scores::find_score(&self.db, score_id).await? {
            Some(_) => Ok(()),
            None => Err(PipelineError::ScoreDeleted(score_id)),
        }
    }

    /// Remove whatever the tools left behind for a deleted score
    async fn discard(&self, score_id: i64) {
        info!(score_id, "Score deleted during processing, dropping its files");
        if let Err(e) = self.storage.remove_score_dir(score_id).await {
            warn!(score_id, error = %e, "Failed to remove score directory");
        }
    }
}

/// Find the OCR output in `dir`.
///
/// Prefers `<stem>.musicxml`; otherwise takes the first file (by name) with
/// a `.musicxml` or `.xml` extension.
pub async fn locate_musicxml(dir: &Path, stem: &str) -> Result<PathBuf, PipelineError> {
    let expected = dir.join(format!("{}.musicxml", stem));
    if tokio::fs::metadata(&expected).await.is_ok() {
        return Ok(expected);
    }

    let read_error = |source| PipelineError::Io {
        context: format!("Failed to list {}", dir.display()),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_error)?;
    let mut candidates = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if !MUSICXML_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            continue;
        }
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            candidates.push(entry.path());
        }
    }
    candidates.sort();

    candidates
        .into_iter()
        .next()
        .ok_or(PipelineError::MissingMusicXml(expected))
}
