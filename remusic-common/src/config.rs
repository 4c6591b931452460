//! Configuration loading
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Tiers 1 and 2 are parsed by the binary (clap with `env`) into a
//! [`TomlConfig`] layer, which is merged over the file layer here.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name looked up under `<config_dir>/remusic/`
pub const DEFAULT_CONFIG_FILE: &str = "remusic-server.toml";

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "scores.db";

/// One configuration layer. Every key is optional so layers can be merged.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub storage_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    /// OCR executable (oemer)
    pub ocr_bin: Option<String>,
    /// Interpreter used to run the MIDI conversion script
    pub python_bin: Option<String>,
    pub midi_script: Option<PathBuf>,
    pub max_upload_size_mb: Option<u64>,
    pub max_concurrent_jobs: Option<usize>,
    /// Directory of a pre-built single-page app to serve (optional)
    pub spa_root: Option<PathBuf>,
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Option<String>,
}

impl TomlConfig {
    /// Merge two layers; values present in `self` win over `lower`.
    pub fn merge(self, lower: TomlConfig) -> TomlConfig {
        TomlConfig {
            host: self.host.or(lower.host),
            port: self.port.or(lower.port),
            storage_dir: self.storage_dir.or(lower.storage_dir),
            data_dir: self.data_dir.or(lower.data_dir),
            ocr_bin: self.ocr_bin.or(lower.ocr_bin),
            python_bin: self.python_bin.or(lower.python_bin),
            midi_script: self.midi_script.or(lower.midi_script),
            max_upload_size_mb: self.max_upload_size_mb.or(lower.max_upload_size_mb),
            max_concurrent_jobs: self.max_concurrent_jobs.or(lower.max_concurrent_jobs),
            spa_root: self.spa_root.or(lower.spa_root),
            logging: LoggingConfig {
                level: self.logging.level.or(lower.logging.level),
            },
        }
    }
}

/// Compiled defaults used when no other tier supplies a value
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
    pub data_dir: PathBuf,
    pub ocr_bin: String,
    pub python_bin: String,
    pub midi_script: PathBuf,
    pub max_upload_size_mb: u64,
    pub max_concurrent_jobs: usize,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            storage_dir: PathBuf::from("storage"),
            data_dir: PathBuf::from("data"),
            ocr_bin: "oemer".to_string(),
            python_bin: "python".to_string(),
            midi_script: PathBuf::from("scripts").join("convert_to_midi.py"),
            max_upload_size_mb: 12,
            max_concurrent_jobs: 2,
            log_level: "info".to_string(),
        }
    }
}

/// Fully resolved server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Root for uploaded images and generated artifacts (served under /files)
    pub storage_dir: PathBuf,
    /// Directory holding the SQLite database
    pub data_dir: PathBuf,
    pub ocr_bin: String,
    pub python_bin: String,
    pub midi_script: PathBuf,
    pub max_upload_size_mb: u64,
    pub max_concurrent_jobs: usize,
    pub spa_root: Option<PathBuf>,
    pub log_level: String,
    /// TOML file the configuration was read from, if any
    pub config_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::default();
        Self {
            host: defaults.host,
            port: defaults.port,
            storage_dir: defaults.storage_dir,
            data_dir: defaults.data_dir,
            ocr_bin: defaults.ocr_bin,
            python_bin: defaults.python_bin,
            midi_script: defaults.midi_script,
            max_upload_size_mb: defaults.max_upload_size_mb,
            max_concurrent_jobs: defaults.max_concurrent_jobs,
            spa_root: None,
            log_level: defaults.log_level,
            config_file: None,
        }
    }
}

impl ServerConfig {
    /// Apply compiled defaults to a merged layer and validate the result
    pub fn from_layer(layer: TomlConfig, defaults: &CompiledDefaults) -> Result<Self> {
        let max_upload_size_mb = layer
            .max_upload_size_mb
            .unwrap_or(defaults.max_upload_size_mb);
        if max_upload_size_mb == 0 {
            return Err(Error::Config(
                "max_upload_size_mb must be at least 1".to_string(),
            ));
        }

        let max_concurrent_jobs = layer
            .max_concurrent_jobs
            .unwrap_or(defaults.max_concurrent_jobs);
        if max_concurrent_jobs == 0 {
            return Err(Error::Config(
                "max_concurrent_jobs must be at least 1".to_string(),
            ));
        }

        for (key, value) in [("ocr_bin", &layer.ocr_bin), ("python_bin", &layer.python_bin)] {
            if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
                return Err(Error::Config(format!("{} must not be empty", key)));
            }
        }

        Ok(Self {
            host: layer.host.unwrap_or_else(|| defaults.host.clone()),
            port: layer.port.unwrap_or(defaults.port),
            storage_dir: layer
                .storage_dir
                .unwrap_or_else(|| defaults.storage_dir.clone()),
            data_dir: layer.data_dir.unwrap_or_else(|| defaults.data_dir.clone()),
            ocr_bin: layer.ocr_bin.unwrap_or_else(|| defaults.ocr_bin.clone()),
            python_bin: layer
                .python_bin
                .unwrap_or_else(|| defaults.python_bin.clone()),
            midi_script: layer
                .midi_script
                .unwrap_or_else(|| defaults.midi_script.clone()),
            max_upload_size_mb,
            max_concurrent_jobs,
            spa_root: layer.spa_root,
            log_level: layer
                .logging
                .level
                .unwrap_or_else(|| defaults.log_level.clone()),
            config_file: None,
        })
    }

    /// Resolve the final configuration from the CLI/env layer and an optional TOML file.
    ///
    /// Runs before logging is set up, so the file used is recorded in
    /// `config_file` instead of logged.
    pub fn resolve(cli: TomlConfig, config_file: Option<&Path>) -> Result<Self> {
        let path = locate_config_file(config_file)?;
        let file_layer = match &path {
            Some(path) => load_toml_config(path)?,
            None => TomlConfig::default(),
        };

        let mut config = Self::from_layer(cli.merge(file_layer), &CompiledDefaults::default())?;
        config.config_file = path;
        Ok(config)
    }

    /// Path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Upload body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }

    /// Create storage and data directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.storage_dir, &self.data_dir] {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

/// Find the TOML file to load.
///
/// An explicitly requested file must exist; the per-user default is optional.
pub fn locate_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(Error::Config(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    Ok(default_config_path().filter(|path| path.exists()))
}

/// `<config_dir>/remusic/remusic-server.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("remusic").join(DEFAULT_CONFIG_FILE))
}

/// Parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    Ok(config)
}
