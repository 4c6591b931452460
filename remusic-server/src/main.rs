//! remusic-server - sheet music digitization service
//!
//! Accepts photos of sheet music, runs optical music recognition and MIDI
//! conversion as external processes, and exposes job status for polling.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use remusic_common::config::{LoggingConfig, ServerConfig, TomlConfig};
use remusic_server::pipeline::PipelineTools;
use remusic_server::{build_router, init_state};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments; each flag also reads its environment variable
#[derive(Parser, Debug)]
#[command(name = "remusic-server")]
#[command(about = "Sheet music digitization service")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "REMUSIC_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Root for uploads and generated files
    #[arg(long, env = "STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    /// Directory holding scores.db
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Optical music recognition executable
    #[arg(long, env = "OEMER_BIN")]
    ocr_bin: Option<String>,

    /// Interpreter for the MIDI conversion script
    #[arg(long, env = "PYTHON_BIN")]
    python_bin: Option<String>,

    /// MusicXML to MIDI conversion script
    #[arg(long, env = "MIDI_SCRIPT")]
    midi_script: Option<PathBuf>,

    /// Maximum upload size in MiB
    #[arg(long, env = "MAX_UPLOAD_SIZE_MB")]
    max_upload_size_mb: Option<u64>,

    /// Pipelines allowed to run at the same time
    #[arg(long, env = "MAX_CONCURRENT_JOBS")]
    max_concurrent_jobs: Option<usize>,

    /// Pre-built single-page app to serve for non-API paths
    #[arg(long, env = "SPA_ROOT")]
    spa_root: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "REMUSIC_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    /// Command-line/environment tier as a config layer
    fn into_layer(self) -> (Option<PathBuf>, TomlConfig) {
        let layer = TomlConfig {
            host: self.host,
            port: self.port,
            storage_dir: self.storage_dir,
            data_dir: self.data_dir,
            ocr_bin: self.ocr_bin,
            python_bin: self.python_bin,
            midi_script: self.midi_script,
            max_upload_size_mb: self.max_upload_size_mb,
            max_concurrent_jobs: self.max_concurrent_jobs,
            spa_root: self.spa_root,
            logging: LoggingConfig {
                level: self.log_level,
            },
        };
        (self.config, layer)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let (config_file, cli_layer) = Args::parse().into_layer();

    let config = ServerConfig::resolve(cli_layer, config_file.as_deref())
        .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "remusic_server={level},remusic_common={level},tower_http={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Build identification first, before any slow startup work
    info!(
        "Starting remusic-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    match &config.config_file {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }
    info!("Storage: {}", config.storage_dir.display());
    info!(
        "OCR tool: {}, converter: {} {}",
        config.ocr_bin,
        config.python_bin,
        config.midi_script.display()
    );

    let tools = PipelineTools::from_config(&config);
    let bind_host = config.host.clone();
    let bind_port = config.port;

    let state = init_state(config, tools).await?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((bind_host.as_str(), bind_port))
        .await
        .with_context(|| format!("Failed to bind to {}:{}", bind_host, bind_port))?;
    let addr: SocketAddr = listener.local_addr()?;
    info!("remusic-server listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
