//! External tool invocation
//!
//! Tools are opaque: the only contract is the exit code and whatever they
//! print. Stdout and stderr are merged in arrival order into one log blob,
//! which is attached to the error on failure.

use std::ffi::{OsStr, OsString};
use std::io;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::debug;

/// Failure of an external tool
#[derive(Debug, Error)]
pub enum ToolError {
    /// Process could not be started (missing binary, permissions)
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Reading output or waiting for the process failed
    #[error("Failed to run {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Process finished with a non-zero exit code
    #[error("Command {program} exited with code {code}.\n{log}")]
    Failed {
        program: String,
        /// Exit code, or `signal` when terminated by a signal
        code: String,
        log: String,
    },
}

/// A program plus the arguments that precede the per-call arguments
///
/// `python convert_to_midi.py <in> <out>` is `ToolCommand::new("python")`
/// with leading argument `convert_to_midi.py`.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    leading_args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.leading_args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion and return the merged output on exit code 0
    pub async fn run<I, S>(&self, args: I) -> Result<String, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(command = ?command.as_std(), "Spawning external tool");
        let started = Instant::now();

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let log = Mutex::new(Vec::new());

        let (out_result, err_result, status) = tokio::join!(
            pump(stdout, &log),
            pump(stderr, &log),
            child.wait()
        );

        let io_error = |source| ToolError::Io {
            program: self.program.clone(),
            source,
        };
        out_result.map_err(io_error)?;
        err_result.map_err(io_error)?;
        let status = status.map_err(io_error)?;

        let log = log.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        let log = String::from_utf8_lossy(&log).into_owned();

        debug!(
            program = %self.program,
            status = %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "External tool finished"
        );

        if status.success() {
            Ok(log)
        } else {
            Err(ToolError::Failed {
                program: self.program.clone(),
                code: status
                    .code()
                    .map(|code| code.to_string())
                    .unwrap_or_else(|| "signal".to_string()),
                log,
            })
        }
    }
}

/// Copy a child pipe into the shared log until EOF
async fn pump<R>(reader: Option<R>, sink: &Mutex<Vec<u8>>) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return Ok(());
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        sink.lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(&buf[..n]);
    }
}
