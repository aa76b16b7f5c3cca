// src/diagnostics.rs

//! Logging setup and the diagnostic log kept only when a run fails.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// A per-run log file: discarded on success, preserved on failure.
#[derive(Debug)]
pub struct DiagnosticLog {
    path: PathBuf,
    file: File,
}

impl DiagnosticLog {
    /// Creates or truncates the log file at `path`.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A new handle appending to the log.
    pub fn writer(&self) -> io::Result<File> {
        self.file.try_clone()
    }

    /// Ends the run. Returns the log path when it was preserved.
    pub fn finish(self, success: bool) -> Option<PathBuf> {
        if !success {
            return Some(self.path);
        }
        let _ = self.file.sync_all();
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.path) {
            eprintln!("Failed to remove '{}': {}", self.path.display(), e);
        }
        None
    }
}

/// Installs the global subscriber: colored compact output on an interactive
/// stderr, plus a plain copy in the diagnostic log when there is one.
pub fn init_tracing(log_level: &str, log: Option<&DiagnosticLog>) -> Result<()> {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string());
    let filter = EnvFilter::try_new(&level)
        .with_context(|| format!("Invalid log level '{level}'"))?;

    let file_layer = match log {
        Some(log) => {
            let file = log
                .writer()
                .with_context(|| format!("Failed to open '{}'", log.path().display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_ansi(io::stderr().is_terminal())
                .with_writer(io::stderr),
        )
        .with(file_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;
    Ok(())
}
