// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for the synskel tools
//!
//! Console output goes to stderr so that tools can keep stdout for reports. With the
//! `file-logging` feature a JSON log file is written per run:
//!
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── synskel.log
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How logging should be set up
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Level for targets without a debug flag (trace, debug, info, warn, error)
    pub default_level: String,
    /// Base directory for per-run log folders; `None` disables file output
    pub log_dir: Option<PathBuf>,
    /// Keep this many most recent run folders
    pub retention_runs: usize,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            default_level: "info".to_string(),
            log_dir: None,
            retention_runs: 10,
        }
    }
}

/// Keeps file writers alive; logs are flushed when it is dropped.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    run_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Folder of this run's log file, if file logging is active.
    pub fn run_dir(&self) -> Option<&Path> {
        self.run_dir.as_deref()
    }
}

/// Build the filter: `RUST_LOG` wins, otherwise debug flags over the default level.
pub fn build_filter(debug_flags: &CrateDebugFlags, default_level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directives = debug_flags.to_filter_string(default_level);
    EnvFilter::try_new(&directives)
        .with_context(|| format!("Invalid log filter: {}", directives))
}

/// Initialize console logging and, when configured, a per-run JSON log file.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_filter(build_filter(debug_flags, &options.default_level)?);
    layers.push(console_layer.boxed());

    #[cfg(feature = "file-logging")]
    let (file_guard, run_dir) = match &options.log_dir {
        Some(base) => {
            let (layer, guard, run_dir) = file_layer(debug_flags, options, base)?;
            layers.push(layer);
            (Some(guard), Some(run_dir))
        }
        None => (None, None),
    };
    #[cfg(not(feature = "file-logging"))]
    let run_dir: Option<PathBuf> = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    #[cfg(not(feature = "file-logging"))]
    if let Some(base) = &options.log_dir {
        tracing::warn!(
            target: "synskel-observability",
            log_dir = %base.display(),
            "File logging requested but the file-logging feature is disabled"
        );
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        run_dir,
    })
}

/// Initialize console-only logging at `info`.
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingOptions::default())
}

#[cfg(feature = "file-logging")]
fn file_layer(
    debug_flags: &CrateDebugFlags,
    options: &LoggingOptions,
    base: &Path,
) -> Result<(
    BoxedLayer,
    tracing_appender::non_blocking::WorkerGuard,
    PathBuf,
)> {
    let run_dir = create_run_dir(base)?;
    cleanup_old_runs(base, options.retention_runs)?;

    let appender = tracing_appender::rolling::never(&run_dir, "synskel.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(build_filter(debug_flags, &options.default_level)?)
        .boxed();
    Ok((layer, guard, run_dir))
}

#[cfg(feature = "file-logging")]
const RUN_PREFIX: &str = "run_";
#[cfg(feature = "file-logging")]
const RUN_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

#[cfg(feature = "file-logging")]
fn create_run_dir(base: &Path) -> Result<PathBuf> {
    let timestamp = chrono::Utc::now().format(RUN_TIMESTAMP);
    let run_dir = base.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create log directory: {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Remove all but the `keep` most recent run folders under `base`.
#[cfg(feature = "file-logging")]
pub fn cleanup_old_runs(base: &Path, keep: usize) -> Result<usize> {
    use chrono::NaiveDateTime;

    if !base.exists() {
        return Ok(0);
    }

    let mut runs: Vec<(NaiveDateTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(base)
        .with_context(|| format!("Failed to list log directory: {}", base.display()))?
    {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let started = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(RUN_PREFIX))
            .and_then(|stamp| NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP).ok());
        if let Some(started) = started {
            runs.push((started, path));
        }
    }

    // newest first
    runs.sort_by(|a, b| b.0.cmp(&a.0));
    let mut removed = 0;
    for (_, path) in runs.iter().skip(keep) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_accepts_hyphenated_targets() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-synskel-thinning".to_string()]);
        assert!(build_filter(&flags, "warn").is_ok());
    }

    #[cfg(feature = "file-logging")]
    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20240101_000000", "20240102_000000", "20240103_000000"] {
            std::fs::create_dir(dir.path().join(format!("run_{}", stamp))).unwrap();
        }
        std::fs::create_dir(dir.path().join("unrelated")).unwrap();

        assert_eq!(cleanup_old_runs(dir.path(), 2).unwrap(), 1);
        assert!(!dir.path().join("run_20240101_000000").exists());
        assert!(dir.path().join("run_20240103_000000").exists());
        assert!(dir.path().join("unrelated").exists());
    }
}
