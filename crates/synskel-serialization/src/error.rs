// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

/// Result type for point-file operations
pub type PointFileResult<T> = Result<T, PointFileError>;

/// Errors raised while reading or writing exchange files
#[derive(Debug, thiserror::Error)]
pub enum PointFileError {
    #[error("I/O failure on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Checksum mismatch in {path}: stored {expected}, computed {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: i64,
        actual: i64,
    },

    #[error("Corrupt file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

impl PointFileError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| PointFileError::Io { path, source }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        PointFileError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
