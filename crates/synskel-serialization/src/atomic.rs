// Copyright 2025 Synskel Developers
// SPDX-License-Identifier: Apache-2.0

//! Write-fully-or-not-at-all file output.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{PointFileError, PointFileResult};

/// Writes a file through a temporary sibling that is renamed into place on success.
///
/// Missing parent directories are created. If `fill` fails, the destination is left
/// untouched and the temporary file is removed.
pub fn write_atomically<F>(path: &Path, fill: F) -> PointFileResult<()>
where
    F: FnOnce(&mut BufWriter<&mut File>) -> io::Result<()>,
{
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(directory).map_err(PointFileError::io(directory))?;

    let mut staging = NamedTempFile::new_in(directory).map_err(PointFileError::io(path))?;
    {
        let mut writer = BufWriter::new(staging.as_file_mut());
        fill(&mut writer).map_err(PointFileError::io(path))?;
        writer.flush().map_err(PointFileError::io(path))?;
    }
    staging
        .as_file()
        .sync_data()
        .map_err(PointFileError::io(path))?;
    staging
        .persist(path)
        .map_err(|err| PointFileError::io(path)(err.error))?;
    Ok(())
}
