// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic file replace: write to a temp file in the same directory, fsync,
//! rename over the target. Subprocess readers therefore ever see either the
//! old file or the new one, never a partial write (spec §4.2/§8 scenario 5).

use crate::error::StorageError;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|source| StorageError::Io { path: dir.to_path_buf(), source })?;

    let tmp_path = dir.join(format!(".{}.{}.tmp", file_name(path), nanoid::nanoid!(8)));

    let mut file = File::create(&tmp_path)
        .map_err(|source| StorageError::Io { path: tmp_path.clone(), source })?;
    file.write_all(bytes).map_err(|source| StorageError::Io { path: tmp_path.clone(), source })?;
    file.sync_all().map_err(|source| StorageError::Io { path: tmp_path.clone(), source })?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|source| StorageError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("file").to_string()
}

#[cfg(test)]
#[path = "atomic_tests.rs"]
mod tests;
