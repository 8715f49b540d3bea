// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error at {path}: {source}")]
    Io { path: std::path::PathBuf, source: std::io::Error },

    #[error("malformed JSON in {path}: {source}")]
    Json { path: std::path::PathBuf, source: serde_json::Error },
}
