// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistence errors.

use std::path::PathBuf;

/// Error reading or writing a story database
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// SQLite rejected a statement
    #[error("Database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A JSON column could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error around the database file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Export target already exists
    #[error("Refusing to overwrite {0}")]
    ExportTargetExists(PathBuf),
}
