// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::PoisonError;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by inode table and adapter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Path not found: {0}")]
    NotFound(String),

    /// The path carries neither a `.json` nor an `.arrow` suffix
    #[error("Invalid table path: {0}")]
    InvalidPath(String),

    #[error("Entry already exists: {0}")]
    AlreadyExists(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Not a symlink: {0}")]
    NotASymlink(String),

    /// The root directory cannot be removed or moved
    #[error("Immutable path: {0}")]
    Immutable(String),

    #[error("Query for table {table} failed: {message}")]
    Query { table: String, message: String },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),

    #[error("Arrow conversion error: {0}")]
    SerdeArrow(#[from] serde_arrow::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("State lock poisoned: {0}")]
    Lock(String),
}

impl Error {
    pub fn not_found<P: AsRef<str>>(path: P) -> Self {
        Error::NotFound(path.as_ref().to_string())
    }

    pub fn invalid_path<P: AsRef<str>>(path: P) -> Self {
        Error::InvalidPath(path.as_ref().to_string())
    }

    pub fn already_exists<P: AsRef<str>>(path: P) -> Self {
        Error::AlreadyExists(path.as_ref().to_string())
    }

    pub fn is_directory<P: AsRef<str>>(path: P) -> Self {
        Error::IsDirectory(path.as_ref().to_string())
    }

    pub fn not_a_directory<P: AsRef<str>>(path: P) -> Self {
        Error::NotADirectory(path.as_ref().to_string())
    }

    pub fn not_a_symlink<P: AsRef<str>>(path: P) -> Self {
        Error::NotASymlink(path.as_ref().to_string())
    }

    pub fn immutable<P: AsRef<str>>(path: P) -> Self {
        Error::Immutable(path.as_ref().to_string())
    }

    pub fn query<T: AsRef<str>, M: std::fmt::Display>(table: T, message: M) -> Self {
        Error::Query {
            table: table.as_ref().to_string(),
            message: message.to_string(),
        }
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Error {
        Error::Lock(err.to_string())
    }
}
