// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Binding between file paths and query tables
//!
//! A path `/<name>.json` or `/<name>.arrow` is bound to table `<name>`.
//! The binding is recomputed from the path string on every access.

use crate::codec;
use crate::error::{Error, Result};
use crate::source::Row;

/// Serialization exposed by a table file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableFormat {
    Json,
    Arrow,
}

impl TableFormat {
    /// Every format, in registration order
    pub const ALL: [TableFormat; 2] = [TableFormat::Json, TableFormat::Arrow];

    /// File suffix including the dot
    pub fn suffix(&self) -> &'static str {
        match self {
            TableFormat::Json => ".json",
            TableFormat::Arrow => ".arrow",
        }
    }

    /// Select the format from a path suffix
    pub fn from_path(path: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| path.ends_with(format.suffix()))
            .ok_or_else(|| Error::invalid_path(path))
    }

    /// Absolute path of `table` in this format
    pub fn path_for(&self, table: &str) -> String {
        format!("/{}{}", table, self.suffix())
    }

    /// Encode rows with the codec for this format
    pub fn encode(&self, rows: &[Row]) -> Result<Vec<u8>> {
        match self {
            TableFormat::Json => codec::encode_json(rows),
            TableFormat::Arrow => codec::encode_arrow(rows),
        }
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableFormat::Json => write!(f, "json"),
            TableFormat::Arrow => write!(f, "arrow"),
        }
    }
}

/// Table name and format derived from a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableBinding {
    table: String,
    format: TableFormat,
}

impl TableBinding {
    /// Strip the leading separator and the format suffix.
    ///
    /// Fails with `InvalidPath` when neither suffix matches or nothing is
    /// left once both are stripped.
    pub fn from_path(path: &str) -> Result<Self> {
        let format = TableFormat::from_path(path)?;
        let stem = path.strip_suffix(format.suffix()).unwrap_or(path);
        let table = stem.strip_prefix('/').unwrap_or(stem);
        if table.is_empty() {
            return Err(Error::invalid_path(path));
        }
        Ok(Self {
            table: table.to_string(),
            format,
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn format(&self) -> TableFormat {
        self.format
    }
}
