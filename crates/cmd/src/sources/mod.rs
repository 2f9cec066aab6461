// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Concrete query sources

mod duck;
mod osquery;

pub use duck::DuckDbSource;
pub use osquery::OsquerySource;

use crate::config::{SourceConfig, SourceKind};
use anyhow::{Context, Result, anyhow};
use tablefs::{QuerySource, Row};

/// Source selected by the configuration
#[derive(Debug)]
pub enum Source {
    Osquery(OsquerySource),
    DuckDb(DuckDbSource),
}

impl Source {
    pub fn open(config: &SourceConfig) -> Result<Self> {
        match config.kind {
            SourceKind::Osquery => Ok(Source::Osquery(OsquerySource::new(config.osqueryi()))),
            SourceKind::Duckdb => {
                let path = config
                    .database
                    .as_ref()
                    .ok_or_else(|| anyhow!("the duckdb source needs a database"))?;
                let db = DuckDbSource::open(path)
                    .with_context(|| format!("could not open duckdb {}", path.display()))?;
                Ok(Source::DuckDb(db))
            }
        }
    }
}

impl QuerySource for Source {
    fn query(&self, table: &str) -> tablefs::Result<Vec<Row>> {
        match self {
            Source::Osquery(source) => source.query(table),
            Source::DuckDb(source) => source.query(table),
        }
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
