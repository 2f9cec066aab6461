// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Test fixtures for code built on the adapter
//!
//! `StaticSource` answers queries from in-memory tables and can be switched
//! into a failing state to exercise the stale-content path of `read`.

use crate::error::{Error, Result};
use crate::source::{QuerySource, Row};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Query source backed by fixed rows per table
#[derive(Debug, Default)]
pub struct StaticSource {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`StaticSource::set_table`]
    pub fn with_table<N: Into<String>>(self, name: N, rows: Vec<Row>) -> Self {
        if let Ok(mut tables) = self.tables.lock() {
            tables.insert(name.into(), rows);
        }
        self
    }

    /// Replace the rows returned for `name`
    pub fn set_table<N: Into<String>>(&self, name: N, rows: Vec<Row>) -> Result<()> {
        self.tables.lock()?.insert(name.into(), rows);
        Ok(())
    }

    /// When failing, every query returns an error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of queries answered or refused so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl QuerySource for StaticSource {
    fn query(&self, table: &str) -> Result<Vec<Row>> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::query(table, "source unavailable"));
        }
        self.tables
            .lock()?
            .get(table)
            .cloned()
            .ok_or_else(|| Error::query(table, "no such table"))
    }
}

/// Rows from a JSON array of objects; anything else is skipped
pub fn rows(value: serde_json::Value) -> Vec<Row> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|item| item.as_object().cloned()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_static_source_answers_and_fails() {
        let source = StaticSource::new().with_table("users", rows(json!([{"uid": 0}])));

        assert_eq!(source.query("users").unwrap().len(), 1);
        assert!(matches!(source.query("groups"), Err(Error::Query { .. })));

        source.set_failing(true);
        assert!(source.query("users").is_err());
        assert_eq!(source.calls(), 3);
    }

    #[test]
    fn test_rows_skips_non_objects() {
        let parsed = rows(json!([{"a": 1}, 2, "x", {"b": null}]));
        assert_eq!(parsed.len(), 2);
        assert!(rows(json!({"a": 1})).is_empty());
    }
}
