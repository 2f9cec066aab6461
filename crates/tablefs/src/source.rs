// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::Result;
use std::sync::Arc;

/// One result row: column name to scalar value, in column order
pub type Row = serde_json::Map<String, serde_json::Value>;

/// External service that runs the query behind a table
///
/// Calls are synchronous and may block for as long as the service takes;
/// the adapter holds its state lock across the call.
pub trait QuerySource: Send + Sync {
    /// Run the query for `table`. The schema may differ between calls.
    fn query(&self, table: &str) -> Result<Vec<Row>>;
}

impl<T: QuerySource + ?Sized> QuerySource for Arc<T> {
    fn query(&self, table: &str) -> Result<Vec<Row>> {
        (**self).query(table)
    }
}

impl<T: QuerySource + ?Sized> QuerySource for Box<T> {
    fn query(&self, table: &str) -> Result<Vec<Row>> {
        (**self).query(table)
    }
}
