// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod materialize;

use crate::testing::{StaticSource, rows};
use crate::{Owner, TableFs};
use serde_json::json;
use std::sync::Arc;

/// Adapter over a shared source holding the `users` table
fn users_fs() -> (Arc<StaticSource>, TableFs) {
    let source = Arc::new(
        StaticSource::new().with_table("users", rows(json!([{"name": "root", "uid": 0}]))),
    );
    let fs = TableFs::with_tables(source.clone(), Owner::default(), ["users"]).unwrap();
    (source, fs)
}

/// Adapter with no tables registered
fn empty_fs() -> TableFs {
    TableFs::new(StaticSource::new())
}
