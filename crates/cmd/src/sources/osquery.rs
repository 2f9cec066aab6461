// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::is_identifier;
use diagnostics::log_debug;
use std::path::{Path, PathBuf};
use std::process::Command;
use tablefs::{Error, QuerySource, Result, Row};

/// Runs `osqueryi --json "select * from <table>"` for every query
#[derive(Debug, Clone)]
pub struct OsquerySource {
    binary: PathBuf,
}

impl OsquerySource {
    pub fn new<P: Into<PathBuf>>(binary: P) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl QuerySource for OsquerySource {
    fn query(&self, table: &str) -> Result<Vec<Row>> {
        if !is_identifier(table) {
            return Err(Error::query(table, "table name is not an identifier"));
        }

        let sql = format!("select * from {table}");
        log_debug!("Running osqueryi: {sql}", sql: sql.as_str());
        let output = Command::new(&self.binary)
            .arg("--json")
            .arg(&sql)
            .output()
            .map_err(|e| Error::query(table, format!("could not run {}: {e}", self.binary.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::query(
                table,
                format!("osqueryi exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        parse_rows(table, &output.stdout)
    }
}

/// Rows from the JSON array printed by `osqueryi --json`
pub(crate) fn parse_rows(table: &str, stdout: &[u8]) -> Result<Vec<Row>> {
    serde_json::from_slice(stdout)
        .map_err(|e| Error::query(table, format!("unexpected osqueryi output: {e}")))
}
