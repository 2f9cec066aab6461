// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, anyhow};
use duckdb::Connection;
use duckdb::types::ValueRef;
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::Mutex;
use tablefs::{Error, QuerySource, Row};

/// Answers `SELECT * FROM "<table>"` from a DuckDB database
pub struct DuckDbSource {
    conn: Mutex<Connection>,
}

impl DuckDbSource {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| anyhow!("{e}"))?;
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Tables and views of the `main` schema, sorted by name
    pub fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().map_err(|e| anyhow!("{e}"))?;
        let mut stmt = conn.prepare(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = 'main' ORDER BY table_name",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(names)
    }
}

impl QuerySource for DuckDbSource {
    fn query(&self, table: &str) -> tablefs::Result<Vec<Row>> {
        let conn = self.conn.lock()?;
        let sql = format!("SELECT * FROM {}", quote_identifier(table));
        let mut stmt = conn.prepare(&sql).map_err(|e| Error::query(table, e))?;
        let mut rows = stmt.query([]).map_err(|e| Error::query(table, e))?;
        let columns: Vec<String> = rows
            .as_ref()
            .map(|stmt| stmt.column_names())
            .unwrap_or_default();

        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(|e| Error::query(table, e))? {
            let mut record = Row::new();
            for (index, name) in columns.iter().enumerate() {
                let value = row.get_ref(index).map_err(|e| Error::query(table, e))?;
                let _ = record.insert(name.clone(), to_json(value));
            }
            result.push(record);
        }
        Ok(result)
    }
}

impl std::fmt::Debug for DuckDbSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DuckDbSource{{}}")
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Numbers, booleans and text map directly; other types are rendered as text
fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => i.into(),
        ValueRef::SmallInt(i) => i.into(),
        ValueRef::Int(i) => i.into(),
        ValueRef::BigInt(i) => i.into(),
        ValueRef::UTinyInt(i) => i.into(),
        ValueRef::USmallInt(i) => i.into(),
        ValueRef::UInt(i) => i.into(),
        ValueRef::UBigInt(i) => i.into(),
        ValueRef::HugeInt(i) => Value::String(i.to_string()),
        ValueRef::Float(f) => float(f64::from(f)),
        ValueRef::Double(f) => float(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        other => Value::String(format!("{:?}", duckdb::types::Value::from(other))),
    }
}

// NaN and infinities have no JSON form
fn float(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}
