// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Row encoders for the two table file formats
//!
//! Both encoders are pure: the same rows always produce the same bytes, and
//! an empty row sequence produces a valid empty table.

use crate::error::Result;
use crate::source::Row;
use arrow::ipc::writer::FileWriter;
use arrow_array::{RecordBatch, RecordBatchOptions};
use arrow_schema::{FieldRef, Schema};
use serde_arrow::schema::{SchemaLike, TracingOptions};
use std::sync::Arc;

/// Encode rows as a compact JSON array of objects
pub fn encode_json(rows: &[Row]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(rows)?)
}

/// Encode rows as an Arrow IPC file
pub fn encode_arrow(rows: &[Row]) -> Result<Vec<u8>> {
    let batch = rows_to_batch(rows)?;

    let mut buffer = Vec::new();
    {
        let mut writer = FileWriter::try_new(&mut buffer, batch.schema().as_ref())?;
        writer.write(&batch)?;
        writer.finish()?;
    }
    Ok(buffer)
}

/// Options used to trace the schema of a result set
///
/// Columns holding only nulls are kept, and mixed integer and float
/// columns are widened to a single numeric type.
pub fn tracing_options() -> TracingOptions {
    TracingOptions::default()
        .allow_null_fields(true)
        .coerce_numbers(true)
}

/// Convert rows into a single record batch, tracing the schema from them
///
/// Columns appear in first-seen order and a row without a column
/// contributes a null. Rows that carry no columns at all still count.
pub fn rows_to_batch(rows: &[Row]) -> Result<RecordBatch> {
    if rows.iter().all(Row::is_empty) {
        let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
        return Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::empty()),
            Vec::new(),
            &options,
        )?);
    }

    let fields = Vec::<FieldRef>::from_samples(rows, tracing_options())?;
    Ok(serde_arrow::to_record_batch(&fields, &rows)?)
}
