// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::ShipContext;
use anyhow::{Context, Result};
use arrow::util::pretty::pretty_format_batches;
use clap::ValueEnum;
use diagnostics::log_debug;
use std::io::Write;
use tablefs::codec::rows_to_batch;
use tablefs::{QuerySource, TableFormat};

/// Output of `cat`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CatFormat {
    /// Same bytes as `/<table>.json`
    #[default]
    Json,
    /// Same bytes as `/<table>.arrow`
    Arrow,
    /// Human-readable table
    Pretty,
}

/// Run one materialization of `table` and write it to `out`
///
/// Unlike a read through the mount, a failing query is reported.
pub fn cat_command<W: Write>(
    ship_context: &ShipContext,
    table: &str,
    format: CatFormat,
    out: &mut W,
) -> Result<()> {
    let source = ship_context.open_source()?;
    let rows = source
        .query(table)
        .with_context(|| format!("could not query table {table}"))?;
    let row_count = rows.len();
    log_debug!(
        "Queried {table}: {row_count} rows",
        table: table,
        row_count: row_count
    );

    match format {
        CatFormat::Json => out.write_all(&TableFormat::Json.encode(&rows)?)?,
        CatFormat::Arrow => out.write_all(&TableFormat::Arrow.encode(&rows)?)?,
        CatFormat::Pretty => {
            let batch = rows_to_batch(&rows)?;
            writeln!(out, "{}", pretty_format_batches(&[batch])?)?;
        }
    }
    out.flush()?;
    Ok(())
}
