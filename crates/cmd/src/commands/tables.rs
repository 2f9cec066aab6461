// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::ShipContext;
use anyhow::Result;
use std::io::Write;

/// Print the resolved catalog, one table per line
pub fn tables_command<W: Write>(ship_context: &ShipContext, out: &mut W) -> Result<()> {
    let source = ship_context.open_source()?;
    for table in ship_context.tables(&source)? {
        writeln!(out, "{table}")?;
    }
    Ok(())
}
