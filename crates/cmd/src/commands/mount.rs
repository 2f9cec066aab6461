// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::common::{ShipContext, current_owner};
use crate::fuse::{MountSettings, mount};
use anyhow::{Result, anyhow};
use diagnostics::log_info;
use std::path::Path;
use tablefs::TableFs;

/// Register every catalog table and serve the mount until it is unmounted
pub fn mount_command(
    ship_context: &ShipContext,
    mountpoint: &Path,
    settings: &MountSettings,
) -> Result<()> {
    if !mountpoint.is_dir() {
        return Err(anyhow!(
            "mount point {} is not a directory",
            mountpoint.display()
        ));
    }

    let fs = build_fs(ship_context)?;
    mount(fs, mountpoint, settings)
}

/// Adapter with the resolved catalog registered, owned by the current user
pub fn build_fs(ship_context: &ShipContext) -> Result<TableFs> {
    let source = ship_context.open_source()?;
    let tables = ship_context.tables(&source)?;
    let table_count = tables.len();
    let fs = TableFs::with_tables(source, current_owner(), &tables)?;
    log_info!("Registered {table_count} tables", table_count: table_count);
    Ok(fs)
}
