// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::catalog::resolve_tables;
use crate::config::Config;
use crate::sources::Source;
use anyhow::Result;
use tablefs::Owner;

/// Resolved configuration shared by every command
#[derive(Debug, Clone)]
pub struct ShipContext {
    pub config: Config,
}

impl ShipContext {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn open_source(&self) -> Result<Source> {
        Source::open(&self.config.source)
    }

    pub fn tables(&self, source: &Source) -> Result<Vec<String>> {
        resolve_tables(&self.config, source)
    }
}

/// Owner of the mounting process, given to every record the mount creates
pub fn current_owner() -> Owner {
    // SAFETY: getuid and getgid cannot fail and touch no memory
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    Owner::new(uid, gid)
}
