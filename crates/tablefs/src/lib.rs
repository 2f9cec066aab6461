// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory filesystem that exposes query tables as files
//!
//! Each registered table `<t>` appears as `/<t>.json` and `/<t>.arrow`.
//! Reading either file runs the table's query and serves freshly encoded
//! rows. Everything else (directories, symlinks, ad-hoc files, extended
//! attributes) lives only in memory and disappears with the process.

// Inode records and the path-keyed table
pub mod inode;
pub mod kind;

// Table binding and encoders
pub mod codec;
pub mod format;

// Query source seam
pub mod source;

// Filesystem operations
pub mod adapter;

pub mod error;

// Fixtures shared with the command crate's tests
pub mod testing;

pub use adapter::{StatFs, TABLE_FILE_MODE, TableFs};
pub use error::{Error, Result};
pub use format::{TableBinding, TableFormat};
pub use inode::{Inode, InodeTable, Owner, ROOT};
pub use kind::InodeKind;
pub use source::{QuerySource, Row};

#[cfg(test)]
mod tests;
