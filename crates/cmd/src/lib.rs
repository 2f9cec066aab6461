// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod catalog;
pub mod commands;
pub mod common;
pub mod config;
pub mod fuse;
pub mod sources;

pub use commands::{cat_command, mount_command, tables_command};
