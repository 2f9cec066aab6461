// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod cat;
pub mod mount;
pub mod tables;

pub use cat::{CatFormat, cat_command};
pub use mount::mount_command;
pub use tables::tables_command;
