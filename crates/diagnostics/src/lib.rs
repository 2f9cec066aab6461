// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Logging setup shared by the tablefs crates
//!
//! Records go to stderr through emit_term. The level comes from the
//! TABLEFS_LOG environment variable unless the caller passes one:
//! - TABLEFS_LOG=off (default) - no logs
//! - TABLEFS_LOG=info - registrations, mounts
//! - TABLEFS_LOG=debug - every materialization and rejected operation

use std::str::FromStr;
use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

/// Environment variable consulted by [`init_diagnostics`]
pub const LOG_ENV: &str = "TABLEFS_LOG";

static INIT: Once = Once::new();

/// Verbosity accepted by `TABLEFS_LOG` and `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }

    fn min_level(self) -> Option<emit::Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(emit::Level::Error),
            LogLevel::Warn => Some(emit::Level::Warn),
            LogLevel::Info => Some(emit::Level::Info),
            LogLevel::Debug => Some(emit::Level::Debug),
        }
    }

    /// Resolve a raw environment value. Unknown values select `Info` and
    /// are handed back so the caller can report them once logging is up.
    fn resolve(raw: Option<&str>) -> (LogLevel, Option<String>) {
        match raw {
            None => (LogLevel::Off, None),
            Some(value) => match value.parse() {
                Ok(level) => (level, None),
                Err(_) => (LogLevel::Info, Some(value.to_string())),
            },
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "" => Ok(LogLevel::Off),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Initialize diagnostics from the TABLEFS_LOG environment variable
///
/// Safe to call more than once; only the first call (of this or
/// [`init_with_level`]) configures the emitter.
pub fn init_diagnostics() {
    let raw = std::env::var(LOG_ENV).ok();
    let (level, unknown) = LogLevel::resolve(raw.as_deref());
    init_with_level(level);

    if let Some(value) = unknown {
        emit::warn!("Unknown {var} value {value}, using info", var: LOG_ENV, value: value.as_str());
    }
}

/// Initialize diagnostics at an explicit level
pub fn init_with_level(level: LogLevel) {
    INIT.call_once(|| {
        let Some(min) = level.min_level() else {
            return;
        };

        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(min))
            .init();

        // The emitter lives for the rest of the process.
        std::mem::forget(rt);
    });
}

/// Log basic operations (mounts, table registration)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (materializations, rejected operations)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable problems (query failures served from stale content)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that stop an operation
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
