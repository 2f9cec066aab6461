// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Process configuration: an optional YAML file overridden by CLI flags

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};

/// Default osquery shell binary, resolved through `PATH`
pub const DEFAULT_OSQUERYI: &str = "osqueryi";

/// Service that answers table queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Spawn `osqueryi --json` per query
    #[default]
    Osquery,
    /// Query a DuckDB database file
    Duckdb,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    /// osqueryi binary
    pub binary: Option<PathBuf>,
    /// DuckDB database file
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    /// Tables to expose; empty means the source's default catalog
    #[serde(default)]
    pub tables: Vec<String>,
}

impl SourceConfig {
    /// Configured osqueryi binary, or the one found through `PATH`
    pub fn osqueryi(&self) -> PathBuf {
        self.binary
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OSQUERYI))
    }
}

/// Values given on the command line; each one wins over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<SourceKind>,
    pub database: Option<PathBuf>,
    pub osqueryi: Option<PathBuf>,
    pub tables: Vec<String>,
}

impl Config {
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml_ng::from_str(text).with_context(|| "could not parse yaml config")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = read_to_string(&path)
            .with_context(|| format!("could not read config {}", path.as_ref().display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("invalid config {}", path.as_ref().display()))
    }

    /// Load `path` if given, apply `overrides`, and validate the result
    pub fn resolve(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(kind) = overrides.source {
            self.source.kind = kind;
        }
        if overrides.database.is_some() {
            self.source.database = overrides.database;
        }
        if overrides.osqueryi.is_some() {
            self.source.binary = overrides.osqueryi;
        }
        if !overrides.tables.is_empty() {
            self.tables = overrides.tables;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.kind == SourceKind::Duckdb && self.source.database.is_none() {
            return Err(anyhow!("the duckdb source needs a database (--database)"));
        }
        for table in &self.tables {
            if table.is_empty() || table.contains('/') {
                return Err(anyhow!("invalid table name {:?}", table));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_osquery_with_builtin_catalog() {
        let config = Config::resolve(None, Overrides::default()).unwrap();
        assert_eq!(config.source.kind, SourceKind::Osquery);
        assert!(config.tables.is_empty());
        assert_eq!(config.source.osqueryi(), PathBuf::from("osqueryi"));
    }

    #[test]
    fn test_parse_yaml() {
        let config = Config::from_yaml(
            "source:\n  kind: duckdb\n  database: /var/lib/stats.duckdb\ntables:\n  - users\n  - groups\n",
        )
        .unwrap();
        assert_eq!(config.source.kind, SourceKind::Duckdb);
        assert_eq!(
            config.source.database,
            Some(PathBuf::from("/var/lib/stats.duckdb"))
        );
        assert_eq!(config.tables, vec!["users", "groups"]);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Config::from_yaml("sources: {}\n").is_err());
        assert!(Config::from_yaml("source:\n  kind: sqlite\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "source:\n  kind: osquery\n  binary: /opt/osqueryi\ntables: [users]").unwrap();

        let overrides = Overrides {
            source: Some(SourceKind::Duckdb),
            database: Some(PathBuf::from("/tmp/db.duckdb")),
            osqueryi: None,
            tables: vec!["processes".to_string()],
        };
        let config = Config::resolve(Some(file.path()), overrides).unwrap();
        assert_eq!(config.source.kind, SourceKind::Duckdb);
        assert_eq!(config.source.binary, Some(PathBuf::from("/opt/osqueryi")));
        assert_eq!(config.source.osqueryi(), PathBuf::from("/opt/osqueryi"));
        assert_eq!(config.tables, vec!["processes"]);
    }

    #[test]
    fn test_file_tables_kept_without_cli_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tables: [users, groups]").unwrap();
        let config = Config::resolve(Some(file.path()), Overrides::default()).unwrap();
        assert_eq!(config.tables, vec!["users", "groups"]);
    }

    #[test]
    fn test_validation() {
        let overrides = Overrides {
            source: Some(SourceKind::Duckdb),
            ..Overrides::default()
        };
        assert!(Config::resolve(None, overrides).is_err());

        let overrides = Overrides {
            tables: vec!["a/b".to_string()],
            ..Overrides::default()
        };
        assert!(Config::resolve(None, overrides).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load("/nonexistent/tablefs.yaml").unwrap_err();
        assert!(err.to_string().contains("could not read config"));
    }
}
