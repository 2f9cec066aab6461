// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cmd::commands::{CatFormat, cat_command, mount_command, tables_command};
use cmd::common::ShipContext;
use cmd::config::{Config, Overrides, SourceKind};
use cmd::fuse::MountSettings;
use diagnostics::LogLevel;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "tablefs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service that answers table queries
    #[arg(long, global = true, value_enum)]
    source: Option<SourceKind>,

    /// DuckDB database file (duckdb source)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// osqueryi binary (osquery source)
    #[arg(long, global = true)]
    osqueryi: Option<PathBuf>,

    /// Table to expose; repeat for more. Defaults to the source's catalog
    #[arg(long = "table", global = true)]
    tables: Vec<String>,

    /// off, error, warn, info or debug; overrides TABLEFS_LOG
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mount the tables and serve them until unmounted
    Mount(MountArgs),
    /// Query one table and write it to stdout
    Cat {
        /// Table name
        table: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = CatFormat::Json)]
        format: CatFormat,
    },
    /// List the tables that would be mounted
    Tables,
}

#[derive(Args)]
struct MountArgs {
    /// Empty directory to mount on
    mountpoint: PathBuf,

    /// Let other users access the mount (needs user_allow_other)
    #[arg(long)]
    allow_other: bool,

    /// Filesystem name shown by mount(8)
    #[arg(long, default_value = "tablefs")]
    fs_name: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.log_level {
        Some(level) => diagnostics::init_with_level(level),
        None => diagnostics::init(),
    }

    let overrides = Overrides {
        source: cli.source,
        database: cli.database,
        osqueryi: cli.osqueryi,
        tables: cli.tables,
    };
    let config = Config::resolve(cli.config.as_deref(), overrides)?;
    let ship_context = ShipContext::new(config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Mount(args) => {
            let settings = MountSettings {
                fs_name: args.fs_name,
                allow_other: args.allow_other,
            };
            mount_command(&ship_context, &args.mountpoint, &settings)
        }
        Commands::Cat { table, format } => cat_command(&ship_context, &table, format, &mut out),
        Commands::Tables => tables_command(&ship_context, &mut out),
    }
}
