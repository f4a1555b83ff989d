//! Command-line surface.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::RangedU64ValueParser;
use gapfill_core::config::{Config, LogFormat};

/// Detect and fill gaps in spreadsheet-backed sensor logs.
#[derive(Debug, Parser)]
#[command(name = "gapfill")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Sheet row (1-based) at which scanning begins.
    #[arg(
        value_name = "START_ROW",
        value_parser = RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub start_row: usize,

    /// Configuration file (default: ./gapfill.toml, then the user config dir).
    #[arg(long, env = "GAPFILL_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Answer "y" to the long-run confirmation.
    #[arg(long, short = 'y')]
    pub yes: bool,

    /// Print the estimate and exit without writing.
    #[arg(long)]
    pub dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log format (pretty or json).
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Also append logs to this file.
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply logging flags on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.clone());
        }
    }
}
