//! Command-line arguments
//!
//! Every scan option is optional here so a config file can supply it;
//! defaults are applied when the two are merged.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use wdkscan_engine::MatchMode;

/// wdkscan - scan legacy wallet.dat containers for candidate key windows
#[derive(Parser, Debug)]
#[command(name = "wdkscan")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the wallet.dat container
    #[arg(short, long)]
    pub wallet: Option<PathBuf>,

    /// Sub-database to scan (for example "main")
    #[arg(short, long)]
    pub database: Option<String>,

    /// Window width in bytes [default: 5]
    #[arg(long)]
    pub width: Option<usize>,

    /// Distance between window starts; set equal to the width for aligned windows [default: 1]
    #[arg(long)]
    pub step: Option<usize>,

    /// Stop at the first match or report every match [default: first]
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Window matcher [default: non-uniform]
    #[arg(long, value_enum)]
    pub matcher: Option<MatcherArg>,

    /// Distinct byte values required by the min-distinct matcher
    #[arg(long)]
    pub min_distinct: Option<u16>,

    /// Write matches to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seconds before the scan is cancelled, 0 disables [default: 30]
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// TOML config file; flags given here take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Page cache size (number of pages) [default: 256]
    #[arg(long)]
    pub cache_pages: Option<usize>,

    /// List sub-database names and exit
    #[arg(long)]
    pub list_databases: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    First,
    All,
}

impl From<ModeArg> for MatchMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::First => MatchMode::First,
            ModeArg::All => MatchMode::All,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MatcherArg {
    NonUniform,
    NonZero,
    MinDistinct,
}
