//! Command-line arguments

use crate::config::{Backend, Settings, SurnameMode};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Loads the Staffordshire war dead dashboard datasets
#[derive(Debug, Parser)]
#[command(name = "wardead", version, about)]
pub struct Cli {
    /// Settings file [default: ~/.wardead/config.toml]
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Backend to read from [default: postgres when WARDEAD_DATABASE_URL is set, else rest]
    #[arg(long, global = true, value_enum)]
    pub backend: Option<BackendArg>,

    /// Serve views from <DIR>/<view>.json instead of a database
    #[arg(long, global = true, value_name = "DIR", conflicts_with = "backend")]
    pub fixtures: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load the dashboard and print the payload as JSON
    Load(LoadArgs),
    /// Load the dashboard and write one file per dataset
    Export(ExportArgs),
    /// Backfill ISO dates of death from the free-text column
    CleanDates(CleanArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    Rest,
    Postgres,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Rest => Backend::Rest,
            BackendArg::Postgres => Backend::Postgres,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SurnameArg {
    /// Sorted by total count, descending, limited
    Top,
    /// Unsorted, unlimited
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Csv,
    Json,
}

/// Query shaping overrides shared by `load` and `export`
#[derive(Debug, Clone, Default, Args)]
pub struct ShapeArgs {
    /// How to query the surname pivot
    #[arg(long, value_enum)]
    pub surnames: Option<SurnameArg>,

    /// Row limit for the surname pivot in `top` mode
    #[arg(long, value_name = "N")]
    pub surname_limit: Option<usize>,

    /// Row limit for the map, rank and timeline views
    #[arg(long, value_name = "N")]
    pub row_limit: Option<usize>,

    /// Per-query timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl ShapeArgs {
    /// Overlay command-line values onto file settings
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.surnames {
            settings.surnames.mode = match mode {
                SurnameArg::Top => SurnameMode::Top,
                SurnameArg::All => SurnameMode::All,
            };
        }
        if let Some(limit) = self.surname_limit {
            settings.surnames.limit = limit;
        }
        if let Some(limit) = self.row_limit {
            settings.row_limit = limit;
        }
        if let Some(secs) = self.timeout {
            settings.query_timeout_secs = Some(secs);
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Pretty-print the payload
    #[arg(long)]
    pub pretty: bool,

    /// Exit non-zero if any field failed to load
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub shape: ShapeArgs,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    pub format: FormatArg,

    /// Output directory
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out: PathBuf,

    /// Exit non-zero if any field failed to load
    #[arg(long)]
    pub strict: bool,
}

#[derive(Debug, Clone, Args)]
pub struct CleanArgs {
    /// Table holding the raw roll of honour
    #[arg(long, default_value = "staffordshire_wardead")]
    pub table: String,

    /// Rows per page and per write batch
    #[arg(long, default_value_t = 1000)]
    pub batch_size: usize,

    /// Also write standardized regiment names to `regiment_clean`
    #[arg(long)]
    pub regiments: bool,

    /// Compute dates without writing them
    #[arg(long)]
    pub dry_run: bool,
}
