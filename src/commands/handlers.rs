//! Command execution handlers
//!
//! Each subcommand resolves settings and a data source, then does its work.
//! Dashboard loads never fail on data errors; `--strict` turns failed
//! fields into a non-zero exit.

use crate::commands::cli::{CleanArgs, Cli, Command, ExportArgs, FormatArg, LoadArgs, ShapeArgs};
use crate::config::{Settings, SourceConfig, load_settings};
use crate::dashboard::{self, DashboardReport, Field};
use crate::db::DatabaseHandle;
use crate::error::{CommandError, CommandResult, ConfigResult, Result};
use crate::export::ExportFormat;
use crate::maintenance::{self, CleanOptions, RegimentColumns};
use std::io::Write;
use std::path::Path;

/// Execute a parsed command line
pub async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Load(args) => load(&cli, args).await,
        Command::Export(args) => export(&cli, args).await,
        Command::CleanDates(args) => clean_dates(&cli, args).await,
    }
}

async fn load(cli: &Cli, args: &LoadArgs) -> Result<()> {
    let report = load_report(cli, &args.shape).await?;
    let failed = report.failed_fields();
    let payload = report.into_payload();

    let json = if args.pretty {
        serde_json::to_string_pretty(&payload)
    } else {
        serde_json::to_string(&payload)
    }
    .map_err(|e| CommandError::ExecutionFailed(format!("cannot serialize payload: {}", e)))?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", json)?;

    Ok(check_strict(args.strict, &failed)?)
}

async fn export(cli: &Cli, args: &ExportArgs) -> Result<()> {
    let report = load_report(cli, &args.shape).await?;
    let failed = report.failed_fields();
    let payload = report.into_payload();
    let format = match args.format {
        FormatArg::Csv => ExportFormat::Csv,
        FormatArg::Json => ExportFormat::Json,
    };

    std::fs::create_dir_all(&args.out)?;
    for field in Field::ALL {
        let path = args.out.join(format!("{}.{}", field.key(), format.extension()));
        let rows = payload.get(field);
        std::fs::write(&path, format.render(rows))?;
        tracing::info!(%field, rows = rows.len(), path = %path.display(), "Exported");
    }

    Ok(check_strict(args.strict, &failed)?)
}

async fn clean_dates(cli: &Cli, args: &CleanArgs) -> Result<()> {
    if args.batch_size == 0 {
        return Err(CommandError::InvalidArgument("--batch-size must be at least 1".into()).into());
    }
    let source = resolve_source(cli, true)?;
    tracing::info!(source = %source.describe(), table = %args.table, "Cleaning dates");

    let db = DatabaseHandle::connect(&source).await?;
    let options = CleanOptions {
        table: args.table.clone(),
        batch_size: args.batch_size,
        dry_run: args.dry_run,
        regiments: args.regiments.then(RegimentColumns::default),
        ..CleanOptions::default()
    };
    let report = maintenance::clean_dates(&db, &options).await?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "fetched {} rows: {} parsed, {} unparsed, {} written{}",
        report.fetched,
        report.parsed,
        report.unparsed,
        report.written,
        if args.dry_run { " (dry run)" } else { "" }
    )?;
    if args.regiments {
        writeln!(out, "{} regiment names standardized", report.regiments_matched)?;
    }

    match report.failed_batch {
        Some((first_row, error)) => Err(CommandError::ExecutionFailed(format!(
            "batch starting at row {} failed: {}",
            first_row, error
        ))
        .into()),
        None => Ok(()),
    }
}

async fn load_report(cli: &Cli, shape: &ShapeArgs) -> Result<DashboardReport> {
    let settings = resolve_settings(cli.config.as_deref(), shape)?;
    let source = resolve_source(cli, false);
    if let Ok(source) = &source {
        tracing::debug!(source = %source.describe(), "Dashboard source");
    }
    Ok(dashboard::load_from_source(source, &settings).await)
}

/// File settings with command-line overrides applied
fn resolve_settings(path: Option<&Path>, shape: &ShapeArgs) -> ConfigResult<Settings> {
    let mut settings = load_settings(path)?;
    shape.apply(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn resolve_source(cli: &Cli, privileged: bool) -> ConfigResult<SourceConfig> {
    if let Some(dir) = &cli.fixtures {
        return Ok(SourceConfig::Fixtures(dir.clone()));
    }
    let backend = cli.backend.map(Into::into);
    if privileged {
        SourceConfig::from_env_privileged(backend)
    } else {
        SourceConfig::from_env(backend)
    }
}

fn check_strict(strict: bool, failed: &[Field]) -> CommandResult<()> {
    if strict && !failed.is_empty() {
        let names: Vec<&str> = failed.iter().map(|f| f.key()).collect();
        return Err(CommandError::ExecutionFailed(format!(
            "failed to load: {}",
            names.join(", ")
        )));
    }
    Ok(())
}
