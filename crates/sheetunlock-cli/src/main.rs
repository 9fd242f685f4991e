//! SheetUnlock CLI - removes sheet and workbook protection from spreadsheets

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use sheetunlock::{check_supported, PipelineState, UnlockOptions, UnlockReport, Unlocker};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheetunlock")]
#[command(
    author,
    version,
    about = "Remove sheet and workbook protection from .xlsx/.xlsm files"
)]
struct Cli {
    /// Input workbook (.xlsx or .xlsm)
    input: PathBuf,

    /// Prefix of the unlocked copy's file name
    #[arg(long, default_value = sheetunlock::options::DEFAULT_OUTPUT_PREFIX)]
    prefix: String,

    /// Write rewritten parts without re-indenting them
    #[arg(long)]
    no_pretty: bool,

    /// Hash algorithm of the sheet protection entries to remove.
    ///
    /// Only SHA-512 entries are removed by default. Any other value goes
    /// beyond that and removes entries hashed with the given algorithm instead.
    #[arg(long, default_value = sheetunlock::options::DEFAULT_SHEET_ALGORITHM)]
    algorithm: String,

    /// Keep the extraction workspace when a stage fails
    #[arg(long)]
    keep_workspace: bool,

    /// Log every part that is extracted, rewritten and packed
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else if self.quiet {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        }
    }

    fn options(&self) -> UnlockOptions {
        UnlockOptions {
            output_prefix: self.prefix.clone(),
            pretty_print: !self.no_pretty,
            sheet_algorithm: self.algorithm.clone(),
            cleanup_on_failure: !self.keep_workspace,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(cli.log_level().as_str()),
    )
    .target(env_logger::Target::Stderr)
    .init();

    let report = unlock(&cli)?;

    println!("File saved to: {}", report.output.display());
    Ok(())
}

fn unlock(cli: &Cli) -> Result<UnlockReport> {
    check_supported(&cli.input)
        .with_context(|| format!("Cannot unlock '{}'", cli.input.display()))?;

    let unlocker = Unlocker::new(cli.options());
    let report = unlocker
        .run_with_progress(&cli.input, |state| {
            if state == PipelineState::Idle {
                log::info!("Processing file...");
            } else {
                log::debug!("Reached {state:?}");
            }
        })
        .with_context(|| format!("Failed to unlock '{}'", cli.input.display()))?;

    if report.worksheets.skipped > 0 {
        eprintln!(
            "Warning: {} worksheet(s) could not be parsed and were copied unchanged",
            report.worksheets.skipped
        );
    }
    Ok(report)
}
