//! wdkscan - scan legacy wallet.dat btree containers for candidate key windows
//!
//! Matches are printed to stdout (or `--output`), logs go to stderr.
//!
//! Exit codes: 0 match found, 1 no match, 2 container could not be opened,
//! 3 container damaged mid-scan, 4 bad configuration or usage, 5 timed out.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wdkscan_engine::{run_scan, CancelToken, Container, OpenOptions, ScanReport, Watchdog};

mod cli;
mod config;
mod output;

use cli::Args;
use config::Settings;

const EXIT_MATCH: u8 = 0;
const EXIT_NO_MATCH: u8 = 1;
const EXIT_USAGE: u8 = 4;
const EXIT_TIMED_OUT: u8 = 5;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let settings = match config::load(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("wdkscan: {:#}", e);
            return ExitCode::from(EXIT_USAGE);
        }
    };

    if let Err(e) = init_logging(&settings.log_level) {
        eprintln!("wdkscan: {:#}", e);
        return ExitCode::from(EXIT_USAGE);
    }

    match run(&settings) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let log_level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG, when set, takes over from the level flags
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(log_level.into()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn run(settings: &Settings) -> Result<u8> {
    let scan = &settings.scan;
    info!("wdkscan v{}", env!("CARGO_PKG_VERSION"));
    info!("Wallet: {}", scan.path.display());

    if settings.list_databases {
        return list_databases(settings);
    }

    info!(
        "Scanning with {}-byte windows, step {}, {} matcher (heuristic), {:?} mode",
        scan.width, scan.step, scan.matcher, scan.mode
    );

    let cancel = CancelToken::new();
    let watchdog = settings.timeout.map(|timeout| {
        debug!("Watchdog armed for {:?}", timeout);
        Watchdog::arm(timeout, cancel.clone())
    });

    let code = scan_and_report(settings, &cancel);
    drop(watchdog);
    code
}

/// Scan, write the report and pick the exit code
///
/// Only a scan that actually stopped early counts as timed out; a watchdog
/// firing after the last record changes nothing.
fn scan_and_report(settings: &Settings, cancel: &CancelToken) -> Result<u8> {
    let scan = &settings.scan;
    let report = run_scan(scan, cancel)?;

    let mut out = output::sink(settings.output.as_deref()).context("opening output")?;
    output::write_report(&mut out, &report, scan.mode).context("writing report")?;

    if report.cancelled {
        warn!(
            "Scan timed out after {} records; results are incomplete",
            report.records_scanned
        );
    }
    Ok(report_exit_code(&report))
}

fn report_exit_code(report: &ScanReport) -> u8 {
    if report.cancelled {
        EXIT_TIMED_OUT
    } else if report.is_empty() {
        EXIT_NO_MATCH
    } else {
        EXIT_MATCH
    }
}

fn list_databases(settings: &Settings) -> Result<u8> {
    let options = OpenOptions {
        database: None,
        cache_pages: settings.scan.cache_pages,
    };
    let mut container = Container::open_with(&settings.scan.path, &options)
        .map_err(wdkscan_engine::Error::from)?;
    let names = container
        .subdatabases()
        .map_err(wdkscan_engine::Error::from)?;
    container.close();

    if names.is_empty() {
        info!("No sub-databases; the file holds a single tree");
    }
    let mut out = output::sink(settings.output.as_deref()).context("opening output")?;
    output::write_databases(&mut out, &names).context("writing database list")?;
    Ok(EXIT_MATCH)
}

/// Engine failures carry their own code; anything else is a usage problem
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<wdkscan_engine::Error>()
        .map(|e| e.exit_code() as u8)
        .unwrap_or(EXIT_USAGE)
}
