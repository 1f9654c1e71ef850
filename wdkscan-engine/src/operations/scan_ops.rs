//! Scan operation: open a container, walk its records, scan each value
//!
//! `ScanConfig` is the one place scan options live. The operation keeps no
//! state besides the report it is building.

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::{debug, info, trace, warn};

use super::cancel::CancelToken;
use crate::error::{ContainerError, Result};
use crate::file_manager::container::{Container, OpenOptions};
use crate::file_manager::cursor::Record;
use crate::file_manager::page_cache::DEFAULT_CAPACITY;
use crate::scanner::{self, Match, Matcher, MatcherKind, DEFAULT_WIDTH};

/// Whether to stop at the first match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    First,
    All,
}

/// Everything a scan needs
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub path: PathBuf,
    /// Sub-database to scan; the top-level tree when `None`
    pub database: Option<String>,
    pub width: NonZeroUsize,
    /// Distance between window starts; 1 slides byte by byte
    pub step: NonZeroUsize,
    pub mode: MatchMode,
    pub matcher: MatcherKind,
    pub cache_pages: usize,
}

impl ScanConfig {
    /// Defaults: 5-byte sliding windows, first match, non-uniform matcher
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ScanConfig {
            path: path.into(),
            database: None,
            width: NonZeroUsize::new(DEFAULT_WIDTH).unwrap_or(NonZeroUsize::MIN),
            step: NonZeroUsize::MIN,
            mode: MatchMode::default(),
            matcher: MatcherKind::default(),
            cache_pages: DEFAULT_CAPACITY,
        }
    }

    fn open_options(&self) -> OpenOptions {
        OpenOptions {
            database: self.database.clone(),
            cache_pages: self.cache_pages,
        }
    }
}

/// Outcome of a scan; no matches is a normal result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub matches: Vec<Match>,
    pub records_scanned: u64,
    /// Stopped early by the cancel token
    pub cancelled: bool,
}

impl ScanReport {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn first(&self) -> Option<&Match> {
        self.matches.first()
    }
}

/// Open the configured container and scan it
pub fn run_scan(config: &ScanConfig, cancel: &CancelToken) -> Result<ScanReport> {
    let container = Container::open_with(&config.path, &config.open_options())?;
    let info = container.info();
    debug!(
        "scanning {} (database {:?}, root page {}, {}-byte windows every {}, {} matcher, {:?} mode)",
        info.path.display(),
        info.database,
        info.root,
        config.width,
        config.step,
        config.matcher,
        config.mode
    );

    let report = scan_records(
        container.records(),
        config.width.get(),
        config.step.get(),
        config.mode,
        &config.matcher,
        cancel,
    )?;

    info!(
        "{}: {} records scanned, {} matches{}",
        info.path.display(),
        report.records_scanned,
        report.matches.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(report)
}

/// Scan a record sequence; the sequence is dropped (and closed) on every return
pub fn scan_records<I, M>(
    records: I,
    width: usize,
    step: usize,
    mode: MatchMode,
    matcher: &M,
    cancel: &CancelToken,
) -> std::result::Result<ScanReport, ContainerError>
where
    I: IntoIterator<Item = std::result::Result<Record, ContainerError>>,
    M: Matcher + ?Sized,
{
    let mut report = ScanReport::default();
    let mut records = records.into_iter();

    loop {
        // Checked before pulling: fetching a record can mean reading an overflow chain
        if cancel.is_cancelled() {
            warn!("scan cancelled after {} records", report.records_scanned);
            report.cancelled = true;
            break;
        }
        let Some(record) = records.next() else {
            break;
        };

        let record = record?;
        report.records_scanned += 1;
        trace!(
            "record {}: {}-byte key, {}-byte value",
            report.records_scanned,
            record.key.len(),
            record.value.len()
        );

        for hit in scanner::scan_stepped(&record.value, width, step, matcher) {
            report
                .matches
                .push(Match::from_hit(&record.key, &record.value, &hit));
            if mode == MatchMode::First {
                return Ok(report);
            }
        }
    }

    Ok(report)
}
