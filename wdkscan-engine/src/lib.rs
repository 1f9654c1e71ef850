//! wdkscan engine - read-only Berkeley DB btree reader and window scanner
//!
//! This crate opens legacy `wallet.dat` style btree containers without the
//! database library, iterates their key/value records in order, and slides a
//! fixed-width window over each value looking for candidate byte runs.
//!
//! The built-in matchers are heuristics. A reported window only means the
//! bytes do not look like padding.

pub mod error;
pub mod storage;
pub mod file_manager;
pub mod scanner;
pub mod operations;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{ContainerError, Error, OpenError, Result};
pub use file_manager::{Container, ContainerInfo, OpenOptions, Record, Records};
pub use operations::{run_scan, CancelToken, MatchMode, ScanConfig, ScanReport, Watchdog};
pub use scanner::{scan, scan_stepped, Match, Matcher, MatcherKind, DEFAULT_WIDTH};
