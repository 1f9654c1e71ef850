//! Scan orchestration
//!
//! Wires a container's record sequence into the scanner and collects a
//! report, under a cancel token the CLI's watchdog can trip.

pub mod cancel;
pub mod scan_ops;

pub use cancel::{CancelToken, Watchdog};
pub use scan_ops::{run_scan, scan_records, MatchMode, ScanConfig, ScanReport};
