//! Report formatting

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use wdkscan_engine::{MatchMode, ScanReport};

/// Open the output sink: a file when given, stdout otherwise
pub fn sink(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    })
}

/// One `<key-hex> <offset> <WINDOW-HEX>` line per match
pub fn write_report(out: &mut dyn Write, report: &ScanReport, mode: MatchMode) -> io::Result<()> {
    for m in &report.matches {
        writeln!(out, "{}", m)?;
    }

    match report.first() {
        Some(first) if mode == MatchMode::First => {
            writeln!(out, "[WDK] Final Key: {}", first.hex())?;
        }
        Some(_) => {}
        None => writeln!(out, "No candidate found")?,
    }
    out.flush()
}

pub fn write_databases(out: &mut dyn Write, names: &[String]) -> io::Result<()> {
    for name in names {
        writeln!(out, "{}", name)?;
    }
    out.flush()
}
