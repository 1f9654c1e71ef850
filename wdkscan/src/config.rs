//! Settings resolution: CLI flags over an optional TOML file over defaults
//!
//! A config file uses the flag names as keys:
//!
//! ```toml
//! wallet = "wallet.dat"
//! database = "main"
//! width = 5
//! mode = "all"
//! matcher = { kind = "min-distinct", n = 4 }
//! timeout = 10
//! ```

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use wdkscan_engine::{MatchMode, MatcherKind, ScanConfig};

use crate::cli::{Args, MatcherArg};

/// Historical watchdog default, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of a `--config` file; every key optional
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub wallet: Option<PathBuf>,
    pub database: Option<String>,
    pub width: Option<usize>,
    pub step: Option<usize>,
    pub mode: Option<MatchMode>,
    pub matcher: Option<MatcherKind>,
    pub output: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub cache_pages: Option<usize>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

/// Fully resolved run settings
#[derive(Debug)]
pub struct Settings {
    pub scan: ScanConfig,
    pub output: Option<PathBuf>,
    /// `None` when the watchdog is disabled
    pub timeout: Option<Duration>,
    pub log_level: String,
    pub list_databases: bool,
}

/// Read the config file named by `--config`, if any, and merge
pub fn load(args: &Args) -> Result<Settings> {
    let file = match &args.config {
        Some(path) => FileConfig::from_path(path)?,
        None => FileConfig::default(),
    };
    resolve(args, file)
}

/// Merge CLI flags over file values over defaults
pub fn resolve(args: &Args, file: FileConfig) -> Result<Settings> {
    let Some(wallet) = args.wallet.clone().or(file.wallet) else {
        bail!("no wallet given; pass --wallet or set `wallet` in the config file");
    };

    let mut scan = ScanConfig::new(wallet);
    scan.database = args.database.clone().or(file.database);

    if let Some(width) = args.width.or(file.width) {
        scan.width = NonZeroUsize::new(width).context("window width must be at least 1")?;
    }
    if let Some(step) = args.step.or(file.step) {
        scan.step = NonZeroUsize::new(step).context("window step must be at least 1")?;
    }
    if let Some(mode) = args.mode.map(MatchMode::from).or(file.mode) {
        scan.mode = mode;
    }
    if let Some(matcher) = resolve_matcher(args, file.matcher)? {
        scan.matcher = matcher;
    }
    if let Some(pages) = args.cache_pages.or(file.cache_pages) {
        scan.cache_pages = pages;
    }

    let timeout = match args.timeout.or(file.timeout).unwrap_or(DEFAULT_TIMEOUT_SECS) {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };

    let log_level = match (&args.log_level, args.verbose) {
        (Some(level), _) => level.clone(),
        (None, true) => "debug".to_string(),
        (None, false) => file
            .log_level
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
    };

    Ok(Settings {
        scan,
        output: args.output.clone().or(file.output),
        timeout,
        log_level,
        list_databases: args.list_databases,
    })
}

fn resolve_matcher(args: &Args, file: Option<MatcherKind>) -> Result<Option<MatcherKind>> {
    let kind = match (args.matcher, args.min_distinct) {
        (Some(MatcherArg::NonUniform), None) => MatcherKind::NonUniform,
        (Some(MatcherArg::NonZero), None) => MatcherKind::NonZero,
        (Some(MatcherArg::MinDistinct) | None, Some(n)) => MatcherKind::MinDistinct(n),
        (Some(MatcherArg::MinDistinct), None) => {
            bail!("--matcher min-distinct needs --min-distinct <N>")
        }
        (Some(other), Some(_)) => {
            bail!("--min-distinct only applies to the min-distinct matcher, not {:?}", other)
        }
        (None, None) => return Ok(file),
    };
    Ok(Some(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(flags: &[&str]) -> Args {
        Args::parse_from(std::iter::once("wdkscan").chain(flags.iter().copied()))
    }

    fn file(text: &str) -> FileConfig {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = resolve(&args(&["--wallet", "wallet.dat"]), FileConfig::default()).unwrap();
        assert_eq!(settings.scan.path, PathBuf::from("wallet.dat"));
        assert_eq!(settings.scan.database, None);
        assert_eq!(settings.scan.width.get(), 5);
        assert_eq!(settings.scan.step.get(), 1);
        assert_eq!(settings.scan.mode, MatchMode::First);
        assert_eq!(settings.scan.matcher, MatcherKind::NonUniform);
        assert_eq!(settings.timeout, Some(Duration::from_secs(30)));
        assert_eq!(settings.log_level, "info");
        assert!(settings.output.is_none());
        assert!(!settings.list_databases);
    }

    #[test]
    fn test_file_fills_and_cli_wins() {
        let file = file(
            r#"
            wallet = "from-file.dat"
            database = "main"
            width = 8
            mode = "all"
            matcher = { kind = "min-distinct", n = 4 }
            timeout = 10
            log-level = "warn"
            "#,
        );
        let settings = resolve(
            &args(&["--wallet", "from-cli.dat", "--width", "6", "--timeout", "0"]),
            file,
        )
        .unwrap();

        assert_eq!(settings.scan.path, PathBuf::from("from-cli.dat"));
        assert_eq!(settings.scan.width.get(), 6);
        assert_eq!(settings.timeout, None);
        assert_eq!(settings.scan.database.as_deref(), Some("main"));
        assert_eq!(settings.scan.mode, MatchMode::All);
        assert_eq!(settings.scan.matcher, MatcherKind::MinDistinct(4));
        assert_eq!(settings.log_level, "warn");
    }

    #[test]
    fn test_wallet_is_required() {
        assert!(resolve(&args(&[]), FileConfig::default()).is_err());
        assert!(resolve(&args(&[]), file(r#"wallet = "w.dat""#)).is_ok());
    }

    #[test]
    fn test_zero_width_or_step_rejected() {
        assert!(resolve(&args(&["--wallet", "w", "--width", "0"]), FileConfig::default()).is_err());
        assert!(resolve(&args(&["--wallet", "w"]), file("step = 0")).is_err());
    }

    #[test]
    fn test_matcher_flags() {
        let pick = |flags: &[&str]| {
            let mut all = vec!["--wallet", "w"];
            all.extend_from_slice(flags);
            resolve(&args(&all), file(r#"matcher = { kind = "non-zero" }"#)).map(|s| s.scan.matcher)
        };

        assert_eq!(pick(&[]).unwrap(), MatcherKind::NonZero);
        assert_eq!(pick(&["--matcher", "non-uniform"]).unwrap(), MatcherKind::NonUniform);
        assert_eq!(pick(&["--min-distinct", "3"]).unwrap(), MatcherKind::MinDistinct(3));
        assert_eq!(
            pick(&["--matcher", "min-distinct", "--min-distinct", "4"]).unwrap(),
            MatcherKind::MinDistinct(4)
        );
        assert!(pick(&["--matcher", "min-distinct"]).is_err());
        assert!(pick(&["--matcher", "non-zero", "--min-distinct", "2"]).is_err());
    }

    #[test]
    fn test_log_level_precedence() {
        let level = |flags: &[&str]| {
            let mut all = vec!["--wallet", "w"];
            all.extend_from_slice(flags);
            resolve(&args(&all), file(r#"log-level = "error""#)).unwrap().log_level
        };
        assert_eq!(level(&[]), "error");
        assert_eq!(level(&["--verbose"]), "debug");
        assert_eq!(level(&["-v", "--log-level", "trace"]), "trace");
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(toml::from_str::<FileConfig>("wdith = 5").is_err());
        assert!(toml::from_str::<FileConfig>(r#"mode = "sometimes""#).is_err());
    }

    #[test]
    fn test_load_reads_config_file() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        writeln!(config, "wallet = \"w.dat\"\nstep = 5").unwrap();
        let path = config.path().to_str().unwrap().to_string();

        let settings = load(&args(&["--config", &path, "--list-databases"])).unwrap();
        assert_eq!(settings.scan.path, PathBuf::from("w.dat"));
        assert_eq!(settings.scan.step.get(), 5);
        assert!(settings.list_databases);

        assert!(load(&args(&["--config", "/nonexistent/wdkscan.toml"])).is_err());
    }
}
