//! CLI argument parsing module for depdoctor

use crate::domain::TargetPolicy;
use crate::output::Verbosity;
use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::time::Duration;

/// Parse duration string in format: Ns (seconds), Nm (minutes),
/// Nh (hours), Nd (days)
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let (num_str, unit) = if let Some(n) = s.strip_suffix('s') {
        (n, 's')
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 'm')
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 'h')
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 'd')
    } else {
        return Err(format!("invalid duration format: {}", s));
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("invalid number in duration: {}", num_str))?;

    let seconds = match unit {
        's' => num,
        'm' => num * 60,
        'h' => num * 60 * 60,
        'd' => num * 24 * 60 * 60,
        _ => unreachable!(),
    };

    Ok(Duration::from_secs(seconds))
}

/// npm dependency upgrade checker with test-verified doctor mode
#[derive(Parser, Debug, Clone)]
#[command(
    name = "depdoctor",
    version,
    about = "Check npm dependencies for upgrades, optionally verified against your tests"
)]
pub struct CliArgs {
    /// Project directory containing package.json (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    // Target selection
    /// Target version policy: latest, newest, greatest, minor, patch,
    /// semver, or tag:<name>
    #[arg(short, long, default_value = "latest")]
    pub target: TargetPolicy,

    /// Include prerelease versions as candidates
    #[arg(long)]
    pub pre: bool,

    /// Include deprecated versions as candidates
    #[arg(long)]
    pub deprecated: bool,

    // Package filters
    /// Only check packages matching these name patterns (glob, can be
    /// repeated or comma separated)
    #[arg(short, long, action = ArgAction::Append)]
    pub filter: Vec<String>,

    /// Exclude packages matching these name patterns
    #[arg(short = 'x', long, action = ArgAction::Append)]
    pub reject: Vec<String>,

    /// Only check packages whose current specifier matches these patterns
    #[arg(long, action = ArgAction::Append)]
    pub filter_version: Vec<String>,

    /// Exclude packages whose current specifier matches these patterns
    #[arg(long, action = ArgAction::Append)]
    pub reject_version: Vec<String>,

    // Write behavior
    /// Write the upgrades to package.json (default is report only)
    #[arg(short, long)]
    pub upgrade: bool,

    /// Verify upgrades by installing and running tests, bisecting out
    /// anything that breaks them (implies --upgrade)
    #[arg(long)]
    pub doctor: bool,

    /// Test command run by the doctor
    #[arg(long, default_value = "npm test")]
    pub test_command: String,

    // Resolution tuning
    /// Maximum concurrent registry requests
    #[arg(long, default_value_t = 8)]
    pub concurrency: usize,

    /// Per-package registry fetch timeout (e.g. 30s, 2m)
    #[arg(long, value_parser = parse_duration, default_value = "30s")]
    pub timeout: Duration,

    /// npm registry base URL
    #[arg(long)]
    pub registry: Option<String>,

    // Cache
    /// Skip the resolution cache entirely
    #[arg(long)]
    pub no_cache: bool,

    /// How long cached registry responses stay fresh (e.g. 10m, 1h)
    #[arg(long, value_parser = parse_duration, default_value = "10m")]
    pub cache_ttl: Duration,

    /// Cache file location (default: no persistence between runs)
    #[arg(long)]
    pub cache_file: Option<PathBuf>,

    // Output options
    /// Output results in JSON format
    #[arg(long)]
    pub json: bool,

    /// Minimal output
    #[arg(short, long)]
    pub quiet: bool,

    /// Show skipped packages and their reasons
    #[arg(long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Whether the manifest will be written (--doctor implies it)
    pub fn writes_manifest(&self) -> bool {
        self.upgrade || self.doctor
    }

    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }

    /// Progress display is reserved for interactive text output
    pub fn progress_enabled(&self) -> bool {
        !self.quiet && !self.json
    }
}
