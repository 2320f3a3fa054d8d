//! CLI argument definitions for the tailpost binary.
//!
//! Uses `clap` v4 derive macros. A configuration file (`-c`) overrides all
//! other per-file flags; without one, the flags plus the positional log file
//! path build a single-file configuration.

use clap::Parser;

/// Active profile: metrics (default)
pub const PROFILE_METRICS: &str = "metrics";
/// Active profile: live console counters
pub const PROFILE_COUNT: &str = "count";
/// Active profile: security-oriented output
pub const PROFILE_SECURITY: &str = "security";

/// Web server access log processor.
///
/// Tails access logs (Apache, Nginx and variants), parses each line,
/// classifies user agents, aggregates per-time-window metrics and
/// optionally persists results to a MySQL database.
#[derive(Parser, Debug)]
#[command(name = "tailpost")]
#[command(version, about)]
#[command(
    after_help = "Usage examples:\n  tailpost -f -p count /var/log/apache2/access.log\n  tailpost -c tailpost-config.json\n\nPassing a configuration file with -c is the recommended way to provide\noptions; command line flags should suffice for the count profile but not\nevery configuration option has a flag."
)]
pub struct Cli {
    /// Log level. Supported values: debug, info, warn.
    #[arg(short = 'l', default_value = "info")]
    pub log_level: String,

    /// Active profile: metrics, count or security. The metrics profile
    /// generates per-time-window metrics; count prints running totals from
    /// the file; security focuses on malicious traffic.
    #[arg(short = 'p', default_value = PROFILE_METRICS)]
    pub profile: String,

    /// Configuration file in JSON format. Overrides all other per-file flags.
    #[arg(short = 'c')]
    pub config: Option<String>,

    /// Follow changes to the file, as in tail -f.
    #[arg(short = 'f')]
    pub follow: bool,

    /// Statistics window size in minutes (1, 5, 10, 15, 30 or 60).
    #[arg(short = 'w', default_value_t = 1)]
    pub window_minutes: u32,

    /// Start position: 0 = beginning, -1 = end (only lines appended after
    /// start), N > 0 = skip the first N lines.
    #[arg(short = 's', default_value_t = 0, allow_hyphen_values = true)]
    pub start_from: i64,

    /// Domain name to report, needed when domain names are not in the logs.
    #[arg(short = 'd', default_value = "")]
    pub domain: String,

    /// Enabled handler name. Only one handler can be passed on the command
    /// line; use a configuration file for multiple handlers.
    #[arg(short = 'a', default_value = "")]
    pub handler: String,

    /// Target file path, required when the handler is WRITE_TO_FILE.
    #[arg(short = 't', default_value = "")]
    pub write_target: String,

    /// Count profile only: number of top items (IPs, referers, paths) shown.
    #[arg(short = 'n', default_value_t = 10)]
    pub counter_top_n: usize,

    /// Count profile only: seconds between successive count outputs.
    #[arg(short = 'i', default_value_t = 30)]
    pub counter_interval_seconds: u64,

    /// Access log file to process (ignored when -c is given).
    pub file_path: Option<String>,
}

impl Cli {
    /// Validate the profile flag. Returns an error message for exit-1 paths.
    pub fn validate_profile(&self) -> Result<(), String> {
        match self.profile.as_str() {
            PROFILE_METRICS | PROFILE_COUNT | PROFILE_SECURITY => Ok(()),
            other => Err(format!(
                "Invalid profile value (invalid -p parameter): '{other}'. Use -h to view command line options."
            )),
        }
    }
}
