//! Logging setup and access-log noise filtering.
//!
//! HTTP access records and per-request processing chatter are emitted on
//! dedicated targets so they can be silenced as a group. Unless verbose mode
//! is on, the access target and `tower_http` are turned off entirely and the
//! request target is raised to WARN.

use tracing::{Level, info};
use tracing_subscriber::filter::{Directive, EnvFilter};
use tracing_subscriber::fmt;

use super::config::LoggingConfig;

/// Target of the per-response HTTP access records.
pub const ACCESS_LOG_TARGET: &str = "mavlink_mcp::access";

/// Target of the JSON-RPC request-processing records.
pub const REQUEST_LOG_TARGET: &str = "mavlink_mcp::request";

const QUIET_DIRECTIVES: [&str; 3] = [
    "mavlink_mcp::access=off",
    "tower_http=off",
    "mavlink_mcp::request=warn",
];

/// Suppresses high-frequency framework logs unless verbose mode is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogNoiseFilter {
    verbose: bool,
}

impl LogNoiseFilter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        Self::new(config.verbose)
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Directives added on top of the base filter. Empty in verbose mode.
    pub fn directives(&self) -> Vec<Directive> {
        if self.verbose {
            return Vec::new();
        }

        QUIET_DIRECTIVES
            .iter()
            .filter_map(|raw| raw.parse().ok())
            .collect()
    }

    /// Install the directives on `filter`.
    pub fn apply(&self, filter: EnvFilter) -> EnvFilter {
        self.directives()
            .into_iter()
            .fold(filter, |filter, directive| filter.add_directive(directive))
    }
}

/// Map a configured level name to a tracing level. Unknown names mean INFO.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the process-wide filter: `RUST_LOG`, the configured level, then the
/// noise filter.
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    let base = EnvFilter::from_default_env().add_directive(parse_level(&config.level).into());
    LogNoiseFilter::from_config(config).apply(base)
}

/// Initialize the logging subsystem.
///
/// Configures tracing with the specified log level and format, and installs
/// the noise filter.
pub fn init(config: &LoggingConfig) {
    fmt()
        .with_env_filter(build_filter(config))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();

    if config.verbose {
        info!("Verbose mode: showing all HTTP and framework logs");
    } else {
        info!("HTTP access logs suppressed (set MAVLINK_VERBOSE=1 to re-enable)");
    }
}
