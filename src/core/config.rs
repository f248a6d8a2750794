//! Configuration management for the MCP server.
//!
//! All settings come from environment variables (optionally seeded from a
//! `.env` file). Invalid values abort startup with [`Error::Config`] before
//! anything is bound or spawned.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::startup::ServerStrategy;
use super::transport::TransportConfig;
use super::warmup::WarmupConfig;
use super::{Error, Result};
use crate::domains::vehicle::VehicleConfig;

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// How the running server instance is obtained.
    pub startup: StartupConfig,

    /// Deferred initialization probe.
    pub warmup: WarmupConfig,

    /// Vehicle link.
    pub vehicle: VehicleConfig,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,

    /// Public base URL (e.g. an ngrok tunnel) shown in the startup banner.
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "MAVLink MCP".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            public_url: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,

    /// Show HTTP access logs and per-request framework logs.
    pub verbose: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            verbose: false,
        }
    }
}

/// Startup sequencing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartupConfig {
    pub strategy: ServerStrategy,
}

fn parse_secs(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::config(format!("{key} must be a whole number of seconds, got '{raw}'")))
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.transport = TransportConfig::from_vars(&lookup)?;

        if let Some(name) = lookup("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Some(url) = lookup("MCP_PUBLIC_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.server.public_url = Some(url.to_string());
            }
        }

        if let Some(level) = lookup("MCP_LOG_LEVEL") {
            config.logging.level = level;
        }

        if let Some(verbose) = lookup("MAVLINK_VERBOSE") {
            config.logging.verbose = verbose.trim() == "1";
        }

        if let Some(strategy) = lookup("MCP_SERVER_STRATEGY") {
            config.startup.strategy = strategy.parse()?;
        }

        if let Some(enabled) = lookup("MCP_WARMUP_ENABLED") {
            config.warmup.enabled = enabled.to_lowercase() != "false" && enabled != "0";
        }

        if let Some(delay) = lookup("MCP_WARMUP_DELAY_SECS") {
            config.warmup.delay = parse_secs("MCP_WARMUP_DELAY_SECS", &delay)?;
        }

        if let Some(timeout) = lookup("MCP_WARMUP_TIMEOUT_SECS") {
            config.warmup.timeout = parse_secs("MCP_WARMUP_TIMEOUT_SECS", &timeout)?;
        }

        if let Some(address) = lookup("MAVLINK_ADDRESS") {
            config.vehicle.address = address;
        }

        Ok(config)
    }
}
