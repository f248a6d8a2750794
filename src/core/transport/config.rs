//! Transport configuration types.
//!
//! Host, port and mount path are resolved once from the environment at
//! startup and then applied to the server that will run, either through
//! [`McpServer::reconfigure`](crate::core::McpServer::reconfigure) or at
//! construction time.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

pub const PORT_VAR: &str = "MCP_PORT";
pub const HOST_VAR: &str = "MCP_HOST";
pub const MOUNT_PATH_VAR: &str = "MCP_MOUNT_PATH";
pub const ENDPOINT_MODE_VAR: &str = "MCP_ENDPOINT_MODE";
pub const CORS_VAR: &str = "MCP_HTTP_CORS";

/// Where the SSE and message endpoints are served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointMode {
    /// `/sse` and `/messages`, regardless of the mount path.
    #[default]
    Root,
    /// `<mount>/sse` and `<mount>/messages`.
    Mounted,
}

impl FromStr for EndpointMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "root" => Ok(Self::Root),
            "mounted" => Ok(Self::Mounted),
            other => Err(Error::config(format!(
                "{ENDPOINT_MODE_VAR} must be 'root' or 'mounted', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for EndpointMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Mounted => f.write_str("mounted"),
        }
    }
}

/// HTTP/SSE transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port number to listen on.
    pub port: u16,

    /// Base path for the JSON-RPC endpoint (and SSE endpoints when mounted).
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// SSE endpoint placement.
    #[serde(default)]
    pub endpoint_mode: EndpointMode,

    /// Enable CORS for browser clients.
    #[serde(default = "default_cors")]
    pub enable_cors: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_mount_path() -> String {
    "/mcp".to_string()
}

fn default_cors() -> bool {
    true
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 8080,
            mount_path: default_mount_path(),
            endpoint_mode: EndpointMode::default(),
            enable_cors: default_cors(),
        }
    }
}

/// Parse a listener port. Non-numeric, zero and out-of-range values are
/// configuration errors.
pub fn parse_port(raw: &str) -> Result<u16> {
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::config(format!(
            "{PORT_VAR} must be an integer between 1 and 65535, got '{raw}'"
        ))),
    }
}

/// Validate and normalize a mount path: must start with `/`, trailing
/// slashes are dropped except for the root path.
pub fn normalize_mount_path(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') {
        return Err(Error::config(format!(
            "{MOUNT_PATH_VAR} must start with '/', got '{raw}'"
        )));
    }
    check_literal_path(trimmed)?;

    let normalized = trimmed.trim_end_matches('/');
    if normalized.is_empty() {
        Ok("/".to_string())
    } else {
        Ok(normalized.to_string())
    }
}

// Router path syntax (`:param`, `*rest`, `{capture}`) is not allowed in a
// mount path; every segment must match literally.
fn check_literal_path(path: &str) -> Result<()> {
    let dynamic = path.split('/').find(|segment| {
        segment.starts_with(':') || segment.starts_with('*') || segment.contains(['{', '}'])
    });

    match dynamic {
        Some(segment) => Err(Error::config(format!(
            "{MOUNT_PATH_VAR} segments must be literal, got '{segment}' in '{path}'"
        ))),
        None => Ok(()),
    }
}

fn join_path(base: &str, segment: &str) -> String {
    if base == "/" {
        format!("/{segment}")
    } else {
        format!("{base}/{segment}")
    }
}

impl TransportConfig {
    /// Create a config bound to the given host and port with default paths.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Resolve the transport settings through `lookup`.
    ///
    /// Missing variables fall back to defaults; present but invalid values
    /// are errors.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup(PORT_VAR) {
            config.port = parse_port(&port)?;
        }

        if let Some(host) = lookup(HOST_VAR) {
            let host = host.trim();
            if host.is_empty() {
                return Err(Error::config(format!("{HOST_VAR} must not be empty")));
            }
            config.host = host.to_string();
        }

        if let Some(mount_path) = lookup(MOUNT_PATH_VAR) {
            config.mount_path = normalize_mount_path(&mount_path)?;
        }

        if let Some(mode) = lookup(ENDPOINT_MODE_VAR) {
            config.endpoint_mode = mode.parse()?;
        }

        if let Some(cors) = lookup(CORS_VAR) {
            config.enable_cors = cors.to_lowercase() != "false" && cors != "0";
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the endpoint layout can be routed.
    ///
    /// The mount path must be literal, and the JSON-RPC endpoint must not
    /// sit on the SSE or messages path.
    pub fn validate(&self) -> Result<()> {
        if !self.mount_path.starts_with('/') {
            return Err(Error::config(format!(
                "{MOUNT_PATH_VAR} must start with '/', got '{}'",
                self.mount_path
            )));
        }
        check_literal_path(&self.mount_path)?;

        let rpc = self.rpc_path();
        if rpc == self.sse_path() || rpc == self.messages_path() {
            return Err(Error::config(format!(
                "{MOUNT_PATH_VAR} '{rpc}' collides with the SSE endpoints in {} mode",
                self.endpoint_mode
            )));
        }

        Ok(())
    }

    /// Get the bind address.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Path of the stateless JSON-RPC endpoint.
    pub fn rpc_path(&self) -> &str {
        &self.mount_path
    }

    /// Path of the SSE session endpoint.
    pub fn sse_path(&self) -> String {
        match self.endpoint_mode {
            EndpointMode::Root => "/sse".to_string(),
            EndpointMode::Mounted => join_path(&self.mount_path, "sse"),
        }
    }

    /// Path clients POST session messages to.
    pub fn messages_path(&self) -> String {
        match self.endpoint_mode {
            EndpointMode::Root => "/messages".to_string(),
            EndpointMode::Mounted => join_path(&self.mount_path, "messages"),
        }
    }

    /// Host to use when connecting to this server from the same machine.
    ///
    /// Wildcard bind addresses are reached through loopback.
    pub fn local_host(&self) -> &str {
        match self.host.as_str() {
            "" | "0.0.0.0" | "::" | "[::]" => "127.0.0.1",
            host => host,
        }
    }

    /// Get a description of this transport for logging.
    pub fn description(&self) -> String {
        format!(
            "HTTP/SSE on {} (sse {}, rpc {})",
            self.bind_address(),
            self.sse_path(),
            self.rpc_path()
        )
    }
}
