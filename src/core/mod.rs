//! Core module containing shared infrastructure components.
//!
//! This module provides the foundational building blocks for the MCP server,
//! including error handling, configuration, logging, startup sequencing and
//! the HTTP/SSE transport.

pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod startup;
pub mod transport;
pub mod warmup;

pub use config::Config;
pub use error::{Error, Result};
pub use server::McpServer;
pub use startup::{RunningServer, ServerStrategy, Startup, StartupState};
pub use transport::TransportConfig;
pub use warmup::{WarmupConfig, WarmupOutcome};
