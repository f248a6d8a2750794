//! MAVLink MCP Server Library
//!
//! This crate serves MAVLink vehicle tools to remote MCP clients over the
//! HTTP+SSE transport.
//!
//! # Architecture
//!
//! The server is organized into the following modules:
//!
//! - **core**: Configuration, logging, the server, startup sequencing, the
//!   warm-up probe and the HTTP/SSE transport
//! - **domains**: Business logic organized by bounded contexts
//!   - **tools**: MCP tools that can be executed by clients
//!   - **vehicle**: The vehicle link and its acquire/release lifecycle
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use mavlink_mcp_server::core::{Config, McpServer, Startup};
//! use mavlink_mcp_server::domains::{tools::build_registry, vehicle::VehicleLifespan};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let lifespan = Arc::new(VehicleLifespan::new(config.vehicle.clone()));
//!     let base = McpServer::new(config.server.name.clone(), build_registry(), lifespan);
//!
//!     let mut startup = Startup::new(config);
//!     let server = startup.bind_tools(base)?;
//!     let running = startup.launch(server, CancellationToken::new()).await?;
//!     running.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
