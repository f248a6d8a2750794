//! Transport layer for the MCP server.
//!
//! The server speaks the MCP HTTP+SSE transport:
//! - **config**: host, port and endpoint layout, read from the environment
//! - **rpc**: JSON-RPC message types and method dispatch
//! - **http**: axum router, SSE sessions and the serve loop
//!
//! Each connection delegates message processing to the [`McpServer`](crate::core::McpServer).

mod config;
mod error;

pub mod http;
pub mod rpc;

pub use config::{EndpointMode, TransportConfig, normalize_mount_path, parse_port};
pub use error::{TransportError, TransportResult};
pub use http::HttpTransport;
