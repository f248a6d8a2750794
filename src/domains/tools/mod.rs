//! Tools domain module.
//!
//! This module handles all tool-related functionality for the MCP server.
//! Tools are executable functions that can be called by MCP clients to perform
//! specific actions on the vehicle.
//!
//! ## Architecture
//!
//! - `definitions/` - Individual tool implementations (one file per tool)
//! - `handlers.rs` - The `ToolHandler` contract and per-call context
//! - `registry.rs` - Name to handler registry and snapshot migration
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `definitions/` implementing `ToolHandler`
//! 2. Export it in `definitions/mod.rs`
//! 3. Add it to `definitions::all()`

pub mod definitions;
mod error;
mod handlers;
mod registry;

use tracing::{info, warn};

pub use error::ToolError;
pub use handlers::{ToolContext, ToolHandler};
pub use registry::ToolRegistry;

/// Build the registry holding every shipped tool.
///
/// Called once at process start; the result is moved into the base server.
pub fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    for handler in definitions::all() {
        if let Err(e) = registry.register_arc(handler) {
            warn!("Skipping tool: {}", e);
        }
    }

    info!("Registered {} tools: {}", registry.len(), registry.names().join(", "));
    registry
}
