//! Tool definitions module.
//!
//! This module exports all available tool definitions.
//! Each tool is defined in its own file for better maintainability.

pub mod common;
pub mod vehicle;

use std::sync::Arc;

use super::ToolHandler;

pub use vehicle::{LinkStatusTool, WaitHeartbeatParams, WaitHeartbeatTool};

/// Every tool shipped with the server.
pub fn all() -> Vec<Arc<dyn ToolHandler>> {
    vec![Arc::new(LinkStatusTool), Arc::new(WaitHeartbeatTool)]
}
