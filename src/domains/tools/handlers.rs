//! Tool handler contract.
//!
//! Every tool registered with the server implements [`ToolHandler`]. The
//! transport dispatches `tools/call` to the handler by name and passes a
//! [`ToolContext`] through which the handler reaches the vehicle link.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};

use super::ToolError;
use crate::domains::vehicle::{Lifespan, VehicleLink};

/// Per-call context handed to tool handlers.
#[derive(Clone)]
pub struct ToolContext {
    lifespan: Arc<dyn Lifespan>,
}

impl ToolContext {
    pub fn new(lifespan: Arc<dyn Lifespan>) -> Self {
        Self { lifespan }
    }

    /// The vehicle link, opened on first use.
    pub async fn vehicle(&self) -> Result<Arc<VehicleLink>, ToolError> {
        Ok(self.lifespan.acquire().await?)
    }
}

/// A named, invocable capability exposed to remote clients.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// Tool metadata advertised through `tools/list`.
    fn tool(&self) -> Tool;

    /// Execute the tool with the given JSON arguments.
    ///
    /// Domain failures are reported as `CallToolResult` with `is_error` set;
    /// `Err` is reserved for bad arguments and unavailable backends.
    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<CallToolResult, ToolError>;
}
