//! Link status tool.
//!
//! Reports the state of the vehicle link, opening it if needed.

use async_trait::async_trait;
use chrono::Utc;
use rmcp::model::{CallToolResult, Tool};
use serde::Serialize;
use tracing::{info, instrument};

use crate::domains::tools::definitions::common::{
    EmptyParams, error_result, parse_params, structured_result, tool_model,
};
use crate::domains::tools::{ToolContext, ToolError, ToolHandler};

/// Structured output of the link status tool.
#[derive(Debug, Clone, Serialize)]
pub struct LinkStatus {
    pub address: String,
    pub local_addr: String,
    pub connected_at: String,
    pub uptime_secs: i64,
}

/// Link status tool - describes the open MAVLink link.
pub struct LinkStatusTool;

impl LinkStatusTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "link_status";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Report the state of the MAVLink link to the vehicle: configured address, bound socket, and how long it has been open. Opens the link if it is not open yet.";
}

#[async_trait]
impl ToolHandler for LinkStatusTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tool(&self) -> Tool {
        tool_model::<EmptyParams>(Self::NAME, Self::DESCRIPTION)
    }

    #[instrument(skip_all)]
    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<CallToolResult, ToolError> {
        let _params: EmptyParams = parse_params(arguments)?;
        let link = context.vehicle().await?;

        let local_addr = match link.local_addr() {
            Ok(addr) => addr,
            Err(e) => return Ok(error_result(&format!("Vehicle link socket error: {}", e))),
        };

        let connected_at = link.connected_at();
        let status = LinkStatus {
            address: link.address().to_string(),
            local_addr: local_addr.to_string(),
            connected_at: connected_at.to_rfc3339(),
            uptime_secs: (Utc::now() - connected_at).num_seconds(),
        };

        info!("Link status requested: {} on {}", status.address, status.local_addr);

        let summary = format!(
            "Vehicle link {} bound on {} (open for {}s)",
            status.address, status.local_addr, status.uptime_secs
        );
        Ok(structured_result(summary, &status))
    }
}
