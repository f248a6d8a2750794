//! Heartbeat wait tool.
//!
//! Blocks until the vehicle sends a frame on the link or the timeout
//! elapses, and reports which MAVLink version the frame used.

use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::domains::tools::definitions::common::{
    error_result, parse_params, structured_result, tool_model,
};
use crate::domains::tools::{ToolContext, ToolError, ToolHandler};
use crate::domains::vehicle::LifespanError;

const MAX_TIMEOUT_SECS: u64 = 60;

/// Parameters for the heartbeat wait tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WaitHeartbeatParams {
    /// Seconds to wait for a frame (default: 5, max: 60).
    #[schemars(description = "Seconds to wait for a frame (default: 5, max: 60)")]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    5
}

/// Clamp the timeout to the allowed range (1-60).
pub fn validate_timeout(secs: u64) -> u64 {
    secs.clamp(1, MAX_TIMEOUT_SECS)
}

/// Heartbeat wait tool - waits for the next frame from the vehicle.
pub struct WaitHeartbeatTool;

impl WaitHeartbeatTool {
    /// Tool name as registered in MCP.
    pub const NAME: &'static str = "wait_heartbeat";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str = "Wait for the next frame from the vehicle on the MAVLink link (typically a HEARTBEAT) and report the sender, frame size and protocol version.";
}

#[async_trait]
impl ToolHandler for WaitHeartbeatTool {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn tool(&self) -> Tool {
        tool_model::<WaitHeartbeatParams>(Self::NAME, Self::DESCRIPTION)
    }

    #[instrument(skip_all)]
    async fn call(
        &self,
        arguments: serde_json::Value,
        context: &ToolContext,
    ) -> Result<CallToolResult, ToolError> {
        let params: WaitHeartbeatParams = parse_params(arguments)?;
        let timeout = Duration::from_secs(validate_timeout(params.timeout_secs));
        let link = context.vehicle().await?;

        info!("Waiting up to {:?} for a vehicle frame", timeout);

        match link.recv_datagram(timeout).await {
            Ok(datagram) => {
                let summary = format!(
                    "Received {} bytes from {} (MAVLink {:?})",
                    datagram.len, datagram.from, datagram.version
                );
                Ok(structured_result(summary, &datagram))
            }
            Err(LifespanError::Timeout(waited)) => Ok(error_result(&format!(
                "No frame received from the vehicle within {}s",
                waited.as_secs()
            ))),
            Err(e) => Ok(error_result(&format!("Vehicle link error: {}", e))),
        }
    }
}
