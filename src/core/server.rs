//! MCP Server implementation.
//!
//! `McpServer` owns the tool registry, the effective transport settings and
//! a handle to the vehicle lifespan. The transport layer holds it behind an
//! `Arc` while serving; before that it may be reconfigured in place.

use std::sync::Arc;

use rmcp::model::{CallToolResult, Tool};
use tracing::{debug, info, instrument};

use super::transport::TransportConfig;
use crate::domains::tools::{ToolContext, ToolError, ToolRegistry};
use crate::domains::vehicle::{Lifespan, LifespanError};

/// Instructions returned to clients on `initialize`.
pub const INSTRUCTIONS: &str = "This server exposes MAVLink vehicle tools. \
    Call link_status to check the link to the drone and wait_heartbeat to confirm the vehicle is transmitting.";

/// The main MCP server.
pub struct McpServer {
    name: String,
    version: String,
    registry: ToolRegistry,
    transport: TransportConfig,
    lifespan: Arc<dyn Lifespan>,
}

impl McpServer {
    /// Create a server with the default transport settings.
    pub fn new(name: impl Into<String>, registry: ToolRegistry, lifespan: Arc<dyn Lifespan>) -> Self {
        Self::with_transport(name, registry, lifespan, TransportConfig::default())
    }

    /// Create a server bound to the given transport settings.
    pub fn with_transport(
        name: impl Into<String>,
        registry: ToolRegistry,
        lifespan: Arc<dyn Lifespan>,
        transport: TransportConfig,
    ) -> Self {
        let mut server = Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            registry,
            transport: TransportConfig::default(),
            lifespan,
        };
        server.apply_transport(transport);
        server
    }

    /// Replace the transport settings of an existing server.
    ///
    /// Only meaningful before the server is handed to the transport; the
    /// listener binds whatever settings are current at that point. Tools
    /// stay registered.
    pub fn reconfigure(&mut self, transport: TransportConfig) {
        info!("Reconfiguring transport: {}", transport.description());
        self.apply_transport(transport);
    }

    // Shared by construction and reconfiguration so both end up identical.
    fn apply_transport(&mut self, transport: TransportConfig) {
        debug!(
            host = %transport.host,
            port = transport.port,
            mount_path = %transport.mount_path,
            "Applying transport settings"
        );
        self.transport = transport;
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The effective transport settings.
    pub fn transport(&self) -> &TransportConfig {
        &self.transport
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ToolRegistry {
        &mut self.registry
    }

    pub fn lifespan(&self) -> &Arc<dyn Lifespan> {
        &self.lifespan
    }

    /// Open the backend resource if it is not open yet.
    pub async fn ensure_backend(&self) -> Result<(), LifespanError> {
        self.lifespan.acquire().await.map(|_| ())
    }

    /// List all available tools.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.registry.tools()
    }

    /// Call a tool by name.
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallToolResult, ToolError> {
        let handler = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::not_found(name))?;

        let context = ToolContext::new(Arc::clone(&self.lifespan));
        handler.call(arguments, &context).await
    }
}
