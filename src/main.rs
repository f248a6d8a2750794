//! MAVLink MCP Server Entry Point
//!
//! Loads configuration, initializes logging, builds the tool registry and
//! runs the HTTP/SSE server until Ctrl+C.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mavlink_mcp_server::core::{Config, McpServer, Startup, logging};
use mavlink_mcp_server::domains::tools::build_registry;
use mavlink_mcp_server::domains::vehicle::{Lifespan, VehicleLifespan};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Config::from_env()?;

    // Initialize logging
    logging::init(&config.logging);

    info!("Starting {} v{}", config.server.name, config.server.version);
    info!("Vehicle link address: {}", config.vehicle.address);

    let lifespan = Arc::new(VehicleLifespan::new(config.vehicle.clone()));
    let base = McpServer::new(
        config.server.name.clone(),
        build_registry(),
        Arc::clone(&lifespan) as Arc<dyn Lifespan>,
    );

    info!("Server initialized ({} strategy)", config.startup.strategy);

    let shutdown = CancellationToken::new();
    let mut startup = Startup::new(config);
    let server = startup.bind_tools(base)?;
    let running = startup.launch(server, shutdown.clone()).await?;

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                signal.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    running.wait().await?;
    lifespan.release().await;

    info!("Server shutting down");

    Ok(())
}
