//! Startup sequencing.
//!
//! Startup moves through `Configuring → ToolsBound → ListenerScheduled →
//! Serving`. The warm-up probe is spawned on the way to `Serving` and
//! resolves on its own; nothing waits for it.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::transport::{HttpTransport, TransportError, TransportResult};
use super::warmup::{HttpProber, Prober, WarmupHandle, WarmupProbe, probe_url};
use super::{Config, Error, McpServer, Result};
use crate::domains::tools::ToolRegistry;

pub const STRATEGY_VAR: &str = "MCP_SERVER_STRATEGY";

/// How the server instance that ends up serving is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStrategy {
    /// Reconfigure the base server in place.
    #[default]
    Reuse,
    /// Build a new server with the transport settings and copy the tools over.
    Fresh,
}

impl FromStr for ServerStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "fresh" => Ok(Self::Fresh),
            other => Err(Error::config(format!(
                "{STRATEGY_VAR} must be 'reuse' or 'fresh', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for ServerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reuse => f.write_str("reuse"),
            Self::Fresh => f.write_str("fresh"),
        }
    }
}

/// Steps of the startup sequence.
///
/// The warm-up probe is not a step: it runs beside `Serving` and resolves on
/// its own. While it is in flight the server is in `Serving` with the
/// warm-up pending, which [`RunningServer::warmup_finished`] reports as
/// `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    Configuring,
    ToolsBound,
    ListenerScheduled,
    Serving,
}

/// Drives the server from configuration to a running listener.
pub struct Startup {
    config: Config,
    state: StartupState,
    history: Vec<StartupState>,
}

impl Startup {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: StartupState::Configuring,
            history: vec![StartupState::Configuring],
        }
    }

    pub fn state(&self) -> StartupState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[StartupState] {
        &self.history
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn require(&self, state: StartupState) -> Result<()> {
        if self.state != state {
            return Err(Error::internal(format!(
                "startup step requires state {:?}, current state is {:?}",
                state, self.state
            )));
        }
        Ok(())
    }

    fn enter(&mut self, state: StartupState) {
        debug!("Startup: {:?} -> {:?}", self.state, state);
        self.state = state;
        self.history.push(state);
    }

    /// Apply the transport settings and settle the tool registry.
    ///
    /// With [`ServerStrategy::Reuse`] the base server is reconfigured in
    /// place. With [`ServerStrategy::Fresh`] a new server is built with the
    /// settings and the base registry is migrated into it.
    pub fn bind_tools(&mut self, base: McpServer) -> Result<McpServer> {
        self.require(StartupState::Configuring)?;

        let transport = self.config.transport.clone();
        let server = match self.config.startup.strategy {
            ServerStrategy::Reuse => {
                let mut server = base;
                server.reconfigure(transport);
                server
            }
            ServerStrategy::Fresh => {
                let mut fresh = McpServer::with_transport(
                    base.name(),
                    ToolRegistry::new(),
                    Arc::clone(base.lifespan()),
                    transport,
                );
                let copied = base.registry().migrate_into(fresh.registry_mut());
                info!("Migrated {} tools into a fresh server instance", copied);
                fresh
            }
        };

        self.enter(StartupState::ToolsBound);
        Ok(server)
    }

    /// Bind the listener, schedule the warm-up probe and start serving.
    ///
    /// An unroutable endpoint layout is rejected before anything binds. A
    /// bind failure is returned as is and nothing is spawned.
    pub async fn launch(
        &mut self,
        server: McpServer,
        shutdown: CancellationToken,
    ) -> Result<RunningServer> {
        let prober = HttpProber::new().map_err(|e| Error::internal(e.to_string()))?;
        self.launch_with_prober(server, shutdown, Arc::new(prober))
            .await
    }

    /// [`launch`](Self::launch) with a caller-supplied probe client.
    pub async fn launch_with_prober(
        &mut self,
        server: McpServer,
        shutdown: CancellationToken,
        prober: Arc<dyn Prober>,
    ) -> Result<RunningServer> {
        self.require(StartupState::ToolsBound)?;
        server.transport().validate()?;

        let server = Arc::new(server);
        let transport = HttpTransport::bind(Arc::clone(&server), shutdown.clone()).await?;
        let local_addr = transport.local_addr();
        self.enter(StartupState::ListenerScheduled);

        log_banner(&self.config, &server, local_addr);

        let url = probe_url(server.transport(), local_addr.port());
        let warmup = WarmupProbe::new(url, self.config.warmup.clone(), prober)
            .spawn(shutdown.child_token());

        let serve = tokio::spawn(transport.serve(shutdown.clone()));
        self.enter(StartupState::Serving);

        Ok(RunningServer {
            local_addr,
            server,
            shutdown,
            serve,
            warmup: Some(warmup),
        })
    }
}

fn log_banner(config: &Config, server: &McpServer, local_addr: SocketAddr) {
    let transport = server.transport();

    info!("{} v{} listening on {}", server.name(), server.version(), local_addr);
    info!("SSE endpoint: {}", probe_url(transport, local_addr.port()));
    info!("JSON-RPC endpoint: POST {}", transport.rpc_path());
    info!("Endpoint mode: {}", transport.endpoint_mode);

    match &config.server.public_url {
        Some(url) => info!("Public SSE endpoint: {}{}", url, transport.sse_path()),
        None => {
            info!("To expose this server publicly, run: ngrok http {}", local_addr.port());
            info!("Then set MCP_PUBLIC_URL to the forwarding URL");
        }
    }
}

/// A server that has reached [`StartupState::Serving`].
pub struct RunningServer {
    local_addr: SocketAddr,
    server: Arc<McpServer>,
    shutdown: CancellationToken,
    serve: JoinHandle<TransportResult<()>>,
    warmup: Option<WarmupHandle>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn server(&self) -> &Arc<McpServer> {
        &self.server
    }

    /// Whether the warm-up task has ended (or was already collected).
    pub fn warmup_finished(&self) -> bool {
        self.warmup.as_ref().is_none_or(WarmupHandle::is_finished)
    }

    /// Take ownership of the warm-up task.
    pub fn take_warmup(&mut self) -> Option<WarmupHandle> {
        self.warmup.take()
    }

    /// Block until the serve loop exits, then stop the warm-up if still running.
    pub async fn wait(self) -> Result<()> {
        let Self { serve, warmup, .. } = self;

        let result = match serve.await {
            Ok(result) => result.map_err(Error::from),
            Err(e) => Err(TransportError::TaskError(e.to_string()).into()),
        };

        if let Some(warmup) = warmup {
            let outcome = warmup.shutdown().await;
            debug!("Warm-up outcome at shutdown: {:?}", outcome);
        }

        if let Err(e) = &result {
            warn!("Serve loop ended with error: {}", e);
        }
        result
    }

    /// Trigger graceful shutdown and wait for it to complete.
    pub async fn shutdown(self) -> Result<()> {
        self.shutdown.cancel();
        self.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transport::TransportConfig;
    use crate::core::warmup::{ProbeError, WarmupOutcome};
    use crate::domains::tools::build_registry;
    use crate::domains::vehicle::{Lifespan, VehicleLifespan};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_test::assert_ok;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<&str, &str> = pairs.iter().copied().collect();
        Config::from_vars(|key| vars.get(key).map(|v| v.to_string())).unwrap()
    }

    fn local_config(pairs: &[(&str, &str)]) -> Config {
        let mut config = config(pairs);
        config.transport = TransportConfig::new("127.0.0.1", 0);
        config.vehicle.address = "udpin://127.0.0.1:0".to_string();
        config
    }

    fn base_server(config: &Config) -> (McpServer, Arc<VehicleLifespan>) {
        let lifespan = Arc::new(VehicleLifespan::new(config.vehicle.clone()));
        let server = McpServer::new(
            config.server.name.clone(),
            build_registry(),
            Arc::clone(&lifespan) as Arc<dyn Lifespan>,
        );
        (server, lifespan)
    }

    #[derive(Clone, Copy, Debug)]
    enum Reply {
        Status(u16),
        Refused,
        Hang,
    }

    struct ScriptedProber(Reply);

    #[async_trait]
    impl Prober for ScriptedProber {
        async fn probe(&self, _url: &str, _timeout: Duration) -> std::result::Result<u16, ProbeError> {
            match self.0 {
                Reply::Status(status) => Ok(status),
                Reply::Refused => Err(ProbeError::Request("connection refused".to_string())),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    const REPLIES: [Reply; 3] = [Reply::Status(200), Reply::Refused, Reply::Hang];

    async fn launch_scripted(pairs: &[(&str, &str)], reply: Reply) -> (Startup, RunningServer) {
        let config = local_config(pairs);
        let (base, _) = base_server(&config);
        let mut startup = Startup::new(config);

        let server = startup.bind_tools(base).unwrap();
        let running = startup
            .launch_with_prober(server, CancellationToken::new(), Arc::new(ScriptedProber(reply)))
            .await
            .unwrap();
        (startup, running)
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("Fresh".parse::<ServerStrategy>().unwrap(), ServerStrategy::Fresh);
        assert_eq!(" reuse ".parse::<ServerStrategy>().unwrap(), ServerStrategy::Reuse);
        let err = "both".parse::<ServerStrategy>().unwrap_err();
        assert!(err.to_string().contains(STRATEGY_VAR));
        assert_eq!(ServerStrategy::default().to_string(), "reuse");
    }

    #[test]
    fn test_env_settings_reach_server_for_both_strategies() {
        let vars = [
            ("MCP_PORT", "9100"),
            ("MCP_HOST", "127.0.0.1"),
            ("MCP_MOUNT_PATH", "/drone/"),
        ];

        let mut served = Vec::new();
        for strategy in ["reuse", "fresh"] {
            let mut pairs = vars.to_vec();
            pairs.push(("MCP_SERVER_STRATEGY", strategy));
            let config = config(&pairs);
            let (base, _) = base_server(&config);

            let mut startup = Startup::new(config);
            let server = startup.bind_tools(base).unwrap();

            assert_eq!(startup.state(), StartupState::ToolsBound);
            assert_eq!(server.transport().port, 9100);
            assert_eq!(server.transport().host, "127.0.0.1");
            assert_eq!(server.transport().mount_path, "/drone");
            assert_eq!(server.registry().names(), vec!["link_status", "wait_heartbeat"]);
            served.push(server.transport().clone());
        }

        assert_eq!(served[0], served[1]);
    }

    #[tokio::test]
    async fn test_out_of_order_transitions_rejected() {
        let config = local_config(&[]);
        let mut startup = Startup::new(config.clone());

        let (early, _) = base_server(&config);
        let err = startup
            .launch(early, CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Internal(_)));
        assert_eq!(startup.state(), StartupState::Configuring);

        let (base, _) = base_server(&config);
        assert_ok!(startup.bind_tools(base));

        let (again, _) = base_server(&config);
        assert!(matches!(startup.bind_tools(again), Err(Error::Internal(_))));
        assert_eq!(startup.history().len(), 2);
    }

    #[tokio::test]
    async fn test_serving_does_not_wait_for_warmup() {
        for reply in REPLIES {
            let (startup, running) =
                launch_scripted(&[("MCP_WARMUP_DELAY_SECS", "3")], reply).await;

            assert_eq!(startup.state(), StartupState::Serving, "{reply:?}");
            assert_eq!(
                startup.history(),
                &[
                    StartupState::Configuring,
                    StartupState::ToolsBound,
                    StartupState::ListenerScheduled,
                    StartupState::Serving,
                ]
            );
            assert!(!running.warmup_finished(), "{reply:?}");
            assert!(!running.server().lifespan().is_ready());

            assert_ok!(running.shutdown().await);
        }
    }

    #[tokio::test]
    async fn test_warmup_outcome_does_not_affect_serving() {
        let pairs = [
            ("MCP_WARMUP_DELAY_SECS", "0"),
            ("MCP_WARMUP_TIMEOUT_SECS", "1"),
        ];

        for reply in REPLIES {
            let (_, mut running) = launch_scripted(&pairs, reply).await;

            let outcome = running.take_warmup().unwrap().join().await;
            match reply {
                Reply::Status(status) => assert_eq!(outcome, WarmupOutcome::Succeeded { status }),
                Reply::Refused | Reply::Hang => {
                    assert!(matches!(outcome, WarmupOutcome::Failed { .. }), "{reply:?}")
                }
            }

            let health = reqwest::get(format!("http://{}/health", running.local_addr()))
                .await
                .unwrap();
            assert_eq!(health.status().as_u16(), 200, "{reply:?}");

            assert_ok!(running.shutdown().await);
        }
    }

    #[tokio::test]
    async fn test_unroutable_mount_path_fails_before_bind() {
        let mut config = local_config(&[]);
        config.transport.mount_path = "/messages".to_string();
        let (base, _) = base_server(&config);
        let mut startup = Startup::new(config);

        let server = startup.bind_tools(base).unwrap();
        let err = startup
            .launch(server, CancellationToken::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(startup.state(), StartupState::ToolsBound);
    }

    #[test]
    fn test_route_syntax_in_mount_path_fails_config() {
        for raw in ["/:mcp", "/messages"] {
            let result = Config::from_vars(|key| {
                (key == "MCP_MOUNT_PATH").then(|| raw.to_string())
            });
            assert!(matches!(result, Err(Error::Config(_))), "{raw}");
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_fatal() {
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let mut config = local_config(&[]);
        config.transport = TransportConfig::new("127.0.0.1", port);
        let (base, _) = base_server(&config);
        let mut startup = Startup::new(config);

        let server = startup.bind_tools(base).unwrap();
        let err = startup
            .launch(server, CancellationToken::new())
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err,
            Error::Transport(TransportError::BindError { .. })
        ));
        assert_eq!(startup.state(), StartupState::ToolsBound);
    }

    #[tokio::test]
    async fn test_warmup_opens_vehicle_link() {
        let config = local_config(&[("MCP_WARMUP_DELAY_SECS", "0")]);
        let (base, lifespan) = base_server(&config);
        let mut startup = Startup::new(config);

        let server = startup.bind_tools(base).unwrap();
        let mut running = startup
            .launch(server, CancellationToken::new())
            .await
            .unwrap();

        let outcome = running.take_warmup().unwrap().join().await;
        assert_eq!(outcome, WarmupOutcome::Succeeded { status: 200 });
        assert!(lifespan.is_ready());
        assert_eq!(lifespan.connect_count(), 1);

        assert_ok!(running.shutdown().await);
    }

    #[tokio::test]
    async fn test_fresh_server_answers_tool_calls() {
        let config = local_config(&[
            ("MCP_SERVER_STRATEGY", "fresh"),
            ("MCP_WARMUP_ENABLED", "0"),
        ]);
        let (base, _) = base_server(&config);
        let mut startup = Startup::new(config);

        let server = startup.bind_tools(base).unwrap();
        let running = startup
            .launch(server, CancellationToken::new())
            .await
            .unwrap();

        let url = format!("http://{}/mcp", running.local_addr());
        let body: serde_json::Value = reqwest::Client::new()
            .post(&url)
            .json(&serde_json::json!({
                "jsonrpc": "2.0", "id": 1, "method": "tools/call",
                "params": { "name": "link_status" }
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["result"]["isError"], false);
        assert!(running.server().lifespan().is_ready());

        assert_ok!(running.shutdown().await);
    }
}
