//! Deferred initialization of backend resources.
//!
//! Opening the vehicle link is lazy: it happens on the first SSE session or
//! tool call. To keep that cost off the first real client, a background task
//! waits for the listener to come up and then opens one SSE session against
//! the server itself.
//!
//! The probe is best-effort. Failures are logged at WARN and dropped, the
//! probe is never retried, and the server never waits on it. If it fails,
//! the first client request initializes the link instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::transport::TransportConfig;

/// Warm-up probe settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupConfig {
    /// Whether to run the probe at all.
    pub enabled: bool,

    /// Grace period before the probe, giving the listener time to come up.
    pub delay: Duration,

    /// Upper bound on the probe request.
    pub timeout: Duration,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay: Duration::from_secs(3),
            timeout: Duration::from_secs(5),
        }
    }
}

/// How the probe ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WarmupOutcome {
    /// The server answered with a 2xx status.
    Succeeded { status: u16 },
    /// Connection error, timeout or non-2xx status.
    Failed { reason: String },
    /// Shutdown began before the probe finished.
    Cancelled,
    /// The probe is turned off.
    Disabled,
}

/// Errors from a single probe request.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),
}

/// Issues the synthetic warm-up request.
#[async_trait]
pub trait Prober: Send + Sync {
    /// GET `url` and return the response status.
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

/// [`Prober`] backed by `reqwest`.
///
/// Only the response head is awaited; the SSE body is dropped right away,
/// which closes the session on the server side.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(timeout)
                } else {
                    ProbeError::Request(e.to_string())
                }
            })?;

        Ok(response.status().as_u16())
    }
}

/// URL of the server's own SSE endpoint on the bound port.
pub fn probe_url(transport: &TransportConfig, port: u16) -> String {
    let host = transport.local_host();
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{}]:{}{}", host, port, transport.sse_path())
    } else {
        format!("http://{}:{}{}", host, port, transport.sse_path())
    }
}

/// One-shot warm-up probe.
pub struct WarmupProbe {
    url: String,
    config: WarmupConfig,
    prober: Arc<dyn Prober>,
}

impl WarmupProbe {
    pub fn new(url: impl Into<String>, config: WarmupConfig, prober: Arc<dyn Prober>) -> Self {
        Self {
            url: url.into(),
            config,
            prober,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Wait out the grace period, then issue the probe once.
    pub async fn run(self, cancel: CancellationToken) -> WarmupOutcome {
        if !self.config.enabled {
            info!("Warm-up probe disabled; the vehicle link opens on the first client request");
            return WarmupOutcome::Disabled;
        }

        info!("Background: waiting {:?} for the server to start", self.config.delay);
        tokio::select! {
            _ = cancel.cancelled() => return WarmupOutcome::Cancelled,
            _ = tokio::time::sleep(self.config.delay) => {}
        }

        info!("Triggering connection initialization via GET {}", self.url);
        let request = tokio::time::timeout(
            self.config.timeout,
            self.prober.probe(&self.url, self.config.timeout),
        );
        let result = tokio::select! {
            _ = cancel.cancelled() => return WarmupOutcome::Cancelled,
            result = request => result.unwrap_or(Err(ProbeError::Timeout(self.config.timeout))),
        };

        match result {
            Ok(status) if (200..300).contains(&status) => {
                info!("Initialization request completed (status: {})", status);
                WarmupOutcome::Succeeded { status }
            }
            Ok(status) => Self::failed(format!("unexpected status {status}")),
            Err(e) => Self::failed(e.to_string()),
        }
    }

    fn failed(reason: String) -> WarmupOutcome {
        warn!("Initialization trigger request failed: {}", reason);
        info!("Connection will initialize on the first client request instead");
        WarmupOutcome::Failed { reason }
    }

    /// Run the probe as a detached task tied to `cancel`.
    pub fn spawn(self, cancel: CancellationToken) -> WarmupHandle {
        let token = cancel.clone();
        let task = tokio::spawn(self.run(token));
        WarmupHandle { cancel, task }
    }
}

/// Handle to a spawned warm-up task.
pub struct WarmupHandle {
    cancel: CancellationToken,
    task: JoinHandle<WarmupOutcome>,
}

impl WarmupHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the probe to end on its own.
    pub async fn join(self) -> WarmupOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => WarmupOutcome::Failed {
                reason: e.to_string(),
            },
        }
    }

    /// Cancel the probe if still in flight and collect its outcome.
    pub async fn shutdown(self) -> WarmupOutcome {
        self.cancel.cancel();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Reply {
        Status(u16),
        Refused,
        Hang,
    }

    struct FakeProber {
        reply: Reply,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeProber {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Instant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Prober for FakeProber {
        async fn probe(&self, url: &str, _timeout: Duration) -> Result<u16, ProbeError> {
            self.calls
                .lock()
                .unwrap()
                .push((url.to_string(), Instant::now()));
            match self.reply {
                Reply::Status(status) => Ok(status),
                Reply::Refused => Err(ProbeError::Request("connection refused".to_string())),
                Reply::Hang => std::future::pending().await,
            }
        }
    }

    fn probe(prober: Arc<FakeProber>) -> WarmupProbe {
        WarmupProbe::new("http://127.0.0.1:8080/sse", WarmupConfig::default(), prober)
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_waits_grace_period() {
        let prober = FakeProber::new(Reply::Status(200));
        let start = Instant::now();

        let outcome = probe(prober.clone()).run(CancellationToken::new()).await;

        assert_eq!(outcome, WarmupOutcome::Succeeded { status: 200 });
        let calls = prober.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "http://127.0.0.1:8080/sse");
        assert!(calls[0].1 - start >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_error_is_swallowed() {
        let prober = FakeProber::new(Reply::Refused);
        let outcome = probe(prober.clone()).run(CancellationToken::new()).await;

        assert!(matches!(outcome, WarmupOutcome::Failed { reason } if reason.contains("refused")));
        assert_eq!(prober.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_success_status_fails() {
        let prober = FakeProber::new(Reply::Status(503));
        let outcome = probe(prober).run(CancellationToken::new()).await;
        assert!(matches!(outcome, WarmupOutcome::Failed { reason } if reason.contains("503")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_probe_is_bounded_by_timeout() {
        let prober = FakeProber::new(Reply::Hang);
        let start = Instant::now();

        let outcome = probe(prober).run(CancellationToken::new()).await;

        assert!(matches!(outcome, WarmupOutcome::Failed { reason } if reason.contains("timed out")));
        assert!(start.elapsed() >= Duration::from_secs(8));
        assert!(start.elapsed() < Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_grace_period() {
        let prober = FakeProber::new(Reply::Status(200));
        let token = CancellationToken::new();
        let handle = probe(prober.clone()).spawn(token.clone());

        tokio::time::sleep(Duration::from_secs(1)).await;
        let outcome = handle.shutdown().await;

        assert_eq!(outcome, WarmupOutcome::Cancelled);
        assert!(prober.calls().is_empty());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_disabled_probe_never_calls() {
        let prober = FakeProber::new(Reply::Status(200));
        let config = WarmupConfig {
            enabled: false,
            ..Default::default()
        };

        let outcome = WarmupProbe::new("http://127.0.0.1:1/sse", config, prober.clone())
            .run(CancellationToken::new())
            .await;

        assert_eq!(outcome, WarmupOutcome::Disabled);
        assert!(prober.calls().is_empty());
    }

    #[test]
    fn test_probe_url_uses_loopback_for_wildcard() {
        let transport = TransportConfig::default();
        assert_eq!(probe_url(&transport, 8080), "http://127.0.0.1:8080/sse");

        let mut mounted = TransportConfig::new("10.1.2.3", 9000);
        mounted.endpoint_mode = crate::core::transport::EndpointMode::Mounted;
        assert_eq!(probe_url(&mounted, 9000), "http://10.1.2.3:9000/mcp/sse");

        assert_eq!(
            probe_url(&TransportConfig::new("::1", 8080), 8080),
            "http://[::1]:8080/sse"
        );
    }

    #[tokio::test]
    async fn test_http_prober_unreachable_port() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let prober = HttpProber::new().unwrap();
        let result = prober
            .probe(&format!("http://127.0.0.1:{port}/sse"), Duration::from_secs(2))
            .await;
        assert!(result.is_err());
    }
}
