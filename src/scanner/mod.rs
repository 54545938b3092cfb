//! The scan loop and the per-protocol probes it drives.

pub mod grpc_scanner;
pub mod http_scanner;
pub mod tls;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::{Port, Protocol, ScannerConfig, Server};
use crate::errors::Result;

pub use grpc_scanner::GrpcScanner;
pub use http_scanner::HttpScanner;

/// Bound on a single probe, connection included.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
/// Pause after finishing all ports of one server.
pub const SERVER_PAUSE: Duration = Duration::from_secs(5);

/// Response body on success, the reason otherwise.
pub type ProbeOutcome = Result<String>;

/// One bounded attempt to reach `address` over a single protocol.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome;
}

/// One probe implementation per [`Protocol`].
#[derive(Clone)]
pub struct ProbeSet {
    pub http: Arc<dyn Probe>,
    pub https: Arc<dyn Probe>,
    pub grpc: Arc<dyn Probe>,
}

impl ProbeSet {
    pub fn new() -> Result<Self> {
        Ok(ProbeSet {
            http: Arc::new(HttpScanner::http()?),
            https: Arc::new(HttpScanner::https()?),
            grpc: Arc::new(GrpcScanner::new()),
        })
    }

    pub fn get(&self, protocol: Protocol) -> &dyn Probe {
        match protocol {
            Protocol::Http => self.http.as_ref(),
            Protocol::Https => self.https.as_ref(),
            Protocol::Grpc => self.grpc.as_ref(),
        }
    }
}

impl std::fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProbeSet").finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct ScanReport {
    pub address: String,
    pub protocol: Protocol,
    pub outcome: ProbeOutcome,
}

impl ScanReport {
    fn log(&self) {
        match &self.outcome {
            Ok(response) => info!(
                target_addr = %self.address,
                protocol = %self.protocol,
                response = %response.trim_end(),
                "Successfully made request"
            ),
            Err(error) => warn!(
                target_addr = %self.address,
                protocol = %self.protocol,
                %error,
                "Error making request"
            ),
        }
    }
}

/// Walks the configured servers forever, one probe in flight at a time.
#[derive(Debug)]
pub struct Scanner {
    config: ScannerConfig,
    probes: ProbeSet,
    timeout: Duration,
    pause: Duration,
}

impl Scanner {
    pub fn new(config: ScannerConfig) -> Result<Self> {
        Ok(Self::with_probes(config, ProbeSet::new()?))
    }

    pub fn with_probes(config: ScannerConfig, probes: ProbeSet) -> Self {
        Scanner {
            config,
            probes,
            timeout: PROBE_TIMEOUT,
            pause: SERVER_PAUSE,
        }
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Never returns. The next sweep starts as soon as the last server's
    /// pause is over.
    pub async fn run(&self) {
        loop {
            self.sweep().await;
        }
    }

    pub async fn sweep(&self) -> Vec<ScanReport> {
        let mut reports = Vec::new();
        for server in &self.config.servers {
            reports.extend(self.scan_server(server).await);
        }
        reports
    }

    /// Probes every port of `server` in order, then sleeps for the server pause
    /// whatever the outcomes were.
    pub async fn scan_server(&self, server: &Server) -> Vec<ScanReport> {
        let mut reports = Vec::with_capacity(server.ports.len());
        for port in &server.ports {
            if let Some(report) = self.scan_port(server, port).await {
                report.log();
                reports.push(report);
            }
        }
        tokio::time::sleep(self.pause).await;
        reports
    }

    /// `None` for protocols without a probe: nothing is sent and nothing logged.
    pub async fn scan_port(&self, server: &Server, port: &Port) -> Option<ScanReport> {
        let protocol = port.protocol()?;
        let address = server.address(port);
        let outcome = self.probes.get(protocol).probe(&address, self.timeout).await;
        Some(ScanReport {
            address,
            protocol,
            outcome,
        })
    }
}
