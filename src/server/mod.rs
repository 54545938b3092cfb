//! The server role: plain HTTP, HTTPS and gRPC listeners running side by side.

pub mod cert;
pub mod grpc;
pub mod http;

use std::fmt;
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info};

use crate::config::ServeConfig;
use crate::errors::{ListenerError, ListenerFailure, ServeError};
use crate::version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Http,
    Https,
    Grpc,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ListenerKind::Http => "HTTP",
            ListenerKind::Https => "HTTPS",
            ListenerKind::Grpc => "gRPC",
        })
    }
}

/// Binds all interfaces on `port`, ready to be handed to tokio.
pub(crate) fn bind(port: u16) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .map_err(|source| ListenerError::Bind { port, source })?;
    listener
        .set_nonblocking(true)
        .map_err(|source| ListenerError::Bind { port, source })?;
    Ok(listener)
}

pub fn local_hostname() -> Result<String, ServeError> {
    hostname::get()
        .map_err(ServeError::Hostname)?
        .into_string()
        .map_err(ServeError::HostnameEncoding)
}

/// Runs the three listeners and collects whatever they report.
///
/// Failures travel over an unbounded queue, so a listener never blocks on
/// reporting and no failure is dropped. A failed listener is logged while the
/// others keep serving; [`ServeOrchestrator::run`] only returns once all of
/// them have stopped.
#[derive(Debug)]
pub struct ServeOrchestrator {
    config: ServeConfig,
    hostname: Arc<str>,
}

impl ServeOrchestrator {
    /// Fails when the local hostname cannot be determined; there is no fallback.
    pub fn new(config: ServeConfig) -> Result<Self, ServeError> {
        let hostname = local_hostname()?;
        Ok(Self::with_hostname(config, hostname))
    }

    pub fn with_hostname(config: ServeConfig, hostname: impl Into<Arc<str>>) -> Self {
        ServeOrchestrator {
            config,
            hostname: hostname.into(),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub async fn run(self) -> Result<(), ServeError> {
        info!("{}", version::to_string(false));
        info!("Transponder server is starting.");
        info!("Hostname is {}.", self.hostname);

        let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
        let ports = self.config;

        spawn_listener(
            ListenerKind::Http,
            http::serve_http(ports.http_port, self.hostname.clone()),
            failures_tx.clone(),
        );
        spawn_listener(
            ListenerKind::Https,
            http::serve_https(ports.https_port, self.hostname.clone()),
            failures_tx.clone(),
        );
        spawn_listener(
            ListenerKind::Grpc,
            grpc::serve_grpc(ports.grpc_port, self.hostname.clone()),
            failures_tx,
        );

        let mut failures = Vec::new();
        while let Some(failure) = failures_rx.recv().await {
            error!(listener = %failure.listener, error = %failure.error, "Listener stopped");
            failures.push(failure);
        }
        Err(ServeError::AllListenersStopped { failures })
    }
}

fn spawn_listener<F>(listener: ListenerKind, serve: F, failures: mpsc::UnboundedSender<ListenerFailure>)
where
    F: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    tokio::spawn(async move {
        let error = match serve.await {
            Ok(()) => ListenerError::Stopped,
            Err(error) => error,
        };
        // Only fails once the orchestrator itself is gone.
        let _ = failures.send(ListenerFailure { listener, error });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_local_hostname() {
        assert!(!local_hostname().unwrap().is_empty());
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let taken = TcpListener::bind("0.0.0.0:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        assert!(matches!(bind(port), Err(ListenerError::Bind { port: p, .. }) if p == port));
    }

    #[tokio::test]
    async fn returns_every_failure_once_all_listeners_stop() {
        let taken: Vec<TcpListener> = (0..3)
            .map(|_| TcpListener::bind("0.0.0.0:0").unwrap())
            .collect();
        let port = |i: usize| taken[i].local_addr().unwrap().port();
        let config = ServeConfig {
            http_port: port(0),
            https_port: port(1),
            grpc_port: port(2),
        };

        let err = ServeOrchestrator::with_hostname(config, "localhost")
            .run()
            .await
            .unwrap_err();
        let ServeError::AllListenersStopped { failures } = err else {
            panic!("expected every listener to stop");
        };
        let kinds: HashSet<ListenerKind> = failures.iter().map(|f| f.listener).collect();
        assert_eq!(
            kinds,
            HashSet::from([ListenerKind::Http, ListenerKind::Https, ListenerKind::Grpc])
        );
        assert!(failures
            .iter()
            .all(|f| matches!(f.error, ListenerError::Bind { .. })));
    }
}
