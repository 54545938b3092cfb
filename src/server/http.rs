use std::net::TcpListener;
use std::sync::Arc;

use axum::extract::State;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig;
use tracing::info;

use crate::errors::ListenerError;
use crate::server::bind;
use crate::server::cert::{self, CredentialRequest};

/// Every path answers with the same greeting.
pub fn router(hostname: Arc<str>) -> Router {
    Router::new().fallback(greet).with_state(hostname)
}

async fn greet(State(hostname): State<Arc<str>>) -> String {
    format!("Hello from {}\n", hostname)
}

pub async fn serve_http(port: u16, hostname: Arc<str>) -> Result<(), ListenerError> {
    let listener = bind(port)?;
    info!("Serving HTTP on port {}.", port);
    serve_plain(listener, hostname).await
}

pub async fn serve_plain(listener: TcpListener, hostname: Arc<str>) -> Result<(), ListenerError> {
    let listener = tokio::net::TcpListener::from_std(listener).map_err(ListenerError::Serve)?;
    axum::serve(listener, router(hostname))
        .await
        .map_err(ListenerError::Serve)
}

/// Mints a certificate for `hostname` and serves HTTPS with it. Key and
/// certificate stay in memory for as long as the listener runs.
pub async fn serve_https(port: u16, hostname: Arc<str>) -> Result<(), ListenerError> {
    info!("Generating certificate to serve HTTPS.");
    let request = CredentialRequest::for_hosts(hostname.as_ref());
    // RSA generation is CPU bound; keep it off the reactor.
    let material = tokio::task::spawn_blocking(move || cert::issue(&request))
        .await
        .map_err(|e| ListenerError::Serve(std::io::Error::other(e)))??;
    let config = material.server_config()?;

    let listener = bind(port)?;
    info!("Serving HTTPS on port {}.", port);
    serve_tls(listener, config, hostname).await
}

pub async fn serve_tls(
    listener: TcpListener,
    config: ServerConfig,
    hostname: Arc<str>,
) -> Result<(), ListenerError> {
    let config = RustlsConfig::from_config(Arc::new(config));
    axum_server::from_tcp_rustls(listener, config)
        .serve(router(hostname).into_make_service())
        .await
        .map_err(ListenerError::Serve)
}
