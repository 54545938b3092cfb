use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::server::ListenerKind;

/// Problems turning a scanner config file into a [`crate::config::ScannerConfig`].
/// All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config file for scanner from: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to unmarshal config file for scanner from: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("server #{index} has an empty host")]
    EmptyHost { index: usize },
}

/// A failed probe. Never escapes the scan loop; it is logged and the sweep moves on.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("got status code: {0}")]
    Status(u16),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("failed to read response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("tls client configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("grpc transport: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("grpc call failed: {0}")]
    Rpc(#[from] tonic::Status),
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_body() || err.is_decode() {
            ProbeError::Body(err)
        } else if err.is_builder() {
            ProbeError::Client(err)
        } else {
            ProbeError::Request(err)
        }
    }
}

/// Failure to mint a self-signed key and certificate. No partial material is
/// ever returned alongside one of these.
#[derive(Debug, Error)]
pub enum IssuanceError {
    #[error("missing required host")]
    MissingHost,

    #[error("unsupported key algorithm: {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("failed to parse creation date {value:?}: {source}")]
    InvalidValidFrom {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("validity window is out of range")]
    InvalidValidity,

    #[error("failed to generate private key: {0}")]
    KeyGeneration(String),

    #[error("failed to create certificate: {0}")]
    Certificate(#[from] rcgen::Error),

    #[error("unable to marshal private key: {0}")]
    Encoding(String),
}

/// Terminal error from one listener. Only that listener stops.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to generate key and certificate to serve HTTPS: {0}")]
    Credentials(#[from] IssuanceError),

    #[error("failed to build TLS server configuration: {0}")]
    Tls(String),

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("grpc server error: {0}")]
    Grpc(#[from] tonic::transport::Error),

    #[error("listener exited without an error")]
    Stopped,
}

impl From<rustls::Error> for ListenerError {
    fn from(err: rustls::Error) -> Self {
        ListenerError::Tls(err.to_string())
    }
}

/// A [`ListenerError`] tagged with the listener it came from.
#[derive(Debug, Error)]
#[error("{listener} listener failed: {error}")]
pub struct ListenerFailure {
    pub listener: ListenerKind,
    #[source]
    pub error: ListenerError,
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("unable to determine hostname: {0}")]
    Hostname(#[source] io::Error),

    #[error("hostname is not valid unicode: {0:?}")]
    HostnameEncoding(std::ffi::OsString),

    #[error("all listeners stopped ({} failures)", failures.len())]
    AllListenersStopped { failures: Vec<ListenerFailure> },
}

pub type Result<T, E = ProbeError> = std::result::Result<T, E>;
