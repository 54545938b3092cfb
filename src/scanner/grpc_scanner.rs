use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tonic::Request;
use tracing::debug;

use crate::errors::ProbeError;
use crate::proto::{GreeterClient, HelloRequest};
use crate::scanner::{Probe, ProbeOutcome};

/// Calls `Greeter/SayHello` over a plaintext connection.
#[derive(Debug, Clone, Copy, Default)]
pub struct GrpcScanner;

impl GrpcScanner {
    pub fn new() -> Self {
        GrpcScanner
    }

    async fn say_hello(endpoint: Endpoint) -> ProbeOutcome {
        let channel = endpoint.connect().await?;
        let mut client = GreeterClient::new(channel);
        let response = client.say_hello(Request::new(HelloRequest::default())).await?;

        // Only a diagnostic; the reply message is the probe result.
        if let Some(hostname) = response
            .metadata()
            .get("hostname")
            .and_then(|v| v.to_str().ok())
        {
            debug!(hostname, "greeter sent hostname header");
        }
        Ok(response.into_inner().message)
    }
}

#[async_trait]
impl Probe for GrpcScanner {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let endpoint = Endpoint::from_shared(format!("http://{}", address))
            .map_err(|_| ProbeError::InvalidAddress(address.to_string()))?;

        // One deadline for dial and call together.
        match tokio::time::timeout(timeout, Self::say_hello(endpoint)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}
