use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::errors::ProbeError;
use crate::scanner::{tls, Probe, ProbeOutcome};

/// Probes a target with `GET /` over plain HTTP or, with [`HttpScanner::https`],
/// over TLS without verifying the server certificate.
#[derive(Debug, Clone)]
pub struct HttpScanner {
    scheme: &'static str,
    client: Client,
}

impl HttpScanner {
    pub fn http() -> Result<Self, ProbeError> {
        let client = Client::builder().build().map_err(ProbeError::Client)?;
        Ok(HttpScanner {
            scheme: "http",
            client,
        })
    }

    pub fn https() -> Result<Self, ProbeError> {
        let client = Client::builder()
            .use_preconfigured_tls(tls::insecure_client_config()?)
            .build()
            .map_err(ProbeError::Client)?;
        Ok(HttpScanner {
            scheme: "https",
            client,
        })
    }

    fn url(&self, address: &str) -> String {
        format!("{}://{}/", self.scheme, address)
    }

    async fn get(&self, url: &str, timeout: Duration) -> ProbeOutcome {
        let response = self.client.get(url).timeout(timeout).send().await?;
        if response.status() != StatusCode::OK {
            return Err(ProbeError::Status(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Probe for HttpScanner {
    async fn probe(&self, address: &str, timeout: Duration) -> ProbeOutcome {
        let url = self.url(address);
        self.get(&url, timeout).await.map_err(|err| match err {
            ProbeError::Request(e) | ProbeError::Body(e) if e.is_timeout() => {
                ProbeError::Timeout(timeout)
            }
            other => other,
        })
    }
}
