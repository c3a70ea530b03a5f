//! HTTP client abstraction for testability
//!
//! [`ProxyApi`](super::ProxyApi) talks to the proxy only through
//! [`HttpClient`], so tests can substitute a scripted client.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::error::{MapError, MapResult};

/// Default request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("wayfinder/", env!("CARGO_PKG_VERSION"));

/// Trait for async HTTP GET requests returning the response body.
///
/// Implementations map HTTP 404 to [`MapError::NotFound`], other non-2xx
/// statuses and transport failures to [`MapError::ProviderUnavailable`], and
/// an elapsed timeout to [`MapError::Timeout`].
pub trait HttpClient: Send + Sync {
    /// Performs an async HTTP GET request.
    fn get(&self, url: &str) -> impl Future<Output = MapResult<Vec<u8>>> + Send;
}

/// HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the default 10 s timeout.
    pub fn new() -> MapResult<Self> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates a new ReqwestClient with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> MapResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| MapError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> MapResult<Vec<u8>> {
        trace!(url = url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(
                    url = url,
                    status = resp.status().as_u16(),
                    "HTTP response received"
                );
                resp
            }
            Err(e) => {
                warn!(
                    url = url,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(e.into());
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(url = url, "HTTP 404");
            return Err(MapError::NotFound(format!("HTTP 404 from {}", url)));
        }
        if !status.is_success() {
            warn!(url = url, status = status.as_u16(), "HTTP error status");
            return Err(MapError::ProviderUnavailable(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        match response.bytes().await {
            Ok(bytes) => {
                trace!(url = url, bytes = bytes.len(), "HTTP response body read");
                Ok(bytes.to_vec())
            }
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read response body");
                Err(e.into())
            }
        }
    }
}
