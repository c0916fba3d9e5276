//! Tracking backend client.
//!
//! Provides async HTTP access to the `/location` and `/track-ip` endpoints.
//! Uses reqwest with rustls for TLS.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use crate::config::TrackerConfig;
use crate::errors::GeotrailError;
use crate::models::{IpLookupRequest, IpLookupResponse, LocationSample};

/// User agent string for backend requests.
const USER_AGENT: &str = concat!("geotrail/", env!("CARGO_PKG_VERSION"));

/// Operations the tracker needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Submit one position sample. The reply is returned for logging only.
    async fn post_location(&self, sample: &LocationSample) -> Result<serde_json::Value, GeotrailError>;

    /// Ask the backend to geolocate an IP address.
    async fn track_ip(&self, ip: &str) -> Result<IpLookupResponse, GeotrailError>;
}

/// HTTP client for the tracking backend.
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GeotrailError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from the tracker configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, GeotrailError> {
        Self::new(config.backend_base(), config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for BackendClient {
    #[instrument(skip(self, sample), fields(session = %sample.session_id))]
    async fn post_location(&self, sample: &LocationSample) -> Result<serde_json::Value, GeotrailError> {
        let url = self.url("/location");
        debug!("posting sample to {}", url);

        let response = self.client.post(&url).json(sample).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(GeotrailError::Backend {
                status: status.as_u16(),
                message: body,
            });
        }

        // Any reply shape is tolerated; non-JSON bodies are kept as text
        Ok(serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body)))
    }

    #[instrument(skip(self))]
    async fn track_ip(&self, ip: &str) -> Result<IpLookupResponse, GeotrailError> {
        let url = self.url("/track-ip");
        debug!("looking up {} via {}", ip, url);

        let request = IpLookupRequest { ip: ip.to_string() };
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // The backend reports lookup failures as {success:false, error} with
        // a 4xx/5xx status, so the body is read regardless of status
        match serde_json::from_str::<IpLookupResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(GeotrailError::Backend {
                status: status.as_u16(),
                message: body,
            }),
            Err(e) => Err(GeotrailError::Parse(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let client = BackendClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url("/location"), "http://localhost:5000/location");
        assert_eq!(client.url("/track-ip"), "http://localhost:5000/track-ip");
    }
}
