//! Test doubles shared across modules.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::client::Backend;
use crate::errors::GeotrailError;
use crate::models::{IpLookupResponse, LocationSample};

/// Records calls and replies with canned responses.
#[derive(Default)]
pub(crate) struct FakeBackend {
    pub samples: Mutex<Vec<serde_json::Value>>,
    pub lookups: Mutex<Vec<String>>,
    pub lookup_reply: Mutex<Option<serde_json::Value>>,
    pub fail_reports: bool,
}

impl FakeBackend {
    pub(crate) fn replying(reply: serde_json::Value) -> Self {
        Self {
            lookup_reply: Mutex::new(Some(reply)),
            ..Self::default()
        }
    }

    pub(crate) fn sample_count(&self) -> usize {
        self.samples.lock().unwrap().len()
    }

    pub(crate) fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn post_location(
        &self,
        sample: &LocationSample,
    ) -> Result<serde_json::Value, GeotrailError> {
        self.samples
            .lock()
            .unwrap()
            .push(serde_json::to_value(sample)?);
        if self.fail_reports {
            return Err(GeotrailError::Backend {
                status: 500,
                message: "Database error".into(),
            });
        }
        Ok(serde_json::json!({"status": "saved"}))
    }

    async fn track_ip(&self, ip: &str) -> Result<IpLookupResponse, GeotrailError> {
        self.lookups.lock().unwrap().push(ip.to_string());
        let reply = self.lookup_reply.lock().unwrap().clone();
        match reply {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Err(GeotrailError::InvalidResponse("connection refused".into())),
        }
    }
}
