//! Position reporter.
//!
//! Tags each fix with the session identifier and posts it to the backend.
//! The outcome is logged and otherwise ignored: no retry, no queueing.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::Backend;
use crate::models::{Fix, LocationSample};
use crate::session::SessionId;

pub struct PositionReporter {
    session_id: SessionId,
    backend: Arc<dyn Backend>,
}

impl PositionReporter {
    #[must_use]
    pub fn new(session_id: SessionId, backend: Arc<dyn Backend>) -> Self {
        Self {
            session_id,
            backend,
        }
    }

    /// Post `fix` in the background.
    pub fn report(&self, fix: &Fix) -> JoinHandle<()> {
        let sample = LocationSample::new(self.session_id, fix);
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move { send_sample(backend.as_ref(), &sample).await })
    }
}

/// Post one sample and log the reply.
pub async fn send_sample(backend: &dyn Backend, sample: &LocationSample) {
    match backend.post_location(sample).await {
        Ok(reply) => debug!("backend: {reply}"),
        Err(e) => warn!("location report failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_report_tags_session() {
        let backend = Arc::new(FakeBackend::default());
        let session = SessionId::generate();
        let reporter = PositionReporter::new(session, backend.clone());

        reporter.report(&Fix::new(1.5, 2.5, 7.0)).await.unwrap();
        reporter.report(&Fix::new(1.6, 2.6, 7.0)).await.unwrap();

        let samples = backend.samples.lock().unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s["session_id"] == session.to_string()));
        assert_eq!(samples[1]["lat"], 1.6);
    }

    #[tokio::test]
    async fn test_failed_report_is_swallowed() {
        let backend = Arc::new(FakeBackend {
            fail_reports: true,
            ..FakeBackend::default()
        });
        let reporter = PositionReporter::new(SessionId::generate(), backend.clone());

        // Completes without panicking; failure is only logged
        reporter.report(&Fix::new(0.0, 0.0, 1.0)).await.unwrap();
        assert_eq!(backend.sample_count(), 1);
    }
}
