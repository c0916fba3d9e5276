//! Tracking controller.
//!
//! Owns the polling timer. Tracking is active exactly while a timer task
//! exists; there is no separate flag to drift out of sync.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

/// Result of [`TrackingController::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyActive,
    /// No geolocation capability; tracking did not start
    Unsupported,
}

#[derive(Debug)]
pub struct TrackingController {
    interval: Duration,
    timer: Option<JoinHandle<()>>,
}

impl TrackingController {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timer: None,
        }
    }

    /// Start polling.
    ///
    /// `on_tick` runs once immediately and then once per interval. Returning
    /// `false` from it ends the timer (the receiving side has gone away).
    pub fn start<F>(&mut self, supported: bool, mut on_tick: F) -> StartOutcome
    where
        F: FnMut() -> bool + Send + 'static,
    {
        if !supported {
            return StartOutcome::Unsupported;
        }
        if self.timer.is_some() {
            return StartOutcome::AlreadyActive;
        }

        let period = self.interval;
        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                // First tick completes immediately
                ticker.tick().await;
                if !on_tick() {
                    break;
                }
            }
        }));

        info!("tracking started (every {}ms)", period.as_millis());
        StartOutcome::Started
    }

    /// Cancel the timer. Returns `false` if tracking was not active.
    ///
    /// Requests already in flight are not cancelled.
    pub fn stop(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                timer.abort();
                info!("tracking stopped");
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.timer.is_some()
    }
}

impl Drop for TrackingController {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}
