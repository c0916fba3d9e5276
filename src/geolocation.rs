//! Geolocation sources.
//!
//! A [`Geolocator`] answers "where is the device now". Requests carry
//! [`PositionOptions`]; the timeout is enforced by [`request_position`]
//! regardless of the source.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::errors::GeotrailError;
use crate::geo::{LatLng, destination};
use crate::models::Fix;

/// Why a position request produced no fix.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeolocationError {
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("geolocation is not supported")]
    Unsupported,
}

/// Options sent with each position request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub enable_high_accuracy: bool,
    /// Oldest acceptable cached fix; zero forces a fresh reading
    pub maximum_age: Duration,
    /// How long to wait before failing the request
    pub timeout: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            enable_high_accuracy: true,
            maximum_age: Duration::ZERO,
            timeout: Duration::from_secs(10),
        }
    }
}

/// A source of device positions.
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Capability probe. Tracking refuses to start when this is false.
    fn is_supported(&self) -> bool {
        true
    }

    /// Obtain the current position.
    async fn current_position(&self, options: &PositionOptions) -> Result<Fix, GeolocationError>;
}

/// Request a position, failing with [`GeolocationError::Timeout`] once
/// `options.timeout` elapses.
pub async fn request_position(
    geolocator: &dyn Geolocator,
    options: &PositionOptions,
) -> Result<Fix, GeolocationError> {
    if !geolocator.is_supported() {
        return Err(GeolocationError::Unsupported);
    }

    debug!(
        "requesting position (high accuracy: {}, max age: {}ms)",
        options.enable_high_accuracy,
        options.maximum_age.as_millis()
    );
    match tokio::time::timeout(options.timeout, geolocator.current_position(options)).await {
        Ok(result) => result,
        Err(_) => Err(GeolocationError::Timeout(options.timeout)),
    }
}

/// Replays recorded fixes in order, one per request.
///
/// Input is NDJSON with one `{"lat","lng","accuracy"}` object per line.
#[derive(Debug)]
pub struct ReplayGeolocator {
    fixes: Mutex<VecDeque<Fix>>,
}

impl ReplayGeolocator {
    #[must_use]
    pub fn new(fixes: impl IntoIterator<Item = Fix>) -> Self {
        Self {
            fixes: Mutex::new(fixes.into_iter().collect()),
        }
    }

    /// Load fixes from an NDJSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a valid fix.
    pub fn from_path(path: &Path) -> Result<Self, GeotrailError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse NDJSON fixes; blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is not a valid fix.
    pub fn parse(contents: &str) -> Result<Self, GeotrailError> {
        let mut fixes = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            let fix: Fix = serde_json::from_str(line)?;
            fix.validate()?;
            fixes.push(fix);
        }
        debug!("loaded {} replay fixes", fixes.len());
        Ok(Self::new(fixes))
    }

    /// Fixes not yet handed out.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.fixes.lock().map_or(0, |f| f.len())
    }
}

#[async_trait]
impl Geolocator for ReplayGeolocator {
    async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, GeolocationError> {
        let next = self
            .fixes
            .lock()
            .map_err(|_| GeolocationError::PositionUnavailable("replay source poisoned".into()))?
            .pop_front();
        next.ok_or_else(|| GeolocationError::PositionUnavailable("replay exhausted".into()))
    }
}

/// Deterministic walk around a starting point.
///
/// Each request advances `step_meters` and turns `turn_degrees`, so the
/// trail traces a polygon that closes on itself.
#[derive(Debug)]
pub struct SimulatedGeolocator {
    state: Mutex<WalkState>,
    step_meters: f64,
    turn_degrees: f64,
    accuracy: f64,
}

#[derive(Debug)]
struct WalkState {
    position: LatLng,
    heading: f64,
}

impl SimulatedGeolocator {
    #[must_use]
    pub fn new(start: LatLng) -> Self {
        Self {
            state: Mutex::new(WalkState {
                position: start,
                heading: 0.0,
            }),
            step_meters: 15.0,
            turn_degrees: 12.0,
            accuracy: 8.0,
        }
    }

}

#[async_trait]
impl Geolocator for SimulatedGeolocator {
    async fn current_position(&self, options: &PositionOptions) -> Result<Fix, GeolocationError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| GeolocationError::PositionUnavailable("simulator poisoned".into()))?;

        let fix = Fix::new(
            state.position.lat,
            state.position.lng,
            if options.enable_high_accuracy {
                self.accuracy
            } else {
                self.accuracy * 4.0
            },
        );

        state.position = destination(state.position, state.heading, self.step_meters);
        state.heading = (state.heading + self.turn_degrees) % 360.0;
        Ok(fix)
    }
}

/// A platform without geolocation.
#[derive(Debug, Default)]
pub struct UnsupportedGeolocator;

#[async_trait]
impl Geolocator for UnsupportedGeolocator {
    fn is_supported(&self) -> bool {
        false
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledGeolocator;

    #[async_trait]
    impl Geolocator for StalledGeolocator {
        async fn current_position(&self, _: &PositionOptions) -> Result<Fix, GeolocationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Fix::new(0.0, 0.0, 1.0))
        }
    }

    #[tokio::test]
    async fn test_replay_in_order_then_exhausted() {
        let geo = ReplayGeolocator::parse(
            "{\"lat\":1.0,\"lng\":2.0,\"accuracy\":5.0}\n\n{\"lat\":3.0,\"lng\":4.0,\"accuracy\":6.0}\n",
        )
        .unwrap();
        let opts = PositionOptions::default();

        assert_eq!(geo.remaining(), 2);
        assert_eq!(request_position(&geo, &opts).await.unwrap(), Fix::new(1.0, 2.0, 5.0));
        assert_eq!(request_position(&geo, &opts).await.unwrap(), Fix::new(3.0, 4.0, 6.0));
        assert!(matches!(
            request_position(&geo, &opts).await,
            Err(GeolocationError::PositionUnavailable(_))
        ));
    }

    #[test]
    fn test_replay_rejects_bad_line() {
        assert!(ReplayGeolocator::parse("{\"lat\":1.0}").is_err());
        assert!(ReplayGeolocator::parse("{\"lat\":100.0,\"lng\":0.0,\"accuracy\":1.0}").is_err());
    }

    #[tokio::test]
    async fn test_simulated_walk_moves_by_step() {
        let start = LatLng::new(-6.2, 106.8);
        let geo = SimulatedGeolocator::new(start);
        let opts = PositionOptions::default();

        let first = request_position(&geo, &opts).await.unwrap();
        let second = request_position(&geo, &opts).await.unwrap();
        assert_eq!(first.position(), start);
        let moved = first.position().distance_to(second.position());
        assert!((moved - 15.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_unsupported() {
        let geo = UnsupportedGeolocator;
        assert!(!geo.is_supported());
        assert_eq!(
            request_position(&geo, &PositionOptions::default()).await,
            Err(GeolocationError::Unsupported)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_enforced() {
        let opts = PositionOptions::default();
        let result = request_position(&StalledGeolocator, &opts).await;
        assert_eq!(result, Err(GeolocationError::Timeout(Duration::from_secs(10))));
    }
}
