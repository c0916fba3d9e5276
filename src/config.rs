//! Tracker configuration.
//!
//! Every tunable lives here with its default; the CLI overrides a subset.

use std::time::Duration;

use crate::geolocation::PositionOptions;

/// Default backend base URL.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Shortest polling interval accepted from the command line.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_millis(1000);

/// Runtime configuration for a tracking session.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base URL of the tracking backend (`/location`, `/track-ip`)
    pub backend_url: String,
    /// Time between location requests while tracking
    pub update_interval: Duration,
    /// Options passed with every location request
    pub position_options: PositionOptions,
    /// Maximum retained route points
    pub route_capacity: usize,
    /// Lower bound for the jitter suppression radius (meters)
    pub min_move_meters: f64,
    /// Zoom used when the first GPS fix arrives
    pub gps_zoom: u8,
    /// Zoom used when showing an IP lookup result
    pub ip_zoom: u8,
    /// Zoom of the initial world view
    pub initial_zoom: u8,
    /// Viewport transition for the first accepted fix
    pub first_fix_transition: Duration,
    /// Viewport transition for subsequent fixes
    pub follow_transition: Duration,
    /// Marker interpolation duration; zero moves the marker instantly
    pub marker_animation: Duration,
    /// Time between animation frames
    pub frame_interval: Duration,
    /// HTTP request timeout for backend calls
    pub request_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            update_interval: Duration::from_millis(5000),
            position_options: PositionOptions::default(),
            route_capacity: 500,
            min_move_meters: 2.0,
            gps_zoom: 16,
            ip_zoom: 10,
            initial_zoom: 2,
            first_fix_transition: Duration::from_millis(1500),
            follow_transition: Duration::from_millis(500),
            marker_animation: Duration::from_millis(1000),
            frame_interval: Duration::from_millis(16),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl TrackerConfig {
    /// Apply the polling interval, clamping to [`MIN_UPDATE_INTERVAL`].
    #[must_use]
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        if interval < MIN_UPDATE_INTERVAL {
            tracing::warn!(
                "update interval clamped to minimum of {}ms",
                MIN_UPDATE_INTERVAL.as_millis()
            );
        }
        self.update_interval = interval.max(MIN_UPDATE_INTERVAL);
        self
    }

    /// Backend URL without a trailing slash.
    #[must_use]
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }
}
