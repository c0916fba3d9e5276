//! GPS overlay rendering.
//!
//! Turns accepted fixes into map changes: viewport transition, animated
//! marker, accuracy circle, route polyline and the status display. Fixes
//! that fall inside the noise radius of the last rendered fix are dropped
//! before anything is touched.

use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::animation::Animator;
use crate::config::TrackerConfig;
use crate::geo::LatLng;
use crate::map::MapView;
use crate::models::Fix;
use crate::route::RouteTrail;
use crate::status::StatusDisplay;

/// Renderer tunables, taken from [`TrackerConfig`].
#[derive(Debug, Clone, Copy)]
pub struct RendererSettings {
    pub route_capacity: usize,
    pub min_move_meters: f64,
    pub gps_zoom: u8,
    pub first_fix_transition: Duration,
    pub follow_transition: Duration,
    pub marker_animation: Duration,
}

impl From<&TrackerConfig> for RendererSettings {
    fn from(config: &TrackerConfig) -> Self {
        Self {
            route_capacity: config.route_capacity,
            min_move_meters: config.min_move_meters,
            gps_zoom: config.gps_zoom,
            first_fix_transition: config.first_fix_transition,
            follow_transition: config.follow_transition,
            marker_animation: config.marker_animation,
        }
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self::from(&TrackerConfig::default())
    }
}

/// What happened to a fix handed to [`GpsRenderer::apply_fix`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// First accepted fix: overlays created, viewport zoomed in
    First,
    /// Later fix: overlays updated, viewport panned
    Moved,
    /// Within the noise radius of the last rendered fix; nothing changed
    Suppressed,
}

impl RenderOutcome {
    #[must_use]
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Suppressed)
    }
}

/// Owns the route history and marker animation for the GPS overlays.
#[derive(Debug)]
pub struct GpsRenderer {
    settings: RendererSettings,
    route: RouteTrail,
    last_rendered: Option<LatLng>,
    animator: Animator,
    status: Option<StatusDisplay>,
    accepted: u64,
    suppressed: u64,
}

impl GpsRenderer {
    #[must_use]
    pub fn new(settings: RendererSettings) -> Self {
        Self {
            settings,
            route: RouteTrail::new(settings.route_capacity.max(1)),
            last_rendered: None,
            animator: Animator::default(),
            status: None,
            accepted: 0,
            suppressed: 0,
        }
    }

    /// Render one fix onto `map`.
    ///
    /// `now` drives the marker animation, `clock` is shown in the status display.
    pub fn apply_fix(
        &mut self,
        map: &mut MapView,
        fix: &Fix,
        now: Instant,
        clock: DateTime<Local>,
    ) -> RenderOutcome {
        let position = fix.position();

        if let Some(last) = self.last_rendered {
            let threshold = fix.accuracy.max(self.settings.min_move_meters);
            let moved = last.distance_to(position);
            if moved <= threshold {
                self.suppressed += 1;
                trace!("suppressed fix: moved {moved:.1}m within {threshold:.1}m");
                return RenderOutcome::Suppressed;
            }
        }

        let outcome = if self.last_rendered.is_none() {
            RenderOutcome::First
        } else {
            RenderOutcome::Moved
        };

        self.route.push(position);

        match outcome {
            RenderOutcome::First => map.fly_to(
                position,
                self.settings.gps_zoom,
                self.settings.first_fix_transition,
            ),
            _ => map.pan_to(position, self.settings.follow_transition),
        }

        match map.gps_marker().map(|m| m.position) {
            Some(from) if !self.settings.marker_animation.is_zero() => {
                self.animator
                    .start(from, position, now, self.settings.marker_animation);
            }
            _ => {
                self.animator.cancel();
                map.place_gps_marker(position);
            }
        }

        map.place_accuracy_circle(position, fix.accuracy);
        map.set_route(self.route.to_vec());

        self.status = Some(StatusDisplay::new(position, clock));
        self.last_rendered = Some(position);
        self.accepted += 1;

        debug!(
            "rendered fix {:.6},{:.6} ±{:.0}m ({}/{} route points)",
            position.lat,
            position.lng,
            fix.accuracy,
            self.route.len(),
            self.route.capacity()
        );
        outcome
    }

    /// Advance the marker animation by one frame.
    ///
    /// Returns `true` if the marker moved.
    pub fn frame(&mut self, map: &mut MapView, now: Instant) -> bool {
        match self.animator.frame(now) {
            Some(position) => {
                map.place_gps_marker(position);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.animator.is_running()
    }

    #[must_use]
    pub fn route(&self) -> &RouteTrail {
        &self.route
    }

    #[must_use]
    pub fn status(&self) -> Option<&StatusDisplay> {
        self.status.as_ref()
    }

    #[must_use]
    pub fn animations_cancelled(&self) -> u64 {
        self.animator.cancelled()
    }

    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    #[must_use]
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}
