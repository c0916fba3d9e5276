//! Marker interpolation between consecutive fixes.
//!
//! At most one interpolation runs at a time. Starting a new one cancels the
//! previous, and the new one begins from wherever the marker currently is.

use std::time::Duration;

use tokio::time::Instant;

use crate::geo::LatLng;

/// Linear lat/lng interpolation over a fixed duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerAnimation {
    from: LatLng,
    to: LatLng,
    started: Instant,
    duration: Duration,
}

impl MarkerAnimation {
    #[must_use]
    pub fn new(from: LatLng, to: LatLng, started: Instant, duration: Duration) -> Self {
        Self {
            from,
            to,
            started,
            duration,
        }
    }

    /// Fraction completed at `now`, in `[0, 1]`.
    #[must_use]
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }

    #[must_use]
    pub fn position_at(&self, now: Instant) -> LatLng {
        self.from.lerp(self.to, self.progress(now))
    }

    #[must_use]
    pub fn target(&self) -> LatLng {
        self.to
    }
}

/// Owner of the single in-progress marker animation.
#[derive(Debug, Default)]
pub struct Animator {
    current: Option<MarkerAnimation>,
    cancelled: u64,
}

impl Animator {
    /// Begin animating from `from` to `to`, cancelling any running animation.
    pub fn start(&mut self, from: LatLng, to: LatLng, now: Instant, duration: Duration) {
        if let Some(previous) = self.current.take() {
            self.cancelled += 1;
            tracing::debug!(
                "cancelled marker animation towards {:.6},{:.6}",
                previous.target().lat,
                previous.target().lng
            );
        }
        self.current = Some(MarkerAnimation::new(from, to, now, duration));
    }

    /// Advance one frame.
    ///
    /// Returns the marker position for this frame, or `None` when idle.
    /// The animation ends itself on the frame that reaches the target.
    pub fn frame(&mut self, now: Instant) -> Option<LatLng> {
        let animation = self.current?;
        let position = animation.position_at(now);
        if animation.progress(now) >= 1.0 {
            self.current = None;
        }
        Some(position)
    }

    pub fn cancel(&mut self) {
        if self.current.take().is_some() {
            self.cancelled += 1;
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    /// Animations replaced or cancelled before completing.
    #[must_use]
    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_interpolate_then_finish() {
        let t0 = Instant::now();
        let mut animator = Animator::default();
        let a = LatLng::new(0.0, 0.0);
        let b = LatLng::new(1.0, 2.0);
        animator.start(a, b, t0, Duration::from_millis(1000));

        let mid = animator.frame(t0 + Duration::from_millis(500)).unwrap();
        assert!((mid.lat - 0.5).abs() < 1e-9);
        assert!((mid.lng - 1.0).abs() < 1e-9);
        assert!(animator.is_running());

        assert_eq!(animator.frame(t0 + Duration::from_millis(1200)), Some(b));
        assert!(!animator.is_running());
        assert_eq!(animator.frame(t0 + Duration::from_millis(1300)), None);
    }

    #[test]
    fn test_new_animation_replaces_running_one() {
        let t0 = Instant::now();
        let mut animator = Animator::default();
        animator.start(
            LatLng::new(0.0, 0.0),
            LatLng::new(1.0, 0.0),
            t0,
            Duration::from_millis(1000),
        );

        let t1 = t0 + Duration::from_millis(400);
        let current = animator.frame(t1).unwrap();
        animator.start(current, LatLng::new(0.0, 5.0), t1, Duration::from_millis(1000));

        assert_eq!(animator.cancelled(), 1);
        // Only the new animation drives the marker
        assert_eq!(
            animator.frame(t1 + Duration::from_millis(1000)),
            Some(LatLng::new(0.0, 5.0))
        );
        assert!(!animator.is_running());
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let t0 = Instant::now();
        let mut animator = Animator::default();
        let b = LatLng::new(3.0, 3.0);
        animator.start(LatLng::new(0.0, 0.0), b, t0, Duration::ZERO);
        assert_eq!(animator.frame(t0), Some(b));
        assert!(!animator.is_running());
    }
}
