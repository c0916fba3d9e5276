//! Bounded route trail.
//!
//! Fixed-capacity FIFO of the positions accepted this session.
//! Follows NASA Power of 10: bounded resources regardless of session length.

use std::collections::VecDeque;

use crate::geo::LatLng;

/// Points reserved up front; larger trails grow on demand.
const PREALLOCATED_POINTS: usize = 500;

/// Ordered route points, oldest at the front.
#[derive(Debug, Clone)]
pub struct RouteTrail {
    points: VecDeque<LatLng>,
    capacity: usize,
    /// Points dropped from the front since the session began
    evicted: u64,
}

impl RouteTrail {
    /// Create a trail holding at most `capacity` points.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be positive");

        Self {
            points: VecDeque::with_capacity(capacity.min(PREALLOCATED_POINTS)),
            capacity,
            evicted: 0,
        }
    }

    /// Append a point, evicting the oldest if at capacity.
    pub fn push(&mut self, point: LatLng) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
            self.evicted += 1;
        }

        self.points.push_back(point);

        // NASA Power of 10: assert postcondition
        debug_assert!(self.points.len() <= self.capacity);
    }

    /// Points in order, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<LatLng> {
        self.points.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(i: u32) -> LatLng {
        LatLng::new(f64::from(i), 0.0)
    }

    #[test]
    fn test_preserves_order() {
        let mut trail = RouteTrail::new(10);
        trail.push(p(1));
        trail.push(p(2));
        trail.push(p(3));

        assert_eq!(trail.to_vec(), vec![p(1), p(2), p(3)]);
    }

    #[test]
    fn test_bounded_capacity() {
        let mut trail = RouteTrail::new(3);
        for i in 1..=3 {
            trail.push(p(i));
        }
        assert_eq!(trail.len(), 3);

        // Fourth point evicts oldest
        trail.push(p(4));
        assert_eq!(trail.len(), 3);
        assert_eq!(trail.to_vec(), vec![p(2), p(3), p(4)]);
        assert_eq!(trail.evicted(), 1);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut trail = RouteTrail::new(5);
        for i in 0..100 {
            trail.push(p(i % 90));
            assert!(trail.len() <= trail.capacity());
        }
        assert_eq!(trail.evicted(), 95);
    }
}
