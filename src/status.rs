//! Status display: latest position and the wall-clock time it arrived.

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::geo::LatLng;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusDisplay {
    pub latitude: f64,
    pub longitude: f64,
    pub updated_at: DateTime<Local>,
    /// `updated_at` as `HH:MM:SS`
    pub last_update: String,
}

impl StatusDisplay {
    #[must_use]
    pub fn new(position: LatLng, updated_at: DateTime<Local>) -> Self {
        Self {
            latitude: position.lat,
            longitude: position.lng,
            updated_at,
            last_update: updated_at.format("%H:%M:%S").to_string(),
        }
    }
}
