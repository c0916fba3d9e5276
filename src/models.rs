//! Data models for geolocation fixes and backend payloads.
//!
//! Wire shapes match the tracking backend's `/location` and `/track-ip`
//! endpoints.

use serde::{Deserialize, Serialize};

use crate::errors::GeotrailError;
use crate::geo::LatLng;
use crate::session::SessionId;

/// Message shown when the backend gives no reason for a failed lookup.
pub const GENERIC_LOOKUP_ERROR: &str = "IP lookup failed";

/// One reported device position with its accuracy radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    /// Latitude (degrees)
    pub lat: f64,
    /// Longitude (degrees)
    pub lng: f64,
    /// Accuracy radius in meters
    pub accuracy: f64,
}

impl Fix {
    #[must_use]
    pub const fn new(lat: f64, lng: f64, accuracy: f64) -> Self {
        Self { lat, lng, accuracy }
    }

    #[must_use]
    pub const fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Validate coordinates and accuracy.
    pub fn validate(&self) -> Result<(), GeotrailError> {
        if !self.position().is_valid() {
            return Err(GeotrailError::InvalidResponse(format!(
                "fix out of range: {}, {}",
                self.lat, self.lng
            )));
        }
        if !self.accuracy.is_finite() || self.accuracy < 0.0 {
            return Err(GeotrailError::InvalidResponse(format!(
                "invalid accuracy: {}",
                self.accuracy
            )));
        }
        Ok(())
    }
}

/// Body of `POST /location`.
#[derive(Debug, Clone, Serialize)]
pub struct LocationSample {
    pub session_id: SessionId,
    pub lat: f64,
    pub lng: f64,
    pub accuracy: f64,
}

impl LocationSample {
    #[must_use]
    pub fn new(session_id: SessionId, fix: &Fix) -> Self {
        Self {
            session_id,
            lat: fix.lat,
            lng: fix.lng,
            accuracy: fix.accuracy,
        }
    }
}

/// Body of `POST /track-ip`.
#[derive(Debug, Clone, Serialize)]
pub struct IpLookupRequest {
    pub ip: String,
}

/// Response of `POST /track-ip`.
///
/// Coordinates and place names are only present when `success` is true.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpLookupResponse {
    pub success: bool,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub error: Option<String>,
}

impl IpLookupResponse {
    /// Interpret the response.
    ///
    /// Returns the located address, or the message to show the user.
    pub fn into_location(self) -> Result<IpLocation, String> {
        if !self.success {
            return Err(self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| GENERIC_LOOKUP_ERROR.to_string()));
        }

        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) if LatLng::new(lat, lng).is_valid() => Ok(IpLocation {
                position: LatLng::new(lat, lng),
                city: self.city,
                country: self.country,
            }),
            _ => Err(GENERIC_LOOKUP_ERROR.to_string()),
        }
    }
}

/// A successfully located IP address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IpLocation {
    pub position: LatLng,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl IpLocation {
    /// Popup text for the IP marker; missing names render as `-`.
    #[must_use]
    pub fn popup_text(&self) -> String {
        format!(
            "IP Location\n{}, {}\nLat: {}\nLng: {}",
            self.city.as_deref().unwrap_or("-"),
            self.country.as_deref().unwrap_or("-"),
            self.position.lat,
            self.position.lng
        )
    }
}
