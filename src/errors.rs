//! Error types for geotrail.
//!
//! Uses `thiserror` for library-style error definitions.

use thiserror::Error;

use crate::geolocation::GeolocationError;

/// Errors that can occur in geotrail operations.
#[derive(Error, Debug)]
pub enum GeotrailError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Backend returned an error status without a usable body
    #[error("backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// Invalid response structure
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Position could not be obtained
    #[error("geolocation failed: {0}")]
    Geolocation(#[from] GeolocationError),

    /// Reading a replay source failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
