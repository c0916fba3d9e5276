//! IP address lookup.
//!
//! Validates user input, asks the backend where an address is, and places
//! the result as the IP marker. Independent of GPS tracking: it never
//! touches the GPS marker, accuracy circle or route.

use tracing::{info, warn};

use crate::client::Backend;
use crate::errors::GeotrailError;
use crate::map::MapView;
use crate::models::{GENERIC_LOOKUP_ERROR, IpLocation, IpLookupResponse};
use crate::notice::{IP_REQUIRED, Notice};

/// Trim user input; blank input is refused before any network call.
///
/// # Errors
///
/// Returns an alert notice when the input is empty.
pub fn normalize_input(raw: &str) -> Result<String, Notice> {
    let ip = raw.trim();
    if ip.is_empty() {
        return Err(Notice::alert(IP_REQUIRED));
    }
    Ok(ip.to_string())
}

/// Turn a backend reply (or transport failure) into a location or a notice.
///
/// # Errors
///
/// Returns an error notice carrying the backend's message, or a generic
/// message for transport failures.
pub fn interpret(result: Result<IpLookupResponse, GeotrailError>) -> Result<IpLocation, Notice> {
    match result {
        Ok(response) => response.into_location().map_err(Notice::error),
        Err(e) => {
            warn!("IP lookup request failed: {e}");
            Err(Notice::error(GENERIC_LOOKUP_ERROR))
        }
    }
}

/// Show `location` as the single IP marker and center on it.
pub fn show_on_map(map: &mut MapView, location: &IpLocation, zoom: u8) {
    map.set_view(location.position, zoom);
    map.replace_ip_marker(location);
    info!(
        "IP located at {}, {} ({}, {})",
        location.position.lat,
        location.position.lng,
        location.city.as_deref().unwrap_or("-"),
        location.country.as_deref().unwrap_or("-")
    );
}

/// Validate, look up and interpret in one step.
///
/// # Errors
///
/// Returns the notice to show when the input is blank or the lookup fails.
pub async fn lookup(backend: &dyn Backend, raw: &str) -> Result<IpLocation, Notice> {
    let ip = normalize_input(raw)?;
    interpret(backend.track_ip(&ip).await)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::geo::LatLng;
    use crate::notice::NoticeLevel;
    use crate::testing::FakeBackend;

    #[tokio::test]
    async fn test_blank_input_never_calls_backend() {
        let backend = FakeBackend::replying(json!({"success": true, "lat": 1, "lng": 2}));
        for raw in ["", "   ", "\t\n"] {
            let notice = lookup(&backend, raw).await.unwrap_err();
            assert_eq!(notice.level, NoticeLevel::Alert);
            assert_eq!(notice.message, IP_REQUIRED);
        }
        assert_eq!(backend.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_input_is_trimmed() {
        let backend = FakeBackend::replying(json!({"success": true, "lat": 1, "lng": 2}));
        lookup(&backend, "  8.8.8.8 ").await.unwrap();
        assert_eq!(backend.lookups.lock().unwrap().as_slice(), ["8.8.8.8"]);
    }

    #[tokio::test]
    async fn test_success_places_single_marker() {
        let backend = FakeBackend::replying(
            json!({"success": true, "lat": 1, "lng": 2, "city": "X", "country": "Y"}),
        );
        let mut map = MapView::default();
        let previous = IpLocation {
            position: LatLng::new(40.0, 40.0),
            city: None,
            country: None,
        };
        show_on_map(&mut map, &previous, 10);

        let location = lookup(&backend, "1.2.3.4").await.unwrap();
        show_on_map(&mut map, &location, 10);

        let marker = map.ip_marker().unwrap();
        assert_eq!(marker.position, LatLng::new(1.0, 2.0));
        assert!(marker.popup.contains("X, Y"));
        assert_eq!(map.viewport().center, LatLng::new(1.0, 2.0));
        assert_eq!(map.viewport().zoom, 10);
        assert!(map.gps_marker().is_none());
        assert!(map.route_line().is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_ip_marker() {
        let mut map = MapView::default();
        let earlier: IpLookupResponse =
            serde_json::from_value(json!({"success": true, "lat": 1.0, "lng": 2.0})).unwrap();
        show_on_map(&mut map, &interpret(Ok(earlier)).unwrap(), 10);
        let revision = map.revision();

        let backend = FakeBackend::replying(json!({"success": false, "error": "bad ip"}));
        match lookup(&backend, "999.1.1.1").await {
            Ok(location) => show_on_map(&mut map, &location, 10),
            Err(notice) => assert_eq!(notice, Notice::error("bad ip")),
        }

        assert_eq!(map.revision(), revision);
        assert_eq!(map.ip_marker().unwrap().position, LatLng::new(1.0, 2.0));
    }

    #[tokio::test]
    async fn test_transport_error_is_generic() {
        let backend = FakeBackend::default();
        let notice = lookup(&backend, "1.1.1.1").await.unwrap_err();
        assert_eq!(notice.message, GENERIC_LOOKUP_ERROR);
        assert_eq!(backend.lookup_count(), 1);
    }
}
