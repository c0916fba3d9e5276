//! Map scene: viewport, tile layers and overlay singletons.
//!
//! Mirrors what the tile viewer shows. Each overlay is an optional owned
//! value: created on first data, mutated in place afterwards.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use crate::geo::LatLng;
use crate::models::IpLocation;
use crate::status::StatusDisplay;

/// Title and popup of the GPS marker.
pub const GPS_MARKER_TITLE: &str = "GPS Position";

/// Tile base layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseLayer {
    #[default]
    OpenStreetMap,
    OpenTopoMap,
    EsriWorldImagery,
}

impl BaseLayer {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "osm",
            Self::OpenTopoMap => "topo",
            Self::EsriWorldImagery => "satellite",
        }
    }

    #[must_use]
    pub const fn tile_url(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png",
            Self::OpenTopoMap => "https://{s}.tile.opentopomap.org/{z}/{x}/{y}.png",
            Self::EsriWorldImagery => {
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}"
            }
        }
    }

    #[must_use]
    pub const fn attribution(self) -> &'static str {
        match self {
            Self::OpenStreetMap => "© OpenStreetMap contributors",
            Self::OpenTopoMap => "© OpenStreetMap contributors, SRTM | © OpenTopoMap",
            Self::EsriWorldImagery => "Tiles © Esri",
        }
    }
}

impl std::str::FromStr for BaseLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "osm" | "openstreetmap" => Ok(Self::OpenStreetMap),
            "topo" | "opentopomap" => Ok(Self::OpenTopoMap),
            "satellite" | "esri" => Ok(Self::EsriWorldImagery),
            _ => Err(format!("unknown base layer: {s} (expected: osm, topo, satellite)")),
        }
    }
}

/// Optional overlay layers.
///
/// `Hazard` and `AirQuality` are placeholders with no data source yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayLayer {
    Route,
    Hazard,
    AirQuality,
}

impl OverlayLayer {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Route => "route",
            Self::Hazard => "hazard",
            Self::AirQuality => "air_quality",
        }
    }
}

impl std::str::FromStr for OverlayLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "route" => Ok(Self::Route),
            "hazard" => Ok(Self::Hazard),
            "air_quality" | "air-quality" | "aqi" => Ok(Self::AirQuality),
            _ => Err(format!("unknown overlay: {s} (expected: route, hazard, air_quality)")),
        }
    }
}

/// Current map center and zoom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
}

/// How the viewport last moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// Jump without animation
    Set,
    /// Animated recenter and zoom
    Fly,
    /// Animated recenter keeping the zoom
    Pan,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transition {
    pub kind: TransitionKind,
    pub target: Viewport,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Stroke and fill for vector overlays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PathStyle {
    pub color: &'static str,
    pub weight: Option<f64>,
    pub fill_color: Option<&'static str>,
    pub fill_opacity: Option<f64>,
}

const ACCURACY_STYLE: PathStyle = PathStyle {
    color: "blue",
    weight: None,
    fill_color: None,
    fill_opacity: Some(0.15),
};

const ROUTE_STYLE: PathStyle = PathStyle {
    color: "blue",
    weight: Some(4.0),
    fill_color: None,
    fill_opacity: None,
};

const IP_MARKER_STYLE: PathStyle = PathStyle {
    color: "red",
    weight: None,
    fill_color: Some("orange"),
    fill_opacity: Some(0.85),
};

/// Radius of the IP circle marker in pixels.
const IP_MARKER_RADIUS_PX: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub position: LatLng,
    pub title: &'static str,
    pub popup: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Circle {
    pub center: LatLng,
    /// Radius in meters
    pub radius: f64,
    pub style: PathStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Polyline {
    pub points: Vec<LatLng>,
    pub style: PathStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircleMarker {
    pub position: LatLng,
    /// Radius in pixels
    pub radius: f64,
    pub style: PathStyle,
    pub popup: String,
    pub popup_open: bool,
}

/// The map scene.
#[derive(Debug, Clone)]
pub struct MapView {
    viewport: Viewport,
    last_transition: Option<Transition>,
    base_layer: BaseLayer,
    visible_overlays: BTreeSet<OverlayLayer>,
    gps_marker: Option<Marker>,
    accuracy_circle: Option<Circle>,
    route_line: Option<Polyline>,
    ip_marker: Option<CircleMarker>,
    /// Bumped on every overlay or viewport change
    revision: u64,
    /// Overlay objects created (replacements count again)
    created: u64,
}

impl MapView {
    /// A world view centered on `center`; the route overlay starts visible.
    #[must_use]
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            viewport: Viewport { center, zoom },
            last_transition: None,
            base_layer: BaseLayer::default(),
            visible_overlays: BTreeSet::from([OverlayLayer::Route]),
            gps_marker: None,
            accuracy_circle: None,
            route_line: None,
            ip_marker: None,
            revision: 0,
            created: 0,
        }
    }

    // ------------------------------------------------------------------
    // Viewport
    // ------------------------------------------------------------------

    pub fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.move_viewport(TransitionKind::Set, center, zoom, Duration::ZERO);
    }

    pub fn fly_to(&mut self, center: LatLng, zoom: u8, duration: Duration) {
        self.move_viewport(TransitionKind::Fly, center, zoom, duration);
    }

    /// Recenter keeping the current zoom.
    pub fn pan_to(&mut self, center: LatLng, duration: Duration) {
        let zoom = self.viewport.zoom;
        self.move_viewport(TransitionKind::Pan, center, zoom, duration);
    }

    fn move_viewport(&mut self, kind: TransitionKind, center: LatLng, zoom: u8, duration: Duration) {
        let target = Viewport { center, zoom };
        self.viewport = target;
        self.last_transition = Some(Transition {
            kind,
            target,
            duration,
        });
        self.revision += 1;
    }

    /// Zoom changed by the user (scroll, buttons).
    pub fn set_zoom(&mut self, zoom: u8) {
        self.viewport.zoom = zoom;
        self.revision += 1;
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn last_transition(&self) -> Option<Transition> {
        self.last_transition
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    pub fn set_base_layer(&mut self, layer: BaseLayer) {
        if self.base_layer != layer {
            self.base_layer = layer;
            self.revision += 1;
        }
    }

    /// Flip an overlay's visibility; returns the new state.
    pub fn toggle_overlay(&mut self, layer: OverlayLayer) -> bool {
        let visible = if self.visible_overlays.remove(&layer) {
            false
        } else {
            self.visible_overlays.insert(layer);
            true
        };
        self.revision += 1;
        visible
    }

    // ------------------------------------------------------------------
    // GPS overlays
    // ------------------------------------------------------------------

    /// Create the GPS marker at `position`, or move the existing one.
    pub fn place_gps_marker(&mut self, position: LatLng) {
        match &mut self.gps_marker {
            Some(marker) => marker.position = position,
            None => {
                self.gps_marker = Some(Marker {
                    position,
                    title: GPS_MARKER_TITLE,
                    popup: format!("📍 {GPS_MARKER_TITLE}"),
                });
                self.created += 1;
            }
        }
        self.revision += 1;
    }

    /// Create or update the accuracy circle.
    pub fn place_accuracy_circle(&mut self, center: LatLng, radius: f64) {
        match &mut self.accuracy_circle {
            Some(circle) => {
                circle.center = center;
                circle.radius = radius;
            }
            None => {
                self.accuracy_circle = Some(Circle {
                    center,
                    radius,
                    style: ACCURACY_STYLE,
                });
                self.created += 1;
            }
        }
        self.revision += 1;
    }

    /// Create the route polyline or replace its points.
    pub fn set_route(&mut self, points: Vec<LatLng>) {
        match &mut self.route_line {
            Some(line) => line.points = points,
            None => {
                self.route_line = Some(Polyline {
                    points,
                    style: ROUTE_STYLE,
                });
                self.created += 1;
            }
        }
        self.revision += 1;
    }

    #[must_use]
    pub fn gps_marker(&self) -> Option<&Marker> {
        self.gps_marker.as_ref()
    }

    #[must_use]
    pub fn accuracy_circle(&self) -> Option<&Circle> {
        self.accuracy_circle.as_ref()
    }

    #[must_use]
    pub fn route_line(&self) -> Option<&Polyline> {
        self.route_line.as_ref()
    }

    // ------------------------------------------------------------------
    // IP marker
    // ------------------------------------------------------------------

    /// Remove any previous IP marker and show `location` with its popup open.
    pub fn replace_ip_marker(&mut self, location: &IpLocation) {
        if self.ip_marker.take().is_some() {
            tracing::debug!("removed previous IP marker");
        }
        self.ip_marker = Some(CircleMarker {
            position: location.position,
            radius: IP_MARKER_RADIUS_PX,
            style: IP_MARKER_STYLE,
            popup: location.popup_text(),
            popup_open: true,
        });
        self.created += 1;
        self.revision += 1;
    }

    #[must_use]
    pub fn ip_marker(&self) -> Option<&CircleMarker> {
        self.ip_marker.as_ref()
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    #[must_use]
    pub fn overlays_created(&self) -> u64 {
        self.created
    }

    /// Serializable copy of the scene for output and the web UI.
    #[must_use]
    pub fn snapshot(&self, status: Option<&StatusDisplay>) -> SceneSnapshot {
        SceneSnapshot {
            revision: self.revision,
            viewport: self.viewport,
            transition: self.last_transition,
            base_layer: BaseLayerView {
                name: self.base_layer.as_str(),
                tile_url: self.base_layer.tile_url(),
                attribution: self.base_layer.attribution(),
            },
            overlays: self.visible_overlays.iter().copied().collect(),
            gps_marker: self.gps_marker.clone(),
            accuracy_circle: self.accuracy_circle.clone(),
            route: self.route_line.clone(),
            ip_marker: self.ip_marker.clone(),
            status: status.cloned(),
        }
    }
}

impl Default for MapView {
    fn default() -> Self {
        Self::new(LatLng::new(0.0, 0.0), 2)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseLayerView {
    pub name: &'static str,
    pub tile_url: &'static str,
    pub attribution: &'static str,
}

/// Point-in-time view of the whole scene.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSnapshot {
    pub revision: u64,
    pub viewport: Viewport,
    pub transition: Option<Transition>,
    pub base_layer: BaseLayerView,
    /// Visible overlay layers
    pub overlays: Vec<OverlayLayer>,
    pub gps_marker: Option<Marker>,
    pub accuracy_circle: Option<Circle>,
    pub route: Option<Polyline>,
    pub ip_marker: Option<CircleMarker>,
    pub status: Option<StatusDisplay>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlays_created_once_then_mutated() {
        let mut map = MapView::default();
        map.place_gps_marker(LatLng::new(1.0, 1.0));
        map.place_accuracy_circle(LatLng::new(1.0, 1.0), 10.0);
        map.set_route(vec![LatLng::new(1.0, 1.0)]);
        assert_eq!(map.overlays_created(), 3);

        map.place_gps_marker(LatLng::new(2.0, 2.0));
        map.place_accuracy_circle(LatLng::new(2.0, 2.0), 4.0);
        map.set_route(vec![LatLng::new(1.0, 1.0), LatLng::new(2.0, 2.0)]);
        assert_eq!(map.overlays_created(), 3);

        assert_eq!(map.gps_marker().unwrap().position, LatLng::new(2.0, 2.0));
        assert!((map.accuracy_circle().unwrap().radius - 4.0).abs() < f64::EPSILON);
        assert_eq!(map.route_line().unwrap().points.len(), 2);
    }

    #[test]
    fn test_pan_keeps_zoom() {
        let mut map = MapView::default();
        map.fly_to(LatLng::new(1.0, 1.0), 16, Duration::from_millis(1500));
        map.set_zoom(13);
        map.pan_to(LatLng::new(1.1, 1.1), Duration::from_millis(500));

        let vp = map.viewport();
        assert_eq!(vp.zoom, 13);
        assert_eq!(vp.center, LatLng::new(1.1, 1.1));
        assert_eq!(map.last_transition().unwrap().kind, TransitionKind::Pan);
    }

    #[test]
    fn test_ip_marker_replaced() {
        let mut map = MapView::default();
        let first = IpLocation {
            position: LatLng::new(5.0, 5.0),
            city: None,
            country: None,
        };
        let second = IpLocation {
            position: LatLng::new(1.0, 2.0),
            city: Some("X".into()),
            country: Some("Y".into()),
        };
        map.replace_ip_marker(&first);
        map.replace_ip_marker(&second);

        let marker = map.ip_marker().unwrap();
        assert_eq!(marker.position, LatLng::new(1.0, 2.0));
        assert!(marker.popup_open);
        assert!(map.gps_marker().is_none());
    }

    #[test]
    fn test_layer_switching() {
        let mut map = MapView::default();
        let initial = map.snapshot(None);
        assert_eq!(initial.base_layer.name, "osm");
        assert_eq!(initial.overlays, vec![OverlayLayer::Route]);

        map.set_base_layer("satellite".parse().unwrap());

        assert!(map.toggle_overlay(OverlayLayer::AirQuality));
        assert!(!map.toggle_overlay(OverlayLayer::Route));
        let snapshot = map.snapshot(None);
        assert_eq!(snapshot.overlays, vec![OverlayLayer::AirQuality]);
        assert_eq!(snapshot.base_layer.name, "satellite");
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut map = MapView::default();
        map.fly_to(LatLng::new(1.0, 2.0), 16, Duration::from_millis(1500));
        let json = serde_json::to_value(map.snapshot(None)).unwrap();
        assert_eq!(json["viewport"]["zoom"], 16);
        assert_eq!(json["transition"]["kind"], "fly");
        assert_eq!(json["transition"]["duration_ms"], 1500);
        assert!(json["gps_marker"].is_null());
    }
}
