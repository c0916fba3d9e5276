//! Output formatters for session updates.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use crate::app::{AppUpdate, UpdateReason};
use crate::map::SceneSnapshot;
use crate::notice::{Notice, NoticeLevel};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[91m";
const YELLOW: &str = "\x1b[93m";
const CYAN: &str = "\x1b[96m";
const GREEN: &str = "\x1b[92m";

// Icons for visual richness
const ICON_GPS: &str = "📍";
const ICON_IP: &str = "🌐";
const ICON_MAP: &str = "🗺️";
const ICON_ALERT: &str = "⚠️";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// Pretty-printed JSON per update
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

fn write_fix<W: Write>(writer: &mut W, scene: &SceneSnapshot) -> io::Result<()> {
    let Some(status) = &scene.status else {
        return Ok(());
    };
    let accuracy = scene
        .accuracy_circle
        .as_ref()
        .map(|c| format!("±{:.0}m", c.radius))
        .unwrap_or_else(|| "±?".into());
    let points = scene.route.as_ref().map_or(0, |r| r.points.len());

    writeln!(
        writer,
        "{ICON_GPS} {CYAN}{BOLD}{:>11.6}{RESET}, {CYAN}{BOLD}{:>11.6}{RESET} │ \
         {DIM}{accuracy:>6}{RESET} │ \
         {points:>4} pts │ \
         {}",
        status.latitude, status.longitude, status.last_update
    )
}

fn write_ip<W: Write>(writer: &mut W, scene: &SceneSnapshot) -> io::Result<()> {
    let Some(marker) = &scene.ip_marker else {
        return Ok(());
    };
    // Popup lines: heading, "city, country", "Lat: ..", "Lng: .."
    let mut lines = marker.popup.lines().skip(1);
    let place = lines.next().unwrap_or("-, -");

    writeln!(
        writer,
        "{ICON_IP} {YELLOW}{BOLD}IP Location{RESET} │ {place} │ \
         {DIM}{:.4}, {:.4}{RESET} │ zoom {}",
        marker.position.lat, marker.position.lng, scene.viewport.zoom
    )
}

fn write_layers<W: Write>(writer: &mut W, scene: &SceneSnapshot) -> io::Result<()> {
    let overlays: Vec<&str> = scene.overlays.iter().map(|o| o.as_str()).collect();
    writeln!(
        writer,
        "{ICON_MAP} base {BOLD}{}{RESET} │ overlays: {}",
        scene.base_layer.name,
        if overlays.is_empty() {
            "none".to_string()
        } else {
            overlays.join(", ")
        }
    )
}

fn write_notice<W: Write>(writer: &mut W, notice: &Notice) -> io::Result<()> {
    let color = match notice.level {
        NoticeLevel::Alert => YELLOW,
        NoticeLevel::Error => RED,
    };
    writeln!(writer, "{ICON_ALERT} {color}{BOLD}{}{RESET}", notice.message)
}

/// Write one update in human-readable form. Animation frames are not printed.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(writer: &mut W, update: &AppUpdate) -> io::Result<()> {
    match update {
        AppUpdate::Scene { reason, scene } => match reason {
            UpdateReason::Fix => write_fix(writer, scene),
            UpdateReason::IpLookup => write_ip(writer, scene),
            UpdateReason::Layers => write_layers(writer, scene),
            UpdateReason::Frame => Ok(()),
        },
        AppUpdate::Notice(notice) => write_notice(writer, notice),
        AppUpdate::Tracking { active: true } => {
            writeln!(writer, "{GREEN}▶ tracking started{RESET}")
        }
        AppUpdate::Tracking { active: false } => {
            writeln!(writer, "{DIM}■ tracking stopped{RESET}")
        }
    }
}

/// Write one update as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(writer: &mut W, update: &AppUpdate) -> io::Result<()> {
    let json = serde_json::to_string_pretty(update)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write one update as a single line of JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(writer: &mut W, update: &AppUpdate) -> io::Result<()> {
    let json =
        serde_json::to_string(update).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{json}")
}

/// Write an update in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_update<W: Write>(writer: &mut W, update: &AppUpdate, format: Format) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, update),
        Format::Json => write_json(writer, update),
        Format::Ndjson => write_ndjson(writer, update),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::geo::LatLng;
    use crate::map::MapView;
    use crate::models::IpLocation;
    use crate::status::StatusDisplay;

    fn render(update: &AppUpdate, format: Format) -> String {
        let mut buf = Vec::new();
        write_update(&mut buf, update, format).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("human".parse::<Format>().unwrap(), Format::Human);
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("ndjson".parse::<Format>().unwrap(), Format::Ndjson);
        assert!("invalid".parse::<Format>().is_err());
    }

    #[test]
    fn test_human_fix_line() {
        let mut map = MapView::default();
        let position = LatLng::new(-6.175_392, 106.827_153);
        map.place_accuracy_circle(position, 12.0);
        map.set_route(vec![position]);
        let at = Local.with_ymd_and_hms(2026, 1, 1, 8, 30, 0).unwrap();
        let status = StatusDisplay::new(position, at);

        let update = AppUpdate::Scene {
            reason: UpdateReason::Fix,
            scene: Box::new(map.snapshot(Some(&status))),
        };
        let out = render(&update, Format::Human);
        assert!(out.contains("-6.175392"));
        assert!(out.contains("±12m"));
        assert!(out.contains("08:30:00"));
    }

    #[test]
    fn test_frames_are_silent_for_humans() {
        let update = AppUpdate::Scene {
            reason: UpdateReason::Frame,
            scene: Box::new(MapView::default().snapshot(None)),
        };
        assert!(render(&update, Format::Human).is_empty());
        assert!(!render(&update, Format::Ndjson).is_empty());
    }

    #[test]
    fn test_human_ip_line() {
        let mut map = MapView::default();
        map.replace_ip_marker(&IpLocation {
            position: LatLng::new(1.0, 2.0),
            city: Some("Bandung".into()),
            country: Some("Indonesia".into()),
        });
        let update = AppUpdate::Scene {
            reason: UpdateReason::IpLookup,
            scene: Box::new(map.snapshot(None)),
        };
        assert!(render(&update, Format::Human).contains("Bandung, Indonesia"));
    }

    #[test]
    fn test_ndjson_is_tagged() {
        let out = render(&AppUpdate::Notice(Notice::error("bad ip")), Format::Ndjson);
        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["type"], "notice");
        assert_eq!(value["message"], "bad ip");
        assert_eq!(value["level"], "error");
        assert_eq!(out.lines().count(), 1);
    }
}
