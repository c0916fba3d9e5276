//! Web server for the geotrail map UI.
//!
//! Provides a live tracking map using:
//! - Axum for HTTP server
//! - SSE (Server-Sent Events) for scene updates and notices
//! - Leaflet for the tile map

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{
        Html, IntoResponse,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::app::{AppHandle, AppUpdate, TrackerApp};
use crate::client::Backend;
use crate::config::TrackerConfig;
use crate::geolocation::Geolocator;
use crate::map::{BaseLayer, OverlayLayer};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub tracker: TrackerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            tracker: TrackerConfig::default(),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the tracking session
    app: AppHandle,
}

/// Create the Axum router with all routes.
pub fn create_router(app: AppHandle) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler))
        .route("/scene", get(scene_handler))
        .route("/tracking/start", post(start_tracking_handler))
        .route("/tracking/stop", post(stop_tracking_handler))
        .route("/tracking/status", get(tracking_status_handler))
        .route("/ip", post(ip_lookup_handler))
        .route("/layers/base/{name}", post(base_layer_handler))
        .route("/layers/overlay/{name}", post(overlay_handler))
        .route("/view/zoom/{level}", post(zoom_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { app })
}

/// Start the web server.
pub async fn run_server(
    config: ServerConfig,
    geolocator: Arc<dyn Geolocator>,
    backend: Arc<dyn Backend>,
) -> anyhow::Result<()> {
    let (session, app) = TrackerApp::new(config.tracker.clone(), geolocator, backend);
    let session = tokio::spawn(session.run());

    let router = create_router(app.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("📍 geotrail UI starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    app.shutdown();
    session.await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the HTML UI.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// SSE stream handler for scene updates.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.app.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(update) => to_sse_event(&update).map(Ok),
        // Lagged subscribers skip ahead; the next scene is complete anyway
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

fn to_sse_event(update: &AppUpdate) -> Option<Event> {
    let name = match update {
        AppUpdate::Scene { .. } => "scene",
        AppUpdate::Notice(_) => "notice",
        AppUpdate::Tracking { .. } => "tracking",
    };
    match serde_json::to_string(update) {
        Ok(json) => Some(Event::default().event(name).data(json)),
        Err(e) => {
            tracing::warn!("failed to encode update: {}", e);
            None
        }
    }
}

/// Current scene for initial page load.
async fn scene_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.app.snapshot().await {
        Some(scene) => Json(scene).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Start tracking. The outcome arrives on the stream.
async fn start_tracking_handler(State(state): State<AppState>) -> StatusCode {
    state.app.start_tracking();
    tracing::info!("tracking start requested via UI");
    StatusCode::ACCEPTED
}

/// Stop tracking.
async fn stop_tracking_handler(State(state): State<AppState>) -> StatusCode {
    state.app.stop_tracking();
    tracing::info!("tracking stop requested via UI");
    StatusCode::ACCEPTED
}

/// Tracking status handler.
async fn tracking_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.app.is_tracking().await {
        Some(active) => Json(serde_json::json!({
            "active": active,
            "session_id": state.app.session_id(),
        }))
        .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct IpForm {
    #[serde(default)]
    ip: String,
}

/// IP lookup form. Blank input is answered with a notice on the stream.
async fn ip_lookup_handler(State(state): State<AppState>, Form(form): Form<IpForm>) -> StatusCode {
    state.app.lookup_ip(form.ip);
    StatusCode::ACCEPTED
}

async fn base_layer_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let layer: BaseLayer = name.parse().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    state.app.set_base_layer(layer);
    Ok(StatusCode::ACCEPTED)
}

async fn overlay_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    let layer: OverlayLayer = name.parse().map_err(|e| (StatusCode::BAD_REQUEST, e))?;
    state.app.toggle_overlay(layer);
    Ok(StatusCode::ACCEPTED)
}

/// The user zoomed the map.
async fn zoom_handler(State(state): State<AppState>, Path(level): Path<u8>) -> StatusCode {
    state.app.set_zoom(level);
    StatusCode::ACCEPTED
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>geotrail — Live Tracking</title>

    <!-- Leaflet -->
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>

    <style>
        :root {
            --font: -apple-system, BlinkMacSystemFont, 'Inter', sans-serif;
            --bg: #0f0f12;
            --panel: #1c1c1f;
            --border: #27272a;
            --text: #fafafa;
            --muted: #a1a1aa;
            --accent: #818cf8;
            --success: #10b981;
            --danger: #ef4444;
        }
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: var(--font); background: var(--bg); color: var(--text); height: 100vh; display: flex; flex-direction: column; }
        header { display: flex; gap: 12px; align-items: center; padding: 10px 16px; border-bottom: 1px solid var(--border); flex-wrap: wrap; }
        header h1 { font-size: 16px; font-weight: 600; margin-right: auto; }
        button, select, input { font: inherit; background: var(--panel); color: var(--text); border: 1px solid var(--border); border-radius: 6px; padding: 6px 10px; }
        button:hover { border-color: var(--accent); cursor: pointer; }
        #map { flex: 1; }
        #status { display: flex; gap: 16px; padding: 8px 16px; font-size: 13px; color: var(--muted); border-top: 1px solid var(--border); font-variant-numeric: tabular-nums; }
        .status-pill { display: inline-flex; align-items: center; gap: 6px; font-size: 13px; }
        .status-dot { width: 8px; height: 8px; border-radius: 50%; background: var(--muted); }
        .status-pill.live .status-dot { background: var(--success); }
        label { font-size: 13px; color: var(--muted); display: inline-flex; gap: 4px; align-items: center; }
    </style>
</head>
<body>
    <header>
        <h1>📍 geotrail</h1>
        <span id="tracking" class="status-pill"><span class="status-dot"></span><span>Stopped</span></span>
        <button onclick="post('/tracking/start')">Start</button>
        <button onclick="post('/tracking/stop')">Stop</button>
        <select id="base" onchange="post('/layers/base/' + this.value)">
            <option value="osm">OpenStreetMap</option>
            <option value="topo">OpenTopoMap</option>
            <option value="satellite">Satellite</option>
        </select>
        <label><input type="checkbox" data-overlay="route" checked> Route</label>
        <label><input type="checkbox" data-overlay="hazard"> Hazard</label>
        <label><input type="checkbox" data-overlay="air_quality"> Air quality</label>
        <form id="ip-form">
            <input id="ip" name="ip" placeholder="IP address">
            <button type="submit">Track IP</button>
        </form>
    </header>
    <div id="map"></div>
    <div id="status">
        <span>Lat: <b id="lat">-</b></span>
        <span>Lng: <b id="lng">-</b></span>
        <span>Updated: <b id="updated">-</b></span>
    </div>

<script>
    const map = L.map("map").setView([0, 0], 2);
    let base = null, baseName = null;
    let gpsMarker = null, accuracyCircle = null, routeLine = null, ipMarker = null, ipKey = null;

    function post(url, body) {
        return fetch(url, { method: "POST", body });
    }

    map.on("zoomend", () => post("/view/zoom/" + map.getZoom()));

    document.querySelectorAll("[data-overlay]").forEach((box) => {
        box.addEventListener("change", () => post("/layers/overlay/" + box.dataset.overlay));
    });

    document.getElementById("ip-form").addEventListener("submit", (e) => {
        e.preventDefault();
        post("/ip", new URLSearchParams(new FormData(e.target)));
    });

    function ll(p) { return [p.lat, p.lng]; }

    function applyView(t) {
        if (!t) return;
        const center = ll(t.target.center);
        const seconds = t.duration_ms / 1000;
        if (t.kind === "fly") map.flyTo(center, t.target.zoom, { duration: seconds });
        else if (t.kind === "pan") map.panTo(center, { animate: true, duration: seconds });
        else map.setView(center, t.target.zoom);
    }

    function applyScene(scene, reason) {
        if (baseName !== scene.base_layer.name) {
            if (base) map.removeLayer(base);
            base = L.tileLayer(scene.base_layer.tile_url, { attribution: scene.base_layer.attribution }).addTo(map);
            baseName = scene.base_layer.name;
            document.getElementById("base").value = baseName;
        }

        if (scene.gps_marker) {
            const m = scene.gps_marker;
            if (!gpsMarker) gpsMarker = L.marker(ll(m.position), { title: m.title }).addTo(map).bindPopup(m.popup);
            else gpsMarker.setLatLng(ll(m.position));
        }
        if (reason === "frame") return;

        if (scene.accuracy_circle) {
            const c = scene.accuracy_circle;
            if (!accuracyCircle) {
                accuracyCircle = L.circle(ll(c.center), { radius: c.radius, color: c.style.color, fillOpacity: c.style.fill_opacity }).addTo(map);
            } else {
                accuracyCircle.setLatLng(ll(c.center));
                accuracyCircle.setRadius(c.radius);
            }
        }

        const showRoute = scene.overlays.includes("route");
        if (scene.route) {
            const points = scene.route.points.map(ll);
            if (!routeLine) routeLine = L.polyline(points, { color: scene.route.style.color, weight: scene.route.style.weight });
            else routeLine.setLatLngs(points);
        }
        if (routeLine) {
            if (showRoute && !map.hasLayer(routeLine)) routeLine.addTo(map);
            if (!showRoute && map.hasLayer(routeLine)) map.removeLayer(routeLine);
        }

        if (scene.ip_marker) {
            const m = scene.ip_marker;
            const key = m.position.lat + "," + m.position.lng + "," + scene.revision;
            if ((reason === "ip_lookup" || reason === "initial") && key !== ipKey) {
                if (ipMarker) map.removeLayer(ipMarker);
                ipMarker = L.circleMarker(ll(m.position), {
                    radius: m.radius, color: m.style.color, fillColor: m.style.fill_color, fillOpacity: m.style.fill_opacity,
                }).addTo(map).bindPopup(m.popup.split("\n").join("<br>"));
                if (m.popup_open) ipMarker.openPopup();
                ipKey = key;
            }
        }

        if (reason === "fix" || reason === "ip_lookup") applyView(scene.transition);
        else if (reason === "initial") map.setView(ll(scene.viewport.center), scene.viewport.zoom);

        if (scene.status) {
            document.getElementById("lat").textContent = scene.status.latitude.toFixed(6);
            document.getElementById("lng").textContent = scene.status.longitude.toFixed(6);
            document.getElementById("updated").textContent = scene.status.last_update;
        }
    }

    function setTracking(active) {
        const pill = document.getElementById("tracking");
        pill.classList.toggle("live", active);
        pill.lastElementChild.textContent = active ? "Tracking" : "Stopped";
    }

    fetch("/scene").then((r) => r.json()).then((scene) => applyScene(scene, "initial"));
    fetch("/tracking/status").then((r) => r.json()).then((s) => setTracking(s.active));

    const stream = new EventSource("/stream");
    stream.addEventListener("scene", (e) => {
        const update = JSON.parse(e.data);
        applyScene(update.scene, update.reason);
    });
    stream.addEventListener("tracking", (e) => setTracking(JSON.parse(e.data).active));
    stream.addEventListener("notice", (e) => alert(JSON.parse(e.data).message));
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::geolocation::UnsupportedGeolocator;
    use crate::testing::FakeBackend;

    async fn serve() -> (String, AppHandle) {
        serve_with(FakeBackend::default()).await
    }

    async fn serve_with(backend: FakeBackend) -> (String, AppHandle) {
        let (session, app) = TrackerApp::new(
            TrackerConfig::default(),
            Arc::new(UnsupportedGeolocator),
            Arc::new(backend),
        );
        tokio::spawn(session.run());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = create_router(app.clone());
        tokio::spawn(async move { axum::serve(listener, router).await });
        (format!("http://{addr}"), app)
    }

    fn http() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_index() {
        let (base, _app) = serve().await;
        let client = http();

        let health = client.get(format!("{base}/health")).send().await.unwrap();
        assert_eq!(health.text().await.unwrap(), "OK");

        let index = client.get(format!("{base}/")).send().await.unwrap();
        assert!(index.text().await.unwrap().contains("leaflet"));
    }

    #[tokio::test]
    async fn test_layer_routes() {
        let (base, app) = serve().await;
        let client = http();

        let ok = client
            .post(format!("{base}/layers/base/topo"))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), reqwest::StatusCode::ACCEPTED);

        let bad = client
            .post(format!("{base}/layers/overlay/volcanoes"))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

        let scene = app.snapshot().await.unwrap();
        assert_eq!(scene.base_layer.name, "topo");
    }

    #[tokio::test]
    async fn test_scene_and_status_json() {
        let (base, app) = serve().await;
        let client = http();

        let scene: serde_json::Value = client
            .get(format!("{base}/scene"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(scene["viewport"]["zoom"], 2);
        assert_eq!(scene["base_layer"]["name"], "osm");

        let status: serde_json::Value = client
            .get(format!("{base}/tracking/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["active"], false);
        assert_eq!(status["session_id"], app.session_id().to_string());
    }

    #[tokio::test]
    async fn test_blank_ip_form_produces_notice() {
        let (base, app) = serve().await;
        let mut updates = app.subscribe();

        let resp = http()
            .post(format!("{base}/ip"))
            .form(&[("ip", "  ")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::ACCEPTED);

        match updates.recv().await.unwrap() {
            AppUpdate::Notice(notice) => assert_eq!(notice.message, crate::notice::IP_REQUIRED),
            other => panic!("unexpected update: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_reload_restores_view_and_ip_marker() {
        let (base, app) = serve_with(FakeBackend::replying(
            serde_json::json!({"success": true, "lat": 48.85, "lng": 2.35, "city": "Paris"}),
        ))
        .await;
        let mut updates = app.subscribe();

        app.lookup_ip("203.0.113.7");
        loop {
            if let AppUpdate::Scene { .. } = updates.recv().await.unwrap() {
                break;
            }
        }

        let client = http();
        let scene: serde_json::Value = client
            .get(format!("{base}/scene"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(scene["viewport"]["zoom"], 10);
        assert_eq!(scene["viewport"]["center"]["lat"], 48.85);
        assert_eq!(scene["ip_marker"]["position"]["lng"], 2.35);

        // A freshly loaded page applies that viewport and marker
        let page = client.get(format!("{base}/")).send().await.unwrap().text().await.unwrap();
        assert!(page.contains(r#"applyScene(scene, "initial")"#));
        assert!(page.contains("map.setView(ll(scene.viewport.center), scene.viewport.zoom)"));
    }
}
