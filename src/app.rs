//! The tracking session event loop.
//!
//! One task owns the map, renderer and tracking state and handles events
//! strictly one at a time. Timers, geolocation requests and backend calls
//! run as separate tasks and report back through the same queue, so no
//! state is ever shared or locked.

use std::sync::Arc;

use chrono::Local;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::Backend;
use crate::config::TrackerConfig;
use crate::errors::GeotrailError;
use crate::geo::LatLng;
use crate::geolocation::{GeolocationError, Geolocator, request_position};
use crate::ip_lookup;
use crate::map::{BaseLayer, MapView, OverlayLayer, SceneSnapshot};
use crate::models::{Fix, IpLookupResponse};
use crate::notice::{GEOLOCATION_UNSUPPORTED, Notice};
use crate::renderer::{GpsRenderer, RendererSettings};
use crate::reporter::PositionReporter;
use crate::session::SessionId;
use crate::tracker::{StartOutcome, TrackingController};

/// Capacity of the update broadcast; slow subscribers skip ahead.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Why a scene update was published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateReason {
    /// An accepted GPS fix
    Fix,
    /// A marker animation frame
    Frame,
    /// A successful IP lookup
    IpLookup,
    /// Base layer or overlay visibility changed
    Layers,
}

/// Everything the session tells its observers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppUpdate {
    Scene {
        reason: UpdateReason,
        scene: Box<SceneSnapshot>,
    },
    Notice(Notice),
    Tracking {
        active: bool,
    },
}

enum Event {
    StartTracking,
    StopTracking,
    LookupIp(String),
    SetBaseLayer(BaseLayer),
    ToggleOverlay(OverlayLayer),
    SetZoom(u8),
    Snapshot(oneshot::Sender<SceneSnapshot>),
    TrackingStatus(oneshot::Sender<bool>),
    Shutdown,
    Tick,
    Located(Result<Fix, GeolocationError>),
    IpResolved(Result<IpLookupResponse, GeotrailError>),
}

/// Cloneable handle for driving a running [`TrackerApp`].
#[derive(Clone)]
pub struct AppHandle {
    events: mpsc::UnboundedSender<Event>,
    updates: broadcast::Sender<AppUpdate>,
    session_id: SessionId,
}

impl AppHandle {
    fn send(&self, event: Event) {
        if self.events.send(event).is_err() {
            debug!("tracker session has shut down");
        }
    }

    pub fn start_tracking(&self) {
        self.send(Event::StartTracking);
    }

    pub fn stop_tracking(&self) {
        self.send(Event::StopTracking);
    }

    /// Submit raw user input for an IP lookup.
    pub fn lookup_ip(&self, input: impl Into<String>) {
        self.send(Event::LookupIp(input.into()));
    }

    pub fn set_base_layer(&self, layer: BaseLayer) {
        self.send(Event::SetBaseLayer(layer));
    }

    pub fn toggle_overlay(&self, layer: OverlayLayer) {
        self.send(Event::ToggleOverlay(layer));
    }

    /// Record a zoom change made by the user on the map.
    pub fn set_zoom(&self, zoom: u8) {
        self.send(Event::SetZoom(zoom));
    }

    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }

    /// Current scene, or `None` if the session has ended.
    pub async fn snapshot(&self) -> Option<SceneSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::Snapshot(tx));
        rx.await.ok()
    }

    /// Whether tracking is active, or `None` if the session has ended.
    pub async fn is_tracking(&self) -> Option<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(Event::TrackingStatus(tx));
        rx.await.ok()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AppUpdate> {
        self.updates.subscribe()
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }
}

/// A tracking session: constructed once, runs until shut down.
pub struct TrackerApp {
    config: TrackerConfig,
    map: MapView,
    renderer: GpsRenderer,
    tracker: TrackingController,
    reporter: PositionReporter,
    geolocator: Arc<dyn Geolocator>,
    backend: Arc<dyn Backend>,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    updates: broadcast::Sender<AppUpdate>,
}

impl TrackerApp {
    #[must_use]
    pub fn new(
        config: TrackerConfig,
        geolocator: Arc<dyn Geolocator>,
        backend: Arc<dyn Backend>,
    ) -> (Self, AppHandle) {
        let session_id = SessionId::generate();
        info!("session id: {session_id}");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let handle = AppHandle {
            events: events_tx.clone(),
            updates: updates.clone(),
            session_id,
        };

        let app = Self {
            map: MapView::new(LatLng::new(0.0, 0.0), config.initial_zoom),
            renderer: GpsRenderer::new(RendererSettings::from(&config)),
            tracker: TrackingController::new(config.update_interval),
            reporter: PositionReporter::new(session_id, Arc::clone(&backend)),
            config,
            geolocator,
            backend,
            events_tx,
            events_rx,
            updates,
        };

        (app, handle)
    }

    /// Process events until [`AppHandle::shutdown`].
    pub async fn run(mut self) {
        let mut frames = tokio::time::interval(self.config.frame_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                event = self.events_rx.recv() => {
                    match event {
                        Some(Event::Shutdown) | None => break,
                        Some(event) => self.handle(event),
                    }
                }
                _ = frames.tick(), if self.renderer.is_animating() => {
                    self.on_frame(Instant::now());
                }
            }
        }

        self.tracker.stop();
        info!(
            "session ended: {} fixes rendered, {} suppressed",
            self.renderer.accepted(),
            self.renderer.suppressed()
        );
        let route = self.renderer.route();
        if !route.is_empty() {
            debug!(
                "route held {} points ({} evicted, {} animations cut short, {} overlays created)",
                route.len(),
                route.evicted(),
                self.renderer.animations_cancelled(),
                self.map.overlays_created()
            );
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::StartTracking => self.on_start(),
            Event::StopTracking => {
                if self.tracker.stop() {
                    self.publish(AppUpdate::Tracking { active: false });
                }
            }
            Event::Tick => self.on_tick(),
            Event::Located(result) => self.on_located(result),
            Event::LookupIp(input) => self.on_lookup(&input),
            Event::IpResolved(result) => self.on_ip_resolved(result),
            Event::SetBaseLayer(layer) => {
                self.map.set_base_layer(layer);
                self.publish_scene(UpdateReason::Layers);
            }
            Event::ToggleOverlay(layer) => {
                let visible = self.map.toggle_overlay(layer);
                debug!("overlay {} visible: {visible}", layer.as_str());
                self.publish_scene(UpdateReason::Layers);
            }
            // User zoom from the viewer, no scene to send back
            Event::SetZoom(zoom) => self.map.set_zoom(zoom),
            Event::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::TrackingStatus(reply) => {
                let _ = reply.send(self.tracker.is_active());
            }
            // Handled by the run loop
            Event::Shutdown => {}
        }
    }

    fn on_start(&mut self) {
        let events = self.events_tx.clone();
        let outcome = self
            .tracker
            .start(self.geolocator.is_supported(), move || events.send(Event::Tick).is_ok());

        match outcome {
            StartOutcome::Started => self.publish(AppUpdate::Tracking { active: true }),
            StartOutcome::AlreadyActive => debug!("tracking already active"),
            StartOutcome::Unsupported => {
                warn!("tracking not started: geolocation unsupported");
                self.publish(AppUpdate::Notice(Notice::alert(GEOLOCATION_UNSUPPORTED)));
            }
        }
    }

    fn on_tick(&self) {
        let geolocator = Arc::clone(&self.geolocator);
        let options = self.config.position_options;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = request_position(geolocator.as_ref(), &options).await;
            let _ = events.send(Event::Located(result));
        });
    }

    fn on_located(&mut self, result: Result<Fix, GeolocationError>) {
        let fix = match result {
            Ok(fix) => fix,
            Err(e) => {
                // The next tick is the only retry
                warn!("GPS error: {e}");
                return;
            }
        };

        if let Err(e) = fix.validate() {
            warn!("discarding fix: {e}");
            return;
        }

        self.reporter.report(&fix);

        let outcome = self
            .renderer
            .apply_fix(&mut self.map, &fix, Instant::now(), Local::now());
        if outcome.is_accepted() {
            self.publish_scene(UpdateReason::Fix);
        }
    }

    fn on_frame(&mut self, now: Instant) {
        if self.renderer.frame(&mut self.map, now) {
            self.publish_scene(UpdateReason::Frame);
        }
    }

    fn on_lookup(&self, input: &str) {
        let ip = match ip_lookup::normalize_input(input) {
            Ok(ip) => ip,
            Err(notice) => {
                self.publish(AppUpdate::Notice(notice));
                return;
            }
        };

        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = backend.track_ip(&ip).await;
            let _ = events.send(Event::IpResolved(result));
        });
    }

    fn on_ip_resolved(&mut self, result: Result<IpLookupResponse, GeotrailError>) {
        match ip_lookup::interpret(result) {
            Ok(location) => {
                ip_lookup::show_on_map(&mut self.map, &location, self.config.ip_zoom);
                self.publish_scene(UpdateReason::IpLookup);
            }
            Err(notice) => self.publish(AppUpdate::Notice(notice)),
        }
    }

    fn snapshot(&self) -> SceneSnapshot {
        self.map.snapshot(self.renderer.status())
    }

    fn publish_scene(&self, reason: UpdateReason) {
        self.publish(AppUpdate::Scene {
            reason,
            scene: Box::new(self.snapshot()),
        });
    }

    fn publish(&self, update: AppUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}
