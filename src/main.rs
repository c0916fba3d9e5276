//! geotrail - live GPS tracking from your terminal or browser.
//!
//! Polls a geolocation source, keeps a live marker, accuracy circle and
//! bounded route trail on a map, reports every fix to a tracking backend,
//! and looks up IP address locations on demand.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

mod animation;
mod app;
mod cli;
mod client;
mod config;
mod errors;
mod geo;
mod geolocation;
mod ip_lookup;
mod map;
mod models;
mod notice;
mod output;
mod renderer;
mod reporter;
mod route;
mod server;
mod session;
mod status;
#[cfg(test)]
mod testing;
mod tracker;

use app::{AppUpdate, TrackerApp, UpdateReason};
use cli::{Cli, Command, SourceArgs};
use client::BackendClient;
use config::TrackerConfig;
use geolocation::{Geolocator, ReplayGeolocator, SimulatedGeolocator, UnsupportedGeolocator};
use map::MapView;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Command::Track(args) => cmd_track(args, &cli.backend),
        Command::LookupIp(args) => cmd_lookup_ip(args, &cli.backend),
        Command::Ui(args) => cmd_ui(args, &cli.backend),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Pick the geolocation source named on the command line.
fn build_geolocator(source: &SourceArgs) -> Result<Arc<dyn Geolocator>> {
    if let Some(path) = &source.replay {
        let replay = ReplayGeolocator::from_path(path)
            .with_context(|| format!("failed to load replay file {}", path.display()))?;
        info!("replaying {} fixes from {}", replay.remaining(), path.display());
        return Ok(Arc::new(replay));
    }

    if let Some(start) = source.simulate {
        return Ok(Arc::new(SimulatedGeolocator::new(start)));
    }

    warn!("no geolocation source configured (use --replay or --simulate)");
    Ok(Arc::new(UnsupportedGeolocator))
}

/// Execute the `track` command - poll until Ctrl+C.
fn cmd_track(args: cli::TrackArgs, backend_url: &str) -> Result<()> {
    let config = args.source.to_config(backend_url);
    let geolocator = build_geolocator(&args.source)?;
    let backend =
        Arc::new(BackendClient::from_config(&config).context("failed to create backend client")?);

    // Print startup banner
    if args.format == output::Format::Human {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "\x1b[1m📍 geotrail\x1b[0m")?;
        writeln!(
            handle,
            "\x1b[2mBackend: {} | Poll: {}ms | Press Ctrl+C to stop\x1b[0m",
            config.backend_base(),
            config.update_interval.as_millis()
        )?;
        writeln!(handle, "\x1b[2m─────────────────────────────────────────────────────────────────────\x1b[0m")?;
    }

    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(async move {
            let (app, handle) = TrackerApp::new(config, geolocator, backend);
            let mut updates = handle.subscribe();
            let session = tokio::spawn(app.run());

            let ctrl_c = tokio::signal::ctrl_c();
            tokio::pin!(ctrl_c);

            handle.start_tracking();
            let mut tracking = false;

            loop {
                tokio::select! {
                    update = updates.recv() => match update {
                        Ok(update) => {
                            // Frames are for the map view only
                            if matches!(update, AppUpdate::Scene { reason: UpdateReason::Frame, .. }) {
                                continue;
                            }

                            let stdout = io::stdout();
                            let mut out = stdout.lock();
                            if let Err(e) = output::write_update(&mut out, &update, args.format) {
                                warn!("failed to write update: {}", e);
                            }
                            let _ = out.flush();

                            match update {
                                AppUpdate::Tracking { active } => tracking = active,
                                AppUpdate::Notice(notice) if !tracking => {
                                    handle.shutdown();
                                    anyhow::bail!("tracking could not start: {notice}");
                                }
                                _ => {}
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!("output lagged, skipped {} updates", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                    _ = &mut ctrl_c => {
                        handle.stop_tracking();
                        handle.shutdown();
                        break;
                    }
                }
            }

            session.await.context("tracker session failed")?;
            Ok(())
        })
}

/// Execute the `lookup-ip` command - one-shot IP lookup.
fn cmd_lookup_ip(args: cli::LookupIpArgs, backend_url: &str) -> Result<()> {
    let config = TrackerConfig {
        backend_url: backend_url.to_string(),
        ..TrackerConfig::default()
    };
    let client = BackendClient::from_config(&config).context("failed to create backend client")?;

    let result = tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(ip_lookup::lookup(&client, &args.ip));

    let location = result.map_err(|notice| anyhow::anyhow!("{notice}"))?;

    let mut map = MapView::new(geo::LatLng::new(0.0, 0.0), config.initial_zoom);
    ip_lookup::show_on_map(&mut map, &location, config.ip_zoom);

    let update = AppUpdate::Scene {
        reason: UpdateReason::IpLookup,
        scene: Box::new(map.snapshot(None)),
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_update(&mut handle, &update, args.format)?;

    Ok(())
}

/// Execute the `ui` command - start web server.
fn cmd_ui(args: cli::UiArgs, backend_url: &str) -> Result<()> {
    let tracker = args.source.to_config(backend_url);
    let geolocator = build_geolocator(&args.source)?;
    let backend =
        Arc::new(BackendClient::from_config(&tracker).context("failed to create backend client")?);

    let config = server::ServerConfig {
        port: args.port,
        host: args.host.clone(),
        tracker,
    };

    // Print startup message
    let url = format!("http://{}:{}", args.host, args.port);
    println!("\x1b[1m📍 geotrail Web UI\x1b[0m");
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("  Local:   \x1b[96m{}\x1b[0m", url);
    println!("  Backend: {}", config.tracker.backend_base());
    println!("  Poll:    {}ms", config.tracker.update_interval.as_millis());
    println!("\x1b[2m───────────────────────────────────────\x1b[0m");
    println!("\x1b[2mPress Ctrl+C to stop\x1b[0m\n");

    // Open browser if requested (using xdg-open/open command)
    if args.open {
        #[cfg(target_os = "linux")]
        let _ = std::process::Command::new("xdg-open").arg(&url).spawn();
        #[cfg(target_os = "macos")]
        let _ = std::process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "windows")]
        let _ = std::process::Command::new("cmd").args(["/c", "start", &url]).spawn();
    }

    // Run the async server on tokio runtime
    tokio::runtime::Runtime::new()
        .context("failed to create tokio runtime")?
        .block_on(server::run_server(config, geolocator, backend))
}
