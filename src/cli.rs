//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_BACKEND_URL, TrackerConfig};
use crate::geo::LatLng;
use crate::output::Format;

/// Live GPS tracking with route trail, backend reporting and IP lookup.
#[derive(Parser, Debug)]
#[command(name = "geotrail")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Tracking backend base URL
    #[arg(long, global = true, default_value = DEFAULT_BACKEND_URL)]
    pub backend: String,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Track position until interrupted, printing map updates
    Track(TrackArgs),

    /// Look up the location of an IP address
    LookupIp(LookupIpArgs),

    /// Start the web map UI
    Ui(UiArgs),
}

/// Largest route the command line accepts.
const MAX_ROUTE_CAPACITY: u64 = 100_000;

/// Where positions come from and how often they are requested.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Replay fixes from an NDJSON file ({"lat","lng","accuracy"} per line)
    #[arg(long, conflicts_with = "simulate")]
    pub replay: Option<PathBuf>,

    /// Simulate a walk starting at lat,lng
    #[arg(long, value_parser = parse_latlng, allow_hyphen_values = true)]
    pub simulate: Option<LatLng>,

    /// Milliseconds between location requests (minimum 1000)
    #[arg(long, default_value = "5000")]
    pub interval_ms: u64,

    /// Maximum route points kept on the map (1-100000)
    #[arg(long, default_value = "500", value_parser = clap::value_parser!(u64).range(1..=MAX_ROUTE_CAPACITY))]
    pub route_capacity: u64,

    /// Move the marker instantly instead of animating
    #[arg(long)]
    pub no_animation: bool,
}

impl SourceArgs {
    /// Build the tracker configuration for these arguments.
    #[must_use]
    pub fn to_config(&self, backend: &str) -> TrackerConfig {
        let mut config = TrackerConfig {
            backend_url: backend.to_string(),
            route_capacity: usize::try_from(self.route_capacity).unwrap_or(usize::MAX),
            ..TrackerConfig::default()
        }
        .with_update_interval(Duration::from_millis(self.interval_ms));

        if self.no_animation {
            config.marker_animation = Duration::ZERO;
        }
        config
    }
}

/// Arguments for the `track` command.
#[derive(Parser, Debug)]
pub struct TrackArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `lookup-ip` command.
#[derive(Parser, Debug)]
pub struct LookupIpArgs {
    /// IP address to locate
    pub ip: String,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `ui` command.
#[derive(Parser, Debug)]
pub struct UiArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Port to listen on
    #[arg(long, short = 'p', default_value = "8080")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// Parse a coordinate from string.
fn parse_latlng(s: &str) -> Result<LatLng, String> {
    s.parse()
}
