//! Cadence Audio Player (cadence-ap) - demonstration entry point
//!
//! Loads a TOML playlist and plays it through the engine against simulated
//! network, preparation and output collaborators, logging every transition.
//! Optionally degrades the network mid-run to show the lookahead shrinking.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cadence_ap::config::EngineConfig;
use cadence_ap::network::NetworkCondition;
use cadence_ap::session::LoggingSessionReporter;
use cadence_ap::sim::{SimulatedNetwork, SimulatedOutput, SimulatedPreparer, SimulatedResolver};
use cadence_ap::{EngineDeps, PlaybackEngine};
use cadence_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use cadence_common::events::{CadenceEvent, PlaybackState, RepeatMode};
use cadence_common::{Track, TrackId};
use clap::Parser;
use serde::Deserialize;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for cadence-ap
#[derive(Parser, Debug)]
#[command(name = "cadence-ap")]
#[command(about = "Playback queue and adaptive preloading engine (simulated demo)")]
#[command(version)]
struct Args {
    /// Playlist file (TOML with [[tracks]] entries)
    playlist: PathBuf,

    /// Config file (overrides CADENCE_CONFIG and the platform default)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Queue index to start from
    #[arg(short, long, default_value = "0")]
    start: usize,

    /// Playback speed multiplier for the simulated output
    #[arg(long, default_value = "20.0")]
    speed: f64,

    /// Simulated preparation latency in milliseconds
    #[arg(long, default_value = "400")]
    latency_ms: u64,

    /// Enable shuffle before playing
    #[arg(long)]
    shuffle: bool,

    /// Repeat mode: off, all or one
    #[arg(long, default_value = "off", value_parser = parse_repeat)]
    repeat: RepeatMode,

    /// Switch to constrained cellular after this many seconds
    #[arg(long, env = "CADENCE_DEGRADE_AFTER")]
    degrade_after: Option<u64>,

    /// Track ids the simulated server reports as unavailable
    #[arg(long = "unavailable", value_delimiter = ',')]
    unavailable: Vec<String>,
}

fn parse_repeat(s: &str) -> std::result::Result<RepeatMode, String> {
    match s {
        "off" => Ok(RepeatMode::Off),
        "all" => Ok(RepeatMode::All),
        "one" => Ok(RepeatMode::One),
        other => Err(format!("unknown repeat mode '{}'", other)),
    }
}

#[derive(Debug, Deserialize)]
struct Playlist {
    tracks: Vec<Track>,
}

fn load_playlist(path: &Path) -> Result<Vec<Track>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read playlist {}", path.display()))?;
    let playlist: Playlist = toml::from_str(&content)
        .with_context(|| format!("Failed to parse playlist {}", path.display()))?;
    Ok(playlist.tracks)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Resolve config before logging so its level can seed the filter
    let source = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = EngineConfig::load(&source);
    let level = config
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{level},cadence_ap=debug").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting cadence-ap {} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("CADENCE_GIT_HASH"),
        env!("CADENCE_BUILD_PROFILE"),
        env!("CADENCE_BUILD_TIMESTAMP")
    );
    info!("Config source: {:?}", source);

    let config = config.context("Failed to load configuration")?;
    let tracks = load_playlist(&args.playlist)?;
    info!("Loaded {} track(s) from {}", tracks.len(), args.playlist.display());

    let network = Arc::new(SimulatedNetwork::new(NetworkCondition::wifi()));
    let (output, output_events, clock) =
        SimulatedOutput::spawn(Duration::from_millis(100), args.speed);

    let deps = EngineDeps {
        resolver: Arc::new(SimulatedResolver::new(
            args.unavailable.iter().map(|id| TrackId::new(id.as_str())),
        )),
        preparer: Arc::new(SimulatedPreparer::new(Duration::from_millis(args.latency_ms))),
        output: output.clone(),
        network: network.clone(),
        reporter: Arc::new(LoggingSessionReporter),
    };

    let engine = Arc::new(
        PlaybackEngine::new(deps, output_events, config)
            .context("Failed to initialize playback engine")?,
    );
    let mut events = engine.subscribe();
    engine.start();

    if args.shuffle {
        engine.set_shuffle(true);
    }
    while engine.repeat_mode() != args.repeat {
        engine.cycle_repeat_mode();
    }

    if let Some(secs) = args.degrade_after {
        let engine = Arc::clone(&engine);
        let network = Arc::clone(&network);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            network.set(NetworkCondition::cellular().with_constrained(true));
            let lookahead = engine.network_changed().await;
            info!("Network degraded, lookahead now {}", lookahead);
        });
    }

    if let Err(e) = engine.set_queue(tracks, args.start).await {
        warn!("Could not start playback: {}", e);
    }

    let finished = async {
        let mut started = false;
        let mut skipping = false;
        loop {
            match events.recv().await {
                Ok(CadenceEvent::TrackStarted { .. }) => started = true,
                Ok(CadenceEvent::PlaybackStateChanged {
                    new_state: PlaybackState::Stopped,
                    ..
                }) => {
                    if skipping {
                        skipping = false;
                    } else if started {
                        break;
                    }
                }
                Ok(CadenceEvent::TrackUnavailable { track_id, reason, .. }) => {
                    warn!("{} unavailable ({}), skipping", track_id, reason);
                    skipping = true;
                    match engine.advance_next().await {
                        Ok(Some(_)) => {}
                        Ok(None) => break,
                        Err(e) => warn!("Skip failed: {}", e),
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Event log lagged by {} event(s)", n)
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        _ = finished => info!("Playback finished"),
        _ = shutdown_signal() => {}
    }

    engine.clear_queue().await;
    clock.abort();

    let status = engine.status();
    info!(
        "Final status ({:.0}% into current track): {}",
        status.progress() * 100.0,
        serde_json::to_string(&status).context("Failed to serialize status")?
    );
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
