//! # Ironvale Server
//!
//! Headless host for the Ironvale simulation. Loads `ironvale.toml`, spawns
//! the world definition, drives ticks at the AI rate with a handful of
//! scripted players, and logs every emitted event.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod demo;

use anyhow::{Context, Result};
use config::{ServerConfig, CONFIG_FILE};
use demo::{DemoAmmo, DemoLoot, ScriptedPlayer};
use ironvale_common::{SimTime, Vec3};
use ironvale_sim::{SimEvent, Simulation};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Main entry point.
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ironvale=info".parse()?))
        .init();

    info!("Ironvale server starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = ServerConfig::load_from(&config_path);

    run(config).await?;

    info!("Ironvale server shutdown complete");
    Ok(())
}

async fn run(config: ServerConfig) -> Result<()> {
    let mut sim = Simulation::from_world_file(config.sim.clone(), &config.world_file)
        .with_context(|| format!("loading world from {}", config.world_file.display()))?;
    sim.set_ammo_source(Box::new(DemoAmmo::new(config.demo_quiver)));
    sim.set_loot_roller(Box::new(DemoLoot::new(config.sim.rng_seed)));
    let events = sim.attach_event_bus(config.event_bus_capacity);

    let spawned = sim.start(SimTime::ZERO).context("populating spawn points")?;
    info!(
        mobs = spawned.len(),
        world = %config.world_file.display(),
        "World populated"
    );

    let players: Vec<ScriptedPlayer> = (0..config.demo_players)
        .map(|i| ScriptedPlayer::new(i, Vec3::ZERO))
        .collect();

    let mut interval = tokio::time::interval(config.sim.ai_tick());
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let started = Instant::now();
    loop {
        tokio::select! {
            _ = interval.tick() => {},
            result = &mut shutdown => {
                result.context("listening for ctrl-c")?;
                info!("Shutdown requested");
                break;
            },
        }

        let elapsed = started.elapsed();
        drive_players(&mut sim, &players, elapsed)?;

        let emitted = sim.tick(SimTime::from_duration(elapsed)).len();
        let drained: Vec<SimEvent> = events.try_iter().collect();
        if drained.len() < emitted {
            warn!(emitted, drained = drained.len(), "Event bus dropped events");
        }
        if config.log_events {
            drained.iter().for_each(log_event);
        }
        debug!(tick = sim.tick_count(), events = emitted, "Tick");

        if config.max_ticks > 0 && sim.tick_count() >= config.max_ticks {
            info!(ticks = sim.tick_count(), "Tick limit reached");
            break;
        }
    }

    info!(
        ticks = sim.tick_count(),
        uptime_secs = started.elapsed().as_secs(),
        "Simulation stopped"
    );
    Ok(())
}

/// Syncs each scripted player and queues an attack on whatever is in reach.
fn drive_players(
    sim: &mut Simulation,
    players: &[ScriptedPlayer],
    elapsed: Duration,
) -> Result<()> {
    for player in players {
        let health = sim.player(player.id()).map(|p| p.health);
        sim.sync_player(player.record(elapsed, health))
            .with_context(|| format!("syncing player {}", player.id()))?;

        if let Some(target) = player.pick_target(sim.directory(), sim.config()) {
            sim.queue_attack(player.id(), target, None);
        }
    }
    Ok(())
}

fn log_event(event: &SimEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!(target: "ironvale::events", event = event.name(), "{json}"),
        Err(e) => warn!("Failed to serialize {} event: {e}", event.name()),
    }
}
