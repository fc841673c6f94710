//! Host binary for Lodestone.
//!
//! Wires the region gate and the feed engine to a demo world and reads
//! host events from stdin until EOF.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `lodestone-config.yaml`
//! 3. Spawn the mutation lane over a flat demo world
//! 4. Open the key store (failure switches generation and reports off)
//! 5. Build the gate, the feed engine and the team directory
//! 6. Start the admin API server
//! 7. Pump host events until stdin closes
//! 8. Drain the lane and close the store

mod error;
mod host;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use lodestone_admin::{AdminState, ServerConfig};
use lodestone_core::{
    FeedEngine, IoPool, LodestoneConfig, MemoryStats, MutationLane, RegionGate, Roster,
    TeamDirectory, TeamProvider,
};
use lodestone_db::DurableStore;
use lodestone_types::{Material, RealmId};
use lodestone_world::GridWorld;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::host::{HostBridge, HostEvent, LogMessenger};

/// Lowest y of the demo world.
const WORLD_MIN_Y: i32 = -64;
/// Exclusive top y of the demo world.
const WORLD_MAX_Y: i32 = 320;
/// Surface height of the demo world.
const WORLD_GROUND: i32 = 64;

/// How long shutdown waits for queued placements.
const LANE_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the admin server cannot
/// bind, or stdin fails.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_err| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("lodestone-engine starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        realm = %config.generation.realm,
        store = %config.store.path.display(),
        io_workers = config.workers.io_workers,
        lane_capacity = config.workers.lane_capacity,
        settle_delay_ms = config.feed.settle_delay_ms,
        "Configuration loaded"
    );

    // 3. Mutation lane over the demo world.
    let realm = RealmId::new(config.generation.realm.clone());
    let world = GridWorld::flat(realm.clone(), WORLD_MIN_Y, WORLD_MAX_Y, WORLD_GROUND);
    let (lane, lane_handle) = MutationLane::spawn(world, config.workers.lane_capacity);
    let pool = IoPool::new(config.workers.io_workers);

    // 4. Key store.
    let store = match DurableStore::open(&config.store.to_store_config()).await {
        Ok(store) => {
            info!(path = %config.store.path.display(), "Key store opened");
            Some(store)
        }
        Err(e) => {
            tracing::error!(error = %e, "Key store unavailable, region generation and reports disabled");
            None
        }
    };

    // 5. Engines and collaborators.
    let stats = Arc::new(MemoryStats::new());
    let roster = Arc::new(Roster::new());
    let gate = store.clone().map(|store| {
        RegionGate::new(
            store,
            lane.clone(),
            pool.clone(),
            realm,
            config.generation.placement.clone(),
        )
    });
    let feed = store.clone().map(|store| {
        FeedEngine::new(
            store,
            stats.clone(),
            roster.clone(),
            Arc::new(LogMessenger),
            pool.clone(),
            config.feed.clone(),
        )
    });
    let teams = TeamDirectory::bind(|| {
        Err::<Arc<dyn TeamProvider>, _>("standalone host has no team plugin")
    });
    info!(teams = teams.is_present(), "Team directory bound");

    // 6. Admin API server.
    let admin_handle = if config.admin.enabled {
        let state = Arc::new(AdminState::new(feed.clone(), stats.clone()));
        let listener = lodestone_admin::bind(&ServerConfig::from(&config.admin))
            .await
            .map_err(EngineError::from)?;
        Some(tokio::spawn(async move {
            if let Err(e) = lodestone_admin::serve(listener, state).await {
                tracing::error!(error = %e, "Admin server stopped");
            }
        }))
    } else {
        info!("Admin API disabled");
        None
    };

    // 7. Host event pump.
    let bridge = HostBridge::new(lane, gate, feed, roster, stats);
    pump_events(&bridge).await?;
    info!("Host event stream closed, shutting down");

    // 8. Shutdown.
    if let Some(handle) = admin_handle {
        handle.abort();
    }
    drop(bridge);
    match tokio::time::timeout(LANE_DRAIN_TIMEOUT, lane_handle).await {
        Ok(Ok(world)) => info!(
            loaded_regions = world.loaded_count(),
            markers = world.placed(Material::Lodestone).len(),
            "Mutation lane drained"
        ),
        Ok(Err(e)) => tracing::error!(error = %e, "Mutation lane task failed"),
        Err(_elapsed) => tracing::warn!("Mutation lane still busy at shutdown"),
    }
    pool.shutdown();
    if let Some(store) = store {
        store.close().await;
    }

    info!("lodestone-engine shutdown complete");
    Ok(())
}

/// Load configuration from `lodestone-config.yaml`, falling back to
/// defaults when the file is absent.
fn load_config() -> Result<LodestoneConfig, EngineError> {
    let config_path = Path::new("lodestone-config.yaml");
    if config_path.exists() {
        Ok(LodestoneConfig::from_file(config_path)?)
    } else {
        info!("Config file not found, using defaults");
        let mut config = LodestoneConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }
}

/// Read newline-delimited host events from stdin until EOF.
async fn pump_events(bridge: &HostBridge) -> Result<(), EngineError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match HostEvent::parse(line) {
            Ok(event) => {
                tracing::debug!(?event, "Host event");
                // Background work finishes on its own; nothing waits on it here.
                drop(bridge.handle(event).await);
            }
            Err(e) => tracing::warn!(error = %e, line, "Skipping malformed host event"),
        }
    }
    Ok(())
}
