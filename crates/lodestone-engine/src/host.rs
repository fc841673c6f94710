//! Bridge from host game events to the Lodestone engines.
//!
//! The host writes one JSON object per line on stdin, tagged by `type`:
//!
//! ```text
//! {"type":"region_load","realm":"overworld","x":3,"z":-2}
//! {"type":"actor_join","actor_id":"6f1c..."}
//! {"type":"sale","actor_id":"6f1c...","items":"3","money":"4.50"}
//! ```

use std::sync::Arc;

use lodestone_core::{
    ClaimOutcome, CollaboratorError, FeedEngine, MemoryStats, Messenger, MutationLane,
    NotifyOutcome, RegionGate, Roster,
};
use lodestone_types::{ActorId, ItemCount, RegionKey};
use lodestone_world::GridWorld;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::task::JoinHandle;

/// One event from the host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    /// A region became available for reads and writes.
    RegionLoad {
        /// Realm name.
        realm: String,
        /// Region x.
        x: i32,
        /// Region z.
        z: i32,
    },
    /// A region is no longer available.
    RegionUnload {
        /// Realm name.
        realm: String,
        /// Region x.
        x: i32,
        /// Region z.
        z: i32,
    },
    /// An actor connected.
    ActorJoin {
        /// Who connected.
        actor_id: ActorId,
    },
    /// An actor disconnected.
    ActorQuit {
        /// Who disconnected.
        actor_id: ActorId,
    },
    /// An actor sold items.
    Sale {
        /// The seller.
        actor_id: ActorId,
        /// Items sold, as a digit string or a JSON integer.
        items: ItemCount,
        /// Money earned.
        money: Decimal,
    },
}

impl HostEvent {
    /// Parse one line of host input.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

/// Background work started by an event.
#[derive(Debug)]
pub enum Pending {
    /// A region claim on the I/O pool.
    Claim(JoinHandle<Option<ClaimOutcome>>),
    /// A reconnect report waiting out the settle delay.
    Report(JoinHandle<Option<NotifyOutcome>>),
}

/// Messenger that writes actor-facing lines to the log.
#[derive(Debug, Default)]
pub struct LogMessenger;

impl Messenger for LogMessenger {
    fn send(&self, actor_id: ActorId, lines: &[String]) -> Result<(), CollaboratorError> {
        for line in lines {
            tracing::info!(actor_id = %actor_id, line = %line, "Message to actor");
        }
        Ok(())
    }
}

/// Routes host events to the world lane, the gate and the feed engine.
#[derive(Debug)]
pub struct HostBridge {
    lane: MutationLane<GridWorld>,
    gate: Option<RegionGate<GridWorld>>,
    feed: Option<FeedEngine>,
    roster: Arc<Roster>,
    stats: Arc<MemoryStats>,
}

impl HostBridge {
    /// Create a bridge. `gate` and `feed` are `None` when the store is down.
    pub const fn new(
        lane: MutationLane<GridWorld>,
        gate: Option<RegionGate<GridWorld>>,
        feed: Option<FeedEngine>,
        roster: Arc<Roster>,
        stats: Arc<MemoryStats>,
    ) -> Self {
        Self {
            lane,
            gate,
            feed,
            roster,
            stats,
        }
    }

    /// Apply one event. Returns the background task it started, if any.
    ///
    /// Waits for room when the mutation lane's queue is full.
    pub async fn handle(&self, event: HostEvent) -> Option<Pending> {
        match event {
            HostEvent::RegionLoad { realm, x, z } => {
                let key = RegionKey::new(realm, x, z);
                let load_key = key.clone();
                // Queued before the claim, so placement always sees the load.
                if self
                    .lane
                    .submit(move |world| {
                        world.load_region(&load_key);
                    })
                    .await
                    .is_err()
                {
                    tracing::error!(region = %key, "Mutation lane closed, dropping region load");
                    return None;
                }
                self.gate
                    .as_ref()
                    .map(|gate| Pending::Claim(gate.on_region_load(key)))
            }
            HostEvent::RegionUnload { realm, x, z } => {
                let key = RegionKey::new(realm, x, z);
                if self
                    .lane
                    .submit(move |world| {
                        world.unload_region(&key);
                    })
                    .await
                    .is_err()
                {
                    tracing::error!("Mutation lane closed, dropping region unload");
                }
                None
            }
            HostEvent::ActorJoin { actor_id } => {
                self.roster.join(actor_id);
                self.feed
                    .as_ref()
                    .map(|feed| Pending::Report(feed.on_reconnect(actor_id)))
            }
            HostEvent::ActorQuit { actor_id } => {
                self.roster.quit(actor_id);
                None
            }
            HostEvent::Sale {
                actor_id,
                items,
                money,
            } => {
                self.stats.record_sale(actor_id, &items, money);
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use lodestone_core::config::FeedConfig;
    use lodestone_core::{IoPool, RecordingMessenger, StatsSource};
    use lodestone_db::DurableStore;
    use lodestone_types::{Material, RealmId, StatsKey};
    use lodestone_world::{Layer, PlacementSettings};

    use super::*;

    #[test]
    fn parses_tagged_events() {
        let actor = ActorId::new();
        let load = HostEvent::parse(r#"{"type":"region_load","realm":"overworld","x":3,"z":-2}"#);
        assert_eq!(
            load.unwrap(),
            HostEvent::RegionLoad {
                realm: "overworld".to_owned(),
                x: 3,
                z: -2
            }
        );

        let sale = HostEvent::parse(&format!(
            r#"{{"type":"sale","actor_id":"{actor}","items":"3","money":"4.50"}}"#
        ));
        assert_eq!(
            sale.unwrap(),
            HostEvent::Sale {
                actor_id: actor,
                items: ItemCount::from(3_u32),
                money: Decimal::new(450, 2),
            }
        );
    }

    #[test]
    fn sale_items_are_unbounded_whole_numbers() {
        let actor = ActorId::new();
        let huge = "1267650600228229401496703205376";
        let sale = HostEvent::parse(&format!(
            r#"{{"type":"sale","actor_id":"{actor}","items":"{huge}","money":"1"}}"#
        ));
        let Ok(HostEvent::Sale { items, .. }) = &sale else {
            panic!("expected a sale, got {sale:?}");
        };
        assert_eq!(items.to_string(), huge);

        let numeric = HostEvent::parse(&format!(
            r#"{{"type":"sale","actor_id":"{actor}","items":2,"money":"1"}}"#
        ));
        assert!(matches!(numeric, Ok(HostEvent::Sale { .. })));

        let fractional = HostEvent::parse(&format!(
            r#"{{"type":"sale","actor_id":"{actor}","items":"1.5","money":"1"}}"#
        ));
        assert!(fractional.is_err());
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(HostEvent::parse("not json").is_err());
        assert!(HostEvent::parse(r#"{"type":"teleport"}"#).is_err());
        assert!(HostEvent::parse(r#"{"type":"actor_join","actor_id":"nope"}"#).is_err());
    }

    async fn bridge() -> (HostBridge, JoinHandle<GridWorld>, Arc<MemoryStats>, Arc<RecordingMessenger>) {
        let store = DurableStore::open_in_memory().await.expect("open store");
        let world = GridWorld::layered(
            RealmId::new("overworld"),
            0,
            16,
            vec![Layer {
                top: 16,
                material: Material::Stone,
            }],
        );
        let (lane, handle) = MutationLane::spawn(world, 64);
        let pool = IoPool::new(2);
        let stats = Arc::new(MemoryStats::new());
        let roster = Arc::new(Roster::new());
        let messenger = Arc::new(RecordingMessenger::new());
        let gate = RegionGate::new(
            store.clone(),
            lane.clone(),
            pool.clone(),
            RealmId::new("overworld"),
            PlacementSettings::default(),
        );
        let feed = FeedEngine::new(
            store,
            stats.clone(),
            roster.clone(),
            messenger.clone(),
            pool,
            FeedConfig {
                settle_delay_ms: 0,
                ..FeedConfig::default()
            },
        );
        let bridge = HostBridge::new(lane, Some(gate), Some(feed), roster, stats.clone());
        (bridge, handle, stats, messenger)
    }

    #[tokio::test]
    async fn region_load_claims_and_places() {
        let (bridge, handle, _stats, _messenger) = bridge().await;
        let event = HostEvent::RegionLoad {
            realm: "overworld".to_owned(),
            x: 1,
            z: 1,
        };
        let Some(Pending::Claim(claim)) = bridge.handle(event.clone()).await else {
            panic!("expected a claim");
        };
        assert_eq!(claim.await.unwrap(), Some(ClaimOutcome::Claimed));

        let Some(Pending::Claim(again)) = bridge.handle(event).await else {
            panic!("expected a claim");
        };
        assert_eq!(again.await.unwrap(), Some(ClaimOutcome::AlreadyClaimed));

        drop(bridge);
        let world = handle.await.unwrap();
        assert!((1..=2).contains(&world.placed(Material::Lodestone).len()));
    }

    #[tokio::test]
    async fn join_after_sale_reports_delta() {
        let (bridge, _handle, stats, messenger) = bridge().await;
        let actor = ActorId::new();
        assert!(
            bridge
                .handle(HostEvent::Sale {
                    actor_id: actor,
                    items: ItemCount::from(2_u32),
                    money: Decimal::from(6),
                })
                .await
                .is_none()
        );
        let global = stats.live_stats(&StatsKey::Global).unwrap();
        assert_eq!(global.items_sold, ItemCount::from(2_u32));

        let Some(Pending::Report(report)) =
            bridge.handle(HostEvent::ActorJoin { actor_id: actor }).await
        else {
            panic!("expected a report");
        };
        let outcome = report.await.unwrap();
        assert!(matches!(outcome, Some(NotifyOutcome::Delivered(_))));
        let lines = &messenger.batches_for(actor)[0];
        assert!(lines[0].contains("2 Market Items"));
    }

    #[tokio::test]
    async fn store_down_bridge_only_tracks_world() {
        let world = GridWorld::flat(RealmId::new("overworld"), 0, 64, 40);
        let (lane, handle) = MutationLane::spawn(world, 64);
        let bridge = HostBridge::new(
            lane,
            None,
            None,
            Arc::new(Roster::new()),
            Arc::new(MemoryStats::new()),
        );
        let pending = bridge
            .handle(HostEvent::RegionLoad {
                realm: "overworld".to_owned(),
                x: 0,
                z: 0,
            })
            .await;
        assert!(pending.is_none());
        assert!(
            bridge
                .handle(HostEvent::ActorJoin { actor_id: ActorId::new() })
                .await
                .is_none()
        );

        drop(bridge);
        let world = handle.await.unwrap();
        assert_eq!(world.loaded_count(), 1);
        assert!(world.placed(Material::Lodestone).is_empty());
    }
}
