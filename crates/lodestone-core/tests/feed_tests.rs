//! Feed engine tests: reconnect reports and announcement publishing
//! against an in-memory store and the in-memory collaborators.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use lodestone_core::config::FeedConfig;
use lodestone_core::{
    AbortReason, CollaboratorError, FeedEngine, IoPool, MemoryStats, Messenger, NotifyOutcome,
    PublishError, RecordingMessenger, Roster,
};
use lodestone_db::{DurableStore, StoreConfig};
use lodestone_types::{ActorId, ActorSnapshot, AnnouncementId, ItemCount, LiveStats, StatsKey};
use rust_decimal::Decimal;

struct Harness {
    engine: FeedEngine,
    store: DurableStore,
    stats: Arc<MemoryStats>,
    roster: Arc<Roster>,
    messenger: Arc<RecordingMessenger>,
}

async fn harness_with(config: FeedConfig) -> Harness {
    let store = DurableStore::open_in_memory().await.expect("open store");
    let stats = Arc::new(MemoryStats::new());
    let roster = Arc::new(Roster::new());
    let messenger = Arc::new(RecordingMessenger::new());
    let engine = FeedEngine::new(
        store.clone(),
        stats.clone(),
        roster.clone(),
        messenger.clone(),
        IoPool::new(2),
        config,
    );
    Harness {
        engine,
        store,
        stats,
        roster,
        messenger,
    }
}

async fn harness() -> Harness {
    harness_with(FeedConfig::default()).await
}

fn delivered(outcome: NotifyOutcome) -> lodestone_core::DeliveryReport {
    match outcome {
        NotifyOutcome::Delivered(report) => report,
        other => panic!("expected delivery, got {other:?}"),
    }
}

#[tokio::test]
async fn delta_reports_growth_since_baseline() {
    let h = harness().await;
    let actor = ActorId::new();
    h.store
        .snapshots()
        .put(&ActorSnapshot {
            actor_id: actor,
            items_sold: ItemCount::from(10_u32),
            money_earned: Decimal::new(50, 1),
            last_seen_announcement: AnnouncementId::NONE,
        })
        .await
        .unwrap();
    h.stats.set(
        StatsKey::Actor(actor),
        LiveStats {
            items_sold: ItemCount::from(14_u32),
            money_earned: Decimal::new(50, 1),
        },
    );
    h.roster.join(actor);

    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(report.items, ItemCount::from(4_u32));
    assert_eq!(report.money, Decimal::ZERO);
    assert!(report.baseline_saved);

    let batches = h.messenger.batches_for(actor);
    assert_eq!(batches.len(), 1);
    assert!(batches[0][0].contains("4 Market Items"));
    assert!(batches[0][0].contains("$0.00"));

    let stored = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(stored.items_sold, ItemCount::from(14_u32));
}

#[tokio::test]
async fn baseline_ahead_of_live_reports_zero() {
    let h = harness().await;
    let actor = ActorId::new();
    h.store
        .snapshots()
        .put(&ActorSnapshot {
            actor_id: actor,
            items_sold: ItemCount::from(50_u32),
            money_earned: Decimal::from(80),
            last_seen_announcement: AnnouncementId::NONE,
        })
        .await
        .unwrap();
    h.stats.record_sale(actor, &ItemCount::from(1_u32), Decimal::ONE);
    h.roster.join(actor);

    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert!(report.items.is_zero());
    assert_eq!(report.money, Decimal::ZERO);
    let stored = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(stored.items_sold, ItemCount::from(1_u32));
}

#[tokio::test]
async fn single_item_uses_singular_label() {
    let h = harness().await;
    let actor = ActorId::new();
    h.stats.record_sale(actor, &ItemCount::from(1_u32), Decimal::new(250, 2));
    h.roster.join(actor);

    delivered(h.engine.compute_and_notify(actor).await);
    let line = &h.messenger.batches_for(actor)[0][0];
    assert!(line.contains("1 Market Item sold"), "{line}");
    assert!(line.contains("$2.50"), "{line}");
}

#[tokio::test]
async fn feed_merge_shows_only_unseen() {
    let h = harness().await;
    let actor = ActorId::new();
    for n in 1..=5 {
        h.engine.publish_announcement(&format!("news {n}")).await.unwrap();
    }
    h.store
        .snapshots()
        .put(&ActorSnapshot {
            last_seen_announcement: AnnouncementId(2),
            ..ActorSnapshot::zero(actor)
        })
        .await
        .unwrap();
    h.roster.join(actor);

    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(report.shown, 3);
    assert_eq!(report.omitted, 0);
    assert_eq!(report.last_seen, AnnouncementId(5));

    let lines = &h.messenger.batches_for(actor)[0];
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[1], "[Announcement] news 3");
    assert_eq!(lines[3], "[Announcement] news 5");
}

#[tokio::test]
async fn offline_publish_surfaces_on_reconnect() {
    let h = harness().await;
    let actor = ActorId::new();

    h.engine
        .publish_announcement("  Market closes at dusk  ")
        .await
        .unwrap();
    assert_eq!(h.messenger.batch_count(), 0);

    h.roster.join(actor);
    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(report.shown, 1);
    let lines = &h.messenger.batches_for(actor)[0];
    assert_eq!(lines[1], "[Announcement] Market closes at dusk");
}

#[tokio::test]
async fn online_publish_is_not_repeated_on_reconnect() {
    let h = harness().await;
    let actor = ActorId::new();
    h.roster.join(actor);

    let id = h.engine.publish_announcement("Double sell prices").await.unwrap();
    assert_eq!(
        h.messenger.batches_for(actor),
        vec![vec!["[Announcement] Double sell prices".to_owned()]]
    );
    let touched = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(touched.last_seen_announcement, id);

    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(report.shown, 0);
    assert_eq!(report.last_seen, id);
}

#[tokio::test]
async fn blank_announcement_is_rejected() {
    let h = harness().await;
    let result = h.engine.publish_announcement(" \t\n ").await;
    assert!(matches!(result, Err(PublishError::Empty)));
    assert_eq!(h.store.announcements().count().await.unwrap(), 0);
}

#[tokio::test]
async fn overflow_resurfaces_next_time() {
    let h = harness_with(FeedConfig {
        retention: 20,
        ..FeedConfig::default()
    })
    .await;
    let actor = ActorId::new();
    for n in 1..=12 {
        h.engine.publish_announcement(&format!("news {n}")).await.unwrap();
    }
    h.roster.join(actor);

    let first = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(first.shown, 9);
    assert_eq!(first.omitted, 3);
    assert_eq!(first.last_seen, AnnouncementId(9));
    assert_eq!(h.messenger.batches_for(actor)[0].len(), 10);

    let second = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(second.shown, 3);
    assert_eq!(second.last_seen, AnnouncementId(12));
    assert_eq!(h.messenger.batches_for(actor)[1][1], "[Announcement] news 10");
}

#[tokio::test]
async fn offline_actor_gets_nothing_and_keeps_baseline() {
    let h = harness().await;
    let actor = ActorId::new();
    h.stats.record_sale(actor, &ItemCount::from(3_u32), Decimal::from(3));

    assert_eq!(h.engine.compute_and_notify(actor).await, NotifyOutcome::Offline);
    assert_eq!(h.messenger.batch_count(), 0);
    let stored = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(stored, ActorSnapshot::zero(actor));
}

#[tokio::test]
async fn closed_store_aborts_without_side_effects() {
    let h = harness().await;
    let actor = ActorId::new();
    h.stats.record_sale(actor, &ItemCount::from(3_u32), Decimal::from(3));
    h.roster.join(actor);
    h.store.close().await;

    assert_eq!(
        h.engine.compute_and_notify(actor).await,
        NotifyOutcome::Aborted(AbortReason::StoreUnavailable)
    );
    assert_eq!(h.messenger.batch_count(), 0);

    let publish = h.engine.publish_announcement("hello").await;
    assert!(publish.is_err_and(|e| e.is_unavailable()));
    assert_eq!(h.messenger.batch_count(), 0);
}

#[tokio::test]
async fn overlapping_runs_for_one_actor_do_not_double_report() {
    let h = harness().await;
    let actor = ActorId::new();
    h.stats.record_sale(actor, &ItemCount::from(5_u32), Decimal::from(5));
    h.roster.join(actor);

    let (a, b) = tokio::join!(
        h.engine.compute_and_notify(actor),
        h.engine.compute_and_notify(actor)
    );
    let outcomes = [a, b];
    let delivered_count = outcomes
        .iter()
        .filter(|o| matches!(o, NotifyOutcome::Delivered(_)))
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| matches!(o, NotifyOutcome::AlreadyRunning))
        .count();
    assert_eq!(delivered_count, 1);
    assert_eq!(skipped, 1);
    assert_eq!(h.messenger.batch_count(), 1);

    // Once the first run finishes the guard is released.
    let again = delivered(h.engine.compute_and_notify(actor).await);
    assert!(again.items.is_zero());
}

#[tokio::test]
async fn reconnect_waits_for_settle_delay() {
    let h = harness_with(FeedConfig {
        settle_delay_ms: 300,
        ..FeedConfig::default()
    })
    .await;
    let actor = ActorId::new();
    h.stats.record_sale(actor, &ItemCount::from(2_u32), Decimal::ONE);
    h.roster.join(actor);

    let handle = h.engine.on_reconnect(actor);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.messenger.batch_count(), 0);
    assert!(!handle.is_finished());

    let outcome = handle.await.unwrap().expect("ran on the pool");
    assert_eq!(delivered(outcome).items, ItemCount::from(2_u32));
    assert_eq!(h.messenger.batch_count(), 1);
}

#[tokio::test]
async fn feed_keeps_retention_bound() {
    let h = harness().await;
    for n in 1..=15 {
        h.engine.publish_announcement(&format!("news {n}")).await.unwrap();
    }
    let feed = h.engine.feed().await.unwrap();
    assert_eq!(feed.len(), 10);
    assert_eq!(feed[0].id, AnnouncementId(6));
    assert_eq!(feed[9].id, AnnouncementId(15));
}

#[tokio::test]
async fn live_publish_keeps_backlog_for_next_reconnect() {
    let h = harness_with(FeedConfig {
        retention: 20,
        ..FeedConfig::default()
    })
    .await;
    let actor = ActorId::new();
    for n in 1..=12 {
        h.engine.publish_announcement(&format!("news {n}")).await.unwrap();
    }
    h.roster.join(actor);

    let first = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(first.shown, 9);
    assert_eq!(first.last_seen, AnnouncementId(9));

    // Delivered live, but 10..=12 are still owed.
    let id = h.engine.publish_announcement("news 13").await.unwrap();
    assert_eq!(id, AnnouncementId(13));
    assert_eq!(
        h.messenger.batches_for(actor)[1],
        vec!["[Announcement] news 13".to_owned()]
    );
    let kept = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(kept.last_seen_announcement, AnnouncementId(9));

    let second = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(second.shown, 4);
    assert_eq!(second.last_seen, AnnouncementId(13));
    let lines = &h.messenger.batches_for(actor)[2];
    assert_eq!(lines[1], "[Announcement] news 10");
    assert_eq!(lines[4], "[Announcement] news 13");

    // Caught up now, so the next live publish is recorded as seen.
    let id = h.engine.publish_announcement("news 14").await.unwrap();
    let caught_up = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(caught_up.last_seen_announcement, id);
}

#[tokio::test]
async fn lifetime_counts_past_96_bits_are_reported_exactly() {
    let h = harness().await;
    let actor = ActorId::new();
    let start: ItemCount = "79228162514264337593543950335".parse().unwrap();
    h.store
        .snapshots()
        .put(&ActorSnapshot {
            items_sold: start.clone(),
            ..ActorSnapshot::zero(actor)
        })
        .await
        .unwrap();
    h.stats.set(
        StatsKey::Actor(actor),
        LiveStats {
            items_sold: start,
            money_earned: Decimal::ZERO,
        },
    );
    h.stats.record_sale(actor, &ItemCount::from(5_u32), Decimal::ZERO);
    h.stats.record_sale(actor, &ItemCount::from(7_u32), Decimal::ZERO);
    h.roster.join(actor);

    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(report.items, ItemCount::from(12_u32));
    let line = &h.messenger.batches_for(actor)[0][0];
    assert!(line.contains("12 Market Items sold"), "{line}");

    let stored = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(stored.items_sold.to_string(), "79228162514264337593543950347");
}

/// Refuses every delivery.
struct RefusingMessenger;

impl Messenger for RefusingMessenger {
    fn send(&self, actor_id: ActorId, _lines: &[String]) -> Result<(), CollaboratorError> {
        Err(CollaboratorError::Delivery {
            actor_id,
            reason: "connection reset".to_owned(),
        })
    }
}

/// Delivers, then shuts the store before the baseline can be written.
struct StoreClosingMessenger {
    store: DurableStore,
    handle: Handle,
    inner: RecordingMessenger,
}

impl Messenger for StoreClosingMessenger {
    fn send(&self, actor_id: ActorId, lines: &[String]) -> Result<(), CollaboratorError> {
        self.inner.send(actor_id, lines)?;
        tokio::task::block_in_place(|| self.handle.block_on(self.store.close()));
        Ok(())
    }
}

fn engine_over(
    store: &DurableStore,
    stats: &Arc<MemoryStats>,
    roster: &Arc<Roster>,
    messenger: Arc<dyn Messenger>,
) -> FeedEngine {
    FeedEngine::new(
        store.clone(),
        stats.clone(),
        roster.clone(),
        messenger,
        IoPool::new(2),
        FeedConfig::default(),
    )
}

#[tokio::test]
async fn refused_delivery_leaves_baseline_untouched() {
    let h = harness().await;
    let actor = ActorId::new();
    h.engine.publish_announcement("news 1").await.unwrap();
    h.stats.record_sale(actor, &ItemCount::from(4_u32), Decimal::from(8));
    h.roster.join(actor);

    let refusing = engine_over(&h.store, &h.stats, &h.roster, Arc::new(RefusingMessenger));
    assert_eq!(
        refusing.compute_and_notify(actor).await,
        NotifyOutcome::Aborted(AbortReason::DeliveryFailed)
    );
    let stored = h.store.snapshots().get(actor).await.unwrap();
    assert_eq!(stored, ActorSnapshot::zero(actor));

    // The same progress and announcement are reported on the next try.
    let report = delivered(h.engine.compute_and_notify(actor).await);
    assert_eq!(report.items, ItemCount::from(4_u32));
    assert_eq!(report.money, Decimal::from(8));
    assert_eq!(report.shown, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unsaved_baseline_repeats_report_after_restart() {
    let path = std::env::temp_dir().join(format!("lodestone-feed-{}.db", ActorId::new()));
    let store = DurableStore::open(&StoreConfig::new(&path)).await.unwrap();
    let stats = Arc::new(MemoryStats::new());
    let roster = Arc::new(Roster::new());
    let actor = ActorId::new();
    stats.record_sale(actor, &ItemCount::from(6_u32), Decimal::new(300, 2));
    roster.join(actor);

    let closing = Arc::new(StoreClosingMessenger {
        store: store.clone(),
        handle: Handle::current(),
        inner: RecordingMessenger::new(),
    });
    let engine = engine_over(&store, &stats, &roster, closing.clone());
    let outcome = tokio::spawn(async move { engine.compute_and_notify(actor).await })
        .await
        .unwrap();
    let first = delivered(outcome);
    assert!(!first.baseline_saved);
    assert_eq!(first.items, ItemCount::from(6_u32));
    assert_eq!(closing.inner.batches_for(actor).len(), 1);
    assert!(store.is_closed());

    let reopened = DurableStore::open(&StoreConfig::new(&path)).await.unwrap();
    assert_eq!(
        reopened.snapshots().get(actor).await.unwrap(),
        ActorSnapshot::zero(actor)
    );

    let messenger = Arc::new(RecordingMessenger::new());
    let engine = engine_over(&reopened, &stats, &roster, messenger.clone());
    let again = delivered(engine.compute_and_notify(actor).await);
    assert!(again.baseline_saved);
    assert_eq!(again.items, first.items);
    assert_eq!(messenger.batches_for(actor)[0], closing.inner.batches_for(actor)[0]);

    reopened.close().await;
    let _ = std::fs::remove_file(&path);
}
