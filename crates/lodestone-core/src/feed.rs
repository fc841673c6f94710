//! The delta and announcement feed engine.
//!
//! On reconnect an actor gets one report: how much they sold and earned
//! since their stored baseline, followed by announcements they have not
//! seen. Delivery always happens before the baseline moves, so a failure
//! part-way through can repeat a report but never swallow one.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use lodestone_db::{DbError, DurableStore, FeedOrder};
use lodestone_types::{
    ActorId, ActorSnapshot, AnnouncementId, AnnouncementItem, ItemCount, StatsKey,
};
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

use crate::collab::{Messenger, Presence, StatsSource};
use crate::config::FeedConfig;
use crate::delta::{announcement_line, compose, compute_delta};
use crate::lanes::IoPool;

/// Why a report run stopped without delivering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The store failed a read.
    StoreUnavailable,
    /// The statistics collaborator failed.
    StatsUnavailable,
    /// The messenger refused the report.
    DeliveryFailed,
}

/// Result of one [`FeedEngine::compute_and_notify`] run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The report reached the actor.
    Delivered(DeliveryReport),
    /// Another run for the same actor was in progress; this one did nothing.
    AlreadyRunning,
    /// The actor disconnected before delivery; nothing was written.
    Offline,
    /// Nothing was delivered and nothing was written.
    Aborted(AbortReason),
}

/// Details of a delivered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Items sold since the previous baseline.
    pub items: ItemCount,
    /// Money earned since the previous baseline.
    pub money: Decimal,
    /// Announcements included.
    pub shown: usize,
    /// Unseen announcements cut by the line budget.
    pub omitted: usize,
    /// Last-seen id after this run.
    pub last_seen: AnnouncementId,
    /// Whether the new baseline was stored. If not, the next reconnect
    /// reports the same progress again.
    pub baseline_saved: bool,
}

/// Errors from [`FeedEngine::publish_announcement`].
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The message is empty after trimming.
    #[error("announcement message is empty")]
    Empty,

    /// The store rejected the insert.
    #[error("announcement store failed: {0}")]
    Store(#[from] DbError),
}

impl PublishError {
    /// Whether this failure means the store is unavailable.
    pub const fn is_unavailable(&self) -> bool {
        match self {
            Self::Empty => false,
            Self::Store(e) => e.is_unavailable(),
        }
    }
}

/// Computes reconnect reports and publishes announcements.
#[derive(Clone)]
pub struct FeedEngine {
    store: DurableStore,
    stats: Arc<dyn StatsSource>,
    presence: Arc<dyn Presence>,
    messenger: Arc<dyn Messenger>,
    pool: IoPool,
    config: FeedConfig,
    in_flight: Arc<Mutex<BTreeSet<ActorId>>>,
}

impl std::fmt::Debug for FeedEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedEngine")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Marks an actor as having a report run in progress until dropped.
struct InFlight {
    set: Arc<Mutex<BTreeSet<ActorId>>>,
    actor_id: ActorId,
}

impl InFlight {
    fn acquire(set: &Arc<Mutex<BTreeSet<ActorId>>>, actor_id: ActorId) -> Option<Self> {
        let inserted = set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(actor_id);
        inserted.then(|| Self {
            set: Arc::clone(set),
            actor_id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.actor_id);
    }
}

impl FeedEngine {
    /// Create an engine over an open store and the host collaborators.
    pub fn new(
        store: DurableStore,
        stats: Arc<dyn StatsSource>,
        presence: Arc<dyn Presence>,
        messenger: Arc<dyn Messenger>,
        pool: IoPool,
        config: FeedConfig,
    ) -> Self {
        Self {
            store,
            stats,
            presence,
            messenger,
            pool,
            config,
            in_flight: Arc::new(Mutex::new(BTreeSet::new())),
        }
    }

    /// Active feed configuration.
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// The store the engine writes to.
    pub const fn store(&self) -> &DurableStore {
        &self.store
    }

    /// The statistics collaborator.
    pub fn stats(&self) -> &dyn StatsSource {
        self.stats.as_ref()
    }

    /// The retained feed, oldest first.
    pub async fn feed(&self) -> Result<Vec<AnnouncementItem>, DbError> {
        self.feed_in(FeedOrder::OldestFirst).await
    }

    /// The retained feed in the given order.
    pub async fn feed_in(&self, order: FeedOrder) -> Result<Vec<AnnouncementItem>, DbError> {
        self.store
            .announcements()
            .read_latest(self.config.retention, order)
            .await
    }

    /// Schedule a report for `actor_id` after the settle delay.
    ///
    /// The delay is spent outside the I/O pool; the report itself runs on it.
    pub fn on_reconnect(&self, actor_id: ActorId) -> JoinHandle<Option<NotifyOutcome>> {
        let engine = self.clone();
        let delay = self.config.settle_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let pool = engine.pool.clone();
            let run = pool.spawn(async move { engine.compute_and_notify(actor_id).await });
            match run.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(actor_id = %actor_id, error = %e, "Report task failed");
                    None
                }
            }
        })
    }

    /// Compute the delta for `actor_id`, deliver the report, then advance
    /// the stored baseline.
    pub async fn compute_and_notify(&self, actor_id: ActorId) -> NotifyOutcome {
        let Some(_guard) = InFlight::acquire(&self.in_flight, actor_id) else {
            tracing::debug!(actor_id = %actor_id, "Report already running for actor");
            return NotifyOutcome::AlreadyRunning;
        };

        let live = match self.stats.live_stats(&StatsKey::Actor(actor_id)) {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(actor_id = %actor_id, error = %e, "Statistics unavailable, skipping report");
                return NotifyOutcome::Aborted(AbortReason::StatsUnavailable);
            }
        };

        let snapshot = match self.store.snapshots().get(actor_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(actor_id = %actor_id, error = %e, "Snapshot store unavailable, skipping report");
                return NotifyOutcome::Aborted(AbortReason::StoreUnavailable);
            }
        };

        let feed = match self.feed().await {
            Ok(feed) => feed,
            Err(e) => {
                tracing::warn!(actor_id = %actor_id, error = %e, "Announcement feed unavailable, skipping report");
                return NotifyOutcome::Aborted(AbortReason::StoreUnavailable);
            }
        };

        let delta = compute_delta(&live, &snapshot.baseline());
        let report = compose(
            &delta,
            &feed,
            snapshot.last_seen_announcement,
            self.config.line_budget,
        );

        if !self.presence.is_connected(actor_id) {
            tracing::debug!(actor_id = %actor_id, "Actor left before report, baseline kept");
            return NotifyOutcome::Offline;
        }

        if let Err(e) = self.messenger.send(actor_id, &report.lines) {
            tracing::warn!(actor_id = %actor_id, error = %e, "Report delivery failed, baseline kept");
            return NotifyOutcome::Aborted(AbortReason::DeliveryFailed);
        }

        let next = ActorSnapshot {
            actor_id,
            items_sold: live.items_sold,
            money_earned: live.money_earned,
            last_seen_announcement: report.last_seen,
        };
        let baseline_saved = match self.store.snapshots().put(&next).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    actor_id = %actor_id,
                    error = %e,
                    "Report delivered but baseline not stored; it will repeat"
                );
                false
            }
        };

        tracing::info!(
            actor_id = %actor_id,
            items = %delta.items,
            money = %delta.money,
            shown = report.shown,
            omitted = report.omitted(),
            last_seen = %report.last_seen,
            "Reconnect report delivered"
        );

        NotifyOutcome::Delivered(DeliveryReport {
            items: delta.items,
            money: delta.money,
            shown: report.shown,
            omitted: report.omitted(),
            last_seen: report.last_seen,
            baseline_saved,
        })
    }

    /// Publish an announcement: store it, prune the feed, and show it to
    /// every connected actor right away.
    ///
    /// Actors that receive it live and had nothing older unseen have their
    /// last-seen id moved to it, so their next reconnect report does not
    /// repeat it. Actors still holding a backlog keep their last-seen id: the
    /// backlog and this announcement both come back on their next reconnect.
    pub async fn publish_announcement(&self, message: &str) -> Result<AnnouncementId, PublishError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(PublishError::Empty);
        }

        let id = self
            .store
            .announcements()
            .insert_and_prune(message, self.config.retention)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "Failed to publish announcement"))?;

        let line = [announcement_line(message)];
        let mut notified: usize = 0;
        let mut backlogged: usize = 0;
        for actor_id in self.presence.connected_actors() {
            if let Err(e) = self.messenger.send(actor_id, &line) {
                tracing::warn!(actor_id = %actor_id, error = %e, "Live announcement not delivered");
                continue;
            }
            notified = notified.saturating_add(1);
            match self.store.snapshots().touch_last_seen(actor_id, id).await {
                Ok(true) => {}
                Ok(false) => {
                    backlogged = backlogged.saturating_add(1);
                    tracing::debug!(actor_id = %actor_id, "Actor has unseen backlog, last-seen kept");
                }
                Err(e) => {
                    tracing::warn!(actor_id = %actor_id, error = %e, "Could not record live announcement as seen");
                }
            }
        }

        tracing::info!(announcement_id = %id, notified, backlogged, "Announcement published");
        Ok(id)
    }
}
