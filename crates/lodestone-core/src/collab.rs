//! External collaborators the engines read from or deliver through.
//!
//! The host game owns statistics, presence, messaging and the money ledger.
//! Each is a narrow trait so the engines can run against the reference
//! implementations below in tests and in the bundled binary.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use lodestone_types::{ActorId, ItemCount, LiveStats, StatsKey};
use rust_decimal::Decimal;

/// Errors reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    /// The collaborator could not answer right now.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    /// A message could not be handed to the actor.
    #[error("delivery to {actor_id} failed: {reason}")]
    Delivery {
        /// Intended recipient.
        actor_id: ActorId,
        /// Why delivery failed.
        reason: String,
    },
}

/// Read-only source of live cumulative counters.
pub trait StatsSource: Send + Sync {
    /// Current cumulative counters for `key`. [`StatsKey::Global`] is the
    /// aggregate across every actor.
    fn live_stats(&self, key: &StatsKey) -> Result<LiveStats, CollaboratorError>;
}

/// Connectivity of actors.
pub trait Presence: Send + Sync {
    /// Whether `actor_id` is connected right now.
    fn is_connected(&self, actor_id: ActorId) -> bool;

    /// Every connected actor.
    fn connected_actors(&self) -> Vec<ActorId>;
}

/// Actor-facing message channel. Delivery is fire-and-forget; callers
/// check [`Presence`] first.
pub trait Messenger: Send + Sync {
    /// Hand `lines` to `actor_id` in order.
    fn send(&self, actor_id: ActorId, lines: &[String]) -> Result<(), CollaboratorError>;
}

/// Read-only money ledger.
pub trait Ledger: Send + Sync {
    /// Current balance of `actor_id`.
    fn balance(&self, actor_id: ActorId) -> Result<Decimal, CollaboratorError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory statistics keyed by actor, with a running global aggregate.
#[derive(Debug, Default)]
pub struct MemoryStats {
    counters: Mutex<BTreeMap<StatsKey, LiveStats>>,
}

impl MemoryStats {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sale for `actor_id`. The global aggregate accrues the same
    /// amounts. A sale with negative money is ignored.
    pub fn record_sale(&self, actor_id: ActorId, items: &ItemCount, money: Decimal) {
        if money.is_sign_negative() {
            tracing::warn!(actor_id = %actor_id, %items, %money, "Ignoring negative sale");
            return;
        }
        let mut counters = lock(&self.counters);
        for key in [StatsKey::Actor(actor_id), StatsKey::Global] {
            let entry = counters.entry(key).or_default();
            entry.items_sold.accrue(items);
            entry.money_earned = entry.money_earned.saturating_add(money);
        }
    }

    /// Overwrite the counters for `key`, e.g. after an external reset.
    pub fn set(&self, key: StatsKey, stats: LiveStats) {
        lock(&self.counters).insert(key, stats);
    }
}

impl StatsSource for MemoryStats {
    fn live_stats(&self, key: &StatsKey) -> Result<LiveStats, CollaboratorError> {
        Ok(lock(&self.counters).get(key).cloned().unwrap_or_default())
    }
}

/// Set of connected actors.
#[derive(Debug, Default)]
pub struct Roster {
    online: Mutex<BTreeSet<ActorId>>,
}

impl Roster {
    /// Create an empty roster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `actor_id` connected. Returns false if it already was.
    pub fn join(&self, actor_id: ActorId) -> bool {
        lock(&self.online).insert(actor_id)
    }

    /// Mark `actor_id` disconnected. Returns false if it was not connected.
    pub fn quit(&self, actor_id: ActorId) -> bool {
        lock(&self.online).remove(&actor_id)
    }
}

impl Presence for Roster {
    fn is_connected(&self, actor_id: ActorId) -> bool {
        lock(&self.online).contains(&actor_id)
    }

    fn connected_actors(&self) -> Vec<ActorId> {
        lock(&self.online).iter().copied().collect()
    }
}

/// Messenger that keeps every delivered line, per actor.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ActorId, Vec<String>)>>,
}

impl RecordingMessenger {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every batch sent to `actor_id`, oldest first.
    pub fn batches_for(&self, actor_id: ActorId) -> Vec<Vec<String>> {
        lock(&self.sent)
            .iter()
            .filter(|(to, _)| *to == actor_id)
            .map(|(_, lines)| lines.clone())
            .collect()
    }

    /// Total batches sent to anyone.
    pub fn batch_count(&self) -> usize {
        lock(&self.sent).len()
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, actor_id: ActorId, lines: &[String]) -> Result<(), CollaboratorError> {
        lock(&self.sent).push((actor_id, lines.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sales_accrue_to_actor_and_global() {
        let stats = MemoryStats::new();
        let a = ActorId::new();
        let b = ActorId::new();
        stats.record_sale(a, &ItemCount::from(3_u32), Decimal::new(150, 2));
        stats.record_sale(b, &ItemCount::from(2_u32), Decimal::new(50, 2));

        let a_stats = stats.live_stats(&StatsKey::Actor(a)).unwrap_or_default();
        assert_eq!(a_stats.items_sold, ItemCount::from(3_u32));
        let global = stats.live_stats(&StatsKey::Global).unwrap_or_default();
        assert_eq!(global.items_sold, ItemCount::from(5_u32));
        assert_eq!(global.money_earned, Decimal::from(2));
    }

    #[test]
    fn unknown_actor_reads_zero() {
        let stats = MemoryStats::new();
        let read = stats.live_stats(&StatsKey::Actor(ActorId::new()));
        assert_eq!(read, Ok(LiveStats::default()));
    }

    #[test]
    fn negative_sale_is_ignored() {
        let stats = MemoryStats::new();
        let a = ActorId::new();
        stats.record_sale(a, &ItemCount::from(1_u32), Decimal::from(-1));
        assert_eq!(stats.live_stats(&StatsKey::Global), Ok(LiveStats::default()));
    }

    #[test]
    fn sales_past_fixed_width_limits_keep_accruing() {
        let stats = MemoryStats::new();
        let a = ActorId::new();
        let start: ItemCount = "79228162514264337593543950335".parse().unwrap_or_default();
        stats.set(
            StatsKey::Actor(a),
            LiveStats {
                items_sold: start.clone(),
                money_earned: Decimal::ZERO,
            },
        );
        stats.record_sale(a, &ItemCount::from(5_u32), Decimal::ZERO);
        stats.record_sale(a, &ItemCount::from(7_u32), Decimal::ZERO);

        let live = stats.live_stats(&StatsKey::Actor(a)).unwrap_or_default();
        assert_eq!(live.items_sold.to_string(), "79228162514264337593543950347");
        assert_eq!(live.items_sold.since(&start), ItemCount::from(12_u32));
    }

    #[test]
    fn roster_tracks_presence() {
        let roster = Roster::new();
        let a = ActorId::new();
        assert!(roster.join(a));
        assert!(!roster.join(a));
        assert!(roster.is_connected(a));
        assert_eq!(roster.connected_actors(), vec![a]);
        assert!(roster.quit(a));
        assert!(!roster.is_connected(a));
    }

    #[test]
    fn recorder_keeps_batches_per_actor() {
        let messenger = RecordingMessenger::new();
        let a = ActorId::new();
        let b = ActorId::new();
        assert!(messenger.send(a, &["one".to_owned()]).is_ok());
        assert!(messenger.send(b, &["two".to_owned()]).is_ok());
        assert_eq!(messenger.batches_for(a), vec![vec!["one".to_owned()]]);
        assert_eq!(messenger.batch_count(), 2);
    }
}
