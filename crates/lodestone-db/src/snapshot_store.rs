//! Actor baselines: the upsert half of the key store.
//!
//! One row per actor holds the counters last reported to them and the newest
//! announcement they have seen. A missing row reads as the all-zero
//! baseline. The announcement id column only ever moves forward: both
//! upserts keep `MAX(stored, incoming)`.

use chrono::Utc;
use lodestone_types::{ActorId, ActorSnapshot, AnnouncementId, ItemCount};
use rust_decimal::Decimal;
use sqlx::SqlitePool;

use crate::error::DbError;

/// Operations on the `actor_snapshots` table.
pub struct SnapshotStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SnapshotStore<'a> {
    /// Create a snapshot store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Read an actor's baseline, defaulting to zero when no row exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the query fails.
    pub async fn get(&self, actor_id: ActorId) -> Result<ActorSnapshot, DbError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r"SELECT actor_id, items_sold, money_earned, last_seen_announcement
              FROM actor_snapshots
              WHERE actor_id = ?1",
        )
        .bind(actor_id.to_string())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map_or_else(
            || ActorSnapshot::zero(actor_id),
            |row| row.into_snapshot(actor_id),
        ))
    }

    /// Replace an actor's baseline as one unit.
    ///
    /// Both counters are overwritten; the last-seen id never regresses.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidInput`] for negative money and
    /// [`DbError::Unavailable`] if the upsert fails.
    pub async fn put(&self, snapshot: &ActorSnapshot) -> Result<(), DbError> {
        if snapshot.money_earned.is_sign_negative() {
            return Err(DbError::InvalidInput(format!(
                "negative baseline for actor {}",
                snapshot.actor_id
            )));
        }

        sqlx::query(
            r"INSERT INTO actor_snapshots
                (actor_id, items_sold, money_earned, last_seen_announcement, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5)
              ON CONFLICT (actor_id) DO UPDATE SET
                items_sold = excluded.items_sold,
                money_earned = excluded.money_earned,
                last_seen_announcement =
                    MAX(actor_snapshots.last_seen_announcement, excluded.last_seen_announcement),
                updated_at = excluded.updated_at",
        )
        .bind(snapshot.actor_id.to_string())
        .bind(snapshot.items_sold.to_string())
        .bind(snapshot.money_earned.to_string())
        .bind(snapshot.last_seen_announcement.into_inner())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        tracing::debug!(
            actor_id = %snapshot.actor_id,
            last_seen = %snapshot.last_seen_announcement,
            "Stored actor snapshot"
        );
        Ok(())
    }

    /// Advance only the last-seen announcement id, and only if the actor
    /// has no retained announcement older than `announcement` still unseen.
    ///
    /// Existing counters are preserved; an absent row is created with a zero
    /// baseline. Returns whether the row was written. An actor with a
    /// backlog keeps their last-seen id so the backlog is still reported on
    /// their next reconnect.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the upsert fails.
    pub async fn touch_last_seen(
        &self,
        actor_id: ActorId,
        announcement: AnnouncementId,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"INSERT INTO actor_snapshots (actor_id, last_seen_announcement, updated_at)
              SELECT ?1, ?2, ?3
              WHERE NOT EXISTS (
                  SELECT 1 FROM announcements
                  WHERE id < ?2
                    AND id > COALESCE(
                        (SELECT last_seen_announcement FROM actor_snapshots WHERE actor_id = ?1),
                        0)
              )
              ON CONFLICT (actor_id) DO UPDATE SET
                last_seen_announcement =
                    MAX(actor_snapshots.last_seen_announcement, excluded.last_seen_announcement),
                updated_at = excluded.updated_at",
        )
        .bind(actor_id.to_string())
        .bind(announcement.into_inner())
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        let touched = result.rows_affected() == 1;
        tracing::debug!(%actor_id, %announcement, touched, "Touched actor last-seen");
        Ok(touched)
    }
}

/// A row from the `actor_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    /// Actor identity as a hyphenated UUID string.
    pub actor_id: String,
    /// Items-sold baseline as a decimal string.
    pub items_sold: String,
    /// Money-earned baseline as a decimal string.
    pub money_earned: String,
    /// Highest announcement id seen.
    pub last_seen_announcement: i64,
}

impl SnapshotRow {
    /// Convert the row into an [`ActorSnapshot`].
    ///
    /// Counters that fail to parse (or parse negative) are replaced by zero.
    pub fn into_snapshot(self, actor_id: ActorId) -> ActorSnapshot {
        ActorSnapshot {
            actor_id,
            items_sold: parse_items(&self.items_sold, actor_id),
            money_earned: parse_money(&self.money_earned, actor_id),
            last_seen_announcement: AnnouncementId(self.last_seen_announcement.max(0)),
        }
    }
}

/// Parse a stored item count, recovering malformed values as zero.
fn parse_items(raw: &str, actor_id: ActorId) -> ItemCount {
    raw.parse().unwrap_or_else(|e| {
        tracing::warn!(%actor_id, raw, error = %e, "Unparsable stored item count, using zero");
        ItemCount::zero()
    })
}

/// Parse a stored money amount, recovering malformed values as zero.
fn parse_money(raw: &str, actor_id: ActorId) -> Decimal {
    match raw.trim().parse::<Decimal>() {
        Ok(value) if !value.is_sign_negative() => value,
        Ok(value) => {
            tracing::warn!(%actor_id, %value, "Negative stored money, using zero");
            Decimal::ZERO
        }
        Err(e) => {
            tracing::warn!(%actor_id, raw, error = %e, "Unparsable stored money, using zero");
            Decimal::ZERO
        }
    }
}
