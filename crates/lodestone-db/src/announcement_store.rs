//! The bounded announcement feed.
//!
//! Inserts and pruning share one transaction, so after any publish the
//! table holds at most `retention` rows and those are always the newest
//! ids.

use chrono::Utc;
use lodestone_types::{AnnouncementId, AnnouncementItem};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Direction in which [`AnnouncementStore::read_latest`] returns rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedOrder {
    /// Oldest id first, the order actors see them in.
    #[default]
    OldestFirst,
    /// Newest id first.
    NewestFirst,
}

/// Operations on the `announcements` table.
pub struct AnnouncementStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnnouncementStore<'a> {
    /// Create an announcement store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append an announcement and prune everything beyond the newest
    /// `retention` rows.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidInput`] if `retention` is zero and
    /// [`DbError::Unavailable`] if the transaction fails.
    pub async fn insert_and_prune(
        &self,
        message: &str,
        retention: u32,
    ) -> Result<AnnouncementId, DbError> {
        if retention == 0 {
            return Err(DbError::InvalidInput("retention must be at least 1".to_owned()));
        }

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO announcements (message, created_at)
              VALUES (?1, ?2)
              RETURNING id",
        )
        .bind(message)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let pruned = sqlx::query(
            r"DELETE FROM announcements
              WHERE id NOT IN (
                SELECT id FROM announcements ORDER BY id DESC LIMIT ?1
              )",
        )
        .bind(i64::from(retention))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(id, pruned = pruned.rows_affected(), "Inserted announcement");
        Ok(AnnouncementId(id))
    }

    /// Read up to `limit` of the most recent announcements.
    ///
    /// The newest `limit` rows are always the ones selected; `order` only
    /// decides how they are returned.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the query fails.
    pub async fn read_latest(
        &self,
        limit: u32,
        order: FeedOrder,
    ) -> Result<Vec<AnnouncementItem>, DbError> {
        let mut rows = sqlx::query_as::<_, AnnouncementRow>(
            r"SELECT id, message, created_at
              FROM announcements
              ORDER BY id DESC
              LIMIT ?1",
        )
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        if order == FeedOrder::OldestFirst {
            rows.reverse();
        }
        Ok(rows.into_iter().map(AnnouncementRow::into_item).collect())
    }

    /// Number of retained announcements.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the query fails.
    pub async fn count(&self) -> Result<i64, DbError> {
        let count: i64 = sqlx::query_scalar(r"SELECT COUNT(*) FROM announcements")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// A row from the `announcements` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnnouncementRow {
    /// Auto-incremented id.
    pub id: i64,
    /// Announcement text.
    pub message: String,
    /// Publication time.
    pub created_at: chrono::DateTime<Utc>,
}

impl AnnouncementRow {
    /// Convert the row into the shared [`AnnouncementItem`] type.
    pub fn into_item(self) -> AnnouncementItem {
        AnnouncementItem {
            id: AnnouncementId(self.id),
            message: self.message,
            created_at: self.created_at,
        }
    }
}
