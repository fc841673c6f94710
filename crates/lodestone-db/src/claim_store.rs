//! Region claims: the insert-if-absent half of the key store.
//!
//! A claim row, once written, is permanent. The primary key on
//! `(realm, region_x, region_z)` together with `ON CONFLICT DO NOTHING`
//! makes the insert atomic: of any number of racing callers exactly one
//! sees a row affected.

use chrono::Utc;
use lodestone_types::{RegionClaim, RegionKey};
use sqlx::SqlitePool;

use crate::error::DbError;

/// Operations on the `region_claims` table.
pub struct ClaimStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ClaimStore<'a> {
    /// Create a claim store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Claim `key` if nobody has yet.
    ///
    /// Returns `true` iff this call inserted the row, i.e. the caller is the
    /// first and only claimant. Returns `false` if the key was already
    /// claimed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the insert could not run.
    pub async fn claim_if_absent(&self, key: &RegionKey) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"INSERT INTO region_claims (realm, region_x, region_z, claimed_at)
              VALUES (?1, ?2, ?3, ?4)
              ON CONFLICT (realm, region_x, region_z) DO NOTHING",
        )
        .bind(key.realm.as_str())
        .bind(key.x)
        .bind(key.z)
        .bind(Utc::now())
        .execute(self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        tracing::debug!(region = %key, claimed, "Region claim attempted");
        Ok(claimed)
    }

    /// Look up the claim for `key`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the query fails.
    pub async fn get(&self, key: &RegionKey) -> Result<Option<RegionClaim>, DbError> {
        let row = sqlx::query_as::<_, ClaimRow>(
            r"SELECT realm, region_x, region_z, claimed_at
              FROM region_claims
              WHERE realm = ?1 AND region_x = ?2 AND region_z = ?3",
        )
        .bind(key.realm.as_str())
        .bind(key.x)
        .bind(key.z)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ClaimRow::into_claim))
    }

    /// Count claimed regions in a realm.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Unavailable`] if the query fails.
    pub async fn count_in_realm(&self, realm: &str) -> Result<i64, DbError> {
        let count: i64 =
            sqlx::query_scalar(r"SELECT COUNT(*) FROM region_claims WHERE realm = ?1")
                .bind(realm)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }
}

/// A row from the `region_claims` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimRow {
    /// Realm name.
    pub realm: String,
    /// Region x coordinate.
    pub region_x: i32,
    /// Region z coordinate.
    pub region_z: i32,
    /// When the claim was written.
    pub claimed_at: chrono::DateTime<Utc>,
}

impl ClaimRow {
    /// Convert the row into the shared [`RegionClaim`] type.
    pub fn into_claim(self) -> RegionClaim {
        RegionClaim {
            key: RegionKey::new(self.realm, self.region_x, self.region_z),
            claimed_at: self.claimed_at,
        }
    }
}
