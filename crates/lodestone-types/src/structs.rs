//! Core data-model structs shared by the store, the world lane and the feed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::count::ItemCount;
use crate::ids::{ActorId, AnnouncementId, RealmId};

/// Width of a region along the x and z axes, in blocks.
pub const REGION_SIZE: i32 = 16;

// ---------------------------------------------------------------------------
// Spatial keys
// ---------------------------------------------------------------------------

/// A block coordinate in a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    /// East/west coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
    /// North/south coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Create a block position.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The six axis-aligned neighbors (up, down, and the four sides).
    pub const fn neighbors(self) -> [Self; 6] {
        let Self { x, y, z } = self;
        [
            Self::new(x, y.saturating_add(1), z),
            Self::new(x, y.saturating_sub(1), z),
            Self::new(x.saturating_add(1), y, z),
            Self::new(x.saturating_sub(1), y, z),
            Self::new(x, y, z.saturating_add(1)),
            Self::new(x, y, z.saturating_sub(1)),
        ]
    }

    /// The position directly above this one.
    pub const fn above(self) -> Self {
        Self::new(self.x, self.y.saturating_add(1), self.z)
    }
}

/// Address of a region: a [`REGION_SIZE`] x [`REGION_SIZE`] column of blocks
/// spanning the full height of a realm.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionKey {
    /// The realm the region belongs to.
    pub realm: RealmId,
    /// Region coordinate along x (block x divided by [`REGION_SIZE`]).
    pub x: i32,
    /// Region coordinate along z (block z divided by [`REGION_SIZE`]).
    pub z: i32,
}

impl RegionKey {
    /// Create a region key.
    pub fn new(realm: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            realm: RealmId::new(realm),
            x,
            z,
        }
    }

    /// Lowest block x covered by this region.
    pub const fn min_block_x(&self) -> i32 {
        self.x.saturating_mul(REGION_SIZE)
    }

    /// Lowest block z covered by this region.
    pub const fn min_block_z(&self) -> i32 {
        self.z.saturating_mul(REGION_SIZE)
    }

    /// The region containing the given block column.
    pub fn containing(realm: &RealmId, block_x: i32, block_z: i32) -> Self {
        Self {
            realm: realm.clone(),
            x: block_x.div_euclid(REGION_SIZE),
            z: block_z.div_euclid(REGION_SIZE),
        }
    }
}

impl core::fmt::Display for RegionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:({}, {})", self.realm, self.x, self.z)
    }
}

/// A permanent, once-only claim on a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionClaim {
    /// The claimed region.
    pub key: RegionKey,
    /// When the claim was written.
    pub claimed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

/// Cumulative counters read live from the statistics collaborator.
///
/// `items_sold` is an unbounded whole count; `money_earned` is a decimal
/// amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveStats {
    /// Lifetime items sold.
    pub items_sold: ItemCount,
    /// Lifetime money earned.
    pub money_earned: Decimal,
}

/// An actor's persisted baseline: the counters last reported to them and the
/// newest announcement they have seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorSnapshot {
    /// Whose baseline this is.
    pub actor_id: ActorId,
    /// Items-sold counter at the last report.
    pub items_sold: ItemCount,
    /// Money-earned counter at the last report.
    pub money_earned: Decimal,
    /// Highest announcement id already delivered to the actor.
    pub last_seen_announcement: AnnouncementId,
}

impl ActorSnapshot {
    /// The all-zero baseline used when no row exists yet.
    pub fn zero(actor_id: ActorId) -> Self {
        Self {
            actor_id,
            items_sold: ItemCount::zero(),
            money_earned: Decimal::ZERO,
            last_seen_announcement: AnnouncementId::NONE,
        }
    }

    /// The baseline counters as a [`LiveStats`] value.
    pub fn baseline(&self) -> LiveStats {
        LiveStats {
            items_sold: self.items_sold.clone(),
            money_earned: self.money_earned,
        }
    }
}

/// One entry of the bounded announcement feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncementItem {
    /// Monotonically increasing id.
    pub id: AnnouncementId,
    /// Free-form announcement text.
    pub message: String,
    /// When the announcement was published.
    pub created_at: DateTime<Utc>,
}
