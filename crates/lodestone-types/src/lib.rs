//! Shared type definitions for the Lodestone world services.
//!
//! This crate is the single source of truth for the identifiers and
//! data-model records that flow between the key store, the world lane,
//! the feed engine and the admin API.
//!
//! # Modules
//!
//! - [`count`] -- Unbounded item counter
//! - [`ids`] -- Strongly-typed identifiers (actors, realms, announcements)
//! - [`enums`] -- Block materials, placement tiers, statistics keys
//! - [`structs`] -- Region keys, snapshots, announcements, live statistics

pub mod count;
pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use count::ItemCount;
pub use enums::{Material, PlacementTier, StatsKey};
pub use ids::{ActorId, AnnouncementId, RealmId};
pub use structs::{
    ActorSnapshot, AnnouncementItem, BlockPos, LiveStats, REGION_SIZE, RegionClaim, RegionKey,
};
