//! Error types for the `lodestone-world` crate.

use lodestone_types::{BlockPos, RealmId, RegionKey};

/// Errors that can occur while reading or mutating live world state.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The realm is not hosted by this world.
    #[error("unknown realm: {0}")]
    UnknownRealm(RealmId),

    /// A write targeted a region that is not loaded.
    #[error("region not loaded: {0}")]
    RegionNotLoaded(RegionKey),

    /// A write targeted a position outside the realm's vertical bounds.
    #[error("position {pos:?} is outside the bounds of realm {realm}")]
    OutOfBounds {
        /// The realm written to.
        realm: RealmId,
        /// The rejected position.
        pos: BlockPos,
    },

    /// Placement settings failed validation.
    #[error("invalid placement settings: {0}")]
    InvalidSettings(String),
}
