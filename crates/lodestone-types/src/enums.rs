//! Enumeration types shared across the Lodestone crates.

use serde::{Deserialize, Serialize};

use crate::ids::ActorId;

// ---------------------------------------------------------------------------
// Block materials
// ---------------------------------------------------------------------------

/// The material occupying a single block position in the live world.
///
/// Only the materials the placement algorithm and the grid world need are
/// modelled; hosts map their own block palette onto these.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Material {
    /// Empty space.
    #[default]
    Air,
    /// Plain stone, the default placement substrate.
    Stone,
    /// Deep stone found near the bottom of a realm.
    Deepslate,
    /// Soil below the surface layer.
    Dirt,
    /// Surface soil.
    Grass,
    /// Loose gravel.
    Gravel,
    /// Still or flowing water.
    Water,
    /// Indestructible floor of a realm.
    Bedrock,
    /// The special ore committed by vein placement.
    Lodestone,
}

impl Material {
    /// Whether this position is empty.
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }
}

// ---------------------------------------------------------------------------
// Placement tiers
// ---------------------------------------------------------------------------

/// Where a vein is searched for inside a claimed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementTier {
    /// Exposed just below the natural terrain surface.
    Surface,
    /// Anywhere within the realm's vertical bounds.
    Buried,
}

// ---------------------------------------------------------------------------
// Statistics keys
// ---------------------------------------------------------------------------

/// Key into the external statistics collaborator.
///
/// `Global` is the server-wide aggregate and is distinct from every actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsKey {
    /// The aggregate across every actor.
    Global,
    /// A single actor's cumulative counters.
    Actor(ActorId),
}

impl core::fmt::Display for StatsKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Actor(id) => write!(f, "{id}"),
        }
    }
}

impl From<ActorId> for StatsKey {
    fn from(id: ActorId) -> Self {
        Self::Actor(id)
    }
}
