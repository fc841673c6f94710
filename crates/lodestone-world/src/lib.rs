//! Live world access and vein placement for the Lodestone world services.
//!
//! Everything in this crate runs on the single mutation lane: it reads and
//! writes blocks through the [`BlockAccess`] seam and never touches the key
//! store.
//!
//! # Modules
//!
//! - [`access`] -- The [`BlockAccess`] trait hosts implement.
//! - [`grid`] -- [`GridWorld`], an in-memory layered world.
//! - [`placement`] -- Site sampling and vein commit for claimed regions.
//! - [`error`] -- Error types for world operations.

pub mod access;
pub mod error;
pub mod grid;
pub mod placement;

// Re-export primary types at crate root.
pub use access::BlockAccess;
pub use error::WorldError;
pub use grid::{GridWorld, Layer};
pub use placement::{
    PlacementOutcome, PlacementSettings, PlacementSite, VeinPlan, place_planned, place_vein,
};
