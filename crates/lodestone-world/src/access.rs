//! The seam between placement logic and whatever hosts the live world.
//!
//! Implementations are only ever touched from the mutation lane, so the
//! trait takes `&mut self` for writes and needs no interior locking.

use lodestone_types::{BlockPos, Material, RealmId, RegionKey};

use crate::error::WorldError;

/// Read/write access to live world blocks.
pub trait BlockAccess {
    /// Whether the region is currently loaded and safe to mutate.
    fn is_region_loaded(&self, key: &RegionKey) -> bool;

    /// Vertical bounds of a realm as `(min_y, max_y)`, min inclusive and max
    /// exclusive. `None` if the realm is not hosted here.
    fn vertical_bounds(&self, realm: &RealmId) -> Option<(i32, i32)>;

    /// Height-map value of a column: the y of the lowest empty block above
    /// natural terrain. The highest natural-terrain block sits one below it.
    fn surface_height(&self, realm: &RealmId, x: i32, z: i32) -> Option<i32>;

    /// The material currently at `pos`. Positions outside the realm read as
    /// [`Material::Air`].
    fn block(&self, realm: &RealmId, pos: BlockPos) -> Material;

    /// Replace the block at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] if the realm is unknown, the position is out of
    /// bounds, or its region is not loaded.
    fn set_block(
        &mut self,
        realm: &RealmId,
        pos: BlockPos,
        material: Material,
    ) -> Result<(), WorldError>;
}
