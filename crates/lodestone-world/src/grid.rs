//! An in-memory, single-realm block world.
//!
//! Natural terrain is a stack of horizontal layers shared by every column.
//! Placed blocks are stored sparsely on top of it. The engine binary uses
//! this as its demo world and the tests use it as a deterministic fixture.

use std::collections::{BTreeMap, BTreeSet};

use lodestone_types::{BlockPos, Material, RealmId, RegionKey};

use crate::access::BlockAccess;
use crate::error::WorldError;

/// A horizontal band of natural terrain: every y below `top` (and above the
/// previous layer) is `material`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layer {
    /// Exclusive upper y of the band.
    pub top: i32,
    /// Material filling the band.
    pub material: Material,
}

/// In-memory block world for one realm.
#[derive(Debug, Clone)]
pub struct GridWorld {
    realm: RealmId,
    min_y: i32,
    max_y: i32,
    /// Bottom-up terrain layers.
    layers: Vec<Layer>,
    /// Blocks changed since generation.
    edits: BTreeMap<BlockPos, Material>,
    /// Loaded `(region_x, region_z)` pairs.
    loaded: BTreeSet<(i32, i32)>,
}

impl GridWorld {
    /// A realm with no terrain at all: every position is air.
    pub fn empty(realm: RealmId, min_y: i32, max_y: i32) -> Self {
        Self {
            realm,
            min_y,
            max_y,
            layers: Vec::new(),
            edits: BTreeMap::new(),
            loaded: BTreeSet::new(),
        }
    }

    /// A realm with explicit terrain layers, listed bottom-up.
    pub fn layered(realm: RealmId, min_y: i32, max_y: i32, layers: Vec<Layer>) -> Self {
        Self {
            layers,
            ..Self::empty(realm, min_y, max_y)
        }
    }

    /// Flat terrain: bedrock floor, stone, three blocks of dirt and a grass
    /// surface whose top is at `ground`.
    pub fn flat(realm: RealmId, min_y: i32, max_y: i32, ground: i32) -> Self {
        let layers = vec![
            Layer {
                top: min_y.saturating_add(1),
                material: Material::Bedrock,
            },
            Layer {
                top: ground.saturating_sub(4),
                material: Material::Stone,
            },
            Layer {
                top: ground.saturating_sub(1),
                material: Material::Dirt,
            },
            Layer {
                top: ground,
                material: Material::Grass,
            },
        ];
        Self::layered(realm, min_y, max_y, layers)
    }

    /// The realm this world hosts.
    pub const fn realm(&self) -> &RealmId {
        &self.realm
    }

    /// Mark a region as loaded. Returns `false` if it already was.
    pub fn load_region(&mut self, key: &RegionKey) -> bool {
        key.realm == self.realm && self.loaded.insert((key.x, key.z))
    }

    /// Mark a region as unloaded. Returns `false` if it was not loaded.
    pub fn unload_region(&mut self, key: &RegionKey) -> bool {
        key.realm == self.realm && self.loaded.remove(&(key.x, key.z))
    }

    /// Number of loaded regions.
    pub fn loaded_count(&self) -> usize {
        self.loaded.len()
    }

    /// Positions currently holding `material` because of an edit.
    pub fn placed(&self, material: Material) -> Vec<BlockPos> {
        self.edits
            .iter()
            .filter(|&(_, m)| *m == material)
            .map(|(pos, _)| *pos)
            .collect()
    }

    /// Write a block without the loaded-region check (fixture setup).
    pub fn carve(&mut self, pos: BlockPos, material: Material) {
        if self.in_bounds(pos) {
            self.edits.insert(pos, material);
        }
    }

    const fn in_bounds(&self, pos: BlockPos) -> bool {
        pos.y >= self.min_y && pos.y < self.max_y
    }

    fn natural(&self, y: i32) -> Material {
        self.layers
            .iter()
            .find(|layer| y < layer.top)
            .map_or(Material::Air, |layer| layer.material)
    }

    fn terrain_top(&self) -> i32 {
        self.layers
            .iter()
            .map(|layer| layer.top)
            .max()
            .unwrap_or(self.min_y)
            .clamp(self.min_y, self.max_y)
    }
}

impl BlockAccess for GridWorld {
    fn is_region_loaded(&self, key: &RegionKey) -> bool {
        key.realm == self.realm && self.loaded.contains(&(key.x, key.z))
    }

    fn vertical_bounds(&self, realm: &RealmId) -> Option<(i32, i32)> {
        (*realm == self.realm).then_some((self.min_y, self.max_y))
    }

    fn surface_height(&self, realm: &RealmId, _x: i32, _z: i32) -> Option<i32> {
        (*realm == self.realm).then(|| self.terrain_top())
    }

    fn block(&self, realm: &RealmId, pos: BlockPos) -> Material {
        if *realm != self.realm || !self.in_bounds(pos) {
            return Material::Air;
        }
        self.edits
            .get(&pos)
            .copied()
            .unwrap_or_else(|| self.natural(pos.y))
    }

    fn set_block(
        &mut self,
        realm: &RealmId,
        pos: BlockPos,
        material: Material,
    ) -> Result<(), WorldError> {
        if *realm != self.realm {
            return Err(WorldError::UnknownRealm(realm.clone()));
        }
        if !self.in_bounds(pos) {
            return Err(WorldError::OutOfBounds {
                realm: realm.clone(),
                pos,
            });
        }
        let key = RegionKey::containing(realm, pos.x, pos.z);
        if !self.is_region_loaded(&key) {
            return Err(WorldError::RegionNotLoaded(key));
        }
        self.edits.insert(pos, material);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overworld() -> RealmId {
        RealmId::new("overworld")
    }

    #[test]
    fn flat_world_layers() {
        let world = GridWorld::flat(overworld(), 0, 64, 40);
        let realm = overworld();
        assert_eq!(world.block(&realm, BlockPos::new(0, 0, 0)), Material::Bedrock);
        assert_eq!(world.block(&realm, BlockPos::new(0, 20, 0)), Material::Stone);
        assert_eq!(world.block(&realm, BlockPos::new(0, 37, 0)), Material::Dirt);
        assert_eq!(world.block(&realm, BlockPos::new(0, 39, 0)), Material::Grass);
        assert_eq!(world.block(&realm, BlockPos::new(0, 40, 0)), Material::Air);
        assert_eq!(world.surface_height(&realm, 5, 5), Some(40));
    }

    #[test]
    fn other_realms_read_as_air() {
        let world = GridWorld::flat(overworld(), 0, 64, 40);
        let nether = RealmId::new("nether");
        assert_eq!(world.block(&nether, BlockPos::new(0, 10, 0)), Material::Air);
        assert_eq!(world.vertical_bounds(&nether), None);
    }

    #[test]
    fn writes_require_a_loaded_region() {
        let mut world = GridWorld::flat(overworld(), 0, 64, 40);
        let realm = overworld();
        let pos = BlockPos::new(17, 10, 2);

        let denied = world.set_block(&realm, pos, Material::Lodestone);
        assert!(matches!(denied, Err(WorldError::RegionNotLoaded(_))));

        assert!(world.load_region(&RegionKey::new("overworld", 1, 0)));
        assert!(world.set_block(&realm, pos, Material::Lodestone).is_ok());
        assert_eq!(world.placed(Material::Lodestone), vec![pos]);
    }

    #[test]
    fn writes_outside_vertical_bounds_fail() {
        let mut world = GridWorld::flat(overworld(), 0, 64, 40);
        let realm = overworld();
        world.load_region(&RegionKey::new("overworld", 0, 0));
        let result = world.set_block(&realm, BlockPos::new(0, 64, 0), Material::Stone);
        assert!(matches!(result, Err(WorldError::OutOfBounds { .. })));
    }

    #[test]
    fn unload_region_toggles() {
        let mut world = GridWorld::empty(overworld(), 0, 16);
        let key = RegionKey::new("overworld", 2, 2);
        assert!(world.load_region(&key));
        assert!(!world.load_region(&key));
        assert!(world.unload_region(&key));
        assert!(!world.is_region_loaded(&key));
        assert_eq!(world.loaded_count(), 0);
    }
}
