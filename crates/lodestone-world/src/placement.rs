//! Vein placement inside a freshly claimed region.
//!
//! Runs only on the mutation lane. A vein is one or two blocks of the marker
//! material, chosen as follows:
//!
//! 1. Abort if the region is no longer loaded (the claim stays consumed).
//! 2. Roll the vein size: 1 or 2, uniformly.
//! 3. Roll the tier: surface with probability `surface_chance`, else buried.
//!    - Surface: up to `surface_samples` random columns; the highest natural
//!      terrain block must be substrate with air above it. Falls back to a
//!      buried search when the budget runs out.
//!    - Buried: up to `buried_samples` random positions across the realm's
//!      full height; the block must be substrate.
//! 4. Commit the primary site.
//! 5. For size 2, commit one random substrate neighbor of the primary site
//!    (among the six axis-aligned ones, in loaded regions), if any.
//!    Otherwise the vein stays at size 1.
//!
//! Running out of samples is a normal outcome, not an error.

use lodestone_types::{BlockPos, Material, PlacementTier, REGION_SIZE, RegionKey};
use rand::Rng;
use serde::Deserialize;

use crate::access::BlockAccess;
use crate::error::WorldError;

/// Default probability of attempting a surface placement.
pub const DEFAULT_SURFACE_CHANCE: f64 = 0.05;

/// Default number of columns sampled by a surface search.
pub const DEFAULT_SURFACE_SAMPLES: u32 = 12;

/// Default number of positions sampled by a buried search.
pub const DEFAULT_BURIED_SAMPLES: u32 = 24;

/// Tunables for vein placement.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlacementSettings {
    /// Material a site must currently hold to be replaced.
    #[serde(default = "default_substrate")]
    pub substrate: Material,

    /// Material committed at each vein site.
    #[serde(default = "default_marker")]
    pub marker: Material,

    /// Probability in `[0, 1]` of trying the surface tier first.
    #[serde(default = "default_surface_chance")]
    pub surface_chance: f64,

    /// Column budget of a surface search.
    #[serde(default = "default_surface_samples")]
    pub surface_samples: u32,

    /// Position budget of a buried search.
    #[serde(default = "default_buried_samples")]
    pub buried_samples: u32,
}

impl Default for PlacementSettings {
    fn default() -> Self {
        Self {
            substrate: default_substrate(),
            marker: default_marker(),
            surface_chance: default_surface_chance(),
            surface_samples: default_surface_samples(),
            buried_samples: default_buried_samples(),
        }
    }
}

impl PlacementSettings {
    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::InvalidSettings`] if the surface chance is not a
    /// probability or the marker equals the substrate.
    pub fn validate(&self) -> Result<(), WorldError> {
        if !(0.0..=1.0).contains(&self.surface_chance) {
            return Err(WorldError::InvalidSettings(format!(
                "surface_chance must be within [0, 1], got {}",
                self.surface_chance
            )));
        }
        if self.marker == self.substrate {
            return Err(WorldError::InvalidSettings(
                "marker and substrate must differ".to_owned(),
            ));
        }
        Ok(())
    }

    /// Surface chance safe to hand to the RNG; anything invalid means never.
    fn surface_probability(&self) -> f64 {
        if (0.0..=1.0).contains(&self.surface_chance) {
            self.surface_chance
        } else {
            0.0
        }
    }
}

const fn default_substrate() -> Material {
    Material::Stone
}

const fn default_marker() -> Material {
    Material::Lodestone
}

const fn default_surface_chance() -> f64 {
    DEFAULT_SURFACE_CHANCE
}

const fn default_surface_samples() -> u32 {
    DEFAULT_SURFACE_SAMPLES
}

const fn default_buried_samples() -> u32 {
    DEFAULT_BURIED_SAMPLES
}

/// A sampled candidate: where, and what was there when it was looked at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacementSite {
    /// Sampled position.
    pub pos: BlockPos,
    /// Material observed at sampling time.
    pub observed: Material,
}

/// The rolled shape of a vein before any site is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VeinPlan {
    /// Tier searched first.
    pub tier: PlacementTier,
    /// Requested number of sites (1 or 2).
    pub size: u8,
}

impl VeinPlan {
    /// Roll a plan: size uniformly 1 or 2, surface tier with the configured
    /// probability.
    pub fn roll<R: Rng + ?Sized>(settings: &PlacementSettings, rng: &mut R) -> Self {
        let size = if rng.random_bool(0.5) { 2 } else { 1 };
        let tier = if rng.random_bool(settings.surface_probability()) {
            PlacementTier::Surface
        } else {
            PlacementTier::Buried
        };
        Self { tier, size }
    }
}

/// What a placement run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// The region was unloaded before placement ran; nothing was touched.
    RegionUnloaded,
    /// No site matched within the sampling budget.
    NoSite,
    /// The vein was committed.
    Placed {
        /// Tier the primary site was found in.
        tier: PlacementTier,
        /// Committed positions, primary first.
        sites: Vec<BlockPos>,
    },
}

/// Roll a plan and place a vein in `key`.
///
/// # Errors
///
/// Returns [`WorldError`] if the world rejects a block write.
pub fn place_vein<W, R>(
    world: &mut W,
    key: &RegionKey,
    settings: &PlacementSettings,
    rng: &mut R,
) -> Result<PlacementOutcome, WorldError>
where
    W: BlockAccess + ?Sized,
    R: Rng + ?Sized,
{
    if !world.is_region_loaded(key) {
        return Ok(PlacementOutcome::RegionUnloaded);
    }
    let plan = VeinPlan::roll(settings, rng);
    place_planned(world, key, plan, settings, rng)
}

/// Place a vein following an already-rolled plan.
///
/// # Errors
///
/// Returns [`WorldError`] if the world rejects a block write.
pub fn place_planned<W, R>(
    world: &mut W,
    key: &RegionKey,
    plan: VeinPlan,
    settings: &PlacementSettings,
    rng: &mut R,
) -> Result<PlacementOutcome, WorldError>
where
    W: BlockAccess + ?Sized,
    R: Rng + ?Sized,
{
    if !world.is_region_loaded(key) {
        return Ok(PlacementOutcome::RegionUnloaded);
    }

    let found = match plan.tier {
        PlacementTier::Surface => search_surface(world, key, settings, rng)
            .map(|site| (PlacementTier::Surface, site))
            .or_else(|| {
                search_buried(world, key, settings, rng).map(|site| (PlacementTier::Buried, site))
            }),
        PlacementTier::Buried => {
            search_buried(world, key, settings, rng).map(|site| (PlacementTier::Buried, site))
        }
    };

    let Some((tier, primary)) = found else {
        tracing::debug!(region = %key, "No vein site within sampling budget");
        return Ok(PlacementOutcome::NoSite);
    };

    world.set_block(&key.realm, primary.pos, settings.marker)?;
    let mut sites = vec![primary.pos];

    if plan.size >= 2 {
        if let Some(extra) = pick_neighbor(world, key, primary.pos, settings, rng) {
            world.set_block(&key.realm, extra.pos, settings.marker)?;
            sites.push(extra.pos);
        }
    }

    tracing::debug!(region = %key, ?tier, size = sites.len(), "Vein placed");
    Ok(PlacementOutcome::Placed { tier, sites })
}

/// Sample random columns for a substrate block exposed to air.
fn search_surface<W, R>(
    world: &W,
    key: &RegionKey,
    settings: &PlacementSettings,
    rng: &mut R,
) -> Option<PlacementSite>
where
    W: BlockAccess + ?Sized,
    R: Rng + ?Sized,
{
    for _ in 0..settings.surface_samples {
        let (x, z) = random_column(key, rng);
        let Some(height) = world.surface_height(&key.realm, x, z) else {
            return None;
        };
        let pos = BlockPos::new(x, height.saturating_sub(1), z);
        let observed = world.block(&key.realm, pos);
        if observed == settings.substrate && world.block(&key.realm, pos.above()).is_air() {
            return Some(PlacementSite { pos, observed });
        }
    }
    None
}

/// Sample random positions across the full height for a substrate block.
fn search_buried<W, R>(
    world: &W,
    key: &RegionKey,
    settings: &PlacementSettings,
    rng: &mut R,
) -> Option<PlacementSite>
where
    W: BlockAccess + ?Sized,
    R: Rng + ?Sized,
{
    let (min_y, max_y) = world.vertical_bounds(&key.realm)?;
    if min_y >= max_y {
        return None;
    }
    for _ in 0..settings.buried_samples {
        let (x, z) = random_column(key, rng);
        let y = rng.random_range(min_y..max_y);
        let pos = BlockPos::new(x, y, z);
        let observed = world.block(&key.realm, pos);
        if observed == settings.substrate {
            return Some(PlacementSite { pos, observed });
        }
    }
    None
}

/// Pick one substrate neighbor of `primary` uniformly, if any exists.
///
/// Neighbors across a region edge only count when that region is loaded.
fn pick_neighbor<W, R>(
    world: &W,
    key: &RegionKey,
    primary: BlockPos,
    settings: &PlacementSettings,
    rng: &mut R,
) -> Option<PlacementSite>
where
    W: BlockAccess + ?Sized,
    R: Rng + ?Sized,
{
    let candidates: Vec<PlacementSite> = primary
        .neighbors()
        .into_iter()
        .map(|pos| PlacementSite {
            pos,
            observed: world.block(&key.realm, pos),
        })
        .filter(|site| {
            site.observed == settings.substrate
                && world.is_region_loaded(&RegionKey::containing(&key.realm, site.pos.x, site.pos.z))
        })
        .collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.get(rng.random_range(0..candidates.len())).copied()
}

fn random_column<R: Rng + ?Sized>(key: &RegionKey, rng: &mut R) -> (i32, i32) {
    let min_x = key.min_block_x();
    let min_z = key.min_block_z();
    (
        rng.random_range(min_x..min_x.saturating_add(REGION_SIZE)),
        rng.random_range(min_z..min_z.saturating_add(REGION_SIZE)),
    )
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::arithmetic_side_effects
)]
mod tests {
    use lodestone_types::RealmId;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::grid::{GridWorld, Layer};

    fn overworld() -> RealmId {
        RealmId::new("overworld")
    }

    fn region() -> RegionKey {
        RegionKey::new("overworld", 3, -2)
    }

    fn loaded(mut world: GridWorld) -> GridWorld {
        world.load_region(&region());
        world
    }

    fn in_region(pos: BlockPos) -> bool {
        let key = region();
        (key.min_block_x()..key.min_block_x() + REGION_SIZE).contains(&pos.x)
            && (key.min_block_z()..key.min_block_z() + REGION_SIZE).contains(&pos.z)
    }

    #[test]
    fn unloaded_region_is_left_alone() {
        let mut world = GridWorld::flat(overworld(), 0, 64, 40);
        let mut rng = SmallRng::seed_from_u64(42);
        let outcome = place_vein(&mut world, &region(), &PlacementSettings::default(), &mut rng);
        assert_eq!(outcome.unwrap(), PlacementOutcome::RegionUnloaded);
        assert!(world.placed(Material::Lodestone).is_empty());
    }

    #[test]
    fn buried_vein_replaces_substrate_inside_region() {
        for seed in 0..32 {
            let mut world = loaded(GridWorld::layered(
                overworld(),
                0,
                32,
                vec![Layer {
                    top: 32,
                    material: Material::Stone,
                }],
            ));
            let mut rng = SmallRng::seed_from_u64(seed);
            let outcome =
                place_vein(&mut world, &region(), &PlacementSettings::default(), &mut rng)
                    .unwrap();
            let PlacementOutcome::Placed { sites, .. } = outcome else {
                panic!("solid stone must always yield a site");
            };
            assert!((1..=2).contains(&sites.len()));
            assert!(in_region(sites[0]));
            let mut placed = world.placed(Material::Lodestone);
            placed.sort();
            let mut expected = sites.clone();
            expected.sort();
            assert_eq!(placed, expected);
        }
    }

    #[test]
    fn second_site_is_adjacent_to_primary() {
        let mut world = loaded(GridWorld::layered(
            overworld(),
            0,
            32,
            vec![Layer {
                top: 32,
                material: Material::Stone,
            }],
        ));
        let mut rng = SmallRng::seed_from_u64(7);
        let plan = VeinPlan {
            tier: PlacementTier::Buried,
            size: 2,
        };
        let outcome =
            place_planned(&mut world, &region(), plan, &PlacementSettings::default(), &mut rng)
                .unwrap();
        let PlacementOutcome::Placed { sites, .. } = outcome else {
            panic!("expected a placed vein");
        };
        assert_eq!(sites.len(), 2);
        assert!(sites[0].neighbors().contains(&sites[1]));
    }

    #[test]
    fn vein_degrades_to_one_without_matching_neighbors() {
        let key = region();
        let lone = BlockPos::new(key.min_block_x() + 5, 8, key.min_block_z() + 5);
        let mut world = loaded(GridWorld::empty(overworld(), 0, 16));
        world.carve(lone, Material::Stone);

        let settings = PlacementSettings {
            buried_samples: 100_000,
            ..PlacementSettings::default()
        };
        let plan = VeinPlan {
            tier: PlacementTier::Buried,
            size: 2,
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = place_planned(&mut world, &key, plan, &settings, &mut rng).unwrap();
        assert_eq!(
            outcome,
            PlacementOutcome::Placed {
                tier: PlacementTier::Buried,
                sites: vec![lone],
            }
        );
        assert_eq!(world.placed(Material::Lodestone), vec![lone]);
    }

    #[test]
    fn no_substrate_means_no_site() {
        let mut world = loaded(GridWorld::empty(overworld(), 0, 16));
        let mut rng = SmallRng::seed_from_u64(3);
        let outcome =
            place_vein(&mut world, &region(), &PlacementSettings::default(), &mut rng).unwrap();
        assert_eq!(outcome, PlacementOutcome::NoSite);
        assert!(world.placed(Material::Lodestone).is_empty());
    }

    #[test]
    fn surface_search_picks_exposed_top_block() {
        let mut world = loaded(GridWorld::layered(
            overworld(),
            0,
            64,
            vec![Layer {
                top: 40,
                material: Material::Stone,
            }],
        ));
        let plan = VeinPlan {
            tier: PlacementTier::Surface,
            size: 1,
        };
        let mut rng = SmallRng::seed_from_u64(11);
        let outcome =
            place_planned(&mut world, &region(), plan, &PlacementSettings::default(), &mut rng)
                .unwrap();
        let PlacementOutcome::Placed { tier, sites } = outcome else {
            panic!("expected a surface vein");
        };
        assert_eq!(tier, PlacementTier::Surface);
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].y, 39);
    }

    #[test]
    fn covered_surface_falls_back_to_buried() {
        // Grass on top means the highest terrain block is never substrate.
        let mut world = loaded(GridWorld::flat(overworld(), 0, 64, 40));
        let plan = VeinPlan {
            tier: PlacementTier::Surface,
            size: 1,
        };
        let settings = PlacementSettings {
            buried_samples: 10_000,
            ..PlacementSettings::default()
        };
        let mut rng = SmallRng::seed_from_u64(5);
        let outcome = place_planned(&mut world, &region(), plan, &settings, &mut rng).unwrap();
        let PlacementOutcome::Placed { tier, sites } = outcome else {
            panic!("expected a buried fallback");
        };
        assert_eq!(tier, PlacementTier::Buried);
        assert!(sites[0].y >= 1 && sites[0].y < 36);
    }

    #[test]
    fn plan_roll_respects_extreme_chances() {
        let always = PlacementSettings {
            surface_chance: 1.0,
            ..PlacementSettings::default()
        };
        let never = PlacementSettings {
            surface_chance: 0.0,
            ..PlacementSettings::default()
        };
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..50 {
            let a = VeinPlan::roll(&always, &mut rng);
            let b = VeinPlan::roll(&never, &mut rng);
            assert_eq!(a.tier, PlacementTier::Surface);
            assert_eq!(b.tier, PlacementTier::Buried);
            assert!(a.size == 1 || a.size == 2);
        }
    }

    #[test]
    fn both_vein_sizes_occur() {
        let settings = PlacementSettings::default();
        let mut rng = SmallRng::seed_from_u64(2024);
        let sizes: Vec<u8> = (0..64).map(|_| VeinPlan::roll(&settings, &mut rng).size).collect();
        assert!(sizes.contains(&1));
        assert!(sizes.contains(&2));
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let bad_chance = PlacementSettings {
            surface_chance: 1.5,
            ..PlacementSettings::default()
        };
        assert!(bad_chance.validate().is_err());

        let same = PlacementSettings {
            marker: Material::Stone,
            ..PlacementSettings::default()
        };
        assert!(same.validate().is_err());
        assert!(PlacementSettings::default().validate().is_ok());
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: PlacementSettings =
            serde_yml::from_str("substrate: deepslate\nsurface_chance: 0.25\n").unwrap();
        assert_eq!(settings.substrate, Material::Deepslate);
        assert_eq!(settings.marker, Material::Lodestone);
        assert_eq!(settings.buried_samples, DEFAULT_BURIED_SAMPLES);
    }
}
