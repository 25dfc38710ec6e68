use std::collections::BTreeMap;

use crate::error::HostError;
use crate::settings::DifficultyTier;
use crate::types::{Biome, BlockKind, BlockPos, WorldHandle};

pub const SEA_LEVEL: i32 = 62;
const CELL_SIZE: i32 = 64;
const MIN_FLOOR: i32 = 40;
const TERRAIN_SPAN: f64 = 64.0;

#[derive(Clone, Debug)]
pub struct SimTerrain {
    seed: u64,
    difficulty: DifficultyTier,
    all_ocean: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Column {
    biome: Biome,
    top: i32,
    surface: BlockKind,
    floor: i32,
}

impl SimTerrain {
    pub fn new(seed: u64, difficulty: DifficultyTier) -> Self {
        Self {
            seed,
            difficulty,
            all_ocean: false,
        }
    }

    pub fn difficulty(&self) -> DifficultyTier {
        self.difficulty
    }

    fn column(&self, x: i32, z: i32) -> Column {
        let elevation = value_noise(self.seed, x, z);
        let floor = MIN_FLOOR + (elevation * TERRAIN_SPAN) as i32;
        if self.all_ocean || floor < SEA_LEVEL {
            let biome = if self.all_ocean || floor < SEA_LEVEL - 10 {
                Biome::DeepOcean
            } else {
                Biome::Ocean
            };
            return Column {
                biome,
                top: SEA_LEVEL,
                surface: BlockKind::Water,
                floor: floor.min(SEA_LEVEL - 1),
            };
        }

        let moisture = value_noise(self.seed ^ 0x9e37_79b9_7f4a_7c15, x, z);
        let detail = hash_coords(self.seed ^ 0x51ed_2701, x, z);
        let biome = if floor <= SEA_LEVEL + 1 {
            Biome::Beach
        } else if floor > 96 {
            Biome::Mountains
        } else if moisture > 0.75 {
            Biome::Swamp
        } else if moisture < 0.2 {
            Biome::Desert
        } else if moisture > 0.6 {
            Biome::Snowy
        } else if moisture > 0.45 {
            Biome::Forest
        } else {
            Biome::Plains
        };

        let (top, surface) = match biome {
            Biome::Swamp if detail < 0.4 => (floor, BlockKind::Water),
            Biome::Snowy if detail < 0.5 => (floor, BlockKind::Ice),
            Biome::Forest if detail < 0.35 => (floor + 1, BlockKind::Vegetation),
            Biome::Mountains if detail < 0.05 => (floor, BlockKind::Lava),
            _ => (floor, BlockKind::Solid),
        };
        Column {
            biome,
            top,
            surface,
            floor,
        }
    }

    pub fn top_surface_height(&self, x: i32, z: i32) -> i32 {
        self.column(x, z).top
    }

    pub fn biome_at(&self, x: i32, z: i32) -> Biome {
        self.column(x, z).biome
    }

    pub fn block_kind_at(&self, pos: BlockPos) -> BlockKind {
        let column = self.column(pos.x, pos.z);
        if pos.y > column.top {
            return BlockKind::Air;
        }
        if pos.y == column.top {
            return column.surface;
        }
        if pos.y > column.floor {
            // Ocean water column, or the ground under a tree.
            return if column.surface == BlockKind::Water {
                BlockKind::Water
            } else {
                BlockKind::Solid
            };
        }
        BlockKind::Solid
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimWorldProvider {
    next_handle: u64,
    worlds: BTreeMap<WorldHandle, SimTerrain>,
    pub fail_creation: bool,
    pub fail_teardown: bool,
    pub all_ocean: bool,
    pub created: Vec<WorldHandle>,
    pub destroyed: Vec<WorldHandle>,
    pub preloaded: Vec<(WorldHandle, BlockPos)>,
}

impl SimWorldProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_worlds(&self) -> usize {
        self.worlds.len()
    }

    pub fn terrain(&self, handle: WorldHandle) -> Option<&SimTerrain> {
        self.worlds.get(&handle)
    }

    pub fn create(
        &mut self,
        seed: u64,
        difficulty: DifficultyTier,
    ) -> Result<WorldHandle, HostError> {
        if self.fail_creation {
            return Err(HostError::WorldCreation(format!(
                "simulated failure for seed {seed}"
            )));
        }
        self.next_handle += 1;
        let handle = WorldHandle(self.next_handle);
        let mut terrain = SimTerrain::new(seed, difficulty);
        terrain.all_ocean = self.all_ocean;
        self.worlds.insert(handle, terrain);
        self.created.push(handle);
        Ok(handle)
    }

    pub fn destroy(&mut self, handle: WorldHandle) -> Result<(), HostError> {
        if self.fail_teardown {
            return Err(HostError::WorldTeardown(
                handle,
                "simulated teardown failure".to_string(),
            ));
        }
        if self.worlds.remove(&handle).is_none() {
            return Err(HostError::WorldUnavailable(handle));
        }
        self.destroyed.push(handle);
        Ok(())
    }

    pub fn preload(&mut self, handle: WorldHandle, center: BlockPos) {
        self.preloaded.push((handle, center));
    }
}

fn hash_coords(seed: u64, x: i32, z: i32) -> f64 {
    let mut t = seed
        ^ (x as u32 as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (z as u32 as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
    t = t.wrapping_add(0x6d2b_79f5);
    t = (t ^ (t >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    t = (t ^ (t >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    t ^= t >> 31;
    (t >> 11) as f64 / (1u64 << 53) as f64
}

/// Bilinear value noise over a `CELL_SIZE` lattice, in `[0, 1)`.
fn value_noise(seed: u64, x: i32, z: i32) -> f64 {
    let cx = x.div_euclid(CELL_SIZE);
    let cz = z.div_euclid(CELL_SIZE);
    let fx = f64::from(x.rem_euclid(CELL_SIZE)) / f64::from(CELL_SIZE);
    let fz = f64::from(z.rem_euclid(CELL_SIZE)) / f64::from(CELL_SIZE);
    let sx = fx * fx * (3.0 - 2.0 * fx);
    let sz = fz * fz * (3.0 - 2.0 * fz);

    let c00 = hash_coords(seed, cx, cz);
    let c10 = hash_coords(seed, cx + 1, cz);
    let c01 = hash_coords(seed, cx, cz + 1);
    let c11 = hash_coords(seed, cx + 1, cz + 1);
    let top = c00 + (c10 - c00) * sx;
    let bottom = c01 + (c11 - c01) * sx;
    top + (bottom - top) * sz
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terrain_is_deterministic_per_seed() {
        let a = SimTerrain::new(42, DifficultyTier::Normal);
        let b = SimTerrain::new(42, DifficultyTier::Normal);
        for (x, z) in [(0, 0), (100, -37), (-480, 480)] {
            assert_eq!(a.column(x, z), b.column(x, z));
        }
    }

    #[test]
    fn ocean_columns_sit_at_sea_level() {
        let mut terrain = SimTerrain::new(1, DifficultyTier::Easy);
        terrain.all_ocean = true;
        assert!(terrain.biome_at(5, 5).is_ocean());
        assert_eq!(terrain.top_surface_height(5, 5), SEA_LEVEL);
        assert_eq!(
            terrain.block_kind_at(BlockPos::new(5, SEA_LEVEL, 5)),
            BlockKind::Water
        );
        assert_eq!(
            terrain.block_kind_at(BlockPos::new(5, SEA_LEVEL + 1, 5)),
            BlockKind::Air
        );
    }

    #[test]
    fn land_columns_have_air_above_the_surface() {
        let terrain = SimTerrain::new(9, DifficultyTier::Normal);
        for x in (-256..256).step_by(32) {
            let top = terrain.top_surface_height(x, 64);
            assert_eq!(terrain.block_kind_at(BlockPos::new(x, top + 1, 64)), BlockKind::Air);
            assert_ne!(terrain.block_kind_at(BlockPos::new(x, top, 64)), BlockKind::Air);
        }
    }

    #[test]
    fn provider_tracks_lifecycle_and_failures() {
        let mut provider = SimWorldProvider::new();
        let handle = provider.create(3, DifficultyTier::Hard).expect("created");
        assert_eq!(provider.live_worlds(), 1);
        assert_eq!(
            provider.terrain(handle).map(SimTerrain::difficulty),
            Some(DifficultyTier::Hard)
        );
        provider.destroy(handle).expect("destroyed");
        assert!(matches!(
            provider.destroy(handle),
            Err(HostError::WorldUnavailable(_))
        ));

        provider.fail_creation = true;
        assert!(matches!(
            provider.create(4, DifficultyTier::Hard),
            Err(HostError::WorldCreation(_))
        ));
    }

    #[test]
    fn noise_stays_in_unit_range() {
        for x in (-600..600).step_by(37) {
            for z in (-600..600).step_by(41) {
                let v = value_noise(11, x, z);
                assert!((0.0..1.0).contains(&v));
            }
        }
    }
}
