use crate::constants::{
    SPAWN_PROBES_PER_TICK, SPAWN_SEARCH_MAX_RADIUS, SPAWN_SEARCH_STEP, SURFACE_MAX_Y,
    SURFACE_MIN_Y,
};
use crate::host::WorldProvider;
use crate::types::{BlockPos, WorldHandle};

/// Incremental square-spiral search for a safe spawn column.
///
/// Rings are visited at multiples of `step` around the origin. Each ring is
/// walked edge by edge (`side` 0..4, `offset` along the edge) so every corner
/// is probed exactly once. `process_step` performs a bounded number of probes
/// and then yields back to the tick loop.
#[derive(Clone, Debug)]
pub struct SpawnSearchState {
    radius: i32,
    side: u8,
    offset: i32,
    found: Option<BlockPos>,
    exhausted: bool,
    probes: usize,
    step: i32,
    max_radius: i32,
    probes_per_step: usize,
}

impl Default for SpawnSearchState {
    fn default() -> Self {
        Self::new()
    }
}

impl SpawnSearchState {
    pub fn new() -> Self {
        Self::with_bounds(
            SPAWN_SEARCH_STEP,
            SPAWN_SEARCH_MAX_RADIUS,
            SPAWN_PROBES_PER_TICK,
        )
    }

    pub fn with_bounds(step: i32, max_radius: i32, probes_per_step: usize) -> Self {
        Self {
            radius: 0,
            side: 0,
            offset: 0,
            found: None,
            exhausted: false,
            probes: 0,
            step: step.max(1),
            max_radius: max_radius.max(0),
            probes_per_step: probes_per_step.max(1),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::with_bounds(self.step, self.max_radius, self.probes_per_step);
    }

    pub fn found(&self) -> Option<BlockPos> {
        self.found
    }

    pub fn is_finished(&self) -> bool {
        self.found.is_some() || self.exhausted
    }

    pub fn probes(&self) -> usize {
        self.probes
    }

    pub fn progress(&self) -> f32 {
        if self.is_finished() || self.max_radius == 0 {
            return 100.0;
        }
        (self.radius as f32 / self.max_radius as f32 * 100.0).clamp(0.0, 100.0)
    }

    pub fn worst_case_steps(&self) -> usize {
        let rings = (self.max_radius / self.step) as usize;
        let total_probes = 1 + 4 * rings * (rings + 1);
        total_probes.div_ceil(self.probes_per_step)
    }

    /// Returns `true` once the search is done, either with a latched position
    /// or exhausted with `found() == None`.
    pub fn process_step<W: WorldProvider + ?Sized>(
        &mut self,
        world: &W,
        handle: WorldHandle,
    ) -> bool {
        if self.is_finished() {
            return true;
        }
        for _ in 0..self.probes_per_step {
            let (x, z) = self.current_column();
            self.probes += 1;
            if let Some(ground) = probe_column(world, handle, x, z) {
                self.found = Some(ground);
                return true;
            }
            self.advance();
            if self.exhausted {
                return true;
            }
        }
        false
    }

    fn ring_index(&self) -> i32 {
        self.radius / self.step
    }

    fn side_len(&self) -> i32 {
        let k = self.ring_index();
        match self.side {
            0 => 2 * k + 1,
            1 | 2 => 2 * k,
            _ => 2 * k - 1,
        }
    }

    fn current_column(&self) -> (i32, i32) {
        let r = self.radius;
        let s = self.step;
        let i = self.offset;
        match self.side {
            0 => (-r + i * s, -r),
            1 => (r, -r + (i + 1) * s),
            2 => (r - (i + 1) * s, r),
            _ => (-r, r - (i + 1) * s),
        }
    }

    fn advance(&mut self) {
        if self.radius == 0 {
            self.next_ring();
            return;
        }
        self.offset += 1;
        while self.offset >= self.side_len() {
            self.offset = 0;
            if self.side == 3 {
                self.next_ring();
                return;
            }
            self.side += 1;
        }
    }

    fn next_ring(&mut self) {
        self.radius += self.step;
        self.side = 0;
        self.offset = 0;
        if self.radius > self.max_radius {
            self.exhausted = true;
        }
    }
}

fn probe_column<W: WorldProvider + ?Sized>(
    world: &W,
    handle: WorldHandle,
    x: i32,
    z: i32,
) -> Option<BlockPos> {
    // Biome lookup is cheap and avoids loading terrain for ocean columns.
    if world.biome_at(handle, x, z).is_ocean() {
        return None;
    }
    let height = world.top_surface_height(handle, x, z)?;
    if !(SURFACE_MIN_Y..=SURFACE_MAX_Y).contains(&height) {
        return None;
    }
    let ground = BlockPos::new(x, height, z);
    let safe = world.block_kind_at(handle, ground).is_safe_ground()
        && world.block_kind_at(handle, ground.above(1)).is_clear()
        && world.block_kind_at(handle, ground.above(2)).is_clear();
    safe.then_some(ground)
}
