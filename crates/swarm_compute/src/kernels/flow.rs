//! Flow field passes: reset, seed, relax, derive vectors.
//!
//! Costs and direction codes for all fields share one buffer each; a field
//! occupies `[field * volume, (field + 1) * volume)`.

use swarm_shared::constants::COST_UNREACHABLE;
use swarm_shared::{CubeGrid, IVec3, VoxelClass, DIRECTION_NONE};

/// Marks every cell of a field unreachable with no direction.
pub fn reset(cost: &mut [u32], dirs: &mut [u32]) {
    cost.fill(COST_UNREACHABLE);
    dirs.fill(DIRECTION_NONE);
}

/// Sets passable in-window targets to cost zero.
pub fn seed(grid: CubeGrid, voxels: &[u32], cost: &mut [u32], targets: &[[i32; 4]]) {
    for t in targets {
        let Some(i) = grid.index(IVec3::new(t[0], t[1], t[2])) else {
            continue;
        };
        if VoxelClass::from_code(voxels[i]).is_passable() {
            cost[i] = 0;
        }
    }
}

/// One in-place relaxation sweep. Returns whether any cost dropped.
pub fn relax(grid: CubeGrid, voxels: &[u32], cost: &mut [u32]) -> bool {
    let mut changed = false;
    for i in 0..grid.volume() {
        let Some(step) = VoxelClass::from_code(voxels[i]).step_cost() else {
            continue;
        };
        let best = grid
            .neighbors(grid.coords(i))
            .map(|(_, n)| cost[n])
            .min()
            .unwrap_or(COST_UNREACHABLE);
        if best >= COST_UNREACHABLE {
            continue;
        }
        let candidate = best.saturating_add(step).min(COST_UNREACHABLE - 1);
        if candidate < cost[i] {
            cost[i] = candidate;
            changed = true;
        }
    }
    changed
}

/// Direction code toward the cheapest strictly-lower neighbor.
///
/// Ties go to the first neighbor in `+X, -X, +Y, -Y, +Z, -Z` order. Targets,
/// impassable and unreachable cells get no direction.
pub fn derive_vectors(grid: CubeGrid, voxels: &[u32], cost: &[u32], dirs: &mut [u32]) {
    for i in 0..grid.volume() {
        let own = cost[i];
        if own == 0 || own >= COST_UNREACHABLE || !VoxelClass::from_code(voxels[i]).is_passable() {
            dirs[i] = DIRECTION_NONE;
            continue;
        }
        let mut best = own;
        let mut code = DIRECTION_NONE;
        for (c, n) in grid.neighbors(grid.coords(i)) {
            if cost[n] < best {
                best = cost[n];
                code = c;
            }
        }
        dirs[i] = code;
    }
}

/// Runs every pass for one field. Returns the sweeps actually executed.
///
/// Relaxation stops early once a sweep changes nothing.
pub fn compute(
    grid: CubeGrid,
    voxels: &[u32],
    cost: &mut [u32],
    dirs: &mut [u32],
    targets: &[[i32; 4]],
    sweeps: u32,
) -> u32 {
    reset(cost, dirs);
    seed(grid, voxels, cost, targets);
    let mut ran = 0;
    while ran < sweeps {
        ran += 1;
        if !relax(grid, voxels, cost) {
            break;
        }
    }
    derive_vectors(grid, voxels, cost, dirs);
    ran
}

/// Default sweep count: enough for any straight path across the grid.
#[must_use]
pub const fn default_sweeps(grid: CubeGrid) -> u32 {
    3 * grid.size.saturating_sub(1)
}
