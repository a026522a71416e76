//! Shared kernel helpers: hashing, noise, voxel queries, ray casts.
//!
//! Each function has a WGSL twin in the behavior module with the same
//! name and arithmetic.

use swarm_shared::{CubeGrid, Vec3, VoxelClass};

/// Iteration cap for [`VoxelView::cast_ray`].
pub const RAY_MAX_STEPS: u32 = 64;

const GOLDEN_ANGLE: f32 = 2.399_963;

/// `x - floor(x)`, as WGSL defines it.
#[inline]
pub(crate) fn fract(v: f32) -> f32 {
    v - v.floor()
}

/// Sin-based 3D hash in `[-1, 1)`.
#[must_use]
pub fn hash33(p: Vec3) -> Vec3 {
    let q = Vec3::new(
        p.dot(Vec3::new(127.1, 311.7, 74.7)),
        p.dot(Vec3::new(269.5, 183.3, 246.1)),
        p.dot(Vec3::new(113.5, 271.9, 124.6)),
    );
    let s = Vec3::new(
        fract(q.x.sin() * 43_758.545),
        fract(q.y.sin() * 43_758.545),
        fract(q.z.sin() * 43_758.545),
    );
    s * 2.0 - Vec3::splat(1.0)
}

/// LCG step used for neighbor sampling.
#[inline]
#[must_use]
pub const fn next_rand(state: u32) -> u32 {
    state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223)
}

/// PCG hash.
#[inline]
#[must_use]
pub const fn pcg(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Uniform float in `[0, 1)` from a PCG hash.
#[inline]
#[must_use]
pub fn rand01(v: u32) -> f32 {
    (pcg(v) >> 8) as f32 / 16_777_216.0
}

/// Divergence-free noise direction.
#[must_use]
pub fn curl_noise(p: Vec3, time: f32) -> Vec3 {
    let e = 0.1;
    let pt = p + Vec3::new(0.0, time * 0.5, 0.0);
    let n0 = hash33(pt);
    let dx = hash33(pt + Vec3::new(e, 0.0, 0.0));
    let dy = hash33(pt + Vec3::new(0.0, e, 0.0));
    let dz = hash33(pt + Vec3::new(0.0, 0.0, e));
    Vec3::new(
        (dy.z - n0.z) - (dz.y - n0.y),
        (dz.x - n0.x) - (dx.z - n0.z),
        (dx.y - n0.y) - (dy.x - n0.x),
    )
    .safe_normalize()
}

/// True when `diff` lies inside the cone around `fwd`.
#[inline]
#[must_use]
pub fn in_fov(fwd: Vec3, diff: Vec3, fov_cos: f32) -> bool {
    fwd.dot(diff.safe_normalize()) > fov_cos
}

/// Direction `i` of `n` spread over a cone around `fwd`.
#[must_use]
pub fn fibonacci_cone(i: u32, n: u32, fwd: Vec3, spread: f32) -> Vec3 {
    let denom = n.saturating_sub(1).max(1) as f32;
    let z = 1.0 - (i as f32 / denom) * spread;
    let radius = (1.0 - z * z).max(0.0).sqrt();
    let theta = GOLDEN_ANGLE * i as f32;
    let x = theta.cos() * radius;
    let y = theta.sin() * radius;
    let up0 = if fwd.y.abs() < 0.99 { Vec3::Y } else { Vec3::X };
    let right = up0.cross(fwd).safe_normalize();
    let up = fwd.cross(right);
    right * x + up * y + fwd * z
}

/// Read-only view of the classified voxel window.
#[derive(Clone, Copy, Debug)]
pub struct VoxelView<'a> {
    grid: CubeGrid,
    cells: &'a [u32],
}

impl<'a> VoxelView<'a> {
    /// Wraps a dense voxel grid.
    #[must_use]
    pub const fn new(grid: CubeGrid, cells: &'a [u32]) -> Self {
        Self { grid, cells }
    }

    /// Class at a window-relative position. Outside the window reads as air.
    #[must_use]
    pub fn class_at(&self, p: Vec3) -> VoxelClass {
        self.grid
            .index(p.floor())
            .and_then(|i| self.cells.get(i))
            .map_or(VoxelClass::Air, |&c| VoxelClass::from_code(c))
    }

    /// Solid for movement: full blocks and tall obstacles.
    #[inline]
    #[must_use]
    pub fn blocks(&self, p: Vec3) -> bool {
        matches!(self.class_at(p), VoxelClass::Solid | VoxelClass::Tall)
    }

    /// Distance along `dir` to the first blocking cell, or `max_dist`.
    #[must_use]
    pub fn cast_ray(&self, start: Vec3, dir: Vec3, max_dist: f32) -> f32 {
        let inv = |d: f32| if d.abs() < 1e-6 { 1e30 } else { (1.0 / d).abs() };
        let delta = Vec3::new(inv(dir.x), inv(dir.y), inv(dir.z));

        let mut cell = start.floor();
        let step_x = if dir.x < 0.0 { -1 } else { 1 };
        let step_y = if dir.y < 0.0 { -1 } else { 1 };
        let step_z = if dir.z < 0.0 { -1 } else { 1 };
        let side = |s: f32, c: i32, d: f32, dd: f32| {
            if d < 0.0 {
                (s - c as f32) * dd
            } else {
                (c as f32 + 1.0 - s) * dd
            }
        };
        let mut side_x = side(start.x, cell.x, dir.x, delta.x);
        let mut side_y = side(start.y, cell.y, dir.y, delta.y);
        let mut side_z = side(start.z, cell.z, dir.z, delta.z);

        let mut dist = 0.0;
        let mut steps = 0;
        while dist < max_dist && steps < RAY_MAX_STEPS {
            steps += 1;
            if side_x < side_y && side_x < side_z {
                dist = side_x;
                side_x += delta.x;
                cell.x += step_x;
            } else if side_y < side_z {
                dist = side_y;
                side_y += delta.y;
                cell.y += step_y;
            } else {
                dist = side_z;
                side_z += delta.z;
                cell.z += step_z;
            }
            if dist >= max_dist {
                break;
            }
            if let Some(i) = self.grid.index(cell) {
                let class = VoxelClass::from_code(self.cells[i]);
                if matches!(class, VoxelClass::Solid | VoxelClass::Tall) {
                    return dist;
                }
            }
        }
        max_dist
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarm_shared::IVec3;

    fn floor_grid(size: u32, floor_y: i32) -> Vec<u32> {
        let grid = CubeGrid::new(size);
        let mut cells = vec![0u32; grid.volume()];
        for x in 0..size as i32 {
            for z in 0..size as i32 {
                cells[grid.index_unchecked(IVec3::new(x, floor_y, z))] = VoxelClass::Solid.code();
            }
        }
        cells
    }

    #[test]
    fn test_pcg_known_values() {
        assert_eq!(pcg(0), pcg(0));
        assert_ne!(pcg(1), pcg(2));
        let r = rand01(12345);
        assert!((0.0..1.0).contains(&r));
    }

    #[test]
    fn test_hash_range() {
        for i in 0..64 {
            let h = hash33(Vec3::new(i as f32, 3.5, -2.0));
            assert!(h.x >= -1.0 && h.x < 1.0);
            assert!(h.is_finite());
        }
    }

    #[test]
    fn test_cast_ray_down_to_floor() {
        let cells = floor_grid(8, 2);
        let view = VoxelView::new(CubeGrid::new(8), &cells);

        let d = view.cast_ray(Vec3::new(4.5, 3.0, 4.5), -Vec3::Y, 4.0);
        assert!(d.abs() < 1e-6);

        let d = view.cast_ray(Vec3::new(4.5, 4.25, 4.5), -Vec3::Y, 4.0);
        assert!((d - 1.25).abs() < 1e-5);

        let d = view.cast_ray(Vec3::new(4.5, 4.25, 4.5), Vec3::Y, 4.0);
        assert_eq!(d, 4.0);
    }

    #[test]
    fn test_cast_ray_axis_aligned_is_finite() {
        let cells = floor_grid(8, 0);
        let view = VoxelView::new(CubeGrid::new(8), &cells);
        let d = view.cast_ray(Vec3::new(1.0, 1.0, 1.0), Vec3::X, 5.0);
        assert!(d.is_finite());
        assert_eq!(d, 5.0);
    }

    #[test]
    fn test_fibonacci_cone_unit_length() {
        let fwd = Vec3::Z;
        for i in 0..12 {
            let d = fibonacci_cone(i, 12, fwd, 1.2);
            assert!((d.length() - 1.0).abs() < 1e-4);
        }
        assert!(fibonacci_cone(0, 12, fwd, 1.2).dot(fwd) > 0.99);
    }

    #[test]
    fn test_outside_window_is_air() {
        let cells = floor_grid(4, 0);
        let view = VoxelView::new(CubeGrid::new(4), &cells);
        assert_eq!(view.class_at(Vec3::new(-1.0, 0.5, 0.5)), VoxelClass::Air);
        assert!(view.blocks(Vec3::new(0.5, 0.5, 0.5)));
    }
}
