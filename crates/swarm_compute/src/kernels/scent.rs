//! Scent injection and diffusion.
//!
//! Storage is channel-major: `channel * scent_volume + cell`. A diffusion
//! step reads one buffer and writes the other; the caller swaps.

use swarm_shared::constants::SCENT_CHANNELS;
use swarm_shared::{IVec3, VoxelClass, NEIGHBOR_OFFSETS};

use crate::layout::{GridLayout, GpuStimulus, ScentUniforms};

/// Adds every stimulus to its cell, clamped to the ceiling.
///
/// Records outside the scent grid or on an unknown channel are dropped.
pub fn inject(
    layout: &GridLayout,
    scent: &mut [f32],
    stimuli: &[GpuStimulus],
    uniforms: &ScentUniforms,
) {
    let volume = layout.scent.volume();
    let ceiling = uniforms.limits[0];
    for s in stimuli {
        let channel = s.meta[0] as usize;
        if channel >= SCENT_CHANNELS {
            continue;
        }
        let Some(cell) = layout.scent_cell(swarm_shared::Vec3::truncate(s.position)) else {
            continue;
        };
        let slot = &mut scent[channel * volume + cell];
        *slot = (*slot + s.position[3]).clamp(0.0, ceiling);
    }
}

/// One diffusion + decay step from `src` into `dst`.
///
/// Neighbors outside the grid or inside solid voxels contribute the center
/// value. Cells inside solid voxels hold zero.
pub fn diffuse(
    layout: &GridLayout,
    voxels: &[u32],
    src: &[f32],
    dst: &mut [f32],
    uniforms: &ScentUniforms,
) {
    let grid = layout.scent;
    let volume = grid.volume();
    let ceiling = uniforms.limits[0];
    let solid = |c: IVec3| VoxelClass::from_code(voxels[layout.voxel_of_scent(c)]) == VoxelClass::Solid;

    for cell in 0..volume {
        let p = grid.coords(cell);
        if solid(p) {
            for channel in 0..SCENT_CHANNELS {
                dst[channel * volume + cell] = 0.0;
            }
            continue;
        }

        let mut open = [None; 6];
        for (slot, offset) in open.iter_mut().zip(NEIGHBOR_OFFSETS) {
            let n = p + offset;
            if grid.contains(n) && !solid(n) {
                *slot = Some(grid.index_unchecked(n));
            }
        }

        for channel in 0..SCENT_CHANNELS {
            let base = channel * volume;
            let center = src[base + cell];
            let sum: f32 = open
                .iter()
                .map(|n| n.map_or(center, |i| src[base + i]))
                .sum();
            let mean = sum / 6.0;
            let next = (center + uniforms.rate(channel) * (mean - center)) * uniforms.decay(channel);
            dst[base + cell] = next.clamp(0.0, ceiling);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ScentTuning;
    use swarm_shared::{ScentChannel, Vec3};

    fn setup() -> (GridLayout, Vec<u32>, ScentUniforms) {
        let layout = GridLayout::new(16, 8).unwrap();
        let voxels = vec![0u32; layout.voxel.volume()];
        let uniforms = ScentUniforms::new(&layout, &ScentTuning::default(), 0);
        (layout, voxels, uniforms)
    }

    #[test]
    fn test_inject_clamps_and_skips_outside() {
        let (layout, _, uniforms) = setup();
        let mut scent = vec![0.0; layout.scent_len()];
        let inside = Vec3::new(8.5, 8.5, 8.5);
        let stimuli = [
            GpuStimulus::new(inside, ScentChannel::Meat, 10.0),
            GpuStimulus::new(inside, ScentChannel::Meat, 10.0),
            GpuStimulus::new(Vec3::new(0.5, 0.5, 0.5), ScentChannel::Meat, 10.0),
        ];
        inject(&layout, &mut scent, &stimuli, &uniforms);

        let cell = layout.scent_cell(inside).unwrap();
        let idx = ScentChannel::Meat.index() * layout.scent.volume() + cell;
        assert_eq!(scent[idx], uniforms.limits[0]);
        assert_eq!(scent.iter().filter(|v| **v > 0.0).count(), 1);
    }

    #[test]
    fn test_diffuse_spreads_and_decays() {
        let (layout, voxels, uniforms) = setup();
        let mut a = vec![0.0; layout.scent_len()];
        let mut b = vec![0.0; layout.scent_len()];
        let cell = layout.scent_cell(Vec3::new(8.5, 8.5, 8.5)).unwrap();
        a[cell] = 4.0;

        diffuse(&layout, &voxels, &a, &mut b, &uniforms);

        assert!(b[cell] < 4.0);
        assert!(b[cell + 1] > 0.0);
        let before: f32 = a.iter().sum();
        let after: f32 = b.iter().sum();
        assert!(after < before);
    }

    #[test]
    fn test_solid_cells_hold_zero() {
        let (layout, mut voxels, uniforms) = setup();
        let solid = IVec3::new(3, 3, 3);
        voxels[layout.voxel_of_scent(solid)] = VoxelClass::Solid.code();
        let mut a = vec![1.0; layout.scent_len()];
        let idx = layout.scent.index_unchecked(solid);
        a[idx] = 5.0;
        let mut b = vec![0.0; layout.scent_len()];

        diffuse(&layout, &voxels, &a, &mut b, &uniforms);

        assert_eq!(b[idx], 0.0);
        // Uniform field next to a wall only decays.
        let beside = layout.scent.index_unchecked(IVec3::new(4, 3, 3));
        assert!((b[beside] - uniforms.decay(0)).abs() < 1e-6);
    }
}
