//! Dense cubic grid geometry.
//!
//! Every grid in the pipeline (voxels, scent, flow) uses the same layout:
//!
//! ```text
//! index = x + z * size + y * size * size
//! ```
//!
//! so a horizontal slice is contiguous and a chunk column is `size` slices.

use crate::math::{IVec3, Vec3};

/// 6-connected neighbor offsets, in direction-code order.
///
/// Direction code `i + 1` names `NEIGHBOR_OFFSETS[i]`; code 0 means "none".
pub const NEIGHBOR_OFFSETS: [IVec3; 6] = [
    IVec3::new(1, 0, 0),
    IVec3::new(-1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, -1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(0, 0, -1),
];

/// Direction code for "no direction"
pub const DIRECTION_NONE: u32 = 0;

/// Decodes a flow direction code into a unit vector (zero for unknown codes).
#[must_use]
pub fn direction_vector(code: u32) -> Vec3 {
    match code {
        1..=6 => {
            let o = NEIGHBOR_OFFSETS[(code - 1) as usize];
            Vec3::new(o.x as f32, o.y as f32, o.z as f32)
        }
        _ => Vec3::ZERO,
    }
}

/// Cubic grid of `size³` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CubeGrid {
    /// Edge length in cells
    pub size: u32,
}

impl CubeGrid {
    /// Creates a grid with the given edge length.
    #[must_use]
    pub const fn new(size: u32) -> Self {
        Self { size }
    }

    /// Total number of cells.
    #[inline]
    #[must_use]
    pub const fn volume(&self) -> usize {
        let s = self.size as usize;
        s * s * s
    }

    /// True when the local coordinate lies inside the grid.
    #[inline]
    #[must_use]
    pub fn contains(&self, p: IVec3) -> bool {
        let s = self.size as i32;
        p.x >= 0 && p.y >= 0 && p.z >= 0 && p.x < s && p.y < s && p.z < s
    }

    /// Linear index of a local coordinate, `None` outside the grid.
    #[inline]
    #[must_use]
    pub fn index(&self, p: IVec3) -> Option<usize> {
        if self.contains(p) {
            Some(self.index_unchecked(p))
        } else {
            None
        }
    }

    /// Linear index without bounds check. Caller guarantees `contains(p)`.
    #[inline]
    #[must_use]
    pub fn index_unchecked(&self, p: IVec3) -> usize {
        let s = self.size as usize;
        p.x as usize + p.z as usize * s + p.y as usize * s * s
    }

    /// Local coordinate of a linear index.
    #[inline]
    #[must_use]
    pub fn coords(&self, index: usize) -> IVec3 {
        let s = self.size as usize;
        let x = index % s;
        let z = (index / s) % s;
        let y = index / (s * s);
        IVec3::new(x as i32, y as i32, z as i32)
    }

    /// In-bounds 6-neighbors of a cell, paired with their direction code.
    pub fn neighbors(&self, p: IVec3) -> impl Iterator<Item = (u32, usize)> + '_ {
        NEIGHBOR_OFFSETS
            .iter()
            .enumerate()
            .filter_map(move |(i, o)| self.index(p + *o).map(|idx| (i as u32 + 1, idx)))
    }
}
