//! # Voxel Snapshot
//!
//! A cubic window of classified blocks around the point of interest.
//!
//! ```text
//!   center drifts > threshold ──► relocate: clear to AIR, dirty, cursor 0
//!   otherwise                 ──► classify `chunks_per_tick` columns,
//!                                 round-robin over (size/16)² columns
//! ```
//!
//! Unloaded chunks and missing block samples keep their previous class.
//! The scan never blocks.

use swarm_shared::constants::CHUNK_SIZE;
use swarm_shared::{CubeGrid, DVec3, IVec3, Vec3, VoxelClass};

use crate::world::{BlockSample, WorldView};

/// Maps a block sample to a voxel class (hazard > liquid > tall > solid).
#[must_use]
pub const fn classify(sample: BlockSample) -> VoxelClass {
    if sample.hazard {
        VoxelClass::Hazard
    } else if sample.liquid {
        VoxelClass::Liquid
    } else if sample.tall {
        VoxelClass::Tall
    } else if sample.collides {
        VoxelClass::Solid
    } else {
        VoxelClass::Air
    }
}

/// What one [`VoxelSnapshot::update`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// The window moved (and was cleared)
    pub relocated: bool,
    /// Columns classified
    pub columns: usize,
    /// Columns skipped because their chunk was unloaded
    pub skipped: usize,
    /// Cells whose class changed
    pub changed: usize,
}

/// Classified voxel window.
#[derive(Debug, Clone)]
pub struct VoxelSnapshot {
    grid: CubeGrid,
    cells: Vec<u32>,
    origin: Option<IVec3>,
    relocate_threshold: i32,
    chunks_per_tick: usize,
    cursor: usize,
    dirty: bool,
    column: Vec<u32>,
}

impl VoxelSnapshot {
    /// Empty window of edge `size` (a multiple of 16). Nothing is placed
    /// until the first [`Self::update`].
    #[must_use]
    pub fn new(size: u32, relocate_threshold: i32, chunks_per_tick: usize) -> Self {
        let grid = CubeGrid::new(size);
        Self {
            grid,
            cells: vec![VoxelClass::Air.code(); grid.volume()],
            origin: None,
            relocate_threshold,
            chunks_per_tick: chunks_per_tick.max(1),
            cursor: 0,
            dirty: false,
            column: Vec::new(),
        }
    }

    /// Window geometry.
    #[must_use]
    pub const fn grid(&self) -> CubeGrid {
        self.grid
    }

    /// World block at window cell (0, 0, 0).
    #[must_use]
    pub const fn origin(&self) -> Option<IVec3> {
        self.origin
    }

    /// Raw class codes in grid order.
    #[must_use]
    pub fn cells(&self) -> &[u32] {
        &self.cells
    }

    /// True when cells changed since the last [`Self::take_dirty`].
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns the cells and clears the dirty flag, or `None` when clean.
    pub fn take_dirty(&mut self) -> Option<&[u32]> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        Some(&self.cells)
    }

    /// Marks the whole window for re-upload.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Chunk columns per axis.
    #[must_use]
    pub const fn columns_per_axis(&self) -> usize {
        self.grid.size as usize / CHUNK_SIZE as usize
    }

    /// Origin the window would have if centered on `center`.
    #[must_use]
    pub fn desired_origin(&self, center: IVec3) -> IVec3 {
        let half = (self.grid.size / 2) as i32;
        let align = |c: i32| (c - half) & !(CHUNK_SIZE - 1);
        IVec3::new(align(center.x), align(center.y), align(center.z))
    }

    /// Moves the window when `center` has drifted past the threshold (or on
    /// first use). Returns true when it moved.
    pub fn recenter(&mut self, center: IVec3) -> bool {
        let desired = self.desired_origin(center);
        if let Some(origin) = self.origin {
            if origin.max_axis_distance(desired) <= self.relocate_threshold {
                return false;
            }
        }
        tracing::info!(
            "voxel window relocated to ({}, {}, {})",
            desired.x,
            desired.y,
            desired.z
        );
        self.origin = Some(desired);
        self.cells.fill(VoxelClass::Air.code());
        self.cursor = 0;
        self.dirty = true;
        true
    }

    /// Recenters on `center`, then classifies the next columns.
    pub fn update<W: WorldView + ?Sized>(&mut self, world: &W, center: IVec3) -> ScanReport {
        let mut report = ScanReport {
            relocated: self.recenter(center),
            ..ScanReport::default()
        };
        let total = self.columns_per_axis() * self.columns_per_axis();
        for _ in 0..self.chunks_per_tick.min(total) {
            let column = self.cursor;
            self.cursor = (self.cursor + 1) % total;
            match self.scan_column(world, column) {
                Some(changed) => {
                    report.columns += 1;
                    report.changed += changed;
                }
                None => report.skipped += 1,
            }
        }
        if report.changed > 0 {
            self.dirty = true;
        }
        report
    }

    /// Classifies one chunk column. `None` when its chunk is not loaded.
    fn scan_column<W: WorldView + ?Sized>(&mut self, world: &W, column: usize) -> Option<usize> {
        let origin = self.origin?;
        let per_axis = self.columns_per_axis();
        let lx0 = (column % per_axis) as i32 * CHUNK_SIZE;
        let lz0 = (column / per_axis) as i32 * CHUNK_SIZE;
        let (cx, cz) = (origin + IVec3::new(lx0, 0, lz0)).chunk();
        if !world.is_chunk_loaded(cx, cz) {
            return None;
        }

        let height = self.grid.size as i32;
        let mut changed = 0;
        let mut column_cells = std::mem::take(&mut self.column);
        for lz in lz0..lz0 + CHUNK_SIZE {
            for lx in lx0..lx0 + CHUNK_SIZE {
                column_cells.clear();
                for y in 0..height {
                    let local = IVec3::new(lx, y, lz);
                    let previous = self.cells[self.grid.index_unchecked(local)];
                    let class = world
                        .block(origin + local)
                        .map_or(previous, |sample| classify(sample).code());
                    column_cells.push(class);
                }
                // A tall obstacle is a two-cell wall.
                for y in 0..column_cells.len().saturating_sub(1) {
                    if column_cells[y] == VoxelClass::Tall.code() {
                        column_cells[y + 1] = VoxelClass::Solid.code();
                    }
                }
                for (y, class) in column_cells.iter().enumerate() {
                    let i = self.grid.index_unchecked(IVec3::new(lx, y as i32, lz));
                    if self.cells[i] != *class {
                        self.cells[i] = *class;
                        changed += 1;
                    }
                }
            }
        }
        self.column = column_cells;
        Some(changed)
    }

    /// Class of the world block `pos`, `None` outside the window.
    #[must_use]
    pub fn class_at(&self, pos: IVec3) -> Option<VoxelClass> {
        let local = pos - self.origin?;
        self.grid
            .index(local)
            .map(|i| VoxelClass::from_code(self.cells[i]))
    }

    /// Window-relative position of a world point, `None` before placement.
    #[must_use]
    pub fn to_window(&self, pos: DVec3) -> Option<Vec3> {
        self.origin.map(|origin| pos.relative_to(origin))
    }

    /// Window cell of a world point, `None` outside the window.
    #[must_use]
    pub fn cell_of(&self, pos: DVec3) -> Option<IVec3> {
        let local = pos.block() - self.origin?;
        self.grid.contains(local).then_some(local)
    }

    /// True when `pos` lies at least `margin` cells inside every face.
    #[must_use]
    pub fn is_inside(&self, pos: DVec3, margin: i32) -> bool {
        let Some(local) = self.cell_of(pos) else {
            return false;
        };
        let hi = self.grid.size as i32 - margin;
        [local.x, local.y, local.z]
            .iter()
            .all(|c| *c >= margin && *c < hi)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ActorSnapshot, AttractorSite, Environment, FoodSource};

    /// Flat world: solid below y = 0, a fence at (3, 0, 3), water at x = 5,
    /// no data at x = 9.
    struct Flat {
        loaded: bool,
    }

    impl WorldView for Flat {
        fn block(&self, pos: IVec3) -> Option<BlockSample> {
            if pos.x == 9 {
                None
            } else if pos.y < 0 {
                Some(BlockSample::SOLID)
            } else if pos == IVec3::new(3, 0, 3) {
                Some(BlockSample::FENCE)
            } else if pos.x == 5 && pos.y == 0 {
                Some(BlockSample::WATER)
            } else {
                Some(BlockSample::AIR)
            }
        }
        fn is_chunk_loaded(&self, _: i32, _: i32) -> bool {
            self.loaded
        }
        fn environment(&self) -> Environment {
            Environment::default()
        }
        fn players(&self) -> Vec<DVec3> {
            Vec::new()
        }
        fn actors(&self) -> Vec<ActorSnapshot> {
            Vec::new()
        }
        fn protected_positions(&self) -> Vec<DVec3> {
            Vec::new()
        }
        fn food_sources(&self) -> Vec<FoodSource> {
            Vec::new()
        }
        fn attractor_sites(&self, _: IVec3, _: i32) -> Vec<AttractorSite> {
            Vec::new()
        }
        fn set_velocity(&mut self, _: u64, _: DVec3) {}
        fn set_yaw(&mut self, _: u64, _: f32) {}
        fn set_host_gravity(&mut self, _: u64, _: bool) {}
    }

    #[test]
    fn test_classification_priority() {
        let all = BlockSample {
            collides: true,
            liquid: true,
            tall: true,
            hazard: true,
        };
        assert_eq!(classify(all), VoxelClass::Hazard);
        assert_eq!(classify(BlockSample { hazard: false, ..all }), VoxelClass::Liquid);
        assert_eq!(classify(BlockSample::FENCE), VoxelClass::Tall);
        assert_eq!(classify(BlockSample::SOLID), VoxelClass::Solid);
        assert_eq!(classify(BlockSample::AIR), VoxelClass::Air);
    }

    #[test]
    fn test_desired_origin_aligns_to_chunks() {
        let snapshot = VoxelSnapshot::new(32, 8, 1);
        assert_eq!(snapshot.desired_origin(IVec3::new(16, 5, 40)), IVec3::new(0, -16, 16));
        assert_eq!(snapshot.desired_origin(IVec3::new(-1, 0, 0)), IVec3::new(-32, -16, -16));
    }

    #[test]
    fn test_relocation_threshold() {
        let mut snapshot = VoxelSnapshot::new(32, 16, 1);
        assert!(snapshot.recenter(IVec3::new(16, 16, 16)));
        assert!(snapshot.take_dirty().is_some());
        assert!(!snapshot.recenter(IVec3::new(30, 16, 16)));
        assert!(!snapshot.is_dirty());
        assert!(snapshot.recenter(IVec3::new(70, 16, 16)));
        assert_eq!(snapshot.origin(), Some(IVec3::new(48, 0, 0)));
    }

    #[test]
    fn test_full_scan_classifies_and_walls_fences() {
        let world = Flat { loaded: true };
        let mut snapshot = VoxelSnapshot::new(32, 16, 4);
        let report = snapshot.update(&world, IVec3::new(16, 0, 16));
        assert!(report.relocated);
        assert_eq!(report.columns, 4);

        assert_eq!(snapshot.class_at(IVec3::new(1, -1, 1)), Some(VoxelClass::Solid));
        assert_eq!(snapshot.class_at(IVec3::new(1, 0, 1)), Some(VoxelClass::Air));
        assert_eq!(snapshot.class_at(IVec3::new(3, 0, 3)), Some(VoxelClass::Tall));
        assert_eq!(snapshot.class_at(IVec3::new(3, 1, 3)), Some(VoxelClass::Solid));
        assert_eq!(snapshot.class_at(IVec3::new(3, 2, 3)), Some(VoxelClass::Air));
        assert_eq!(snapshot.class_at(IVec3::new(5, 0, 7)), Some(VoxelClass::Liquid));
        assert_eq!(snapshot.class_at(IVec3::new(100, 0, 0)), None);
    }

    #[test]
    fn test_missing_samples_keep_prior_class() {
        let world = Flat { loaded: true };
        let mut snapshot = VoxelSnapshot::new(32, 16, 4);
        snapshot.update(&world, IVec3::new(16, 0, 16));
        // x = 9 never reports, so it stays at the cleared value.
        assert_eq!(snapshot.class_at(IVec3::new(9, -5, 2)), Some(VoxelClass::Air));
    }

    #[test]
    fn test_unloaded_chunks_are_skipped() {
        let world = Flat { loaded: false };
        let mut snapshot = VoxelSnapshot::new(32, 16, 2);
        let report = snapshot.update(&world, IVec3::new(16, 0, 16));
        assert_eq!(report.columns, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(snapshot.class_at(IVec3::new(1, -1, 1)), Some(VoxelClass::Air));
    }

    #[test]
    fn test_round_robin_cursor() {
        let world = Flat { loaded: true };
        let mut snapshot = VoxelSnapshot::new(32, 16, 1);
        snapshot.update(&world, IVec3::new(16, 0, 16));
        assert!(snapshot.take_dirty().is_some());
        // Column 1 covers x 16..32 of the first z row.
        assert_eq!(snapshot.class_at(IVec3::new(20, -1, 2)), Some(VoxelClass::Air));
        let report = snapshot.update(&world, IVec3::new(16, 0, 16));
        assert!(!report.relocated);
        assert!(report.changed > 0);
        assert_eq!(snapshot.class_at(IVec3::new(20, -1, 2)), Some(VoxelClass::Solid));

        // A full lap later nothing changes.
        for _ in 0..2 {
            snapshot.update(&world, IVec3::new(16, 0, 16));
        }
        snapshot.take_dirty();
        let report = snapshot.update(&world, IVec3::new(16, 0, 16));
        assert_eq!(report.changed, 0);
        assert!(!snapshot.is_dirty());
    }

    #[test]
    fn test_margin() {
        let mut snapshot = VoxelSnapshot::new(32, 16, 1);
        snapshot.recenter(IVec3::new(16, 16, 16));
        assert!(snapshot.is_inside(DVec3::new(16.0, 16.0, 16.0), 2));
        assert!(!snapshot.is_inside(DVec3::new(1.5, 16.0, 16.0), 2));
        assert!(!snapshot.is_inside(DVec3::new(30.5, 16.0, 16.0), 2));
        assert!(!snapshot.is_inside(DVec3::new(-4.0, 16.0, 16.0), 0));
    }
}
