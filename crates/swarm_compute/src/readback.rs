//! Host views over read-back grids.

use swarm_shared::constants::COST_UNREACHABLE;
use swarm_shared::{direction_vector, CubeGrid, IVec3, ScentChannel, Vec3};

use crate::error::{ComputeError, ComputeResult};
use crate::layout::GridLayout;

/// One flow field copied back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowGrid {
    grid: CubeGrid,
    cost: Vec<u32>,
    dirs: Vec<u32>,
}

impl FlowGrid {
    /// Wraps read-back costs and direction codes.
    ///
    /// # Errors
    ///
    /// `LengthMismatch` when either array is not one grid volume long.
    pub fn new(grid: CubeGrid, cost: Vec<u32>, dirs: Vec<u32>) -> ComputeResult<Self> {
        let expected = grid.volume();
        for actual in [cost.len(), dirs.len()] {
            if actual != expected {
                return Err(ComputeError::LengthMismatch { expected, actual });
            }
        }
        Ok(Self { grid, cost, dirs })
    }

    /// Grid geometry.
    #[must_use]
    pub const fn grid(&self) -> CubeGrid {
        self.grid
    }

    /// Raw costs, `COST_UNREACHABLE` for unreachable cells.
    #[must_use]
    pub fn costs(&self) -> &[u32] {
        &self.cost
    }

    /// Raw direction codes.
    #[must_use]
    pub fn directions(&self) -> &[u32] {
        &self.dirs
    }

    /// Cost at `p`; `None` outside the grid or when unreachable.
    #[must_use]
    pub fn cost_at(&self, p: IVec3) -> Option<u32> {
        self.grid
            .index(p)
            .map(|i| self.cost[i])
            .filter(|c| *c < COST_UNREACHABLE)
    }

    /// Unit step toward the cheaper neighbor, zero when there is none.
    #[must_use]
    pub fn vector_at(&self, p: IVec3) -> Vec3 {
        self.grid
            .index(p)
            .map_or(Vec3::ZERO, |i| direction_vector(self.dirs[i]))
    }

    /// Number of reachable cells.
    #[must_use]
    pub fn reachable(&self) -> usize {
        self.cost.iter().filter(|c| **c < COST_UNREACHABLE).count()
    }
}

/// All scent channels copied back to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ScentSnapshot {
    layout: GridLayout,
    values: Vec<f32>,
}

impl ScentSnapshot {
    /// Wraps a channel-major read-back.
    ///
    /// # Errors
    ///
    /// `LengthMismatch` when `values` does not cover every channel.
    pub fn new(layout: GridLayout, values: Vec<f32>) -> ComputeResult<Self> {
        if values.len() != layout.scent_len() {
            return Err(ComputeError::LengthMismatch {
                expected: layout.scent_len(),
                actual: values.len(),
            });
        }
        Ok(Self { layout, values })
    }

    /// One channel's cells.
    #[must_use]
    pub fn channel(&self, channel: ScentChannel) -> &[f32] {
        let volume = self.layout.scent.volume();
        let start = channel.index() * volume;
        &self.values[start..start + volume]
    }

    /// Value at scent-grid cell `p`; zero outside.
    #[must_use]
    pub fn at(&self, channel: ScentChannel, p: IVec3) -> f32 {
        self.layout
            .scent
            .index(p)
            .map_or(0.0, |i| self.channel(channel)[i])
    }

    /// Value at window-relative position `pos`; zero outside the scent grid.
    #[must_use]
    pub fn sample(&self, channel: ScentChannel, pos: Vec3) -> f32 {
        self.layout
            .scent_cell(pos)
            .map_or(0.0, |i| self.channel(channel)[i])
    }

    /// Sum over one channel.
    #[must_use]
    pub fn total(&self, channel: ScentChannel) -> f32 {
        self.channel(channel).iter().sum()
    }

    /// Sum over every channel.
    #[must_use]
    pub fn energy(&self) -> f32 {
        self.values.iter().sum()
    }

    /// Smallest value in any channel.
    #[must_use]
    pub fn min_value(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_grid_length_checked() {
        let grid = CubeGrid::new(4);
        assert!(FlowGrid::new(grid, vec![0; 64], vec![0; 63]).is_err());
        let flow = FlowGrid::new(grid, vec![COST_UNREACHABLE; 64], vec![0; 64]).unwrap();
        assert_eq!(flow.cost_at(IVec3::new(1, 1, 1)), None);
        assert_eq!(flow.cost_at(IVec3::new(9, 0, 0)), None);
        assert_eq!(flow.vector_at(IVec3::new(1, 1, 1)), Vec3::ZERO);
        assert_eq!(flow.reachable(), 0);
    }

    #[test]
    fn test_scent_snapshot_channels() {
        let layout = GridLayout::new(16, 8).unwrap();
        let mut values = vec![0.0; layout.scent_len()];
        let volume = layout.scent.volume();
        values[ScentChannel::Meat.index() * volume + 3] = 2.0;
        let snapshot = ScentSnapshot::new(layout, values).unwrap();
        assert_eq!(snapshot.at(ScentChannel::Meat, IVec3::new(3, 0, 0)), 2.0);
        assert_eq!(snapshot.total(ScentChannel::Grain), 0.0);
        assert_eq!(snapshot.energy(), 2.0);
    }
}
