//! # Compute Backend Trait
//!
//! The seam between the resource manager (bookkeeping) and whatever executes
//! the kernels. Two implementations exist:
//!
//! - [`crate::WgpuBackend`]: WGSL kernels on a wgpu device
//! - [`crate::SoftwareBackend`]: the reference kernels on the host CPU
//!
//! Backends hold buffers but no pipelining state. Which generation slot to
//! write, which scent buffer is the front, and whether a frame is pending
//! are all decided by [`crate::ResourceManager`].

use swarm_core::PingPongPass;
use swarm_shared::constants::{MAX_WORKGROUPS_PER_DIM, WORKGROUP_SIZE};
use swarm_shared::FlowTarget;

use crate::error::ComputeResult;
use crate::layout::{
    FrameUniforms, GpuActor, GpuActorOutput, GpuAttractor, GpuStimulus, GridLayout,
    ScentUniforms,
};

/// Attractors a generation slot holds.
pub const MAX_ATTRACTORS: usize = 1024;

/// Stimuli injected per device submission.
pub const MAX_STIMULI: usize = 4096;

/// Which implementation a backend is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// wgpu device
    Wgpu,
    /// Host CPU
    Software,
}

/// Human-readable backend description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendInfo {
    /// Implementation
    pub kind: BackendKind,
    /// Adapter or host name
    pub name: String,
}

/// Kernel executor.
///
/// Every method that touches per-actor data takes the generation slot index
/// chosen by the manager. Slot contents are undefined after `rebuild_slots`.
pub trait ComputeBackend: Send {
    /// Backend description.
    fn describe(&self) -> BackendInfo;

    /// Allocates the grid-sized buffers (voxels, scent pair, flow fields).
    ///
    /// Generation slots are released; `rebuild_slots` must run again.
    ///
    /// # Errors
    ///
    /// Device allocation failures.
    fn configure(&mut self, layout: &GridLayout) -> ComputeResult<()>;

    /// Frees both generation slots and allocates them at `capacity` rows.
    ///
    /// Returns the new arena epoch.
    ///
    /// # Errors
    ///
    /// Device allocation failures. On error no slot is usable.
    fn rebuild_slots(&mut self, capacity: usize) -> ComputeResult<u64>;

    /// Rows each generation slot holds (0 before the first rebuild).
    fn slot_capacity(&self) -> usize;

    /// Replaces the voxel window.
    ///
    /// # Errors
    ///
    /// `NotConfigured` before `configure`; `LengthMismatch` on a wrong size.
    fn upload_voxels(&mut self, voxels: &[u32]) -> ComputeResult<()>;

    /// Zeroes both scent buffers.
    ///
    /// # Errors
    ///
    /// `NotConfigured` before `configure`.
    fn clear_scent(&mut self) -> ComputeResult<()>;

    /// Adds stimuli into scent buffer `buffer`.
    ///
    /// # Errors
    ///
    /// `NotConfigured` before `configure`; device errors.
    fn inject_scent(
        &mut self,
        buffer: usize,
        stimuli: &[GpuStimulus],
        uniforms: &ScentUniforms,
    ) -> ComputeResult<()>;

    /// One diffusion step from `pass.read` into `pass.write`.
    ///
    /// # Errors
    ///
    /// `NotConfigured` before `configure`; device errors.
    fn diffuse_scent(&mut self, pass: PingPongPass, uniforms: &ScentUniforms) -> ComputeResult<()>;

    /// Recomputes one flow field from scratch.
    ///
    /// # Errors
    ///
    /// `NotConfigured` before `configure`; device errors.
    fn compute_flow(
        &mut self,
        target: FlowTarget,
        targets: &[[i32; 4]],
        sweeps: u32,
    ) -> ComputeResult<()>;

    /// Writes actor rows and attractors into generation `slot`.
    ///
    /// # Errors
    ///
    /// `SlotOutOfRange`, `CapacityExceeded`.
    fn upload_actors(
        &mut self,
        slot: usize,
        actors: &[GpuActor],
        attractors: &[GpuAttractor],
    ) -> ComputeResult<()>;

    /// Runs the behavior kernel then self-emission for generation `slot`.
    ///
    /// Behavior reads scent buffer `scent_front`; emission writes into it.
    ///
    /// # Errors
    ///
    /// `SlotOutOfRange`; captured device errors.
    fn dispatch_actors(
        &mut self,
        slot: usize,
        scent_front: usize,
        frame: &FrameUniforms,
    ) -> ComputeResult<()>;

    /// Blocks until the outputs of generation `slot` are available.
    ///
    /// # Errors
    ///
    /// `SlotOutOfRange`, `CapacityExceeded`, `Readback`.
    fn read_outputs(&mut self, slot: usize, count: usize) -> ComputeResult<Vec<GpuActorOutput>>;

    /// Copies scent buffer `buffer` back to the host (all channels).
    ///
    /// # Errors
    ///
    /// `NotConfigured`, `Readback`.
    fn read_scent(&mut self, buffer: usize) -> ComputeResult<Vec<f32>>;

    /// Copies one flow field back to the host: `(costs, direction codes)`.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, `Readback`.
    fn read_flow(&mut self, target: FlowTarget) -> ComputeResult<(Vec<u32>, Vec<u32>)>;
}

/// Workgroup grid covering `items` lanes at 64 lanes per group.
///
/// Counts past the per-dimension limit spill into `y`; kernels rebuild the
/// linear index as `x + y * groups_x * 64`.
#[must_use]
pub fn dispatch_size(items: u32) -> (u32, u32) {
    let groups = items.div_ceil(WORKGROUP_SIZE);
    if groups <= MAX_WORKGROUPS_PER_DIM {
        (groups.max(1), 1)
    } else {
        (MAX_WORKGROUPS_PER_DIM, groups.div_ceil(MAX_WORKGROUPS_PER_DIM))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_size_small() {
        assert_eq!(dispatch_size(0), (1, 1));
        assert_eq!(dispatch_size(1), (1, 1));
        assert_eq!(dispatch_size(64), (1, 1));
        assert_eq!(dispatch_size(65), (2, 1));
    }

    #[test]
    fn test_dispatch_size_spills_into_y() {
        // 128³ grid
        let (x, y) = dispatch_size(128 * 128 * 128);
        assert_eq!(x, 32_768);
        assert_eq!(y, 1);

        let items = MAX_WORKGROUPS_PER_DIM * WORKGROUP_SIZE + 1;
        let (x, y) = dispatch_size(items);
        assert_eq!(x, MAX_WORKGROUPS_PER_DIM);
        assert_eq!(y, 2);
        assert!(u64::from(x) * u64::from(y) * u64::from(WORKGROUP_SIZE) >= u64::from(items));
    }
}
