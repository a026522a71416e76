//! Software backend: the reference kernels on the host CPU.
//!
//! Used by tests, benches and servers without a usable adapter. Behavior is
//! the same as the wgpu backend except that flow relaxation stops as soon as
//! a sweep changes nothing.

use swarm_core::{PingPongPass, SlotArena};
use swarm_shared::constants::FLOW_FIELDS;
use swarm_shared::FlowTarget;

use crate::backend::{BackendInfo, BackendKind, ComputeBackend, MAX_ATTRACTORS};
use crate::error::{ComputeError, ComputeResult};
use crate::kernels::{self, common::VoxelView, FrameView};
use crate::layout::{
    FrameUniforms, GpuActor, GpuActorOutput, GpuAttractor, GpuStimulus, GridLayout,
    ScentUniforms,
};

#[derive(Debug, Default)]
struct SoftwareSlot {
    actors: Vec<GpuActor>,
    attractors: Vec<GpuAttractor>,
    outputs: Vec<GpuActorOutput>,
}

/// CPU executor.
#[derive(Debug, Default)]
pub struct SoftwareBackend {
    layout: Option<GridLayout>,
    voxels: Vec<u32>,
    scent: [Vec<f32>; 2],
    flow_cost: Vec<u32>,
    flow_dirs: Vec<u32>,
    slots: SlotArena<SoftwareSlot>,
    last_sweeps: u32,
}

impl SoftwareBackend {
    /// Unconfigured backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Relaxation sweeps the most recent flow computation actually ran.
    #[must_use]
    pub const fn last_sweeps(&self) -> u32 {
        self.last_sweeps
    }

    fn layout(&self) -> ComputeResult<GridLayout> {
        self.layout.ok_or(ComputeError::NotConfigured("grids"))
    }

    fn slot(&self, slot: usize) -> ComputeResult<&SoftwareSlot> {
        self.slots.get(slot).ok_or(ComputeError::SlotOutOfRange(slot))
    }

    fn field_range(&self, target: FlowTarget) -> ComputeResult<std::ops::Range<usize>> {
        let volume = self.layout()?.voxel.volume();
        let start = target.index() * volume;
        Ok(start..start + volume)
    }
}

fn check_buffer(buffer: usize) -> ComputeResult<()> {
    if buffer < 2 {
        Ok(())
    } else {
        Err(ComputeError::SlotOutOfRange(buffer))
    }
}

impl ComputeBackend for SoftwareBackend {
    fn describe(&self) -> BackendInfo {
        BackendInfo {
            kind: BackendKind::Software,
            name: "cpu reference".to_owned(),
        }
    }

    fn configure(&mut self, layout: &GridLayout) -> ComputeResult<()> {
        let voxel_volume = layout.voxel.volume();
        self.voxels = vec![0; voxel_volume];
        self.scent = [vec![0.0; layout.scent_len()], vec![0.0; layout.scent_len()]];
        self.flow_cost = vec![0; FLOW_FIELDS * voxel_volume];
        self.flow_dirs = vec![0; FLOW_FIELDS * voxel_volume];
        self.layout = Some(*layout);
        self.slots.release();
        tracing::debug!(
            "software backend configured: voxel {} scent {}",
            layout.voxel.size,
            layout.scent.size
        );
        Ok(())
    }

    fn rebuild_slots(&mut self, capacity: usize) -> ComputeResult<u64> {
        self.slots.rebuild(capacity, |_, cap| {
            Ok::<_, ComputeError>(SoftwareSlot {
                actors: Vec::with_capacity(cap),
                attractors: Vec::with_capacity(MAX_ATTRACTORS),
                outputs: vec![GpuActorOutput::default(); cap],
            })
        })
    }

    fn slot_capacity(&self) -> usize {
        self.slots.capacity()
    }

    fn upload_voxels(&mut self, voxels: &[u32]) -> ComputeResult<()> {
        let expected = self.layout()?.voxel.volume();
        if voxels.len() != expected {
            return Err(ComputeError::LengthMismatch {
                expected,
                actual: voxels.len(),
            });
        }
        self.voxels.copy_from_slice(voxels);
        Ok(())
    }

    fn clear_scent(&mut self) -> ComputeResult<()> {
        self.layout()?;
        for buffer in &mut self.scent {
            buffer.fill(0.0);
        }
        Ok(())
    }

    fn inject_scent(
        &mut self,
        buffer: usize,
        stimuli: &[GpuStimulus],
        uniforms: &ScentUniforms,
    ) -> ComputeResult<()> {
        let layout = self.layout()?;
        check_buffer(buffer)?;
        kernels::scent::inject(&layout, &mut self.scent[buffer], stimuli, uniforms);
        Ok(())
    }

    fn diffuse_scent(&mut self, pass: PingPongPass, uniforms: &ScentUniforms) -> ComputeResult<()> {
        let layout = self.layout()?;
        check_buffer(pass.read)?;
        check_buffer(pass.write)?;
        if pass.read == pass.write {
            return Err(ComputeError::NotConfigured("diffusion must not run in place"));
        }
        let [a, b] = &mut self.scent;
        let (src, dst) = if pass.read == 0 { (&*a, b) } else { (&*b, a) };
        kernels::scent::diffuse(&layout, &self.voxels, src, dst, uniforms);
        Ok(())
    }

    fn compute_flow(
        &mut self,
        target: FlowTarget,
        targets: &[[i32; 4]],
        sweeps: u32,
    ) -> ComputeResult<()> {
        let grid = self.layout()?.voxel;
        let range = self.field_range(target)?;
        self.last_sweeps = kernels::flow::compute(
            grid,
            &self.voxels,
            &mut self.flow_cost[range.clone()],
            &mut self.flow_dirs[range],
            targets,
            sweeps,
        );
        tracing::debug!(
            "flow {:?}: {} targets, {} sweeps",
            target,
            targets.len(),
            self.last_sweeps
        );
        Ok(())
    }

    fn upload_actors(
        &mut self,
        slot: usize,
        actors: &[GpuActor],
        attractors: &[GpuAttractor],
    ) -> ComputeResult<()> {
        let capacity = self.slots.capacity();
        if actors.len() > capacity {
            return Err(ComputeError::CapacityExceeded {
                requested: actors.len(),
                capacity,
            });
        }
        if attractors.len() > MAX_ATTRACTORS {
            return Err(ComputeError::CapacityExceeded {
                requested: attractors.len(),
                capacity: MAX_ATTRACTORS,
            });
        }
        let target = self.slots.get_mut(slot).ok_or(ComputeError::SlotOutOfRange(slot))?;
        target.actors.clear();
        target.actors.extend_from_slice(actors);
        target.attractors.clear();
        target.attractors.extend_from_slice(attractors);
        Ok(())
    }

    fn dispatch_actors(
        &mut self,
        slot: usize,
        scent_front: usize,
        frame: &FrameUniforms,
    ) -> ComputeResult<()> {
        let layout = self.layout()?;
        check_buffer(scent_front)?;
        let Some(generation) = self.slots.get_mut(slot) else {
            return Err(ComputeError::SlotOutOfRange(slot));
        };

        let view = FrameView {
            layout: &layout,
            voxels: VoxelView::new(layout.voxel, &self.voxels),
            scent: &self.scent[scent_front],
            flow_dirs: &self.flow_dirs,
            actors: &generation.actors,
            attractors: &generation.attractors,
            frame,
        };
        kernels::run_all(&view, &mut generation.outputs);
        kernels::emit(&layout, &generation.actors, frame, &mut self.scent[scent_front]);
        Ok(())
    }

    fn read_outputs(&mut self, slot: usize, count: usize) -> ComputeResult<Vec<GpuActorOutput>> {
        let generation = self.slot(slot)?;
        if count > generation.outputs.len() {
            return Err(ComputeError::CapacityExceeded {
                requested: count,
                capacity: generation.outputs.len(),
            });
        }
        Ok(generation.outputs[..count].to_vec())
    }

    fn read_scent(&mut self, buffer: usize) -> ComputeResult<Vec<f32>> {
        self.layout()?;
        check_buffer(buffer)?;
        Ok(self.scent[buffer].clone())
    }

    fn read_flow(&mut self, target: FlowTarget) -> ComputeResult<(Vec<u32>, Vec<u32>)> {
        let range = self.field_range(target)?;
        Ok((
            self.flow_cost[range.clone()].to_vec(),
            self.flow_dirs[range].to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ScentTuning;
    use swarm_shared::{ScentChannel, Vec3};

    fn configured() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new();
        backend.configure(&GridLayout::new(16, 8).unwrap()).unwrap();
        backend
    }

    #[test]
    fn test_unconfigured_backend_refuses_work() {
        let mut backend = SoftwareBackend::new();
        assert_eq!(backend.clear_scent(), Err(ComputeError::NotConfigured("grids")));
        assert!(backend.read_flow(FlowTarget::Player).is_err());
    }

    #[test]
    fn test_voxel_upload_checks_length() {
        let mut backend = configured();
        let err = backend.upload_voxels(&[0; 10]).unwrap_err();
        assert_eq!(
            err,
            ComputeError::LengthMismatch {
                expected: 16 * 16 * 16,
                actual: 10
            }
        );
    }

    #[test]
    fn test_diffusion_writes_back_buffer_only() {
        let mut backend = configured();
        let layout = GridLayout::new(16, 8).unwrap();
        let uniforms = ScentUniforms::new(&layout, &ScentTuning::default(), 1);
        let stim = [GpuStimulus::new(Vec3::new(8.5, 8.5, 8.5), ScentChannel::Grain, 5.0)];
        backend.inject_scent(0, &stim, &uniforms).unwrap();
        backend
            .diffuse_scent(PingPongPass { read: 0, write: 1 }, &uniforms)
            .unwrap();

        let front = backend.read_scent(0).unwrap();
        let back = backend.read_scent(1).unwrap();
        assert_eq!(front.iter().sum::<f32>(), 5.0);
        assert!(back.iter().filter(|v| **v > 0.0).count() > 1);
    }

    #[test]
    fn test_upload_beyond_capacity_fails() {
        let mut backend = configured();
        backend.rebuild_slots(2).unwrap();
        let rows = vec![GpuActor::default(); 3];
        assert!(matches!(
            backend.upload_actors(0, &rows, &[]),
            Err(ComputeError::CapacityExceeded { requested: 3, capacity: 2 })
        ));
        assert_eq!(
            backend.upload_actors(5, &rows[..1], &[]),
            Err(ComputeError::SlotOutOfRange(5))
        );
    }
}
