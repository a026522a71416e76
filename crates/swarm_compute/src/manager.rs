//! # Resource Manager
//!
//! Sole owner of the compute backend and of every piece of pipelining state:
//!
//! ```text
//!            submit(N+1)                     harvest(N)
//! host ──► ids[write] ─► upload ─► dispatch ─► commit ──► pending{slot, count, epoch}
//!                                                            │
//!                        read_outputs(pending.slot) ◄────────┘ (next tick)
//! ```
//!
//! ## Rules
//!
//! 1. One `commit` per dispatch cycle, so the write generation alternates
//!    exactly once per cycle
//! 2. A pending frame is only read back if its epoch matches the arena
//! 3. Any slot rebuild or grid reconfiguration discards the pending frame
//! 4. A failed dispatch discards the pending frame

use swarm_core::{
    grow_capacity, GenerationPair, PendingGeneration, PingPong, PingPongPass, MIN_SLOT_CAPACITY,
};
use swarm_shared::constants::MAX_FLOW_TARGETS;
use swarm_shared::{FlowTarget, IVec3};

use crate::backend::{BackendInfo, ComputeBackend, MAX_ATTRACTORS};
use crate::error::{ComputeError, ComputeResult};
use crate::kernels::flow::default_sweeps;
use crate::layout::{
    ActorBatch, ActorOutput, FrameUniforms, GpuAttractor, GpuStimulus, GridLayout, ScentTuning,
    ScentUniforms,
};
use crate::readback::{FlowGrid, ScentSnapshot};

/// Results of one read-back, row-aligned with the ids that were submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    /// Host identity of every row
    pub ids: Vec<u64>,
    /// Decoded kernel output of every row
    pub outputs: Vec<ActorOutput>,
    /// Arena epoch the frame was dispatched under
    pub epoch: u64,
}

impl Harvest {
    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when no rows were dispatched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// `(id, output)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &ActorOutput)> + '_ {
        self.ids.iter().copied().zip(self.outputs.iter())
    }
}

/// Owns the backend, both generations and the scent ping-pong.
pub struct ResourceManager {
    backend: Box<dyn ComputeBackend>,
    layout: Option<GridLayout>,
    ids: GenerationPair<Vec<u64>>,
    scent: PingPong,
    epoch: u64,
    capacity_floor: usize,
    flow_mask: u32,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceManager")
            .field("backend", &self.backend.describe())
            .field("layout", &self.layout)
            .field("epoch", &self.epoch)
            .field("pending", &self.ids.pending())
            .field("flow_mask", &self.flow_mask)
            .finish_non_exhaustive()
    }
}

impl ResourceManager {
    /// Wraps a backend. Nothing is allocated until [`Self::configure`].
    #[must_use]
    pub fn new(backend: Box<dyn ComputeBackend>) -> Self {
        Self {
            backend,
            layout: None,
            ids: GenerationPair::default(),
            scent: PingPong::new(),
            epoch: 0,
            capacity_floor: MIN_SLOT_CAPACITY,
            flow_mask: 0,
        }
    }

    /// Overrides the smallest slot capacity (tests use tiny floors to force
    /// growth).
    #[must_use]
    pub fn with_capacity_floor(mut self, floor: usize) -> Self {
        self.capacity_floor = floor.max(1);
        self
    }

    /// Backend description.
    #[must_use]
    pub fn backend_info(&self) -> BackendInfo {
        self.backend.describe()
    }

    /// Grid geometry, once configured.
    #[must_use]
    pub const fn layout(&self) -> Option<GridLayout> {
        self.layout
    }

    /// Rows per generation slot.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.backend.slot_capacity()
    }

    /// Arena epoch of the current slots.
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Dispatch cycles committed so far.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.ids.cycles()
    }

    /// Scent buffer currently holding the field.
    #[must_use]
    pub const fn scent_front(&self) -> usize {
        self.scent.front()
    }

    /// Bit `i` set when flow field `i` holds a current computation.
    #[must_use]
    pub const fn flow_mask(&self) -> u32 {
        self.flow_mask
    }

    /// True when a frame is waiting to be harvested.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.ids.pending().is_some()
    }

    fn require_layout(&self) -> ComputeResult<GridLayout> {
        self.layout.ok_or(ComputeError::NotConfigured("grids"))
    }

    /// Allocates the grids for `layout`.
    ///
    /// Slots are released, scent and flow state reset, and any pending frame
    /// is discarded.
    ///
    /// # Errors
    ///
    /// Backend allocation failures.
    pub fn configure(&mut self, layout: GridLayout) -> ComputeResult<()> {
        if self.ids.invalidate() {
            tracing::warn!("pending frame discarded by grid reconfiguration");
        }
        self.ids.reset();
        self.scent.reset();
        self.flow_mask = 0;
        self.layout = None;
        self.backend.configure(&layout)?;
        self.layout = Some(layout);
        Ok(())
    }

    /// Makes sure each slot holds `count` rows.
    ///
    /// Returns true when the slots were rebuilt. A rebuild frees both
    /// generations before reallocating and discards the pending frame.
    ///
    /// # Errors
    ///
    /// `NotConfigured` before [`Self::configure`]; backend allocation
    /// failures.
    pub fn ensure_capacity(&mut self, count: usize) -> ComputeResult<bool> {
        self.require_layout()?;
        let capacity = self.backend.slot_capacity();
        if capacity > 0 && count <= capacity {
            return Ok(false);
        }
        if self.ids.invalidate() {
            tracing::warn!("pending frame discarded by slot rebuild");
        }
        let target = grow_capacity(count, self.capacity_floor);
        self.epoch = self.backend.rebuild_slots(target)?;
        tracing::debug!("slots grown to {} rows for {} actors", target, count);
        Ok(true)
    }

    /// Replaces the voxel window on the device.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, `LengthMismatch`.
    pub fn upload_voxels(&mut self, voxels: &[u32]) -> ComputeResult<()> {
        self.backend.upload_voxels(voxels)
    }

    /// Zeroes both scent buffers and returns to buffer 0.
    ///
    /// # Errors
    ///
    /// `NotConfigured`.
    pub fn reset_scent(&mut self) -> ComputeResult<()> {
        self.backend.clear_scent()?;
        self.scent.reset();
        Ok(())
    }

    /// Injects `stimuli` into the front buffer, diffuses into the back
    /// buffer and swaps.
    ///
    /// # Errors
    ///
    /// `NotConfigured`; backend errors. The roles only swap on success.
    pub fn step_scent(
        &mut self,
        stimuli: &[GpuStimulus],
        tuning: &ScentTuning,
    ) -> ComputeResult<PingPongPass> {
        let layout = self.require_layout()?;
        let uniforms = ScentUniforms::new(&layout, tuning, stimuli.len() as u32);
        if !stimuli.is_empty() {
            self.backend.inject_scent(self.scent.front(), stimuli, &uniforms)?;
        }
        self.backend.diffuse_scent(self.scent.next_pass(), &uniforms)?;
        Ok(self.scent.swap())
    }

    /// Recomputes one flow field from `targets` (window-relative cells).
    ///
    /// `sweeps` of 0 picks the grid's diagonal extent. An empty target list
    /// leaves the field unreachable everywhere and marks it invalid.
    ///
    /// # Errors
    ///
    /// `NotConfigured`; backend errors (the field is marked invalid).
    pub fn compute_flow(
        &mut self,
        target: FlowTarget,
        targets: &[IVec3],
        sweeps: u32,
    ) -> ComputeResult<()> {
        let layout = self.require_layout()?;
        let bit = 1u32 << target.index();
        self.flow_mask &= !bit;

        let packed: Vec<[i32; 4]> = targets
            .iter()
            .take(MAX_FLOW_TARGETS)
            .map(|t| t.extend(0))
            .collect();
        let sweeps = if sweeps == 0 {
            default_sweeps(layout.voxel)
        } else {
            sweeps
        };
        self.backend.compute_flow(target, &packed, sweeps)?;
        if !packed.is_empty() {
            self.flow_mask |= bit;
        }
        Ok(())
    }

    /// Marks a flow field stale without recomputing it.
    pub fn invalidate_flow(&mut self, target: FlowTarget) {
        self.flow_mask &= !(1u32 << target.index());
    }

    /// Uploads `batch` into the write generation, runs the behavior and
    /// emission kernels and marks the frame pending.
    ///
    /// `frame` actor and attractor counts and the flow mask are filled in
    /// here. Attractors beyond [`MAX_ATTRACTORS`] are dropped.
    ///
    /// # Errors
    ///
    /// `NotConfigured`; allocation and dispatch errors. Any error discards
    /// the pending frame.
    pub fn submit(
        &mut self,
        batch: &ActorBatch,
        attractors: &[GpuAttractor],
        mut frame: FrameUniforms,
    ) -> ComputeResult<PendingGeneration> {
        let attractors = if attractors.len() > MAX_ATTRACTORS {
            tracing::warn!(
                "{} attractors exceed the slot limit, keeping {}",
                attractors.len(),
                MAX_ATTRACTORS
            );
            &attractors[..MAX_ATTRACTORS]
        } else {
            attractors
        };
        frame.counts[0] = batch.len() as u32;
        frame.counts[1] = attractors.len() as u32;
        frame.counts[3] = self.flow_mask;

        match self.dispatch(batch, attractors, &frame) {
            Ok(pending) => Ok(pending),
            Err(e) => {
                if self.ids.invalidate() {
                    tracing::warn!("pending frame discarded after failed dispatch");
                }
                Err(e)
            }
        }
    }

    fn dispatch(
        &mut self,
        batch: &ActorBatch,
        attractors: &[GpuAttractor],
        frame: &FrameUniforms,
    ) -> ComputeResult<PendingGeneration> {
        self.ensure_capacity(batch.len())?;
        let slot = self.ids.write_index();
        self.backend.upload_actors(slot, &batch.to_device(), attractors)?;
        self.backend.dispatch_actors(slot, self.scent.front(), frame)?;

        let ids = self.ids.write_slot_mut();
        ids.clear();
        ids.extend_from_slice(&batch.ids);
        Ok(self.ids.commit(batch.len(), self.epoch))
    }

    /// Reads back the pending frame.
    ///
    /// `Ok(None)` when nothing is pending or the frame predates the current
    /// slots. The pending marker is consumed either way.
    ///
    /// # Errors
    ///
    /// `Readback`; `LengthMismatch` when the read-back disagrees with the
    /// dispatched count.
    pub fn harvest(&mut self) -> ComputeResult<Option<Harvest>> {
        let Some(pending) = self.ids.take_pending() else {
            return Ok(None);
        };
        if pending.epoch != self.epoch {
            tracing::warn!(
                "stale pending frame skipped (epoch {} != {})",
                pending.epoch,
                self.epoch
            );
            return Ok(None);
        }

        let raw = self.backend.read_outputs(pending.slot, pending.count)?;
        if raw.len() != pending.count {
            return Err(ComputeError::LengthMismatch {
                expected: pending.count,
                actual: raw.len(),
            });
        }
        let ids = self
            .ids
            .slot(pending.slot)
            .ok_or(ComputeError::SlotOutOfRange(pending.slot))?;
        if ids.len() != pending.count {
            return Err(ComputeError::LengthMismatch {
                expected: pending.count,
                actual: ids.len(),
            });
        }

        tracing::debug!("harvested {} rows from slot {}", pending.count, pending.slot);
        Ok(Some(Harvest {
            ids: ids.clone(),
            outputs: raw.iter().map(|o| o.decode()).collect(),
            epoch: pending.epoch,
        }))
    }

    /// Drops the pending frame without reading it. Returns true when one
    /// was pending.
    pub fn discard_pending(&mut self) -> bool {
        self.ids.invalidate()
    }

    /// Copies the current scent field back.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, `Readback`.
    pub fn read_scent(&mut self) -> ComputeResult<ScentSnapshot> {
        let layout = self.require_layout()?;
        let values = self.backend.read_scent(self.scent.front())?;
        ScentSnapshot::new(layout, values)
    }

    /// Copies one flow field back.
    ///
    /// # Errors
    ///
    /// `NotConfigured`, `Readback`.
    pub fn read_flow(&mut self, target: FlowTarget) -> ComputeResult<FlowGrid> {
        let layout = self.require_layout()?;
        let (cost, dirs) = self.backend.read_flow(target)?;
        FlowGrid::new(layout.voxel, cost, dirs)
    }
}
