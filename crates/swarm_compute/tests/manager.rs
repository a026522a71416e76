//! Generation pipelining and failure handling of the resource manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use swarm_compute::{
    ActorBatch, ActorParams, ActorRow, BackendInfo, ComputeBackend, ComputeError, ComputeResult,
    FrameClock, FrameUniforms, GpuActor, GpuActorOutput, GpuAttractor, GpuStimulus, GridLayout,
    KernelTuning, ResourceManager, SoftwareBackend,
};
use swarm_compute::layout::ScentUniforms;
use swarm_core::PingPongPass;
use swarm_shared::{ActorClass, FlowTarget, FlyerState, Vec3};

/// Software backend whose dispatch can be made to fail.
struct Flaky {
    inner: SoftwareBackend,
    fail: Arc<AtomicBool>,
}

impl ComputeBackend for Flaky {
    fn describe(&self) -> BackendInfo {
        self.inner.describe()
    }
    fn configure(&mut self, layout: &GridLayout) -> ComputeResult<()> {
        self.inner.configure(layout)
    }
    fn rebuild_slots(&mut self, capacity: usize) -> ComputeResult<u64> {
        self.inner.rebuild_slots(capacity)
    }
    fn slot_capacity(&self) -> usize {
        self.inner.slot_capacity()
    }
    fn upload_voxels(&mut self, voxels: &[u32]) -> ComputeResult<()> {
        self.inner.upload_voxels(voxels)
    }
    fn clear_scent(&mut self) -> ComputeResult<()> {
        self.inner.clear_scent()
    }
    fn inject_scent(&mut self, b: usize, s: &[GpuStimulus], u: &ScentUniforms) -> ComputeResult<()> {
        self.inner.inject_scent(b, s, u)
    }
    fn diffuse_scent(&mut self, pass: PingPongPass, u: &ScentUniforms) -> ComputeResult<()> {
        self.inner.diffuse_scent(pass, u)
    }
    fn compute_flow(&mut self, t: FlowTarget, targets: &[[i32; 4]], sweeps: u32) -> ComputeResult<()> {
        self.inner.compute_flow(t, targets, sweeps)
    }
    fn upload_actors(&mut self, slot: usize, a: &[GpuActor], at: &[GpuAttractor]) -> ComputeResult<()> {
        self.inner.upload_actors(slot, a, at)
    }
    fn dispatch_actors(&mut self, slot: usize, front: usize, frame: &FrameUniforms) -> ComputeResult<()> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(ComputeError::Device("out of memory".to_owned()));
        }
        self.inner.dispatch_actors(slot, front, frame)
    }
    fn read_outputs(&mut self, slot: usize, count: usize) -> ComputeResult<Vec<GpuActorOutput>> {
        self.inner.read_outputs(slot, count)
    }
    fn read_scent(&mut self, buffer: usize) -> ComputeResult<Vec<f32>> {
        self.inner.read_scent(buffer)
    }
    fn read_flow(&mut self, target: FlowTarget) -> ComputeResult<(Vec<u32>, Vec<u32>)> {
        self.inner.read_flow(target)
    }
}

fn layout() -> GridLayout {
    GridLayout::new(16, 8).unwrap()
}

fn manager() -> ResourceManager {
    let mut m = ResourceManager::new(Box::new(SoftwareBackend::new())).with_capacity_floor(8);
    m.configure(layout()).unwrap();
    m
}

fn flaky() -> (ResourceManager, Arc<AtomicBool>) {
    let fail = Arc::new(AtomicBool::new(false));
    let backend = Flaky {
        inner: SoftwareBackend::new(),
        fail: Arc::clone(&fail),
    };
    let mut m = ResourceManager::new(Box::new(backend)).with_capacity_floor(8);
    m.configure(layout()).unwrap();
    (m, fail)
}

fn walkers(first_id: u64, n: usize) -> ActorBatch {
    let mut batch = ActorBatch::with_capacity(n);
    for i in 0..n {
        let p = Vec3::new(2.5 + (i % 10) as f32, 6.0, 2.5 + (i / 10 % 10) as f32);
        batch.push(ActorRow {
            id: first_id + i as u64,
            position: p,
            velocity: Vec3::ZERO,
            prev_position: p,
            params: ActorParams::for_class(ActorClass::Walker),
            flyer_state: FlyerState::Idle,
            stuck_timer: 0,
        });
    }
    batch
}

fn frame() -> FrameUniforms {
    FrameUniforms::new(
        &layout(),
        &KernelTuning::default(),
        FrameClock::default(),
        0,
        0,
        &[Vec3::new(8.0, 6.0, 8.0)],
        0,
    )
}

#[test]
fn test_growth_with_pending_frame_reads_new_count() {
    let mut m = manager();
    m.submit(&walkers(0, 10), &[], frame()).unwrap();
    let before = m.epoch();

    // Population outgrows the slots while frame N is still pending.
    let grown = walkers(1000, 600);
    m.submit(&grown, &[], frame()).unwrap();
    assert!(m.epoch() > before);
    assert!(m.capacity() >= 600);

    let harvest = m.harvest().unwrap().unwrap();
    assert_eq!(harvest.len(), 600);
    assert_eq!(harvest.ids, grown.ids);
    assert_eq!(harvest.epoch, m.epoch());
    assert!(harvest.outputs.iter().all(|o| o.velocity.is_finite()));
}

#[test]
fn test_growth_between_submit_and_harvest_skips_readback() {
    let mut m = manager();
    m.submit(&walkers(0, 10), &[], frame()).unwrap();
    m.ensure_capacity(5000).unwrap();
    assert_eq!(m.harvest().unwrap(), None);

    // The pipeline restarts cleanly on the next cycle.
    m.submit(&walkers(0, 12), &[], frame()).unwrap();
    assert_eq!(m.harvest().unwrap().unwrap().len(), 12);
}

#[test]
fn test_one_swap_per_cycle() {
    let mut m = manager();
    let mut slots = Vec::new();
    for cycle in 0..6 {
        let pending = m.submit(&walkers(0, 4 + cycle), &[], frame()).unwrap();
        slots.push(pending.slot);
        let harvest = m.harvest().unwrap().unwrap();
        assert_eq!(harvest.len(), pending.count);
    }
    assert_eq!(slots, vec![0, 1, 0, 1, 0, 1]);
    assert_eq!(m.cycles(), 6);
}

#[test]
fn test_failed_dispatch_discards_pending() {
    let (mut m, fail) = flaky();
    m.submit(&walkers(0, 5), &[], frame()).unwrap();
    assert!(m.has_pending());

    fail.store(true, Ordering::Relaxed);
    let err = m.submit(&walkers(0, 5), &[], frame()).unwrap_err();
    assert!(matches!(err, ComputeError::Device(_)));
    assert!(!m.has_pending());
    assert_eq!(m.harvest().unwrap(), None);

    fail.store(false, Ordering::Relaxed);
    m.submit(&walkers(0, 7), &[], frame()).unwrap();
    assert_eq!(m.harvest().unwrap().unwrap().len(), 7);
}

#[test]
fn test_reconfigure_discards_pending() {
    let mut m = manager();
    m.submit(&walkers(0, 3), &[], frame()).unwrap();
    m.configure(layout()).unwrap();
    assert!(!m.has_pending());
    assert_eq!(m.capacity(), 0);
    m.submit(&walkers(0, 3), &[], frame()).unwrap();
    assert_eq!(m.harvest().unwrap().unwrap().len(), 3);
}

#[test]
fn test_excess_attractors_are_dropped() {
    let mut m = manager();
    let attractors = vec![GpuAttractor::default(); 2000];
    m.submit(&walkers(0, 2), &attractors, frame()).unwrap();
    assert!(m.harvest().unwrap().is_some());
}

#[test]
fn test_empty_batch_round_trips() {
    let mut m = manager();
    m.submit(&ActorBatch::default(), &[], frame()).unwrap();
    let harvest = m.harvest().unwrap().unwrap();
    assert!(harvest.is_empty());
}
