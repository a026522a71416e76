//! Shared fixtures: an in-memory host world and a failing backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use swarm::config::BackendChoice;
use swarm::{
    ActorSnapshot, AttractorSite, BlockSample, Environment, FoodSource, SpeciesTable,
    SwarmConfig, SwarmOrchestrator, WorldView,
};
use swarm_compute::layout::ScentUniforms;
use swarm_compute::{
    BackendInfo, ComputeBackend, ComputeError, ComputeResult, FrameUniforms, GpuActor,
    GpuActorOutput, GpuAttractor, GpuStimulus, GridLayout, SoftwareBackend,
};
use swarm_core::PingPongPass;
use swarm_shared::{ActorClass, DVec3, FlowTarget, IVec3};

/// Host world kept entirely in memory.
///
/// Blocks at or below `floor` are solid, `blocks` overrides single
/// positions, everything else is air.
#[derive(Debug, Default)]
pub struct MockWorld {
    pub floor: Option<i32>,
    pub blocks: HashMap<IVec3, BlockSample>,
    pub players: Vec<DVec3>,
    pub actors: Vec<ActorSnapshot>,
    pub protected: Vec<DVec3>,
    pub food: Vec<FoodSource>,
    pub sites: Vec<AttractorSite>,
    pub environment: Environment,
    pub velocities: HashMap<u64, DVec3>,
    pub velocity_log: Vec<(u64, DVec3)>,
    pub yaws: HashMap<u64, f32>,
    pub gravity: HashMap<u64, bool>,
}

impl MockWorld {
    pub fn with_floor(y: i32) -> Self {
        Self {
            floor: Some(y),
            ..Self::default()
        }
    }

    pub fn spawn(&mut self, actor: ActorSnapshot) {
        self.actors.push(actor);
    }

    pub fn despawn(&mut self, id: u64) {
        self.actors.retain(|a| a.id != id);
    }

    pub fn actor_mut(&mut self, id: u64) -> Option<&mut ActorSnapshot> {
        self.actors.iter_mut().find(|a| a.id == id)
    }

    /// Host gravity of `id`; untouched actors keep it on.
    pub fn has_gravity(&self, id: u64) -> bool {
        self.gravity.get(&id).copied().unwrap_or(true)
    }
}

impl WorldView for MockWorld {
    fn block(&self, pos: IVec3) -> Option<BlockSample> {
        if let Some(sample) = self.blocks.get(&pos) {
            return Some(*sample);
        }
        match self.floor {
            Some(floor) if pos.y <= floor => Some(BlockSample::SOLID),
            _ => Some(BlockSample::AIR),
        }
    }

    fn is_chunk_loaded(&self, _cx: i32, _cz: i32) -> bool {
        true
    }

    fn environment(&self) -> Environment {
        self.environment
    }

    fn players(&self) -> Vec<DVec3> {
        self.players.clone()
    }

    fn actors(&self) -> Vec<ActorSnapshot> {
        self.actors.clone()
    }

    fn protected_positions(&self) -> Vec<DVec3> {
        self.protected.clone()
    }

    fn food_sources(&self) -> Vec<FoodSource> {
        self.food.clone()
    }

    fn attractor_sites(&self, _center: IVec3, _radius: i32) -> Vec<AttractorSite> {
        self.sites.clone()
    }

    fn set_velocity(&mut self, id: u64, velocity: DVec3) {
        self.velocities.insert(id, velocity);
        self.velocity_log.push((id, velocity));
        if let Some(actor) = self.actor_mut(id) {
            actor.velocity = velocity;
        }
    }

    fn set_yaw(&mut self, id: u64, yaw: f32) {
        self.yaws.insert(id, yaw);
        if let Some(actor) = self.actor_mut(id) {
            actor.yaw = yaw;
        }
    }

    fn set_host_gravity(&mut self, id: u64, enabled: bool) {
        self.gravity.insert(id, enabled);
    }
}

/// Software backend, 32³ window, whole window scanned per tick.
pub fn config(min_actors: usize) -> SwarmConfig {
    let mut config = SwarmConfig::default();
    config.gpu.backend = BackendChoice::Software;
    config.gpu.min_actors = min_actors;
    config.voxel.size = 32;
    config.voxel.chunks_per_tick = 4;
    config.scent.size = 16;
    config
}

pub fn orchestrator(config: SwarmConfig) -> SwarmOrchestrator {
    SwarmOrchestrator::new(config, Box::new(SpeciesTable::builtin())).unwrap()
}

pub fn walker(id: u64, species: &str, x: f64, y: f64, z: f64) -> ActorSnapshot {
    ActorSnapshot::new(id, species, ActorClass::Walker, DVec3::new(x, y, z))
}

/// `n` generic walkers on a 20-wide grid starting at (`x0`, `y`, `z0`).
pub fn walker_grid(first_id: u64, n: usize, x0: f64, y: f64, z0: f64) -> Vec<ActorSnapshot> {
    (0..n)
        .map(|i| {
            let x = x0 + (i % 20) as f64 + 0.5;
            let z = z0 + (i / 20) as f64 + 0.5;
            walker(first_id + i as u64, "minecraft:zombie", x, y, z)
        })
        .collect()
}

/// Software backend whose actor dispatch fails while the flag is set.
pub struct Flaky {
    inner: SoftwareBackend,
    fail: Arc<AtomicBool>,
}

impl Flaky {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let fail = Arc::new(AtomicBool::new(false));
        let backend = Self {
            inner: SoftwareBackend::new(),
            fail: Arc::clone(&fail),
        };
        (backend, fail)
    }
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
            return Err(ComputeError::Device("device lost".to_owned()));
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
