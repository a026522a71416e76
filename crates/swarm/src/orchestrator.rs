//! # Swarm Orchestrator
//!
//! The only component the host calls, once per tick:
//! ```text
//! Tick N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. HARVEST                                                          │
//! │    └─ Read back frame N-1, sanitize, write velocity + yaw to host   │
//! │                                                                     │
//! │ 2. CLEANUP (every cleanup_interval)                                 │
//! │    └─ Release and forget non-candidates and vanished actors         │
//! │                                                                     │
//! │ 3. VOXEL WINDOW                                                     │
//! │    └─ Relocate or scan the next chunk columns                       │
//! │                                                                     │
//! │ 4. SELECTION                                                        │
//! │    ├─ Release protected and far actors                              │
//! │    └─ Below min_actors: release everyone, stop                      │
//! │                                                                     │
//! │ 5. FIELDS                                                           │
//! │    ├─ Attractor rescan (sensor_interval)                            │
//! │    ├─ Voxel upload if dirty                                         │
//! │    └─ Flow refresh (refresh_interval, forced on relocation)         │
//! │                                                                     │
//! │ 6. DISPATCH                                                         │
//! │    ├─ Stimuli → inject + diffuse                                    │
//! │    ├─ Batch with commands (flee / panic / goal)                     │
//! │    └─ Submit, mark pending. Never waits for the device.             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed cycle discards the pending frame and hands every actor back to
//! the host. After `max_consecutive_failures` in a row the orchestrator
//! disables itself for good.

use std::collections::{HashMap, HashSet};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use swarm_compute::{
    ActorBatch, ActorParams, ActorRow, ComputeBackend, ComputeError, ComputeResult, FlowGrid,
    FrameClock, FrameUniforms, GridLayout, KernelTuning, ResourceManager, ScentSnapshot,
    ScentTuning, SoftwareBackend, WgpuBackend,
};
use swarm_shared::constants::{
    COMMAND_FLEE, COMMAND_MOVE, COMMAND_NONE, DAY_LENGTH, FLAG_MARINE,
};
use swarm_shared::{ActorClass, BehaviorClass, DVec3, FlowTarget, FlyerState, IVec3, Vec3};

use crate::actor::{ActorRegistry, ActorState};
use crate::config::{BackendChoice, SelectionConfig, SwarmConfig};
use crate::error::{SwarmError, SwarmResult};
use crate::flow::{FlowScheduler, FlowTargets};
use crate::scent::ScentSensor;
use crate::sensor::AttractorSensor;
use crate::species::{SpeciesCatalog, SpeciesProfile};
use crate::voxel::VoxelSnapshot;
use crate::world::{ActorSnapshot, WorldView};

/// Why a tick did not dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// Disabled by config, startup failure or repeated failure
    Disabled,
    /// Fewer near candidates than `gpu.min_actors`
    BelowThreshold,
    /// No player and no actor to center the window on
    NoCenter,
    /// A backend call failed this tick
    DispatchFailed,
}

/// Statistics of one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick number
    pub tick: u64,
    /// False on ticks skipped by `update_interval`
    pub ran: bool,
    /// Actors with a class
    pub candidates: usize,
    /// Candidates that passed selection
    pub near: usize,
    /// Actors handed back to the host
    pub released: usize,
    /// Rows submitted
    pub dispatched: usize,
    /// Rows of the previous frame applied
    pub harvested: usize,
    /// Valid flow fields after a refresh this tick
    pub flow_refreshed: Option<usize>,
    /// The voxel window moved
    pub relocated: bool,
    /// Why nothing was dispatched
    pub fallback: Option<FallbackReason>,
}

/// Drives one pipeline cycle per host tick.
pub struct SwarmOrchestrator {
    /// Configuration (validated).
    config: SwarmConfig,
    /// Species profile source.
    species: Box<dyn SpeciesCatalog>,
    /// Backend owner; `None` once the GPU path is unavailable.
    manager: Option<ResourceManager>,
    /// Grid geometry.
    layout: GridLayout,
    /// Classified window.
    voxels: VoxelSnapshot,
    /// Flow refresh cadence.
    flow: FlowScheduler,
    /// Flyer attractors.
    attractors: AttractorSensor,
    /// Stimulus batch builder.
    scent: ScentSensor,
    scent_tuning: ScentTuning,
    kernel_tuning: KernelTuning,
    /// Auxiliary state per actor.
    actors: ActorRegistry,
    /// Near candidates of the last selection.
    candidates: HashSet<u64>,
    /// Window origin the pending frame was dispatched under.
    pending_anchor: Option<IVec3>,
    /// Wander seed stream.
    rng: ChaCha8Rng,
    tick: u64,
    failures: u32,
    disabled: bool,
}

impl std::fmt::Debug for SwarmOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmOrchestrator")
            .field("manager", &self.manager)
            .field("origin", &self.voxels.origin())
            .field("actors", &self.actors.len())
            .field("tick", &self.tick)
            .field("failures", &self.failures)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl SwarmOrchestrator {
    /// Builds the backend named by `config.gpu.backend`.
    ///
    /// A device or kernel failure at startup does not fail construction:
    /// the orchestrator comes up disabled and logs the cause once.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `config` fails validation.
    pub fn new(config: SwarmConfig, species: Box<dyn SpeciesCatalog>) -> SwarmResult<Self> {
        config.validate()?;
        let backend: Option<Box<dyn ComputeBackend>> = if !config.gpu.enabled {
            tracing::info!("gpu path disabled by config");
            None
        } else {
            match config.gpu.backend {
                BackendChoice::Software => Some(Box::new(SoftwareBackend::new())),
                BackendChoice::Wgpu => match WgpuBackend::new() {
                    Ok(backend) => Some(Box::new(backend)),
                    Err(e) => {
                        tracing::error!("gpu path disabled, device unavailable: {}", e);
                        None
                    }
                },
            }
        };
        Self::build(config, species, backend)
    }

    /// Uses an explicit backend.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when `config` fails validation.
    pub fn with_backend(
        config: SwarmConfig,
        species: Box<dyn SpeciesCatalog>,
        backend: Box<dyn ComputeBackend>,
    ) -> SwarmResult<Self> {
        config.validate()?;
        Self::build(config, species, Some(backend))
    }

    fn build(
        config: SwarmConfig,
        species: Box<dyn SpeciesCatalog>,
        backend: Option<Box<dyn ComputeBackend>>,
    ) -> SwarmResult<Self> {
        let layout = config.layout()?;
        let manager = backend.and_then(|backend| {
            let mut manager = ResourceManager::new(backend);
            match manager.configure(layout) {
                Ok(()) => {
                    let info = manager.backend_info();
                    tracing::info!("swarm backend {:?} ({})", info.kind, info.name);
                    Some(manager)
                }
                Err(e) => {
                    tracing::error!("gpu path disabled, grid allocation failed: {}", e);
                    None
                }
            }
        });

        Ok(Self {
            voxels: VoxelSnapshot::new(
                config.voxel.size,
                config.voxel.relocate_threshold,
                config.voxel.chunks_per_tick,
            ),
            flow: FlowScheduler::new(&config.flow),
            attractors: AttractorSensor::new(
                config.selection.sensor_interval,
                config.scent.stimulus_range as i32,
            ),
            scent: ScentSensor::new(&config.scent),
            scent_tuning: config.scent_tuning(),
            kernel_tuning: config.kernel_tuning(),
            rng: ChaCha8Rng::seed_from_u64(config.gpu.seed),
            disabled: manager.is_none(),
            manager,
            layout,
            species,
            actors: ActorRegistry::new(),
            candidates: HashSet::new(),
            pending_anchor: None,
            tick: 0,
            failures: 0,
            config,
        })
    }

    /// False once the GPU path is off for good.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !self.disabled
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Failed cycles since the last success.
    #[must_use]
    pub const fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    /// Classified voxel window.
    #[must_use]
    pub const fn voxels(&self) -> &VoxelSnapshot {
        &self.voxels
    }

    /// Resource manager, while enabled.
    #[must_use]
    pub fn manager(&self) -> Option<&ResourceManager> {
        self.manager.as_ref()
    }

    /// Mutable resource manager (diagnostic read-backs).
    pub fn manager_mut(&mut self) -> Option<&mut ResourceManager> {
        self.manager.as_mut()
    }

    /// Auxiliary state of `id`.
    #[must_use]
    pub fn actor(&self, id: u64) -> Option<&ActorState> {
        self.actors.get(id)
    }

    /// Actors currently driven by the kernels.
    #[must_use]
    pub fn device_owned(&self) -> usize {
        self.actors.device_owned()
    }

    /// Copies the current scent field back (diagnostics).
    ///
    /// # Errors
    ///
    /// `Disabled` once the GPU path is off; backend read-back errors.
    pub fn scent_snapshot(&mut self) -> SwarmResult<ScentSnapshot> {
        let manager = self.manager.as_mut().ok_or(SwarmError::Disabled)?;
        Ok(manager.read_scent()?)
    }

    /// Copies one flow field back (diagnostics).
    ///
    /// # Errors
    ///
    /// `Disabled` once the GPU path is off; backend read-back errors.
    pub fn flow_grid(&mut self, target: FlowTarget) -> SwarmResult<FlowGrid> {
        let manager = self.manager.as_mut().ok_or(SwarmError::Disabled)?;
        Ok(manager.read_flow(target)?)
    }

    /// Hands every actor back to the host and turns the GPU path off.
    pub fn shutdown<W: WorldView + ?Sized>(&mut self, world: &mut W) -> usize {
        let velocities = velocities(&world.actors());
        self.disable(world, &velocities, "shutdown requested")
    }

    /// Runs one host tick.
    pub fn tick<W: WorldView + ?Sized>(&mut self, world: &mut W) -> TickReport {
        let tick = self.tick;
        self.tick += 1;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        if self.disabled {
            report.fallback = Some(FallbackReason::Disabled);
            return report;
        }
        if tick % self.config.gpu.update_interval != 0 {
            return report;
        }
        report.ran = true;

        match self.cycle(world, tick, &mut report) {
            Ok(()) => self.failures = 0,
            Err(e) => {
                let velocities = velocities(&world.actors());
                self.failures += 1;
                tracing::warn!(
                    "swarm cycle failed ({}/{}), falling back to host motion: {}",
                    self.failures,
                    self.config.gpu.max_consecutive_failures,
                    e
                );
                if let Some(manager) = self.manager.as_mut() {
                    manager.discard_pending();
                }
                self.pending_anchor = None;
                report.released += self
                    .actors
                    .release_all(world, |id| velocities.get(&id).copied());
                report.dispatched = 0;
                report.fallback = Some(FallbackReason::DispatchFailed);

                if self.failures >= self.config.gpu.max_consecutive_failures.max(1) {
                    self.disable(world, &velocities, "repeated cycle failures");
                    report.fallback = Some(FallbackReason::Disabled);
                }
            }
        }
        report
    }

    fn disable<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        velocities: &HashMap<u64, DVec3>,
        reason: &str,
    ) -> usize {
        if !self.disabled {
            tracing::error!("swarm pipeline disabled permanently: {}", reason);
        }
        self.disabled = true;
        if let Some(manager) = self.manager.as_mut() {
            manager.discard_pending();
        }
        self.manager = None;
        self.pending_anchor = None;
        let released = self
            .actors
            .release_all(world, |id| velocities.get(&id).copied());
        self.actors.clear();
        released
    }

    /// Reads back the previous frame and applies it.
    fn apply_pending<W: WorldView + ?Sized>(&mut self, world: &mut W) -> ComputeResult<usize> {
        let Some(manager) = self.manager.as_mut() else {
            return Ok(0);
        };
        let anchor = self.pending_anchor.take();
        let Some(harvest) = manager.harvest()? else {
            return Ok(0);
        };
        let Some(anchor) = anchor else {
            return Ok(0);
        };

        let mut applied = 0;
        for (id, output) in harvest.iter() {
            let Some(state) = self.actors.get_mut(id) else {
                continue;
            };
            if state.apply(id, output, anchor, world).is_some() {
                applied += 1;
            }
        }
        tracing::debug!("applied {} of {} harvested rows", applied, harvest.len());
        Ok(applied)
    }

    #[allow(clippy::too_many_lines)]
    fn cycle<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        tick: u64,
        report: &mut TickReport,
    ) -> ComputeResult<()> {
        // 1. previous frame
        report.harvested = self.apply_pending(world)?;

        let snapshots = world.actors();
        let velocities = velocities(&snapshots);
        let velocity_of = |id: u64| velocities.get(&id).copied();

        // 2. ownership cleanup
        if tick % self.config.selection.cleanup_interval.max(1) == 0 {
            let candidates = &self.candidates;
            report.released += self
                .actors
                .sweep(world, velocity_of, |id| candidates.contains(&id));
        }

        // 3. voxel window
        let players = world.players();
        let center = players
            .first()
            .copied()
            .or_else(|| snapshots.iter().find(|a| a.class.is_some()).map(|a| a.position));
        let Some(center) = center else {
            report.released += self.actors.release_all(world, velocity_of);
            report.fallback = Some(FallbackReason::NoCenter);
            return Ok(());
        };
        let scan = self.voxels.update(world, center.block());
        report.relocated = scan.relocated;
        let Some(anchor) = self.voxels.origin() else {
            return Err(ComputeError::NotConfigured("voxel window"));
        };
        let Some(manager) = self.manager.as_mut() else {
            return Err(ComputeError::NotConfigured("backend"));
        };
        if scan.relocated {
            manager.reset_scent()?;
            self.flow.force();
            self.attractors.invalidate();
        }

        // 4. selection
        let selection = &self.config.selection;
        let protected = world.protected_positions();
        let protected_sq = selection.protected_radius * selection.protected_radius;
        let player_chunks: Vec<(i32, i32)> = players.iter().map(|p| p.block().chunk()).collect();
        let mut near: Vec<&ActorSnapshot> = Vec::new();

        for actor in &snapshots {
            if actor.class.is_none() {
                continue;
            }
            report.candidates += 1;
            let is_protected = protected
                .iter()
                .any(|p| p.distance_squared(actor.position) <= protected_sq);
            let (cx, cz) = actor.position.block().chunk();
            let chunk_near = player_chunks.is_empty()
                || player_chunks.iter().any(|(px, pz)| {
                    (cx - px).abs() <= selection.near_chunk_radius
                        && (cz - pz).abs() <= selection.near_chunk_radius
                });
            let inside = self.voxels.is_inside(actor.position, selection.window_margin);

            if is_protected || !chunk_near || !inside {
                if self.actors.release(actor.id, actor.velocity, world) {
                    report.released += 1;
                }
                continue;
            }
            let species = &self.species;
            self.actors
                .entry(actor.id, || {
                    ActorState::new(species.resolve(&actor.species), actor.yaw, tick)
                })
                .touch(tick);
            near.push(actor);
        }
        report.near = near.len();
        self.candidates = near.iter().map(|a| a.id).collect();

        if near.len() < self.config.gpu.min_actors {
            report.released += self.actors.release_all(world, velocity_of);
            if manager.discard_pending() {
                tracing::debug!("pending frame dropped below the actor threshold");
            }
            self.pending_anchor = None;
            report.fallback = Some(FallbackReason::BelowThreshold);
            return Ok(());
        }

        // 5. fields
        self.attractors.rescan_if_due(world, center.block(), tick);
        if let Some(cells) = self.voxels.take_dirty() {
            if let Err(e) = manager.upload_voxels(cells) {
                self.voxels.mark_dirty();
                return Err(e);
            }
        }
        let food = world.food_sources();
        if self.flow.is_due(tick) {
            let mut targets = FlowTargets::new();
            for p in &players {
                if let Some(cell) = self.voxels.cell_of(*p) {
                    targets.push(FlowTarget::Player, cell);
                }
            }
            for actor in &snapshots {
                let livestock = actor.class.is_some()
                    && self.species.resolve(&actor.species).behavior == BehaviorClass::Livestock;
                if let (true, Some(cell)) = (livestock, self.voxels.cell_of(actor.position)) {
                    targets.push(FlowTarget::Herd, cell);
                }
            }
            for source in &food {
                if let Some(cell) = self.voxels.cell_of(source.position) {
                    targets.push(FlowTarget::Food, cell);
                }
            }
            report.flow_refreshed = self.flow.refresh(manager, targets, tick)?;
        }

        // 6. dispatch
        let stimuli = self.scent.collect(center, anchor, &players, &food);
        manager.step_scent(&stimuli, &self.scent_tuning)?;

        let hostiles: Vec<(u64, DVec3)> = snapshots
            .iter()
            .filter(|a| a.hostile)
            .map(|a| (a.id, a.position))
            .collect();
        let mut batch = ActorBatch::with_capacity(near.len());
        let mut gatherers = Vec::new();
        for actor in &near {
            let (Some(class), Some(state)) = (actor.class, self.actors.get(actor.id)) else {
                continue;
            };
            if state.flyer_state() == FlyerState::Gather {
                gatherers.push(actor.position);
            }
            let (command, goal) = command_for(actor, &state.profile, &hostiles, selection);
            let mut params = actor_params(class, &state.profile, actor.marine);
            params.command = command;
            params.goal = goal.map_or(Vec3::ZERO, |g| g.relative_to(anchor));
            batch.push(ActorRow {
                id: actor.id,
                position: actor.position.relative_to(anchor),
                velocity: actor.velocity.as_vec3(),
                prev_position: state.prev_position_or(actor.position).relative_to(anchor),
                params,
                flyer_state: state.flyer_state(),
                stuck_timer: state.stuck_timer(),
            });
        }

        let attractors = self.attractors.to_device(
            anchor,
            &gatherers,
            f64::from(self.kernel_tuning.arrive_radius),
        );
        let env = world.environment();
        let clock = FrameClock {
            tick: tick as u32,
            world_time: (env.time_of_day % u64::from(DAY_LENGTH)) as u32,
            raining: env.raining,
            rain_level: if env.raining { env.rain_level } else { 0.0 },
            seed: self.rng.gen(),
        };
        let players_local: Vec<Vec3> = players.iter().map(|p| p.relative_to(anchor)).collect();
        let frame = FrameUniforms::new(
            &self.layout,
            &self.kernel_tuning,
            clock,
            0,
            0,
            &players_local,
            0,
        );

        manager.submit(&batch, &attractors, frame)?;
        self.pending_anchor = Some(anchor);
        for actor in &near {
            if let Some(state) = self.actors.get_mut(actor.id) {
                state.acquire(actor.id, world);
            }
        }
        report.dispatched = batch.len();
        tracing::debug!(
            "tick {}: dispatched {} actors, {} stimuli, {} attractors",
            tick,
            batch.len(),
            stimuli.len(),
            attractors.len()
        );
        Ok(())
    }
}

fn velocities(snapshots: &[ActorSnapshot]) -> HashMap<u64, DVec3> {
    snapshots.iter().map(|a| (a.id, a.velocity)).collect()
}

/// Kernel parameters of one actor.
fn actor_params(class: ActorClass, profile: &SpeciesProfile, marine: bool) -> ActorParams {
    let mut params = ActorParams::for_class(class);
    params.behavior = profile.behavior;
    params.preferred_channel = profile.preferred_channel;
    params.fear = profile.fear;
    params.aggression = profile.aggression;
    params.familiarity = profile.familiarity;
    if marine {
        params.flags |= FLAG_MARINE;
    }
    params
}

/// Point `distance` blocks horizontally away from `threat`.
fn flee_goal(from: DVec3, threat: DVec3, distance: f64) -> DVec3 {
    let mut away = from - threat;
    away.y = 0.0;
    let len = away.length_squared().sqrt();
    if len < 1e-6 {
        return from + DVec3::new(distance, 0.0, 0.0);
    }
    from + away * (distance / len)
}

/// Command and world goal: damage → flee, nearby hostile → flee (fearful
/// living non-hostile actors only), scripted goal → move.
fn command_for(
    actor: &ActorSnapshot,
    profile: &SpeciesProfile,
    hostiles: &[(u64, DVec3)],
    selection: &SelectionConfig,
) -> (f32, Option<DVec3>) {
    if let Some(attacker) = actor.attacker {
        return (
            COMMAND_FLEE,
            Some(flee_goal(actor.position, attacker, selection.flee_distance)),
        );
    }
    if !actor.hostile && profile.is_fearful() && actor.class.is_some_and(ActorClass::is_living) {
        let panic_sq = selection.panic_radius * selection.panic_radius;
        let threat = hostiles
            .iter()
            .filter(|(id, _)| *id != actor.id)
            .map(|(_, p)| (*p, p.distance_squared(actor.position)))
            .filter(|(_, d2)| *d2 <= panic_sq)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((threat, _)) = threat {
            return (
                COMMAND_FLEE,
                Some(flee_goal(actor.position, threat, selection.flee_distance)),
            );
        }
    }
    match actor.goal {
        Some(goal) => (COMMAND_MOVE, Some(goal)),
        None => (COMMAND_NONE, None),
    }
}
