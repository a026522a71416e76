//! # Reference Kernels
//!
//! CPU implementations of every device pass. The software backend runs these
//! directly; the WGSL in [`crate::shaders`] follows the same structure line
//! for line.
//!
//! ## Per-actor pipeline
//!
//! ```text
//! row ──► species overlay (non-generic living actors)
//!     ──► class kernel (walker / swimmer / flyer / item / orb)
//!     ──► output row
//! ```

pub mod common;
pub mod flow;
pub mod scent;

mod ballistic;
mod flyer;
mod species;
mod swimmer;
mod walker;

use swarm_shared::constants::FLOW_FIELDS;
use swarm_shared::{direction_vector, ActorClass, BehaviorClass, FlowTarget, MotionMode, Vec3};

use crate::layout::{FrameUniforms, GpuActor, GpuActorOutput, GpuAttractor, GridLayout};
use common::VoxelView;

/// Everything a behavior pass reads.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    /// Grid geometry
    pub layout: &'a GridLayout,
    /// Voxel window
    pub voxels: VoxelView<'a>,
    /// Front scent buffer
    pub scent: &'a [f32],
    /// Direction codes of every flow field
    pub flow_dirs: &'a [u32],
    /// Actor rows
    pub actors: &'a [GpuActor],
    /// Flyer attractors
    pub attractors: &'a [GpuAttractor],
    /// Frame constants
    pub frame: &'a FrameUniforms,
}

impl FrameView<'_> {
    /// Nearest player: `(position, distance²)`.
    #[must_use]
    pub fn nearest_player(&self, pos: Vec3) -> Option<(Vec3, f32)> {
        self.frame.nearest_player(pos)
    }

    /// True when no player is within the LOD distance.
    #[must_use]
    pub fn is_lod(&self, pos: Vec3) -> bool {
        self.frame.is_lod(pos)
    }

    /// Flow direction of `field` at `pos`, zero when the field is invalid.
    #[must_use]
    pub fn flow_at(&self, field: FlowTarget, pos: Vec3) -> Vec3 {
        if self.frame.counts[3] & (1 << field.index()) == 0 {
            return Vec3::ZERO;
        }
        let grid = self.layout.voxel;
        let volume = grid.volume();
        match grid.index(pos.floor()) {
            Some(i) if self.flow_dirs.len() >= FLOW_FIELDS * volume => {
                direction_vector(self.flow_dirs[field.index() * volume + i])
            }
            _ => Vec3::ZERO,
        }
    }

    /// Flow a walker of `behavior` follows.
    ///
    /// Predators, pets and generic walkers go to players, falling back to
    /// herds; wild prey runs the opposite way; livestock heads for food.
    #[must_use]
    pub fn consumer_flow(&self, behavior: BehaviorClass, pos: Vec3) -> Vec3 {
        match behavior {
            BehaviorClass::Predator | BehaviorClass::Generic | BehaviorClass::Pet => {
                let toward = self.flow_at(FlowTarget::Player, pos);
                if toward.length_squared() > 0.0 {
                    toward
                } else {
                    self.flow_at(FlowTarget::Herd, pos)
                }
            }
            BehaviorClass::PreyWild => -self.flow_at(FlowTarget::Player, pos),
            BehaviorClass::Livestock => self.flow_at(FlowTarget::Food, pos),
            BehaviorClass::Fish => Vec3::ZERO,
        }
    }
}

/// Result of one class kernel before packing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorStep {
    /// Next velocity
    pub velocity: Vec3,
    /// Updated last sampled position
    pub prev_position: Vec3,
    /// Flyer state code
    pub flyer_state: u32,
    /// Stuck timer
    pub stuck: u32,
    /// Branch taken
    pub mode: MotionMode,
}

impl ActorStep {
    fn pack(self) -> GpuActorOutput {
        GpuActorOutput {
            velocity: self.velocity.extend(0.0),
            prev_position: self.prev_position.extend(0.0),
            state: [self.flyer_state, self.stuck, self.mode.code(), 0],
        }
    }
}

/// Runs the behavior pipeline for row `gid`.
#[must_use]
pub fn run_actor(view: &FrameView<'_>, gid: usize) -> GpuActorOutput {
    let mut a = view.actors[gid];
    let index = gid as u32;
    let pos = a.pos();
    let lod = view.is_lod(pos);
    let class = ActorClass::from_code(a.class_code());

    if a.behavior() != BehaviorClass::Generic && class.is_some_and(ActorClass::is_living) {
        let v = species::overlay(view, &a);
        a.velocity = v.extend(a.velocity[3]);
    }

    let step = match class {
        Some(ActorClass::Walker) => {
            let flow = view.consumer_flow(a.behavior(), pos);
            walker::step(view, index, &a, flow)
        }
        Some(ActorClass::Swimmer) => swimmer::step(view, index, &a, lod),
        Some(ActorClass::Flyer) => flyer::step(view, index, &a, lod),
        Some(ActorClass::Item) => ballistic::item(view, &a),
        Some(ActorClass::XpOrb) => ballistic::xp_orb(view, &a, lod),
        None => ActorStep {
            velocity: a.vel(),
            prev_position: Vec3::truncate(a.prev_position),
            flyer_state: a.meta[2],
            stuck: a.meta[3],
            mode: MotionMode::Idle,
        },
    };
    step.pack()
}

/// Runs the behavior pipeline for every row.
pub fn run_all(view: &FrameView<'_>, outputs: &mut [GpuActorOutput]) {
    let count = (view.frame.counts[0] as usize).min(view.actors.len()).min(outputs.len());
    for (gid, out) in outputs.iter_mut().enumerate().take(count) {
        *out = run_actor(view, gid);
    }
}

/// Marks each emitting actor's scent cell with at least the marker strength.
///
/// Actors in LOD do not emit.
pub fn emit(layout: &GridLayout, actors: &[GpuActor], frame: &FrameUniforms, scent: &mut [f32]) {
    let marker = frame.scent[0];
    let volume = layout.scent.volume();
    let count = (frame.counts[0] as usize).min(actors.len());
    for a in &actors[..count] {
        let Some(channel) = a.behavior().emission() else {
            continue;
        };
        let pos = a.pos();
        if frame.is_lod(pos) {
            continue;
        }
        if let Some(cell) = layout.scent_cell(pos) {
            let slot = &mut scent[channel.index() * volume + cell];
            *slot = slot.max(marker);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::common::hash33;
    use super::*;
    use crate::layout::{
        ActorBatch, ActorOutput, ActorParams, ActorRow, FrameClock, KernelTuning,
    };
    use swarm_shared::constants::{
        COMMAND_FLEE, COMMAND_MOVE, FLAG_MARINE, FLYER_STUCK_LIMIT, WALKER_STUCK_LIMIT,
    };
    use swarm_shared::{AttractorKind, FlyerState, IVec3, ScentChannel, VoxelClass};

    struct World {
        layout: GridLayout,
        voxels: Vec<u32>,
        scent: Vec<f32>,
        flow_dirs: Vec<u32>,
    }

    impl World {
        fn with_floor(floor_y: i32) -> Self {
            let layout = GridLayout::new(32, 16).unwrap();
            let mut voxels = vec![0; layout.voxel.volume()];
            for x in 0..32 {
                for z in 0..32 {
                    voxels[layout.voxel.index_unchecked(IVec3::new(x, floor_y, z))] =
                        VoxelClass::Solid.code();
                }
            }
            Self {
                scent: vec![0.0; layout.scent_len()],
                flow_dirs: vec![0; FLOW_FIELDS * layout.voxel.volume()],
                layout,
                voxels,
            }
        }

        fn run(&self, batch: &ActorBatch, frame: &FrameUniforms) -> Vec<GpuActorOutput> {
            self.run_with(batch, &[], frame)
        }

        fn run_with(
            &self,
            batch: &ActorBatch,
            attractors: &[GpuAttractor],
            frame: &FrameUniforms,
        ) -> Vec<GpuActorOutput> {
            let actors = batch.to_device();
            let view = FrameView {
                layout: &self.layout,
                voxels: VoxelView::new(self.layout.voxel, &self.voxels),
                scent: &self.scent,
                flow_dirs: &self.flow_dirs,
                actors: &actors,
                attractors,
                frame,
            };
            let mut out = vec![GpuActorOutput::default(); actors.len()];
            run_all(&view, &mut out);
            out
        }

        fn wall_x(&mut self, x: i32) {
            for y in 0..32 {
                for z in 0..32 {
                    self.voxels[self.layout.voxel.index_unchecked(IVec3::new(x, y, z))] =
                        VoxelClass::Solid.code();
                }
            }
        }
    }

    fn attractor(kind: AttractorKind, pos: Vec3, claimed: bool) -> GpuAttractor {
        GpuAttractor {
            position: pos.extend(0.0),
            meta: [kind.code(), u32::from(claimed), 0, 0],
        }
    }

    fn frame(layout: &GridLayout, count: usize, players: &[Vec3], mask: u32) -> FrameUniforms {
        let clock = FrameClock {
            tick: 1,
            world_time: 1000,
            ..FrameClock::default()
        };
        FrameUniforms::new(layout, &KernelTuning::default(), clock, count as u32, 0, players, mask)
    }

    fn row(id: u64, pos: Vec3, params: ActorParams) -> ActorRow {
        ActorRow {
            id,
            position: pos,
            velocity: Vec3::ZERO,
            prev_position: Vec3::ZERO,
            params,
            flyer_state: FlyerState::Idle,
            stuck_timer: 0,
        }
    }

    #[test]
    fn test_walker_goal_and_flee_modes() {
        let world = World::with_floor(3);
        let mut batch = ActorBatch::default();
        let mut goal = ActorParams::for_class(ActorClass::Walker);
        goal.command = COMMAND_MOVE;
        goal.goal = Vec3::new(20.5, 4.0, 10.5);
        let mut flee = goal;
        flee.command = COMMAND_FLEE;
        batch.push(row(1, Vec3::new(10.5, 4.0, 10.5), goal));
        batch.push(row(2, Vec3::new(10.5, 4.0, 14.5), flee));

        let out = world.run(&batch, &frame(&world.layout, 2, &[], 0));
        let a = out[0].decode();
        let b = out[1].decode();
        assert_eq!(a.mode, MotionMode::Goal);
        assert!(a.velocity.x > 0.0);
        assert_eq!(b.mode, MotionMode::Flee);
        assert!(b.velocity.length() > a.velocity.length());
    }

    #[test]
    fn test_walker_follows_flow_only_without_command() {
        let mut world = World::with_floor(3);
        let volume = world.layout.voxel.volume();
        world.flow_dirs[..volume].fill(1);
        let mut batch = ActorBatch::default();
        let params = ActorParams::for_class(ActorClass::Walker);
        batch.push(row(1, Vec3::new(10.5, 4.0, 10.5), params));

        let out = world.run(&batch, &frame(&world.layout, 1, &[], 0b001));
        assert_eq!(out[0].decode().mode, MotionMode::Flow);
        assert!(out[0].decode().velocity.x > 0.0);

        // The same field is ignored when the mask says it is stale.
        let out = world.run(&batch, &frame(&world.layout, 1, &[], 0));
        assert_ne!(out[0].decode().mode, MotionMode::Flow);
    }

    #[test]
    fn test_airborne_walker_falls() {
        let world = World::with_floor(0);
        let mut batch = ActorBatch::default();
        batch.push(row(1, Vec3::new(10.5, 20.0, 10.5), ActorParams::for_class(ActorClass::Walker)));
        let out = world.run(&batch, &frame(&world.layout, 1, &[], 0));
        assert!(out[0].decode().velocity.y < 0.0);
    }

    #[test]
    fn test_item_rests_on_ground() {
        let world = World::with_floor(3);
        let mut batch = ActorBatch::default();
        let mut r = row(1, Vec3::new(10.5, 4.1, 10.5), ActorParams::for_class(ActorClass::Item));
        r.velocity = Vec3::new(0.4, -0.2, 0.0);
        batch.push(r);
        let out = world.run(&batch, &frame(&world.layout, 1, &[], 0)).remove(0).decode();
        assert_eq!(out.velocity.y, 0.0);
        assert!((out.velocity.x - 0.2).abs() < 1e-6);
        assert_eq!(out.mode, MotionMode::Fall);
    }

    #[test]
    fn test_xp_orb_homes_on_player() {
        let world = World::with_floor(0);
        let mut batch = ActorBatch::default();
        batch.push(row(1, Vec3::new(10.5, 10.0, 10.5), ActorParams::for_class(ActorClass::XpOrb)));
        let player = Vec3::new(14.5, 9.0, 10.5);
        let out = world.run(&batch, &frame(&world.layout, 1, &[player], 0));
        assert!(out[0].decode().velocity.x > 0.1);
    }

    #[test]
    fn test_stranded_fish_falls() {
        let world = World::with_floor(0);
        let mut batch = ActorBatch::default();
        batch.push(row(1, Vec3::new(10.5, 10.0, 10.5), ActorParams::for_class(ActorClass::Swimmer)));
        let out = world.run(&batch, &frame(&world.layout, 1, &[], 0)).remove(0).decode();
        assert!(out.velocity.y < 0.0);
        assert_eq!(out.mode, MotionMode::Swim);

        let mut marine = ActorParams::for_class(ActorClass::Swimmer);
        marine.flags = FLAG_MARINE;
        let mut batch = ActorBatch::default();
        batch.push(row(1, Vec3::new(10.5, 10.0, 10.5), marine));
        let out = world.run(&batch, &frame(&world.layout, 1, &[], 0)).remove(0).decode();
        assert!(out.velocity.y > -0.08);
    }

    #[test]
    fn test_flyer_goes_home_at_night() {
        let world = World::with_floor(0);
        let mut batch = ActorBatch::default();
        batch.push(row(1, Vec3::new(10.5, 10.0, 10.5), ActorParams::for_class(ActorClass::Flyer)));
        let actors = batch.to_device();
        let mut f = frame(&world.layout, 1, &[Vec3::new(12.0, 10.0, 10.0)], 0);
        f.clock[1] = 15_000;
        let view = FrameView {
            layout: &world.layout,
            voxels: VoxelView::new(world.layout.voxel, &world.voxels),
            scent: &world.scent,
            flow_dirs: &world.flow_dirs,
            actors: &actors,
            attractors: &[],
            frame: &f,
        };
        let out = run_actor(&view, 0).decode();
        assert_eq!(out.flyer_state, FlyerState::Return);
        assert_eq!(out.mode, MotionMode::Fly);
    }

    #[test]
    fn test_prey_flees_predator_scent() {
        let mut world = World::with_floor(3);
        let layout = world.layout;
        let volume = layout.scent.volume();
        // Predator scent rising toward +X across the scent grid.
        for cell in 0..volume {
            let p = layout.scent.coords(cell);
            world.scent[ScentChannel::Predator.index() * volume + cell] = p.x as f32;
        }
        let mut params = ActorParams::for_class(ActorClass::Walker);
        params.behavior = BehaviorClass::PreyWild;
        let actor = {
            let mut batch = ActorBatch::default();
            batch.push(row(1, Vec3::new(16.5, 12.5, 16.5), params));
            batch.to_device()
        };
        let f = frame(&layout, 1, &[], 0);
        let view = FrameView {
            layout: &layout,
            voxels: VoxelView::new(layout.voxel, &world.voxels),
            scent: &world.scent,
            flow_dirs: &world.flow_dirs,
            actors: &actor,
            attractors: &[],
            frame: &f,
        };
        assert!(species::overlay(&view, &actor[0]).x < 0.0);
    }

    #[test]
    fn test_emit_marks_without_lowering() {
        let layout = GridLayout::new(32, 16).unwrap();
        let mut scent = vec![0.0; layout.scent_len()];
        let mut params = ActorParams::for_class(ActorClass::Walker);
        params.behavior = BehaviorClass::Livestock;
        let mut batch = ActorBatch::default();
        let pos = Vec3::new(16.5, 16.5, 16.5);
        batch.push(row(1, pos, params));
        let actors = batch.to_device();
        let cell = layout.scent_cell(pos).unwrap();
        let herd = ScentChannel::Herd.index() * layout.scent.volume() + cell;
        scent[herd] = 3.0;

        let f = frame(&layout, 1, &[pos], 0);
        emit(&layout, &actors, &f, &mut scent);
        assert_eq!(scent[herd], 3.0);

        scent[herd] = 0.2;
        emit(&layout, &actors, &f, &mut scent);
        assert_eq!(scent[herd], KernelTuning::default().marker_strength);

        // No player nearby: no emission.
        scent[herd] = 0.0;
        emit(&layout, &actors, &frame(&layout, 1, &[], 0), &mut scent);
        assert_eq!(scent[herd], 0.0);
    }

    #[test]
    fn test_wander_heading_holds_for_a_window() {
        let world = World::with_floor(3);
        let mut batch = ActorBatch::default();
        for id in 0..64 {
            batch.push(row(id, Vec3::new(10.5, 4.0, 10.5), ActorParams::for_class(ActorClass::Walker)));
        }
        let at = |tick: u32| {
            let mut f = frame(&world.layout, 64, &[], 0);
            f.clock[0] = tick;
            f.clock[3] = tick.wrapping_mul(2_654_435_761);
            world
                .run(&batch, &f)
                .iter()
                .map(|o| {
                    let o = o.decode();
                    (o.mode, o.velocity)
                })
                .collect::<Vec<_>>()
        };

        let first = at(40);
        assert!(first
            .iter()
            .any(|(mode, v)| *mode == MotionMode::Wander && v.horizontal_length_squared() > 0.0));
        assert!(first.iter().any(|(mode, _)| *mode == MotionMode::Idle));
        for tick in 41..80 {
            assert_eq!(at(tick), first, "tick {tick}");
        }
        assert_ne!(at(80), first);
    }

    #[test]
    fn test_stuck_walker_jumps_and_resets() {
        let world = World::with_floor(3);
        let pos = Vec3::new(10.5, 4.0, 10.5);
        let mut params = ActorParams::for_class(ActorClass::Walker);
        params.command = COMMAND_MOVE;
        params.goal = Vec3::new(20.5, 4.0, 10.5);
        let run = |stuck_timer: u32| {
            let mut r = row(1, pos, params);
            r.prev_position = pos;
            r.stuck_timer = stuck_timer;
            let mut batch = ActorBatch::default();
            batch.push(r);
            world.run(&batch, &frame(&world.layout, 1, &[], 0)).remove(0).decode()
        };

        let counting = run(5);
        assert_eq!(counting.stuck_timer, 6);
        assert_eq!(counting.velocity.y, 0.0);

        let limit = run(WALKER_STUCK_LIMIT);
        assert_eq!(limit.stuck_timer, 0);
        assert!((limit.velocity.y - 0.25).abs() < 1e-6);
        assert_eq!(limit.mode, MotionMode::Goal);
    }

    #[test]
    fn test_stuck_flyer_is_kicked_back_to_idle() {
        let world = World::with_floor(0);
        let pos = Vec3::new(10.5, 10.5, 10.5);
        let run = |stuck_timer: u32| {
            let mut r = row(1, pos, ActorParams::for_class(ActorClass::Flyer));
            r.velocity = Vec3::new(0.1, 0.0, 0.0);
            r.prev_position = pos;
            r.flyer_state = FlyerState::Return;
            r.stuck_timer = stuck_timer;
            let mut batch = ActorBatch::default();
            batch.push(r);
            world.run(&batch, &frame(&world.layout, 1, &[], 0)).remove(0).decode()
        };

        let kicked = run(60);
        let mut kick = hash33(Vec3::new(0.0, 1.0, 61.0)) * 0.5;
        kick.y += 0.3;
        assert_eq!(kicked.velocity, kick.limit(0.4));
        assert_eq!(kicked.flyer_state, FlyerState::Idle);
        assert_eq!(kicked.stuck_timer, 61);
        assert_eq!(kicked.mode, MotionMode::Fly);

        let reset = run(FLYER_STUCK_LIMIT);
        assert_eq!(reset.flyer_state, FlyerState::Idle);
        assert_eq!(reset.stuck_timer, 0);
    }

    #[test]
    fn test_flyer_veers_from_wall_ahead() {
        let player = Vec3::new(10.5, 10.5, 4.5);
        let mut params = ActorParams::for_class(ActorClass::Flyer);
        params.wander = 0.0;
        let mut r = row(1, Vec3::new(10.5, 10.5, 10.5), params);
        r.velocity = Vec3::new(0.3, 0.0, 0.0);
        let mut batch = ActorBatch::default();
        batch.push(r);

        let open = World::with_floor(0);
        let f = frame(&open.layout, 1, &[player], 0);
        let clear = open.run(&batch, &f).remove(0).decode();
        assert!(clear.velocity.x > 0.0);

        let mut walled = World::with_floor(0);
        walled.wall_x(13);
        let blocked = walled.run(&batch, &f).remove(0).decode();
        assert!(blocked.velocity.x < 0.0);
    }

    fn swimmer_pair(gap: f32, weights: [f32; 3], other_velocity: Vec3) -> [ActorOutput; 2] {
        let world = World::with_floor(0);
        let mut params = ActorParams::for_class(ActorClass::Swimmer);
        params.flags = FLAG_MARINE;
        params.wander = 0.0;
        params.separation = weights[0];
        params.alignment = weights[1];
        params.cohesion = weights[2];
        let mut batch = ActorBatch::default();
        batch.push(row(1, Vec3::new(10.5, 10.5, 10.5), params));
        let mut other = row(2, Vec3::new(10.5 + gap, 10.5, 10.5), params);
        other.velocity = other_velocity;
        batch.push(other);
        let f = frame(&world.layout, 2, &[Vec3::new(10.5, 10.5, 4.5)], 0);
        let out = world.run(&batch, &f);
        [out[0].decode(), out[1].decode()]
    }

    #[test]
    fn test_swimmer_flocking_terms() {
        let [a, b] = swimmer_pair(1.0, [1.0, 0.0, 0.0], Vec3::ZERO);
        assert!(a.velocity.x < 0.0);
        assert!(b.velocity.x > 0.0);

        // Outside the separation radius only cohesion pulls.
        let [a, b] = swimmer_pair(3.0, [1.0, 0.0, 1.0], Vec3::ZERO);
        assert!(a.velocity.x > 0.0);
        assert!(b.velocity.x < 0.0);

        let [a, _] = swimmer_pair(3.0, [0.0, 1.0, 0.0], Vec3::new(0.0, 0.0, 0.2));
        assert!(a.velocity.z > 0.0);
        assert!(a.velocity.x.abs() < 1e-6);

        // Beyond the flock radius nobody counts.
        let [a, _] = swimmer_pair(5.0, [0.0, 0.0, 1.0], Vec3::ZERO);
        assert_eq!(a.velocity, Vec3::ZERO);
    }

    #[test]
    fn test_flyer_arrives_at_attractors() {
        let world = World::with_floor(0);
        let pos = Vec3::new(10.5, 10.5, 10.5);
        let player = Vec3::new(10.5, 10.5, 4.5);
        let near = Vec3::new(11.5, 10.5, 10.5);
        let run = |state: FlyerState, attractors: &[GpuAttractor], world_time: u32| {
            let mut batch = ActorBatch::default();
            let mut r = row(1, pos, ActorParams::for_class(ActorClass::Flyer));
            r.flyer_state = state;
            batch.push(r);
            let mut f = frame(&world.layout, 1, &[player], 0);
            f.counts[1] = attractors.len() as u32;
            f.clock[1] = world_time;
            world.run_with(&batch, attractors, &f).remove(0).decode()
        };

        let forage = [attractor(AttractorKind::Forage, near, false)];
        assert_eq!(run(FlyerState::Idle, &forage, 1000).flyer_state, FlyerState::Gather);

        let claimed = [attractor(AttractorKind::Forage, near, true)];
        assert_eq!(run(FlyerState::Idle, &claimed, 1000).flyer_state, FlyerState::Idle);

        let home = [attractor(AttractorKind::Home, near, false)];
        let arrived = run(FlyerState::Return, &home, 15_000);
        assert_eq!(arrived.flyer_state, FlyerState::Home);
        assert_eq!(arrived.velocity, Vec3::ZERO);
        assert_eq!(arrived.mode, MotionMode::Idle);

        let resting = run(FlyerState::Home, &home, 15_000);
        assert_eq!(resting.flyer_state, FlyerState::Home);
        assert_eq!(resting.velocity, Vec3::ZERO);
        assert_eq!(run(FlyerState::Home, &home, 1000).flyer_state, FlyerState::Idle);
    }
}
