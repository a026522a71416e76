//! # Actor State
//!
//! Host-side auxiliary state of every candidate, as an explicit machine:
//!
//! ```text
//!            acquire: host gravity off
//!   ┌──────┐ ───────────────────────────► ┌────────┐
//!   │ Host │                              │ Device │ ◄─┐ apply(output)
//!   └──────┘ ◄─────────────────────────── └────────┘ ──┘
//!            release: host gravity on,
//!                     velocity halved
//! ```
//!
//! Flyer state, stuck timer and the last sampled position only change
//! through [`ActorState::apply`], which adopts what the kernel returned.

use std::collections::HashMap;

use swarm_compute::ActorOutput;
use swarm_shared::{DVec3, FlyerState, IVec3, MotionMode, Vec3};

use crate::species::SpeciesProfile;
use crate::world::WorldView;

/// Per-axis velocity limit when applying device output.
pub const MAX_APPLIED_SPEED: f32 = 2.0;

/// Velocities with every axis below this are zeroed.
pub const JITTER_THRESHOLD: f32 = 0.001;

/// Fraction of the remaining turn applied per tick.
pub const YAW_SMOOTHING: f32 = 0.2;

/// Horizontal speed² below which facing is left alone.
pub const YAW_MIN_SPEED_SQ: f32 = 0.004;

/// Who integrates an actor's motion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Ownership {
    /// Host physics and AI
    #[default]
    Host,
    /// Compute kernels
    Device,
}

/// Makes device output safe to hand to the host.
///
/// Non-finite components become 0, each axis is clamped to
/// ±[`MAX_APPLIED_SPEED`], and a vector whose every axis is below
/// [`JITTER_THRESHOLD`] becomes zero.
#[must_use]
pub fn sanitize_velocity(v: Vec3) -> Vec3 {
    let clean = |c: f32| {
        if c.is_finite() {
            c.clamp(-MAX_APPLIED_SPEED, MAX_APPLIED_SPEED)
        } else {
            0.0
        }
    };
    let v = Vec3::new(clean(v.x), clean(v.y), clean(v.z));
    if v.x.abs() < JITTER_THRESHOLD && v.y.abs() < JITTER_THRESHOLD && v.z.abs() < JITTER_THRESHOLD
    {
        Vec3::ZERO
    } else {
        v
    }
}

/// Turns `current` toward the heading of `velocity`, or `None` when the
/// actor is not moving horizontally.
#[must_use]
pub fn smooth_yaw(current: f32, velocity: Vec3) -> Option<f32> {
    if velocity.horizontal_length_squared() <= YAW_MIN_SPEED_SQ {
        return None;
    }
    let target = (-velocity.x).atan2(velocity.z);
    let mut delta = target - current;
    // shortest way round
    while delta > std::f32::consts::PI {
        delta -= std::f32::consts::TAU;
    }
    while delta < -std::f32::consts::PI {
        delta += std::f32::consts::TAU;
    }
    Some(current + delta * YAW_SMOOTHING)
}

/// World position of a window-relative point.
#[must_use]
pub fn to_world(anchor: IVec3, local: Vec3) -> DVec3 {
    DVec3::new(f64::from(anchor.x), f64::from(anchor.y), f64::from(anchor.z))
        + DVec3::from_vec3(local)
}

/// Auxiliary state of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorState {
    /// Species profile, resolved once
    pub profile: SpeciesProfile,
    ownership: Ownership,
    flyer_state: FlyerState,
    stuck_timer: u32,
    prev_position: Option<DVec3>,
    yaw: f32,
    last_mode: MotionMode,
    last_seen: u64,
}

impl ActorState {
    /// Fresh host-owned state.
    #[must_use]
    pub fn new(profile: SpeciesProfile, yaw: f32, tick: u64) -> Self {
        Self {
            profile,
            ownership: Ownership::Host,
            flyer_state: FlyerState::Idle,
            stuck_timer: 0,
            prev_position: None,
            yaw,
            last_mode: MotionMode::Idle,
            last_seen: tick,
        }
    }

    /// Current owner.
    #[must_use]
    pub const fn ownership(&self) -> Ownership {
        self.ownership
    }

    /// True while the kernels drive the actor.
    #[must_use]
    pub const fn is_device_owned(&self) -> bool {
        matches!(self.ownership, Ownership::Device)
    }

    /// Flyer state as last returned by the kernel.
    #[must_use]
    pub const fn flyer_state(&self) -> FlyerState {
        self.flyer_state
    }

    /// Stuck timer as last returned by the kernel.
    #[must_use]
    pub const fn stuck_timer(&self) -> u32 {
        self.stuck_timer
    }

    /// Branch the kernel took last time.
    #[must_use]
    pub const fn last_mode(&self) -> MotionMode {
        self.last_mode
    }

    /// Smoothed facing.
    #[must_use]
    pub const fn yaw(&self) -> f32 {
        self.yaw
    }

    /// Tick the actor was last selected.
    #[must_use]
    pub const fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// Records that the actor is a candidate at `tick`.
    pub fn touch(&mut self, tick: u64) {
        self.last_seen = tick;
    }

    /// Last sampled position, defaulting to `current`.
    #[must_use]
    pub fn prev_position_or(&self, current: DVec3) -> DVec3 {
        self.prev_position.unwrap_or(current)
    }

    /// Hands motion to the device. Returns true on the transition.
    pub fn acquire<W: WorldView + ?Sized>(&mut self, id: u64, world: &mut W) -> bool {
        if self.is_device_owned() {
            return false;
        }
        self.ownership = Ownership::Device;
        world.set_host_gravity(id, false);
        true
    }

    /// Hands motion back to the host. Returns true on the transition.
    pub fn release<W: WorldView + ?Sized>(&mut self, id: u64, velocity: DVec3, world: &mut W) -> bool {
        if !self.is_device_owned() {
            return false;
        }
        self.ownership = Ownership::Host;
        self.stuck_timer = 0;
        world.set_host_gravity(id, true);
        world.set_velocity(id, velocity * 0.5);
        true
    }

    /// Adopts one kernel output. `anchor` is the window origin the frame
    /// was dispatched under. Returns the velocity written to the host, or
    /// `None` when the actor is no longer device-owned.
    pub fn apply<W: WorldView + ?Sized>(
        &mut self,
        id: u64,
        output: &ActorOutput,
        anchor: IVec3,
        world: &mut W,
    ) -> Option<Vec3> {
        if !self.is_device_owned() {
            return None;
        }
        let velocity = sanitize_velocity(output.velocity);
        world.set_velocity(id, DVec3::from_vec3(velocity));
        if let Some(yaw) = smooth_yaw(self.yaw, velocity) {
            self.yaw = yaw;
            world.set_yaw(id, yaw);
        }

        if output.flyer_state != self.flyer_state {
            tracing::debug!(
                "actor {} flyer state {:?} -> {:?}",
                id,
                self.flyer_state,
                output.flyer_state
            );
            self.flyer_state = output.flyer_state;
        }
        self.stuck_timer = output.stuck_timer;
        self.last_mode = output.mode;
        if output.prev_position.is_finite() {
            self.prev_position = Some(to_world(anchor, output.prev_position));
        }
        Some(velocity)
    }
}

/// Auxiliary state of every actor the orchestrator has seen.
#[derive(Debug, Clone, Default)]
pub struct ActorRegistry {
    states: HashMap<u64, ActorState>,
}

impl ActorRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// True when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State of `id`.
    #[must_use]
    pub fn get(&self, id: u64) -> Option<&ActorState> {
        self.states.get(&id)
    }

    /// Mutable state of `id`.
    pub fn get_mut(&mut self, id: u64) -> Option<&mut ActorState> {
        self.states.get_mut(&id)
    }

    /// State of `id`, created with `make` on first sight.
    pub fn entry(&mut self, id: u64, make: impl FnOnce() -> ActorState) -> &mut ActorState {
        self.states.entry(id).or_insert_with(make)
    }

    /// Number of device-owned actors.
    #[must_use]
    pub fn device_owned(&self) -> usize {
        self.states.values().filter(|s| s.is_device_owned()).count()
    }

    /// Releases `id` if tracked. Returns true on the transition.
    pub fn release<W: WorldView + ?Sized>(&mut self, id: u64, velocity: DVec3, world: &mut W) -> bool {
        self.states
            .get_mut(&id)
            .is_some_and(|s| s.release(id, velocity, world))
    }

    /// Keeps the state of live actors `keep` accepts. Everything else is
    /// released if device-owned, then forgotten. Returns the number released.
    pub fn sweep<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        velocity_of: impl Fn(u64) -> Option<DVec3>,
        keep: impl Fn(u64) -> bool,
    ) -> usize {
        let mut released = 0;
        self.states.retain(|id, state| {
            let velocity = velocity_of(*id);
            let kept = keep(*id) && velocity.is_some();
            if !kept && state.release(*id, velocity.unwrap_or(DVec3::ZERO), world) {
                released += 1;
            }
            kept
        });
        released
    }

    /// Forgets every state. Release first; ownership is not handed back here.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Releases everything. Returns the number released.
    pub fn release_all<W: WorldView + ?Sized>(
        &mut self,
        world: &mut W,
        velocity_of: impl Fn(u64) -> Option<DVec3>,
    ) -> usize {
        let mut released = 0;
        for (id, state) in &mut self.states {
            let velocity = velocity_of(*id).unwrap_or(DVec3::ZERO);
            if state.release(*id, velocity, world) {
                released += 1;
            }
        }
        released
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{ActorSnapshot, AttractorSite, BlockSample, Environment, FoodSource};

    #[derive(Default)]
    struct Recorder {
        velocity: Option<DVec3>,
        yaw: Option<f32>,
        gravity: Option<bool>,
    }

    impl WorldView for Recorder {
        fn block(&self, _: IVec3) -> Option<BlockSample> {
            None
        }
        fn is_chunk_loaded(&self, _: i32, _: i32) -> bool {
            false
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
        fn set_velocity(&mut self, _: u64, velocity: DVec3) {
            self.velocity = Some(velocity);
        }
        fn set_yaw(&mut self, _: u64, yaw: f32) {
            self.yaw = Some(yaw);
        }
        fn set_host_gravity(&mut self, _: u64, enabled: bool) {
            self.gravity = Some(enabled);
        }
    }

    fn output(velocity: Vec3) -> ActorOutput {
        ActorOutput {
            velocity,
            prev_position: Vec3::new(1.0, 2.0, 3.0),
            flyer_state: FlyerState::Gather,
            stuck_timer: 7,
            mode: MotionMode::Fly,
        }
    }

    #[test]
    fn test_sanitize_velocity() {
        assert_eq!(sanitize_velocity(Vec3::new(f32::NAN, 0.5, f32::INFINITY)), Vec3::new(0.0, 0.5, 0.0));
        assert_eq!(sanitize_velocity(Vec3::new(5.0, -9.0, 0.1)), Vec3::new(2.0, -2.0, 0.1));
        assert_eq!(sanitize_velocity(Vec3::new(0.0005, -0.0009, 0.0)), Vec3::ZERO);
        assert_eq!(sanitize_velocity(Vec3::new(0.0005, 0.002, 0.0)), Vec3::new(0.0005, 0.002, 0.0));
    }

    #[test]
    fn test_yaw_smoothing() {
        assert_eq!(smooth_yaw(0.3, Vec3::new(0.01, 0.5, 0.01)), None);
        // Heading +Z is yaw 0; starting at 1.0 moves 20% of the way.
        let yaw = smooth_yaw(1.0, Vec3::new(0.0, 0.0, 0.2)).unwrap();
        assert!((yaw - 0.8).abs() < 1e-6);
        // Wraps the short way across ±π.
        let yaw = smooth_yaw(3.0, Vec3::new(0.0, 0.0, -0.2)).unwrap();
        assert!(yaw > 3.0);
    }

    #[test]
    fn test_acquire_and_release_transitions() {
        let mut world = Recorder::default();
        let mut state = ActorState::new(SpeciesProfile::GENERIC, 0.0, 0);
        assert!(state.acquire(1, &mut world));
        assert_eq!(world.gravity, Some(false));
        assert!(!state.acquire(1, &mut world));

        assert!(state.release(1, DVec3::new(0.4, 0.0, -0.2), &mut world));
        assert_eq!(world.gravity, Some(true));
        assert_eq!(world.velocity, Some(DVec3::new(0.2, 0.0, -0.1)));
        assert_eq!(state.ownership(), Ownership::Host);
        assert!(!state.release(1, DVec3::ZERO, &mut world));
    }

    #[test]
    fn test_apply_adopts_output() {
        let mut world = Recorder::default();
        let mut state = ActorState::new(SpeciesProfile::GENERIC, 0.0, 0);
        assert_eq!(state.apply(1, &output(Vec3::X), IVec3::ZERO, &mut world), None);

        state.acquire(1, &mut world);
        let applied = state
            .apply(1, &output(Vec3::new(0.3, 0.0, 0.0)), IVec3::new(10, 20, 30), &mut world)
            .unwrap();
        assert_eq!(applied, Vec3::new(0.3, 0.0, 0.0));
        assert_eq!(world.velocity, Some(DVec3::from_vec3(applied)));
        assert!(world.yaw.is_some());
        assert_eq!(state.flyer_state(), FlyerState::Gather);
        assert_eq!(state.stuck_timer(), 7);
        assert_eq!(state.last_mode(), MotionMode::Fly);
        assert_eq!(state.prev_position_or(DVec3::ZERO), DVec3::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_registry_sweep() {
        let mut world = Recorder::default();
        let mut registry = ActorRegistry::new();
        for id in 0..3 {
            registry
                .entry(id, || ActorState::new(SpeciesProfile::GENERIC, 0.0, 0))
                .acquire(id, &mut world);
        }
        assert_eq!(registry.device_owned(), 3);

        // 0 stays a candidate, 1 is alive but no longer a candidate, 2 is gone.
        let released = registry.sweep(
            &mut world,
            |id| (id < 2).then_some(DVec3::ZERO),
            |id| id == 0,
        );
        assert_eq!(released, 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(0).is_some());
        assert!(registry.get(1).is_none());
        assert_eq!(registry.device_owned(), 1);
        assert_eq!(registry.release_all(&mut world, |_| None), 1);
        assert_eq!(registry.device_owned(), 0);

        registry.clear();
        assert!(registry.is_empty());
    }
}
