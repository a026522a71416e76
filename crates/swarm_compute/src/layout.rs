//! Device Data Layouts
//!
//! Every struct here is uploaded as-is: `#[repr(C)]`, `Pod`, packed into
//! `vec4` lanes so the WGSL declarations line up without padding rules.
//!
//! Host code never fills these directly. Per-actor data is assembled as a
//! named struct-of-arrays ([`ActorBatch`]) and flattened at the boundary.

use bytemuck::{Pod, Zeroable};
use swarm_shared::constants::{
    DEFAULT_SCENT_SIZE, DEFAULT_VOXEL_SIZE, LOD_DISTANCE, MAX_FRAME_PLAYERS, NO_CHANNEL,
    SCENT_BASE_DECAY, SCENT_BASE_DIFFUSION, SCENT_CEILING, SCENT_CHANNELS,
};
use swarm_shared::{
    ActorClass, BehaviorClass, CubeGrid, FlyerState, IVec3, MotionMode, ScentChannel, Vec3,
};

use crate::error::{ComputeError, ComputeResult};

// =============================================================================
// GRID LAYOUT
// =============================================================================

/// Geometry of the voxel window and the scent grid nested inside it.
///
/// ```text
/// voxel window (size V)
/// ┌──────────────────────────┐
/// │      offset = (V-S)/2    │
/// │    ┌──────────────┐      │
/// │    │ scent (S)    │      │
/// │    └──────────────┘      │
/// └──────────────────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GridLayout {
    /// Voxel window / flow field grid
    pub voxel: CubeGrid,
    /// Scent grid
    pub scent: CubeGrid,
    /// Scent grid origin inside the voxel window (same on every axis)
    pub scent_offset: i32,
}

impl Default for GridLayout {
    fn default() -> Self {
        Self {
            voxel: CubeGrid::new(DEFAULT_VOXEL_SIZE),
            scent: CubeGrid::new(DEFAULT_SCENT_SIZE),
            scent_offset: ((DEFAULT_VOXEL_SIZE - DEFAULT_SCENT_SIZE) / 2) as i32,
        }
    }
}

impl GridLayout {
    /// Centers a scent grid of `scent_size` in a voxel window of `voxel_size`.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured` when either size is zero or the scent grid
    /// does not fit inside the window.
    pub fn new(voxel_size: u32, scent_size: u32) -> ComputeResult<Self> {
        if voxel_size == 0 || scent_size == 0 {
            return Err(ComputeError::NotConfigured("grid size must be non-zero"));
        }
        if scent_size > voxel_size {
            return Err(ComputeError::NotConfigured("scent grid larger than voxel window"));
        }
        Ok(Self {
            voxel: CubeGrid::new(voxel_size),
            scent: CubeGrid::new(scent_size),
            scent_offset: ((voxel_size - scent_size) / 2) as i32,
        })
    }

    /// Floats in one scent buffer (all channels).
    #[must_use]
    pub const fn scent_len(&self) -> usize {
        self.scent.volume() * SCENT_CHANNELS
    }

    /// Scent cell containing a window-relative position.
    #[must_use]
    pub fn scent_cell(&self, pos: Vec3) -> Option<usize> {
        let c = pos.floor();
        let off = self.scent_offset;
        self.scent.index(IVec3::new(c.x - off, c.y - off, c.z - off))
    }

    /// Voxel cell under a scent cell coordinate.
    #[must_use]
    pub fn voxel_of_scent(&self, scent_cell: IVec3) -> usize {
        let off = self.scent_offset;
        self.voxel.index_unchecked(IVec3::new(
            scent_cell.x + off,
            scent_cell.y + off,
            scent_cell.z + off,
        ))
    }
}

// =============================================================================
// PER-ACTOR DEVICE LAYOUT
// =============================================================================

/// One actor row as seen by the behavior kernels (144 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct GpuActor {
    /// Window-relative position (xyz) + max speed (w)
    pub position: [f32; 4],
    /// Velocity (xyz) + command (w: 0 none, 1 move, 2 flee)
    pub velocity: [f32; 4],
    /// Window-relative goal (xyz) + wander strength (w)
    pub goal: [f32; 4],
    /// Gravity, jump power, mass, fov cosine
    pub physics: [f32; 4],
    /// Familiarity, fear, aggression, _
    pub behavior: [f32; 4],
    /// Separation, alignment, cohesion weights, _
    pub boids: [f32; 4],
    /// Last sampled position (xyz), _
    pub prev_position: [f32; 4],
    /// Class, behavior id, flyer state, stuck timer
    pub meta: [u32; 4],
    /// Flags, preferred scent channel, identity seed, _
    pub extra: [u32; 4],
}

impl GpuActor {
    /// Size of a row in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Window-relative position
    #[inline]
    #[must_use]
    pub fn pos(&self) -> Vec3 {
        Vec3::truncate(self.position)
    }

    /// Velocity
    #[inline]
    #[must_use]
    pub fn vel(&self) -> Vec3 {
        Vec3::truncate(self.velocity)
    }

    /// Class device code
    #[inline]
    #[must_use]
    pub const fn class_code(&self) -> u32 {
        self.meta[0]
    }

    /// Behavior class
    #[inline]
    #[must_use]
    pub const fn behavior(&self) -> BehaviorClass {
        BehaviorClass::from_code(self.meta[1])
    }

    /// Per-actor random seed, stable across frames and batch order
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> u32 {
        self.extra[2]
    }
}

/// Folds a host id into the 32-bit seed carried in [`GpuActor::extra`].
#[inline]
#[must_use]
pub const fn identity_seed(id: u64) -> u32 {
    (id ^ (id >> 32)) as u32
}

/// Kernel result for one actor (48 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuActorOutput {
    /// Next velocity (xyz), _
    pub velocity: [f32; 4],
    /// Updated last sampled position (xyz), _
    pub prev_position: [f32; 4],
    /// Flyer state, stuck timer, motion mode, _
    pub state: [u32; 4],
}

impl GpuActorOutput {
    /// Size of a row in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Decodes into host types.
    #[must_use]
    pub fn decode(&self) -> ActorOutput {
        ActorOutput {
            velocity: Vec3::truncate(self.velocity),
            prev_position: Vec3::truncate(self.prev_position),
            flyer_state: FlyerState::from_code(self.state[0]),
            stuck_timer: self.state[1],
            mode: MotionMode::from_code(self.state[2]),
        }
    }
}

/// Decoded kernel result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorOutput {
    /// Next velocity
    pub velocity: Vec3,
    /// Last sampled position (window-relative)
    pub prev_position: Vec3,
    /// Flyer state after the kernel
    pub flyer_state: FlyerState,
    /// Stuck timer after the kernel
    pub stuck_timer: u32,
    /// Branch taken
    pub mode: MotionMode,
}

/// Scent stimulus record (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuStimulus {
    /// Window-relative position (xyz) + magnitude (w)
    pub position: [f32; 4],
    /// Channel, _, _, _
    pub meta: [u32; 4],
}

impl GpuStimulus {
    /// Creates a stimulus record.
    #[must_use]
    pub fn new(pos: Vec3, channel: ScentChannel, magnitude: f32) -> Self {
        Self {
            position: pos.extend(magnitude),
            meta: [channel.index() as u32, 0, 0, 0],
        }
    }
}

/// Flyer attractor record (32 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct GpuAttractor {
    /// Window-relative position (xyz), _
    pub position: [f32; 4],
    /// Kind, claimed flag, _, _
    pub meta: [u32; 4],
}

// =============================================================================
// UNIFORMS
// =============================================================================

/// Per-frame constants for the behavior and emission kernels (288 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Voxel size, scent size, scent offset, _
    pub grid: [i32; 4],
    /// Actor count, attractor count, player count, flow valid mask
    pub counts: [u32; 4],
    /// Tick, world time of day, raining flag, random seed
    pub clock: [u32; 4],
    /// Wind (xyz) + rain level (w)
    pub env: [f32; 4],
    /// Marker strength, scent ceiling, overlay blend, LOD distance squared
    pub scent: [f32; 4],
    /// Accel, ground friction, air friction, wander chance
    pub walker: [f32; 4],
    /// Drag, stranded gravity, depth push, flock radius squared
    pub swimmer: [f32; 4],
    /// Drag, attraction force, arrive radius, gather chance
    pub flyer: [f32; 4],
    /// Hover frequency, hover amplitude, avoid lookahead, avoid weight
    pub flyer_ext: [f32; 4],
    /// Item gravity, xp gravity, xp homing, xp radius squared
    pub ballistic: [f32; 4],
    /// Window-relative player positions
    pub players: [[f32; 4]; MAX_FRAME_PLAYERS],
}

/// Clock and weather inputs of one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    /// Host tick
    pub tick: u32,
    /// Time of day in ticks (0..24000)
    pub world_time: u32,
    /// Raining
    pub raining: bool,
    /// Rain strength 0..1
    pub rain_level: f32,
    /// Per-frame random seed
    pub seed: u32,
}

impl FrameUniforms {
    /// Assembles the frame block.
    #[must_use]
    pub fn new(
        layout: &GridLayout,
        tuning: &KernelTuning,
        clock: FrameClock,
        actor_count: u32,
        attractor_count: u32,
        players: &[Vec3],
        flow_valid_mask: u32,
    ) -> Self {
        let mut frame = Self {
            grid: [
                layout.voxel.size as i32,
                layout.scent.size as i32,
                layout.scent_offset,
                0,
            ],
            counts: [actor_count, attractor_count, 0, flow_valid_mask],
            clock: [clock.tick, clock.world_time, u32::from(clock.raining), clock.seed],
            env: [
                0.05 * clock.rain_level,
                0.0,
                0.05 * clock.rain_level,
                clock.rain_level,
            ],
            scent: [
                tuning.marker_strength,
                tuning.scent_ceiling,
                tuning.overlay_blend,
                tuning.lod_distance * tuning.lod_distance,
            ],
            walker: [
                tuning.walker_accel,
                tuning.walker_ground_friction,
                tuning.walker_air_friction,
                tuning.wander_chance,
            ],
            swimmer: [
                tuning.swimmer_drag,
                tuning.swimmer_stranded_gravity,
                tuning.swimmer_depth_push,
                tuning.swimmer_flock_radius * tuning.swimmer_flock_radius,
            ],
            flyer: [
                tuning.flyer_drag,
                tuning.attraction_force,
                tuning.arrive_radius,
                tuning.gather_chance,
            ],
            flyer_ext: [
                tuning.hover_freq,
                tuning.hover_amp,
                tuning.avoid_lookahead,
                tuning.avoid_weight,
            ],
            ballistic: [
                tuning.item_gravity,
                tuning.xp_gravity,
                tuning.xp_homing,
                tuning.xp_radius * tuning.xp_radius,
            ],
            players: [[0.0; 4]; MAX_FRAME_PLAYERS],
        };
        let n = players.len().min(MAX_FRAME_PLAYERS);
        for (slot, p) in frame.players.iter_mut().zip(players.iter().take(n)) {
            *slot = p.extend(1.0);
        }
        frame.counts[2] = n as u32;
        frame
    }

    /// Simulation time as seen by the kernels.
    #[inline]
    #[must_use]
    pub fn time(&self) -> f32 {
        self.clock[0] as f32
    }

    /// Wind acceleration.
    #[inline]
    #[must_use]
    pub fn wind(&self) -> Vec3 {
        Vec3::truncate(self.env)
    }

    /// Nearest player: `(position, distance²)`.
    #[must_use]
    pub fn nearest_player(&self, pos: Vec3) -> Option<(Vec3, f32)> {
        let count = (self.counts[2] as usize).min(MAX_FRAME_PLAYERS);
        self.players[..count]
            .iter()
            .map(|p| {
                let p = Vec3::truncate(*p);
                (p, pos.distance_squared(p))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// True when no player is within the LOD distance.
    #[must_use]
    pub fn is_lod(&self, pos: Vec3) -> bool {
        self.nearest_player(pos).map_or(true, |(_, d2)| d2 > self.scent[3])
    }
}

/// Scent pass constants (112 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct ScentUniforms {
    /// Scent size, voxel size, stimulus count, _
    pub dims: [u32; 4],
    /// Scent offset inside the voxel window (xyz), _
    pub origin: [i32; 4],
    /// Per-channel diffusion rate
    pub rates: [[f32; 4]; 2],
    /// Per-channel decay factor
    pub decays: [[f32; 4]; 2],
    /// Ceiling, _, _, _
    pub limits: [f32; 4],
}

impl ScentUniforms {
    /// Assembles the scent block.
    #[must_use]
    pub fn new(layout: &GridLayout, tuning: &ScentTuning, stimulus_count: u32) -> Self {
        let pack = |v: &[f32; SCENT_CHANNELS]| [[v[0], v[1], v[2], v[3]], [v[4], v[5], v[6], v[7]]];
        let off = layout.scent_offset;
        Self {
            dims: [layout.scent.size, layout.voxel.size, stimulus_count, 0],
            origin: [off, off, off, 0],
            rates: pack(&tuning.diffusion),
            decays: pack(&tuning.decay),
            limits: [tuning.ceiling, 0.0, 0.0, 0.0],
        }
    }

    /// Diffusion rate of a channel.
    #[inline]
    #[must_use]
    pub const fn rate(&self, channel: usize) -> f32 {
        self.rates[channel / 4][channel % 4]
    }

    /// Decay factor of a channel.
    #[inline]
    #[must_use]
    pub const fn decay(&self, channel: usize) -> f32 {
        self.decays[channel / 4][channel % 4]
    }
}

/// Flow pass constants (16 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct FlowUniforms {
    /// Grid size, target count, field index, _
    pub dims: [u32; 4],
}

// =============================================================================
// TUNING
// =============================================================================

/// Per-channel scent behavior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScentTuning {
    /// Diffusion rate per channel, in `[0, 0.5]`
    pub diffusion: [f32; SCENT_CHANNELS],
    /// Decay factor per channel, in `(0, 1]`
    pub decay: [f32; SCENT_CHANNELS],
    /// Intensity ceiling
    pub ceiling: f32,
}

impl Default for ScentTuning {
    fn default() -> Self {
        let mut diffusion = [SCENT_BASE_DIFFUSION; SCENT_CHANNELS];
        let mut decay = [SCENT_BASE_DECAY; SCENT_CHANNELS];
        for channel in ScentChannel::ALL {
            if channel.is_food() {
                diffusion[channel.index()] = 0.05;
            }
        }
        diffusion[ScentChannel::Predator.index()] = 0.25;
        decay[ScentChannel::Player.index()] = 0.995;
        Self {
            diffusion,
            decay,
            ceiling: SCENT_CEILING,
        }
    }
}

/// Behavior kernel constants that the host may tune.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelTuning {
    /// Scent marker written by emitting actors
    pub marker_strength: f32,
    /// Scent ceiling (shared with the scent pass)
    pub scent_ceiling: f32,
    /// Fraction of the species overlay applied per tick
    pub overlay_blend: f32,
    /// Distance beyond which actors skip expensive sensing
    pub lod_distance: f32,
    /// Walker acceleration toward desired velocity (before mass)
    pub walker_accel: f32,
    /// Walker friction on solid ground
    pub walker_ground_friction: f32,
    /// Walker friction in the air
    pub walker_air_friction: f32,
    /// Chance per wander window to pick a heading
    pub wander_chance: f32,
    /// Swimmer drag in liquid
    pub swimmer_drag: f32,
    /// Swimmer gravity out of liquid
    pub swimmer_stranded_gravity: f32,
    /// Swimmer surface/floor correction (before mass)
    pub swimmer_depth_push: f32,
    /// Swimmer flocking radius
    pub swimmer_flock_radius: f32,
    /// Flyer drag
    pub flyer_drag: f32,
    /// Flyer attractor steering weight
    pub attraction_force: f32,
    /// Flyer arrival radius
    pub arrive_radius: f32,
    /// Chance per tick to leave a forage site
    pub gather_chance: f32,
    /// Hover oscillation frequency while gathering
    pub hover_freq: f32,
    /// Hover oscillation amplitude while gathering
    pub hover_amp: f32,
    /// Obstacle avoidance ray length
    pub avoid_lookahead: f32,
    /// Obstacle avoidance weight (before mass)
    pub avoid_weight: f32,
    /// Item gravity
    pub item_gravity: f32,
    /// Experience orb gravity
    pub xp_gravity: f32,
    /// Experience orb homing speed
    pub xp_homing: f32,
    /// Experience orb homing radius
    pub xp_radius: f32,
}

impl Default for KernelTuning {
    fn default() -> Self {
        Self {
            marker_strength: 1.0,
            scent_ceiling: SCENT_CEILING,
            overlay_blend: 0.1,
            lod_distance: LOD_DISTANCE,
            walker_accel: 0.3,
            walker_ground_friction: 0.2,
            walker_air_friction: 0.02,
            wander_chance: 0.35,
            swimmer_drag: 0.92,
            swimmer_stranded_gravity: 0.08,
            swimmer_depth_push: 0.05,
            swimmer_flock_radius: 4.0,
            flyer_drag: 0.98,
            attraction_force: 1.0,
            arrive_radius: 2.0,
            gather_chance: 0.01,
            hover_freq: 5.0,
            hover_amp: 0.02,
            avoid_lookahead: 5.0,
            avoid_weight: 0.8,
            item_gravity: 0.04,
            xp_gravity: 0.03,
            xp_homing: 0.15,
            xp_radius: 8.0,
        }
    }
}

// =============================================================================
// HOST STRUCT-OF-ARRAYS
// =============================================================================

/// Static per-actor parameters, named.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorParams {
    /// Coarse class
    pub class: ActorClass,
    /// Species behavior
    pub behavior: BehaviorClass,
    /// Preferred food channel
    pub preferred_channel: Option<ScentChannel>,
    /// Speed cap
    pub max_speed: f32,
    /// Gravity per tick
    pub gravity: f32,
    /// Jump impulse
    pub jump_power: f32,
    /// Mass (clamped to 0.1 by the kernels)
    pub mass: f32,
    /// Field of view cosine for flocking
    pub fov_cos: f32,
    /// Wander strength
    pub wander: f32,
    /// Flocking separation weight
    pub separation: f32,
    /// Flocking alignment weight
    pub alignment: f32,
    /// Flocking cohesion weight
    pub cohesion: f32,
    /// Bond with players, 0..1
    pub familiarity: f32,
    /// Predator avoidance scale
    pub fear: f32,
    /// Prey attraction scale
    pub aggression: f32,
    /// Window-relative goal
    pub goal: Vec3,
    /// Command (0 none, 1 move, 2 flee)
    pub command: f32,
    /// Flag bits
    pub flags: u32,
}

impl ActorParams {
    /// Class defaults with no command.
    #[must_use]
    pub fn for_class(class: ActorClass) -> Self {
        let (max_speed, gravity, jump_power, mass, wander, separation, alignment, cohesion) =
            match class {
                ActorClass::Walker => (0.25, 0.08, 0.42, 1.0, 0.0, 0.0, 0.0, 0.0),
                ActorClass::Swimmer => (0.3, 0.0, 0.0, 1.0, 0.02, 0.05, 0.03, 0.02),
                ActorClass::Flyer => (0.4, 0.0, 0.0, 1.0, 0.04, 0.08, 0.03, 0.02),
                ActorClass::Item | ActorClass::XpOrb => (1.0, 0.04, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0),
            };
        Self {
            class,
            behavior: BehaviorClass::Generic,
            preferred_channel: None,
            max_speed,
            gravity,
            jump_power,
            mass,
            fov_cos: -0.5,
            wander,
            separation,
            alignment,
            cohesion,
            familiarity: 0.0,
            fear: 1.0,
            aggression: 1.0,
            goal: Vec3::ZERO,
            command: 0.0,
            flags: 0,
        }
    }
}

/// One actor row before flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorRow {
    /// Host identity, carried through read-back
    pub id: u64,
    /// Window-relative position
    pub position: Vec3,
    /// Velocity
    pub velocity: Vec3,
    /// Last sampled position (window-relative)
    pub prev_position: Vec3,
    /// Static parameters
    pub params: ActorParams,
    /// Flyer state
    pub flyer_state: FlyerState,
    /// Stuck timer
    pub stuck_timer: u32,
}

/// Struct-of-arrays batch of actors for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct ActorBatch {
    /// Host identities
    pub ids: Vec<u64>,
    /// Window-relative positions
    pub positions: Vec<Vec3>,
    /// Velocities
    pub velocities: Vec<Vec3>,
    /// Last sampled positions
    pub prev_positions: Vec<Vec3>,
    /// Static parameters
    pub params: Vec<ActorParams>,
    /// Flyer states
    pub flyer_states: Vec<FlyerState>,
    /// Stuck timers
    pub stuck_timers: Vec<u32>,
}

impl ActorBatch {
    /// Empty batch with room for `capacity` rows.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ids: Vec::with_capacity(capacity),
            positions: Vec::with_capacity(capacity),
            velocities: Vec::with_capacity(capacity),
            prev_positions: Vec::with_capacity(capacity),
            params: Vec::with_capacity(capacity),
            flyer_states: Vec::with_capacity(capacity),
            stuck_timers: Vec::with_capacity(capacity),
        }
    }

    /// Appends a row.
    pub fn push(&mut self, row: ActorRow) {
        self.ids.push(row.id);
        self.positions.push(row.position);
        self.velocities.push(row.velocity);
        self.prev_positions.push(row.prev_position);
        self.params.push(row.params);
        self.flyer_states.push(row.flyer_state);
        self.stuck_timers.push(row.stuck_timer);
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// True when empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Removes every row, keeping allocations.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.positions.clear();
        self.velocities.clear();
        self.prev_positions.clear();
        self.params.clear();
        self.flyer_states.clear();
        self.stuck_timers.clear();
    }

    /// Flattens to device rows.
    #[must_use]
    pub fn to_device(&self) -> Vec<GpuActor> {
        (0..self.len())
            .map(|i| {
                let p = &self.params[i];
                GpuActor {
                    position: self.positions[i].extend(p.max_speed),
                    velocity: self.velocities[i].extend(p.command),
                    goal: p.goal.extend(p.wander),
                    physics: [p.gravity, p.jump_power, p.mass, p.fov_cos],
                    behavior: [p.familiarity, p.fear, p.aggression, 0.0],
                    boids: [p.separation, p.alignment, p.cohesion, 0.0],
                    prev_position: self.prev_positions[i].extend(0.0),
                    meta: [
                        p.class.code(),
                        p.behavior.code(),
                        self.flyer_states[i].code(),
                        self.stuck_timers[i],
                    ],
                    extra: [
                        p.flags,
                        p.preferred_channel.map_or(NO_CHANNEL, |c| c.index() as u32),
                        identity_seed(self.ids[i]),
                        0,
                    ],
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(GpuActor::SIZE, 144);
        assert_eq!(GpuActorOutput::SIZE, 48);
        assert_eq!(std::mem::size_of::<GpuStimulus>(), 32);
        assert_eq!(std::mem::size_of::<GpuAttractor>(), 32);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 288);
        assert_eq!(std::mem::size_of::<ScentUniforms>(), 112);
        assert_eq!(std::mem::size_of::<FlowUniforms>() % 16, 0);
    }

    #[test]
    fn test_grid_layout_centering() {
        let layout = GridLayout::new(128, 64).unwrap();
        assert_eq!(layout.scent_offset, 32);
        assert_eq!(layout.scent_cell(Vec3::new(32.5, 32.5, 32.5)), Some(0));
        assert_eq!(layout.scent_cell(Vec3::new(31.9, 40.0, 40.0)), None);
        assert!(GridLayout::new(32, 64).is_err());
    }

    #[test]
    fn test_default_scent_tuning() {
        let t = ScentTuning::default();
        assert_eq!(t.diffusion[ScentChannel::Predator.index()], 0.25);
        assert_eq!(t.diffusion[ScentChannel::Grain.index()], 0.05);
        assert_eq!(t.diffusion[ScentChannel::Herd.index()], 0.1);
        assert_eq!(t.decay[ScentChannel::Player.index()], 0.995);

        let u = ScentUniforms::new(&GridLayout::default(), &t, 3);
        assert_eq!(u.rate(ScentChannel::Predator.index()), 0.25);
        assert_eq!(u.decay(ScentChannel::Player.index()), 0.995);
        assert_eq!(u.dims[2], 3);
    }

    #[test]
    fn test_batch_flatten() {
        let mut batch = ActorBatch::default();
        let mut params = ActorParams::for_class(ActorClass::Walker);
        params.behavior = BehaviorClass::Predator;
        params.preferred_channel = Some(ScentChannel::Meat);
        batch.push(ActorRow {
            id: 42,
            position: Vec3::new(1.0, 2.0, 3.0),
            velocity: Vec3::X,
            prev_position: Vec3::ZERO,
            params,
            flyer_state: FlyerState::Idle,
            stuck_timer: 7,
        });

        let rows = batch.to_device();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].pos(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(rows[0].meta, [4, 2, 0, 7]);
        assert_eq!(rows[0].extra[1], ScentChannel::Meat.index() as u32);
        assert_eq!(rows[0].seed(), identity_seed(batch.ids[0]));
        assert_eq!(rows[0].position[3], params.max_speed);
    }

    #[test]
    fn test_frame_players_truncated() {
        let players = vec![Vec3::X; 12];
        let frame = FrameUniforms::new(
            &GridLayout::default(),
            &KernelTuning::default(),
            FrameClock::default(),
            0,
            0,
            &players,
            0,
        );
        assert_eq!(frame.counts[2], MAX_FRAME_PLAYERS as u32);
    }
}
