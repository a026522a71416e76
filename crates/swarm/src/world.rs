//! # World Collaborator
//!
//! Everything the orchestrator needs from the host game, and nothing more.
//! The host owns blocks, entities and players; the orchestrator only reads
//! snapshots and writes back velocity, facing and gravity.

use swarm_shared::{ActorClass, AttractorKind, DVec3, IVec3, ScentChannel};

/// Physical properties of one block, as the host reports them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockSample {
    /// Has a collision shape
    pub collides: bool,
    /// Water or another swimmable fluid
    pub liquid: bool,
    /// Taller than one block (fences, walls)
    pub tall: bool,
    /// Damages whoever touches it
    pub hazard: bool,
}

impl BlockSample {
    /// Empty space.
    pub const AIR: Self = Self {
        collides: false,
        liquid: false,
        tall: false,
        hazard: false,
    };

    /// Full solid block.
    pub const SOLID: Self = Self {
        collides: true,
        liquid: false,
        tall: false,
        hazard: false,
    };

    /// Swimmable fluid.
    pub const WATER: Self = Self {
        collides: false,
        liquid: true,
        tall: false,
        hazard: false,
    };

    /// Fence-like obstacle.
    pub const FENCE: Self = Self {
        collides: true,
        liquid: false,
        tall: true,
        hazard: false,
    };
}

/// Time of day and weather.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Environment {
    /// Ticks into the current day
    pub time_of_day: u64,
    /// Rain or thunder
    pub raining: bool,
    /// Rain strength, 0..1
    pub rain_level: f32,
}

/// One live entity, as seen at the start of the tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    /// Stable host identity
    pub id: u64,
    /// Species key for the profile catalog (e.g. `"minecraft:wolf"`)
    pub species: String,
    /// Coarse class; `None` for entities the pipeline never drives
    pub class: Option<ActorClass>,
    /// World position
    pub position: DVec3,
    /// Current velocity
    pub velocity: DVec3,
    /// Facing in radians
    pub yaw: f32,
    /// Position of whoever damaged it recently
    pub attacker: Option<DVec3>,
    /// Counts as a threat to fearful actors nearby
    pub hostile: bool,
    /// Scripted destination
    pub goal: Option<DVec3>,
    /// Marine swimmer (always treated as submerged)
    pub marine: bool,
}

impl ActorSnapshot {
    /// A plain actor with no command, threat or goal.
    #[must_use]
    pub fn new(id: u64, species: impl Into<String>, class: ActorClass, position: DVec3) -> Self {
        Self {
            id,
            species: species.into(),
            class: Some(class),
            position,
            velocity: DVec3::ZERO,
            yaw: 0.0,
            attacker: None,
            hostile: false,
            goal: None,
            marine: false,
        }
    }
}

/// A scent source that is not an actor (dropped food, crops).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoodSource {
    /// World position
    pub position: DVec3,
    /// Food channel it emits on
    pub channel: ScentChannel,
}

/// A flyer attractor block (flower, hive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttractorSite {
    /// Block position
    pub position: IVec3,
    /// Forage or home
    pub kind: AttractorKind,
}

/// Host world as the orchestrator sees it.
///
/// Reads must not block. A `None` block sample or an unloaded chunk means
/// "no data": the voxel window keeps whatever it had.
pub trait WorldView {
    /// Classifies one block, `None` when the region is not available.
    fn block(&self, pos: IVec3) -> Option<BlockSample>;

    /// Whether the 16×16 chunk column `(cx, cz)` is loaded.
    fn is_chunk_loaded(&self, cx: i32, cz: i32) -> bool;

    /// Time of day and weather.
    fn environment(&self) -> Environment;

    /// Online player positions.
    fn players(&self) -> Vec<DVec3>;

    /// Live entities that may become candidates.
    fn actors(&self) -> Vec<ActorSnapshot>;

    /// Entities whose surroundings must stay host-driven.
    fn protected_positions(&self) -> Vec<DVec3>;

    /// Food scent sources.
    fn food_sources(&self) -> Vec<FoodSource>;

    /// Attractor blocks within `radius` blocks of `center`.
    fn attractor_sites(&self, center: IVec3, radius: i32) -> Vec<AttractorSite>;

    /// Sets an actor's velocity.
    fn set_velocity(&mut self, id: u64, velocity: DVec3);

    /// Sets an actor's facing.
    fn set_yaw(&mut self, id: u64, yaw: f32);

    /// Turns host gravity for an actor on or off.
    fn set_host_gravity(&mut self, id: u64, enabled: bool);
}
