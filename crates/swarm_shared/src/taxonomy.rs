//! # Taxonomy
//!
//! Every categorical value that crosses the host/device boundary. Device
//! codes are the `u32` discriminants; `from_code` is the only way back.

use serde::{Deserialize, Serialize};

use crate::constants::{STEP_COST_AIR, STEP_COST_LIQUID};

// =============================================================================
// VOXELS
// =============================================================================

/// Classification of one voxel cell.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoxelClass {
    /// Free space
    #[default]
    Air = 0,
    /// Collides
    Solid = 1,
    /// Water, lava surface excluded (that is a hazard)
    Liquid = 2,
    /// Fence, wall or similar one-block obstacle taller than a block
    Tall = 3,
    /// Damaging block (fire, cactus, magma)
    Hazard = 4,
}

impl VoxelClass {
    /// Decodes a device code. Unknown codes read as solid.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Air,
            2 => Self::Liquid,
            3 => Self::Tall,
            4 => Self::Hazard,
            _ => Self::Solid,
        }
    }

    /// Device code
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Whether flow-field costs may propagate through this cell.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self, Self::Air | Self::Liquid)
    }

    /// Cost of stepping into this cell, `None` when impassable.
    #[must_use]
    pub const fn step_cost(self) -> Option<u32> {
        match self {
            Self::Air => Some(STEP_COST_AIR),
            Self::Liquid => Some(STEP_COST_LIQUID),
            _ => None,
        }
    }
}

// =============================================================================
// SCENT
// =============================================================================

/// Scent field channel.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScentChannel {
    /// Seeds, wheat, crops
    Grain = 0,
    /// Raw meat
    Meat = 1,
    /// Fish items
    Fish = 2,
    /// Salt licks
    Salt = 3,
    /// Predator presence
    Predator = 4,
    /// Wild prey presence
    Prey = 5,
    /// Livestock presence
    Herd = 6,
    /// Player presence
    Player = 7,
}

impl ScentChannel {
    /// All channels in storage order
    pub const ALL: [Self; 8] = [
        Self::Grain,
        Self::Meat,
        Self::Fish,
        Self::Salt,
        Self::Predator,
        Self::Prey,
        Self::Herd,
        Self::Player,
    ];

    /// Storage index
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Decodes a storage index.
    #[must_use]
    pub const fn from_index(index: u32) -> Option<Self> {
        if (index as usize) < Self::ALL.len() {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    /// Food channels diffuse slowly and attract foragers.
    #[must_use]
    pub const fn is_food(self) -> bool {
        matches!(self, Self::Grain | Self::Meat | Self::Fish | Self::Salt)
    }
}

// =============================================================================
// ACTORS
// =============================================================================

/// Coarse actor class selecting the behavior kernel.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActorClass {
    /// Flying (bees, birds)
    Flyer = 0,
    /// Dropped item
    Item = 1,
    /// Experience orb
    XpOrb = 2,
    /// Ground walker
    Walker = 4,
    /// Swimmer (fish, squid)
    Swimmer = 5,
}

impl ActorClass {
    /// Decodes a device code.
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Flyer),
            1 => Some(Self::Item),
            2 => Some(Self::XpOrb),
            4 => Some(Self::Walker),
            5 => Some(Self::Swimmer),
            _ => None,
        }
    }

    /// Device code
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Items and orbs are not living and never flee or flock.
    #[must_use]
    pub const fn is_living(self) -> bool {
        matches!(self, Self::Flyer | Self::Walker | Self::Swimmer)
    }
}

/// Canonical species behavior taxonomy.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorClass {
    /// No species overlay
    #[default]
    Generic = 0,
    /// Farm animals: eat, herd, flee predators
    Livestock = 1,
    /// Hunts prey, follows players
    Predator = 2,
    /// Wild prey: flees predators and players
    PreyWild = 3,
    /// Fish: swims toward food only
    Fish = 4,
    /// Tamed companion
    Pet = 5,
}

impl BehaviorClass {
    /// Decodes a device code (unknown → generic).
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Livestock,
            2 => Self::Predator,
            3 => Self::PreyWild,
            4 => Self::Fish,
            5 => Self::Pet,
            _ => Self::Generic,
        }
    }

    /// Device code
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Scent channel this class marks its own cell with, if any.
    #[must_use]
    pub const fn emission(self) -> Option<ScentChannel> {
        match self {
            Self::Predator => Some(ScentChannel::Predator),
            Self::PreyWild => Some(ScentChannel::Prey),
            Self::Livestock => Some(ScentChannel::Herd),
            _ => None,
        }
    }
}

/// Flyer behavior state.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlyerState {
    /// Roaming, looking for forage
    #[default]
    Idle = 0,
    /// Hovering at a forage site
    Gather = 1,
    /// Heading home
    Return = 2,
    /// Resting at home
    Home = 3,
}

impl FlyerState {
    /// Decodes a device code (unknown → idle).
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Gather,
            2 => Self::Return,
            3 => Self::Home,
            _ => Self::Idle,
        }
    }

    /// Device code
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Branch a kernel took for an actor this frame.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionMode {
    /// Standing still
    #[default]
    Idle = 0,
    /// Idle wander heading
    Wander = 1,
    /// Following a flow field
    Flow = 2,
    /// Moving to a scripted goal
    Goal = 3,
    /// Fleeing
    Flee = 4,
    /// Swimming or flopping
    Swim = 5,
    /// Flying
    Fly = 6,
    /// Ballistic fall (items, orbs)
    Fall = 7,
}

impl MotionMode {
    /// Decodes a device code (unknown → idle).
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            1 => Self::Wander,
            2 => Self::Flow,
            3 => Self::Goal,
            4 => Self::Flee,
            5 => Self::Swim,
            6 => Self::Fly,
            7 => Self::Fall,
            _ => Self::Idle,
        }
    }

    /// Device code
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Kind of flyer attractor.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttractorKind {
    /// Flowers and other forage sites
    Forage = 1,
    /// Hives and nests
    Home = 2,
}

impl AttractorKind {
    /// Device code
    #[inline]
    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Flow field target class.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowTarget {
    /// Online players
    Player = 0,
    /// Livestock actors
    Herd = 1,
    /// Food sources
    Food = 2,
}

impl FlowTarget {
    /// All fields in storage order
    pub const ALL: [Self; 3] = [Self::Player, Self::Herd, Self::Food];

    /// Storage index
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voxel_codes() {
        for class in [
            VoxelClass::Air,
            VoxelClass::Solid,
            VoxelClass::Liquid,
            VoxelClass::Tall,
            VoxelClass::Hazard,
        ] {
            assert_eq!(VoxelClass::from_code(class.code()), class);
        }
        assert_eq!(VoxelClass::from_code(99), VoxelClass::Solid);
    }

    #[test]
    fn test_passability() {
        assert_eq!(VoxelClass::Air.step_cost(), Some(1));
        assert_eq!(VoxelClass::Liquid.step_cost(), Some(10));
        assert!(!VoxelClass::Tall.is_passable());
        assert!(!VoxelClass::Hazard.is_passable());
    }

    #[test]
    fn test_actor_class_gap() {
        assert_eq!(ActorClass::from_code(3), None);
        assert_eq!(ActorClass::from_code(5), Some(ActorClass::Swimmer));
    }

    #[test]
    fn test_emission_channels() {
        assert_eq!(BehaviorClass::Predator.emission(), Some(ScentChannel::Predator));
        assert_eq!(BehaviorClass::Fish.emission(), None);
        assert_eq!(ScentChannel::from_index(8), None);
    }
}
