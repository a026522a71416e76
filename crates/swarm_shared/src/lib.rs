//! # SWARM Shared
//!
//! Common types used by the host orchestrator and the compute backends.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on `wgpu` or any GPU crate.
//! If you need device types, put them in `swarm_compute`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod grid;
pub mod math;
pub mod taxonomy;

pub use grid::{direction_vector, CubeGrid, DIRECTION_NONE, NEIGHBOR_OFFSETS};
pub use math::{DVec3, IVec3, Vec3};
pub use taxonomy::{
    ActorClass, AttractorKind, BehaviorClass, FlowTarget, FlyerState, MotionMode, ScentChannel,
    VoxelClass,
};
