//! # SWARM
//!
//! GPU-offloaded movement for voxel-world actors.
//!
//! The host hands the [`SwarmOrchestrator`] a [`WorldView`] once per tick.
//! The orchestrator keeps a classified voxel window around the players,
//! feeds stimuli into the scent field, refreshes the flow fields, and
//! dispatches the behavior kernels through `swarm_compute`. Each tick
//! harvests the previous tick's frame and writes velocities back; it never
//! waits for the device.
//!
//! ## Modules
//!
//! - [`config`]: TOML configuration
//! - [`world`]: the host boundary
//! - [`species`]: species → behavior profile
//! - [`voxel`]: the classified window
//! - [`scent`], [`flow`], [`sensor`]: field inputs
//! - [`actor`]: ownership and output application
//! - [`orchestrator`]: the per-tick sequence

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod actor;
pub mod config;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod scent;
pub mod sensor;
pub mod species;
pub mod voxel;
pub mod world;

pub use actor::{ActorRegistry, ActorState, Ownership};
pub use config::{BackendChoice, SwarmConfig};
pub use error::{SwarmError, SwarmResult};
pub use orchestrator::{FallbackReason, SwarmOrchestrator, TickReport};
pub use species::{SpeciesCatalog, SpeciesProfile, SpeciesTable};
pub use voxel::{ScanReport, VoxelSnapshot};
pub use world::{
    ActorSnapshot, AttractorSite, BlockSample, Environment, FoodSource, WorldView,
};
