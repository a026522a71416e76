//! # SWARM Core
//!
//! Bookkeeping that keeps device work pipelined across host ticks:
//!
//! - [`GenerationPair`]: two generations of per-actor data. Generation N+1 is
//!   uploaded while generation N's result is still waiting to be read back.
//! - [`PingPong`]: front/back roles for the scent buffers.
//! - [`SlotArena`]: owner of the per-generation resources, rebuilt as a whole
//!   when the population outgrows it.
//!
//! ## Architecture Rules
//!
//! 1. **One swap per cycle** - the write generation changes only in `commit`
//! 2. **One owner per buffer** - slots are only reachable through the arena
//! 3. **Stale frames are never read** - a rebuild invalidates pending work

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod memory;
pub mod sync;

pub use memory::{grow_capacity, SlotArena, MIN_SLOT_CAPACITY};
pub use sync::{GenerationPair, PendingGeneration, PingPong, PingPongPass};
