//! # Slot Memory
//!
//! Per-generation resources are allocated together and freed together.
//!
//! ## Design Philosophy
//!
//! - Capacity grows in steps, never per actor
//! - A rebuild frees every slot before allocating the new ones
//! - Every rebuild bumps an epoch so stale handles can be detected

mod arena;

pub use arena::{grow_capacity, SlotArena, MIN_SLOT_CAPACITY};
