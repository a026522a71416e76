//! # Generation Synchronization
//!
//! ## The Problem
//!
//! ```text
//! Tick N:    upload + dispatch generation A
//! Tick N+1:  read back generation A   <- still in flight
//!            upload + dispatch ...    <- must not touch A
//! ```
//!
//! ## The Solution: Two Generations
//!
//! ```text
//! Tick N:
//!   write A, dispatch A, commit (pending = A, write index -> B)
//! Tick N+1:
//!   harvest A
//!   write B, dispatch B, commit (pending = B, write index -> A)
//! ```
//!
//! The scent field uses the same idea with front/back buffers.

mod generation;
mod ping_pong;

pub use generation::{GenerationPair, PendingGeneration};
pub use ping_pong::{PingPong, PingPongPass};
