//! # SWARM Compute
//!
//! The GPU Resource Manager of the SWARM pipeline: device data layouts, the
//! WGSL kernels, and the [`ResourceManager`] that sequences them.
//!
//! ## Passes
//!
//! ```text
//! scent:    inject ──► diffuse (front → back) ──► swap
//! flow:     reset ──► seed ──► relax × N ──► vectors      (slow cadence)
//! actors:   upload ──► behavior ──► emit ──► copy to staging
//! harvest:  map staging (one tick later)
//! ```
//!
//! ## Backends
//!
//! - [`WgpuBackend`]: WGSL on a wgpu device
//! - [`SoftwareBackend`]: the [`kernels`] on the host CPU
//!
//! Both implement [`ComputeBackend`]; the manager never knows which it holds.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod error;
pub mod gpu;
pub mod kernels;
pub mod layout;
pub mod manager;
pub mod readback;
pub mod shaders;
pub mod software;

pub use backend::{dispatch_size, BackendInfo, BackendKind, ComputeBackend};
pub use error::{ComputeError, ComputeResult};
pub use gpu::WgpuBackend;
pub use layout::{
    ActorBatch, ActorOutput, ActorParams, ActorRow, FrameClock, FrameUniforms, GpuActor,
    GpuActorOutput, GpuAttractor, GpuStimulus, GridLayout, KernelTuning, ScentTuning,
};
pub use manager::{Harvest, ResourceManager};
pub use readback::{FlowGrid, ScentSnapshot};
pub use software::SoftwareBackend;
