//! # Compute Error Types
//!
//! Every failure a backend or the resource manager can report.

use thiserror::Error;

/// Errors from device setup, dispatch and read-back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputeError {
    /// No adapter matched the request.
    #[error("no compatible compute adapter found")]
    NoAdapter,

    /// The adapter refused to create a device.
    #[error("device request failed: {0}")]
    DeviceRequest(String),

    /// A validation or out-of-memory error captured by an error scope.
    #[error("device error: {0}")]
    Device(String),

    /// Mapping a staging buffer failed.
    #[error("read-back failed: {0}")]
    Readback(String),

    /// An operation ran before its prerequisite (grids or slots).
    #[error("backend not configured: {0}")]
    NotConfigured(&'static str),

    /// Generation slot index outside the arena.
    #[error("generation slot {0} out of range")]
    SlotOutOfRange(usize),

    /// More rows than the slots were allocated for.
    #[error("capacity exceeded: requested {requested}, capacity {capacity}")]
    CapacityExceeded {
        /// Rows requested.
        requested: usize,
        /// Rows allocated per slot.
        capacity: usize,
    },

    /// Read-back or input length disagrees with the dispatched count.
    #[error("length mismatch: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

/// Result type for compute operations.
pub type ComputeResult<T> = Result<T, ComputeError>;
