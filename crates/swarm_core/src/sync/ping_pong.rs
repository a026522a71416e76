//! Front/back roles for a pair of field buffers.
//!
//! A diffusion pass reads the front buffer and writes the back buffer;
//! `swap` then makes the freshly written buffer the front.

/// Buffer roles of one pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingPongPass {
    /// Buffer read by the pass
    pub read: usize,
    /// Buffer written by the pass
    pub write: usize,
}

/// Front index of a ping-pong buffer pair.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingPong {
    front: usize,
    passes: u64,
    last: Option<PingPongPass>,
}

impl PingPong {
    /// Buffer 0 starts as the front.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            front: 0,
            passes: 0,
            last: None,
        }
    }

    /// Buffer holding the current field.
    #[inline]
    #[must_use]
    pub const fn front(&self) -> usize {
        self.front
    }

    /// Buffer the next pass writes.
    #[inline]
    #[must_use]
    pub const fn back(&self) -> usize {
        self.front ^ 1
    }

    /// Roles for the next pass, without swapping.
    #[inline]
    #[must_use]
    pub const fn next_pass(&self) -> PingPongPass {
        PingPongPass {
            read: self.front,
            write: self.front ^ 1,
        }
    }

    /// Records a completed pass and makes its output the front.
    pub fn swap(&mut self) -> PingPongPass {
        let pass = self.next_pass();
        self.front ^= 1;
        self.passes += 1;
        self.last = Some(pass);
        pass
    }

    /// Most recent completed pass.
    #[inline]
    #[must_use]
    pub const fn last_pass(&self) -> Option<PingPongPass> {
        self.last
    }

    /// Completed passes.
    #[inline]
    #[must_use]
    pub const fn passes(&self) -> u64 {
        self.passes
    }

    /// Back to buffer 0 with no history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
