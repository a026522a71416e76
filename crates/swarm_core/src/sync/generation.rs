//! # Generation Pair
//!
//! Two generations of host companion data (for example the actor ids that
//! match each dispatched row) plus the pending-frame marker.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────────────────┐
//!                 │       GenerationPair        │
//!                 │  ┌─────────┐  ┌─────────┐   │
//!                 │  │ Slot 0  │  │ Slot 1  │   │
//!                 │  └────┬────┘  └────┬────┘   │
//!                 │  ┌────┴────────────┴────┐   │
//!                 │  │   write index (0/1)  │   │
//!                 │  └──────────────────────┘   │
//!                 │  pending: slot/count/epoch  │
//!                 └─────────────────────────────┘
//! ```
//!
//! `commit` is the only operation that changes the write index, so a cycle
//! that dispatches exactly once swaps exactly once.

/// A dispatched generation whose result has not been read back yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingGeneration {
    /// Slot the generation was written to
    pub slot: usize,
    /// Number of rows dispatched
    pub count: usize,
    /// Arena epoch the slot belonged to at dispatch time
    pub epoch: u64,
}

/// Two generations of `T` with a single write index.
#[derive(Debug)]
pub struct GenerationPair<T> {
    slots: [T; 2],
    write_index: usize,
    pending: Option<PendingGeneration>,
    cycles: u64,
}

impl<T: Default> Default for GenerationPair<T> {
    fn default() -> Self {
        Self::new(T::default(), T::default())
    }
}

impl<T> GenerationPair<T> {
    /// Creates a pair writing to slot 0 first.
    #[must_use]
    pub fn new(first: T, second: T) -> Self {
        Self {
            slots: [first, second],
            write_index: 0,
            pending: None,
            cycles: 0,
        }
    }

    /// Slot the next upload goes to.
    #[inline]
    #[must_use]
    pub const fn write_index(&self) -> usize {
        self.write_index
    }

    /// The slot not currently being written.
    #[inline]
    #[must_use]
    pub const fn read_index(&self) -> usize {
        self.write_index ^ 1
    }

    /// Completed dispatch cycles (one per `commit`).
    #[inline]
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Mutable access to the write slot.
    #[inline]
    pub fn write_slot_mut(&mut self) -> &mut T {
        &mut self.slots[self.write_index]
    }

    /// Shared access to either slot.
    #[inline]
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    /// Marks the write slot as dispatched and swaps to the other slot.
    ///
    /// Any previously pending generation is replaced; the caller harvests
    /// before committing.
    pub fn commit(&mut self, count: usize, epoch: u64) -> PendingGeneration {
        let pending = PendingGeneration {
            slot: self.write_index,
            count,
            epoch,
        };
        self.pending = Some(pending);
        self.write_index ^= 1;
        self.cycles += 1;
        pending
    }

    /// The pending generation, if any.
    #[inline]
    #[must_use]
    pub const fn pending(&self) -> Option<PendingGeneration> {
        self.pending
    }

    /// Removes and returns the pending generation.
    pub fn take_pending(&mut self) -> Option<PendingGeneration> {
        self.pending.take()
    }

    /// Drops the pending marker without reading it.
    ///
    /// Returns true when something was pending.
    pub fn invalidate(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Resets to slot 0 with nothing pending.
    pub fn reset(&mut self) {
        self.write_index = 0;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_creation() {
        let pair: GenerationPair<Vec<u64>> = GenerationPair::default();
        assert_eq!(pair.write_index(), 0);
        assert_eq!(pair.read_index(), 1);
        assert_eq!(pair.pending(), None);
        assert_eq!(pair.cycles(), 0);
    }

    #[test]
    fn test_commit_swaps_once() {
        let mut pair: GenerationPair<Vec<u64>> = GenerationPair::default();
        pair.write_slot_mut().extend([7, 8, 9]);

        let pending = pair.commit(3, 0);
        assert_eq!(pending.slot, 0);
        assert_eq!(pair.write_index(), 1);
        assert_eq!(pair.cycles(), 1);
        assert_eq!(pair.slot(pending.slot).map(Vec::len), Some(3));
    }

    #[test]
    fn test_written_slot_is_next_read() {
        let mut pair: GenerationPair<u32> = GenerationPair::default();

        for tick in 0..10u32 {
            if let Some(pending) = pair.take_pending() {
                assert_eq!(pair.slot(pending.slot), Some(&(tick - 1)));
                assert_ne!(pending.slot, pair.write_index());
            }
            let slot = pair.write_index();
            *pair.write_slot_mut() = tick;
            let pending = pair.commit(1, 0);
            assert_eq!(pending.slot, slot);
        }
    }

    #[test]
    fn test_invalidate() {
        let mut pair: GenerationPair<()> = GenerationPair::default();
        assert!(!pair.invalidate());
        let _ = pair.commit(4, 2);
        assert!(pair.invalidate());
        assert_eq!(pair.take_pending(), None);
    }
}
