//! # Slot Arena
//!
//! Owns the two per-generation resource slots (device buffers, bind groups,
//! or CPU vectors for the software backend).
//!
//! Resizing is a single operation: every slot is dropped, then every slot is
//! allocated at the new capacity and the epoch advances.

/// Smallest capacity a rebuild allocates.
pub const MIN_SLOT_CAPACITY: usize = 4096;

/// Capacity to allocate for `count` rows: 50% headroom plus a fixed margin,
/// never below `floor`.
#[inline]
#[must_use]
pub fn grow_capacity(count: usize, floor: usize) -> usize {
    (count.saturating_mul(3) / 2 + 128).max(floor)
}

/// Two generation slots sharing one capacity.
///
/// # Example
///
/// ```rust,ignore
/// let mut arena: SlotArena<Vec<f32>> = SlotArena::new();
/// arena.rebuild(4096, |_slot, cap| Ok::<_, ()>(vec![0.0; cap]))?;
/// assert_eq!(arena.epoch(), 1);
/// ```
#[derive(Debug)]
pub struct SlotArena<T> {
    slots: Vec<T>,
    capacity: usize,
    epoch: u64,
}

impl<T> Default for SlotArena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SlotArena<T> {
    /// Number of generation slots.
    pub const SLOTS: usize = 2;

    /// Empty arena; nothing is allocated until the first rebuild.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            capacity: 0,
            epoch: 0,
        }
    }

    /// Rows each slot can hold.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of completed rebuilds.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True once slots exist.
    #[inline]
    #[must_use]
    pub fn is_allocated(&self) -> bool {
        self.slots.len() == Self::SLOTS
    }

    /// True when `count` rows do not fit.
    #[inline]
    #[must_use]
    pub fn needs_growth(&self, count: usize) -> bool {
        !self.is_allocated() || count > self.capacity
    }

    /// Frees every slot, then allocates both at `capacity`.
    ///
    /// On allocation failure the arena is left empty and the epoch still
    /// advances, so nothing from the old slots can be mistaken for current.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `alloc`.
    pub fn rebuild<E, F>(&mut self, capacity: usize, mut alloc: F) -> Result<u64, E>
    where
        F: FnMut(usize, usize) -> Result<T, E>,
    {
        self.slots.clear();
        self.capacity = 0;
        self.epoch += 1;

        let mut fresh = Vec::with_capacity(Self::SLOTS);
        for slot in 0..Self::SLOTS {
            fresh.push(alloc(slot, capacity)?);
        }
        self.slots = fresh;
        self.capacity = capacity;

        tracing::info!("slot arena rebuilt: capacity {} epoch {}", capacity, self.epoch);
        Ok(self.epoch)
    }

    /// Frees every slot.
    pub fn release(&mut self) {
        self.slots.clear();
        self.capacity = 0;
    }

    /// Shared access to a slot.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&T> {
        self.slots.get(slot)
    }

    /// Mutable access to a slot.
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut T> {
        self.slots.get_mut(slot)
    }
}
