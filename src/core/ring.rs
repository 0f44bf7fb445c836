//! Fixed-capacity ring addressing for recorded snapshots.
//!
//! Slots are physical positions in every per-slot buffer of the recorder.
//! Records are addressed logically: `-1` is the latest record, and
//! `0..len` runs oldest..latest. Nothing is ever moved; advancing past
//! capacity simply overwrites the oldest slot.
//!
//! ```text
//!   capacity = 4, three advances past full:
//!
//!   slot:    0    1    2    3
//!   gen:     5    6    3    4      next = 2, len = 4
//!                 ^last    ^oldest
//! ```

/// Ring addressing state: capacity, fill length and the next slot to write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingIndex {
    capacity: usize,
    len: usize,
    next: usize,
}

impl RingIndex {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        Self {
            capacity,
            len: 0,
            next: 0,
        }
    }

    /// Rebuild from persisted parts. Returns `None` when the parts violate
    /// `len <= capacity` or `next < capacity`.
    pub fn from_parts(capacity: usize, len: usize, next: usize) -> Option<Self> {
        if capacity == 0 || len > capacity || next >= capacity {
            return None;
        }
        Some(Self {
            capacity,
            len,
            next,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn next_slot(&self) -> usize {
        self.next
    }

    /// Occupy the next slot and return it.
    pub fn advance(&mut self) -> usize {
        let slot = self.next;
        self.next = (self.next + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
        slot
    }

    /// Slot of the most recent record.
    ///
    /// # Panics
    /// Panics if nothing has been recorded.
    #[inline]
    pub fn last_slot(&self) -> usize {
        assert!(self.len > 0, "ring is empty: no record to resolve");
        (self.next + self.capacity - 1) % self.capacity
    }

    /// True when `record` names a live record in `0..len`.
    #[inline]
    pub fn is_valid(&self, record: isize) -> bool {
        record >= 0 && (record as usize) < self.len
    }

    /// Physical slot for a logical record number. Negative or out-of-range
    /// numbers resolve to the latest record.
    ///
    /// # Panics
    /// Panics if nothing has been recorded; check [`RingIndex::is_empty`] first.
    pub fn resolve(&self, record: isize) -> usize {
        let last = self.last_slot();
        if !self.is_valid(record) {
            return last;
        }
        let back = self.len - 1 - record as usize;
        (last + self.capacity - back) % self.capacity
    }

    /// Live slots, oldest first.
    pub fn slots(&self) -> impl Iterator<Item = usize> + '_ {
        let start = (self.next + self.capacity - self.len) % self.capacity;
        (0..self.len).map(move |i| (start + i) % self.capacity)
    }

    /// Forget every record. Stored bytes are left in place.
    pub fn reset(&mut self) {
        self.len = 0;
        self.next = 0;
    }
}
