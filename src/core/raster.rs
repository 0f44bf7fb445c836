//! Raster counter -> slot mapping for time-as-axis playback.

use hashbrown::HashMap;

#[derive(Debug, Clone, Default)]
pub struct RasterIndex {
    /// Counter stored in each slot.
    slot_counters: Vec<Option<usize>>,
    map: HashMap<usize, usize>,
    /// Fallback counter for records made without an external one.
    internal: usize,
}

impl RasterIndex {
    pub fn new(capacity: usize) -> Self {
        Self {
            slot_counters: vec![None; capacity],
            map: HashMap::new(),
            internal: 0,
        }
    }

    /// Forget every mapping and restart the internal counter.
    pub fn reset(&mut self, capacity: usize) {
        self.slot_counters.clear();
        self.slot_counters.resize(capacity, None);
        self.map.clear();
        self.internal = 0;
    }

    /// Map `counter` to `slot`. The latest writer wins, and whatever counter
    /// `slot` held before stops resolving to it.
    pub fn record(&mut self, slot: usize, counter: usize) {
        if let Some(old) = self.slot_counters[slot].replace(counter) {
            if old != counter && self.map.get(&old) == Some(&slot) {
                self.map.remove(&old);
            }
        }
        self.map.insert(counter, slot);
    }

    pub fn slot_for_counter(&self, counter: usize) -> Option<usize> {
        self.map.get(&counter).copied()
    }

    pub fn counter_at(&self, slot: usize) -> Option<usize> {
        self.slot_counters.get(slot).copied().flatten()
    }

    /// Return the internal counter, then step it, wrapping to 0 at `max`.
    pub fn next_internal_counter(&mut self, max: usize) -> usize {
        let ctr = self.internal;
        self.internal += 1;
        if self.internal >= max {
            self.internal = 0;
        }
        ctr
    }

    pub(crate) fn internal_counter(&self) -> usize {
        self.internal
    }

    pub(crate) fn slot_counters(&self) -> &[Option<usize>] {
        &self.slot_counters
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.map.iter().map(|(&c, &s)| (c, s))
    }

    pub(crate) fn from_parts(
        slot_counters: Vec<Option<usize>>,
        entries: impl IntoIterator<Item = (usize, usize)>,
        internal: usize,
    ) -> Self {
        Self {
            slot_counters,
            map: entries.into_iter().collect(),
            internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_counter_points_at_latest_record() {
        let mut raster = RasterIndex::new(8);
        raster.record(0, 5);
        raster.record(1, 3);
        raster.record(2, 5);
        assert_eq!(raster.slot_for_counter(5), Some(2));
        assert_eq!(raster.slot_for_counter(3), Some(1));
        assert_eq!(raster.slot_for_counter(4), None);
    }

    #[test]
    fn overwritten_slot_drops_its_old_counter() {
        let mut raster = RasterIndex::new(2);
        raster.record(0, 10);
        raster.record(1, 11);
        raster.record(0, 12);
        assert_eq!(raster.slot_for_counter(10), None);
        assert_eq!(raster.slot_for_counter(12), Some(0));
        assert_eq!(raster.counter_at(0), Some(12));
    }

    #[test]
    fn stale_slot_does_not_steal_newer_mapping() {
        let mut raster = RasterIndex::new(3);
        raster.record(0, 7);
        raster.record(1, 7);
        // Slot 0 is reused for another counter; 7 still lives in slot 1.
        raster.record(0, 8);
        assert_eq!(raster.slot_for_counter(7), Some(1));
    }

    #[test]
    fn internal_counter_wraps_at_max() {
        let mut raster = RasterIndex::new(1);
        let seq: Vec<usize> = (0..7).map(|_| raster.next_internal_counter(3)).collect();
        assert_eq!(seq, vec![0, 1, 2, 0, 1, 2, 0]);
    }
}
