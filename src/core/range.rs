//! Running min/max of recorded values, used for display auto-scaling.
//!
//! Every slot keeps its own per-variable range. The aggregate over the live
//! window is refolded from those per-slot ranges after each record instead
//! of being adjusted incrementally, so an overwritten slot's extremes drop
//! out as soon as the window moves past it.

use crate::ring::RingIndex;

/// A min/max pair. The empty range is `(+inf, -inf)`; any observed sample,
/// infinities included, makes it non-empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMax {
    pub min: f32,
    pub max: f32,
}

impl Default for MinMax {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl MinMax {
    pub const EMPTY: Self = Self {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Fold in one sample. NaN is skipped.
    #[inline]
    pub fn observe(&mut self, v: f32) {
        if v.is_nan() {
            return;
        }
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    #[inline]
    pub fn merge(&mut self, other: MinMax) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn of(values: &[f32]) -> Self {
        let mut mm = Self::EMPTY;
        for &v in values {
            mm.observe(v);
        }
        mm
    }

    /// `Some((min, max))` unless nothing was observed.
    pub fn get(&self) -> Option<(f32, f32)> {
        (!self.is_empty()).then_some((self.min, self.max))
    }
}

/// Per-slot and aggregate unit-variable ranges.
#[derive(Debug, Clone, Default)]
pub struct RangeTracker {
    vars: usize,
    per_slot: Vec<MinMax>,
    aggregate: Vec<MinMax>,
}

impl RangeTracker {
    pub fn new(capacity: usize, vars: usize) -> Self {
        Self {
            vars,
            per_slot: vec![MinMax::EMPTY; capacity * vars],
            aggregate: vec![MinMax::EMPTY; vars],
        }
    }

    /// Resize for a new shape; all ranges become empty.
    pub fn reshape(&mut self, capacity: usize, vars: usize) {
        self.vars = vars;
        self.per_slot.clear();
        self.per_slot.resize(capacity * vars, MinMax::EMPTY);
        self.aggregate.clear();
        self.aggregate.resize(vars, MinMax::EMPTY);
    }

    pub fn begin_record(&mut self, slot: usize) {
        let base = slot * self.vars;
        self.per_slot[base..base + self.vars].fill(MinMax::EMPTY);
    }

    #[inline]
    pub fn observe(&mut self, slot: usize, var: usize, value: f32) {
        self.per_slot[slot * self.vars + var].observe(value);
    }

    /// Fold an already-reduced range for one slot/variable.
    #[inline]
    pub fn merge(&mut self, slot: usize, var: usize, range: MinMax) {
        self.per_slot[slot * self.vars + var].merge(range);
    }

    pub fn recompute_aggregate(&mut self, ring: &RingIndex) {
        self.aggregate.fill(MinMax::EMPTY);
        for slot in ring.slots() {
            let base = slot * self.vars;
            for (agg, per) in self
                .aggregate
                .iter_mut()
                .zip(&self.per_slot[base..base + self.vars])
            {
                agg.merge(*per);
            }
        }
    }

    pub fn aggregate(&self, var: usize) -> Option<(f32, f32)> {
        self.aggregate.get(var)?.get()
    }

    pub fn slot_range(&self, slot: usize, var: usize) -> MinMax {
        self.per_slot
            .get(slot * self.vars + var)
            .copied()
            .unwrap_or(MinMax::EMPTY)
    }

    pub(crate) fn per_slot(&self) -> &[MinMax] {
        &self.per_slot
    }

    pub(crate) fn set_per_slot(&mut self, ranges: Vec<MinMax>) {
        self.per_slot = ranges;
    }
}
