//! The network history recorder.
//!
//! [`NetHistory`] keeps the last `max_records` unit snapshots of a network in
//! a ring, plus the latest synaptic snapshot, and answers viewer queries by
//! logical record number or by raster counter. It is single-threaded; share
//! it through [`crate::shared::SharedHistory`].

use tracing::{debug, warn};

use crate::catalog::{PathSide, VarRef, VariableCatalog};
use crate::config::HistoryConfig;
use crate::network::LiveNetwork;
use crate::range::{MinMax, RangeTracker};
use crate::raster::RasterIndex;
use crate::ring::RingIndex;
use crate::synapses::SynapseStore;
use crate::units::UnitStore;

/// The unit whose pathways are being inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSelection {
    pub layer: String,
    pub unit: usize,
}

/// Every live record of one unit, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitTrace {
    pub layer: String,
    pub unit: usize,
    pub lane: usize,
    pub vars: Vec<String>,
    pub rows: Vec<TraceRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceRow {
    /// Logical record number.
    pub record: usize,
    pub counters: String,
    /// One entry per variable in [`UnitTrace::vars`].
    pub values: Vec<Option<f32>>,
}

#[derive(Debug, Clone)]
pub struct NetHistory {
    pub(crate) cfg: HistoryConfig,
    pub(crate) lanes: usize,
    pub(crate) ring: RingIndex,
    pub(crate) catalog: VariableCatalog,
    pub(crate) units: UnitStore,
    pub(crate) synapses: SynapseStore,
    pub(crate) ranges: RangeTracker,
    pub(crate) syn_ranges: Vec<MinMax>,
    pub(crate) counters: Vec<String>,
    pub(crate) raster: RasterIndex,
    pub(crate) selection: Option<UnitSelection>,
}

impl Default for NetHistory {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

impl NetHistory {
    pub fn new(cfg: HistoryConfig) -> Self {
        if let Err(msg) = cfg.validate() {
            warn!(%msg, "history config adjusted");
        }
        let capacity = cfg.capacity();
        Self {
            cfg,
            lanes: 1,
            ring: RingIndex::new(capacity),
            catalog: VariableCatalog::default(),
            units: UnitStore::new(),
            synapses: SynapseStore::new(),
            ranges: RangeTracker::new(capacity, 0),
            syn_ranges: Vec::new(),
            counters: vec![String::new(); capacity],
            raster: RasterIndex::new(capacity),
            selection: None,
        }
    }

    /// Fresh recorder for `net`, sized and allocated up front.
    pub fn init(net: &dyn LiveNetwork, cfg: HistoryConfig) -> Self {
        let mut nh = Self::new(cfg);
        nh.configure(net);
        nh
    }

    /// Apply new settings. A capacity change discards all history.
    pub fn set_config(&mut self, cfg: HistoryConfig) {
        if let Err(msg) = cfg.validate() {
            warn!(%msg, "history config adjusted");
        }
        self.cfg = cfg;
        if self.cfg.no_syn_data {
            self.synapses.clear();
        }
    }

    /// Match storage to `net`. Cheap when nothing changed, so it can run
    /// before every record. Returns true if history was discarded.
    ///
    /// Changes to capacity, lane count or the unit variable list reset the
    /// whole history. A layer whose unit count changed loses only its own
    /// history.
    pub fn configure(&mut self, net: &dyn LiveNetwork) -> bool {
        if net.layer_count() == 0 {
            return false;
        }
        let capacity = self.cfg.capacity();
        let lanes = net.lanes().max(1);
        let change = self
            .catalog
            .sync(net.unit_var_names(), net.syn_var_names());

        let reset = capacity != self.ring.capacity() || lanes != self.lanes || change.units;
        if reset {
            debug!(capacity, lanes, vars = self.catalog.units().len(), "resetting history");
            self.ring = RingIndex::new(capacity);
            self.lanes = lanes;
            self.counters.clear();
            self.counters.resize(capacity, String::new());
            self.raster.reset(capacity);
            self.ranges.reshape(capacity, self.catalog.units().len());
        }

        let reallocated = self
            .units
            .ensure_shape(net, self.catalog.units().len(), lanes, capacity);
        if reallocated > 0 && !reset && !self.ring.is_empty() {
            self.units.refold_ranges(self.ring.slots(), &mut self.ranges);
            self.ranges.recompute_aggregate(&self.ring);
        }

        if self.cfg.no_syn_data {
            self.synapses.clear();
        } else {
            self.synapses.ensure_shape(net);
        }
        if change.synapses || self.syn_ranges.len() != self.catalog.synapses().len() {
            self.syn_ranges.clear();
            self.syn_ranges
                .resize(self.catalog.synapses().len(), MinMax::EMPTY);
        }
        reset
    }

    /// Record the network's current unit state as the newest record.
    ///
    /// `counters` is the display string for this record. `raster` keys the
    /// record for raster playback; `None` uses an internal counter that
    /// wraps at `raster_max`.
    pub fn record(&mut self, net: &dyn LiveNetwork, counters: &str, raster: Option<usize>) {
        if net.layer_count() == 0 {
            return;
        }
        self.configure(net);

        let ctr = match raster {
            Some(c) => c,
            None => self.raster.next_internal_counter(self.cfg.raster_max),
        };
        let slot = self.ring.advance();
        self.counters[slot].clear();
        self.counters[slot].push_str(counters);
        self.raster.record(slot, ctr);

        self.ranges.begin_record(slot);
        self.units
            .write_snapshot(slot, net, self.catalog.units(), &mut self.ranges);
        self.ranges.recompute_aggregate(&self.ring);
    }

    /// Replace the counter string of the latest record.
    pub fn record_last_counters(&mut self, counters: &str) {
        if self.ring.is_empty() {
            return;
        }
        let slot = self.ring.last_slot();
        self.counters[slot].clear();
        self.counters[slot].push_str(counters);
    }

    /// Record the latest synaptic state of every pathway. Call this when
    /// synaptic values change (e.g. after weight changes are computed),
    /// typically far less often than [`NetHistory::record`].
    pub fn record_synapses(&mut self, net: &dyn LiveNetwork) {
        if self.cfg.no_syn_data || net.layer_count() == 0 {
            return;
        }
        self.configure(net);
        self.syn_ranges.fill(MinMax::EMPTY);
        self.synapses
            .record(net, self.catalog.synapses(), &mut self.syn_ranges);
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.cfg
    }

    pub fn catalog(&self) -> &VariableCatalog {
        &self.catalog
    }

    pub fn ring(&self) -> &RingIndex {
        &self.ring
    }

    pub fn units(&self) -> &UnitStore {
        &self.units
    }

    pub fn synapses(&self) -> &SynapseStore {
        &self.synapses
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    /// Slot for a record number (`-1` = latest), or `None` before the
    /// first record.
    pub fn record_slot(&self, record: isize) -> Option<usize> {
        (!self.ring.is_empty()).then(|| self.ring.resolve(record))
    }

    /// Counter string of a record; empty when nothing is recorded.
    pub fn counter_rec(&self, record: isize) -> &str {
        match self.record_slot(record) {
            Some(slot) => &self.counters[slot],
            None => "",
        }
    }

    /// Raster counter stored with a record.
    pub fn raster_counter(&self, record: isize) -> Option<usize> {
        self.raster.counter_at(self.record_slot(record)?)
    }

    /// Value of `var` for one unit at a record number (`-1` = latest).
    pub fn unit_value(
        &self,
        layer: &str,
        var: VarRef<'_>,
        unit: usize,
        record: isize,
        lane: usize,
    ) -> Option<f32> {
        let slot = self.record_slot(record)?;
        self.unit_value_at_slot(layer, var, unit, slot, lane)
    }

    /// Value of `var` for one unit in the record stored under a raster
    /// counter.
    pub fn unit_value_raster(
        &self,
        layer: &str,
        var: VarRef<'_>,
        unit: usize,
        raster: usize,
        lane: usize,
    ) -> Option<f32> {
        let slot = self.raster.slot_for_counter(raster)?;
        self.unit_value_at_slot(layer, var, unit, slot, lane)
    }

    /// Synaptic projections ignore `slot` and `lane`: only the latest
    /// synaptic record exists.
    pub fn unit_value_at_slot(
        &self,
        layer: &str,
        var: VarRef<'_>,
        unit: usize,
        slot: usize,
        lane: usize,
    ) -> Option<f32> {
        match var {
            VarRef::Unit(name) => {
                let vi = self.catalog.units().index_of(name)?;
                self.units.read_value(layer, vi, unit, slot, lane)
            }
            VarRef::Synaptic {
                name,
                side: PathSide::Recv,
            } => self.recv_unit_value(layer, name, unit),
            VarRef::Synaptic {
                name,
                side: PathSide::Send,
            } => self.send_unit_value(layer, name, unit),
        }
    }

    /// Display range of `var` over the live window (unit variables) or the
    /// latest synaptic record (projections).
    pub fn var_range(&self, var: VarRef<'_>) -> Option<(f32, f32)> {
        if self.ring.is_empty() {
            return None;
        }
        match var {
            VarRef::Unit(name) => {
                let vi = self.catalog.units().index_of(name)?;
                self.ranges.aggregate(vi)
            }
            VarRef::Synaptic { name, .. } => {
                let vi = self.catalog.synapses().index_of(name)?;
                self.syn_ranges.get(vi)?.get()
            }
        }
    }

    pub fn select_unit(&mut self, layer: impl Into<String>, unit: usize) {
        self.selection = Some(UnitSelection {
            layer: layer.into(),
            unit,
        });
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn selection(&self) -> Option<&UnitSelection> {
        self.selection.as_ref()
    }

    /// `var` on the synapse from `unit` of `layer` into the selected unit.
    pub fn recv_unit_value(&self, layer: &str, var: &str, unit: usize) -> Option<f32> {
        let sel = self.selection.as_ref()?;
        let pd = self
            .synapses
            .find_send(layer, &sel.layer, self.cfg.path_type.as_deref())?;
        pd.lookup(var, unit, sel.unit)
    }

    /// `var` on the synapse from the selected unit into `unit` of `layer`.
    pub fn send_unit_value(&self, layer: &str, var: &str, unit: usize) -> Option<f32> {
        let sel = self.selection.as_ref()?;
        let pd = self
            .synapses
            .find_recv(layer, &sel.layer, self.cfg.path_type.as_deref())?;
        pd.lookup(var, sel.unit, unit)
    }

    /// All unit variables of the selected unit across the live window.
    pub fn selected_unit_trace(&self, lane: usize) -> Option<UnitTrace> {
        let sel = self.selection.as_ref()?;
        let layer = self.units.layer(&sel.layer)?;
        let vars = self.catalog.units().names().to_vec();
        let rows = self
            .ring
            .slots()
            .enumerate()
            .map(|(record, slot)| TraceRow {
                record,
                counters: self.counters[slot].clone(),
                values: (0..vars.len())
                    .map(|vi| layer.read(slot, vi, lane, sel.unit))
                    .collect(),
            })
            .collect();
        Some(UnitTrace {
            layer: sel.layer.clone(),
            unit: sel.unit,
            lane,
            vars,
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::TestNet;

    fn cfg(cap: usize) -> HistoryConfig {
        HistoryConfig::default().with_max_records(cap)
    }

    fn unit_a(nh: &NetHistory, layer: &str, record: isize) -> Option<f32> {
        nh.unit_value(layer, VarRef::Unit("A"), 0, record, 0)
    }

    #[test]
    fn six_records_into_four_slots() {
        let mut net = TestNet::with_layers(&[3, 5], &["A", "B"]);
        let mut nh = NetHistory::init(&net, cfg(4));
        for v in 1..=6 {
            net.fill_unit("L0", "A", v as f32);
            net.fill_unit("L1", "A", v as f32);
            nh.record(&net, &format!("t={v}"), None);
        }
        assert_eq!(nh.len(), 4);
        assert_eq!(unit_a(&nh, "L1", -1), Some(6.0));
        assert_eq!(unit_a(&nh, "L1", 0), Some(3.0));
        assert_eq!(unit_a(&nh, "L1", 2), Some(5.0));
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((3.0, 6.0)));
        assert_eq!(nh.counter_rec(-1), "t=6");
        assert_eq!(nh.counter_rec(0), "t=3");
    }

    #[test]
    fn empty_history_answers_nothing() {
        let net = TestNet::with_layers(&[2], &["A"]);
        let nh = NetHistory::init(&net, cfg(4));
        assert!(nh.is_empty());
        assert_eq!(unit_a(&nh, "L0", -1), None);
        assert_eq!(nh.counter_rec(-1), "");
        assert_eq!(nh.raster_counter(-1), None);
        assert_eq!(nh.var_range(VarRef::Unit("A")), None);
        assert_eq!(nh.record_slot(0), None);
    }

    #[test]
    fn nan_samples_read_as_absent() {
        let mut net = TestNet::with_layers(&[3], &["A"]);
        net.set_unit("L0", "A", 0, 0, f32::NAN);
        net.set_unit("L0", "A", 0, 1, 2.0);
        let mut nh = NetHistory::init(&net, cfg(4));
        nh.record(&net, "", None);
        assert_eq!(unit_a(&nh, "L0", -1), None);
        assert_eq!(nh.unit_value("L0", VarRef::Unit("A"), 1, -1, 0), Some(2.0));
        assert_eq!(nh.unit_value("L0", VarRef::Unit("Nope"), 1, -1, 0), None);
    }

    #[test]
    fn new_extreme_enters_and_old_extreme_leaves_range() {
        let mut net = TestNet::with_layers(&[1], &["A"]);
        let mut nh = NetHistory::init(&net, cfg(3));
        for v in [100.0, 1.0, 2.0] {
            net.fill_unit("L0", "A", v);
            nh.record(&net, "", None);
        }
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((1.0, 100.0)));
        net.fill_unit("L0", "A", 3.0);
        nh.record(&net, "", None);
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((1.0, 3.0)));
        net.fill_unit("L0", "A", -4.0);
        nh.record(&net, "", None);
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((-4.0, 3.0)));
    }

    #[test]
    fn raster_counters_pick_latest_record() {
        let mut net = TestNet::with_layers(&[1], &["A"]);
        let mut nh = NetHistory::init(&net, cfg(8));
        for (ctr, v) in [(5, 1.0), (3, 2.0), (5, 3.0)] {
            net.fill_unit("L0", "A", v);
            nh.record(&net, "", Some(ctr));
        }
        let raster = |c| nh.unit_value_raster("L0", VarRef::Unit("A"), 0, c, 0);
        assert_eq!(raster(5), Some(3.0));
        assert_eq!(raster(3), Some(2.0));
        assert_eq!(raster(4), None);
        assert_eq!(nh.raster_counter(0), Some(5));
        assert_eq!(nh.raster_counter(-1), Some(5));
    }

    #[test]
    fn internal_raster_counter_wraps() {
        let net = TestNet::with_layers(&[1], &["A"]);
        let mut nh = NetHistory::init(&net, cfg(8).with_raster_max(3));
        for _ in 0..4 {
            nh.record(&net, "", None);
        }
        let ctrs: Vec<_> = (0..4).map(|r| nh.raster_counter(r)).collect();
        assert_eq!(ctrs, vec![Some(0), Some(1), Some(2), Some(0)]);
    }

    #[test]
    fn lanes_are_recorded_side_by_side() {
        let mut net = TestNet::with_layers(&[2], &["A"]);
        net.set_lanes(2);
        net.set_unit("L0", "A", 0, 0, 1.0);
        net.set_unit("L0", "A", 1, 0, 9.0);
        let mut nh = NetHistory::init(&net, cfg(2));
        nh.record(&net, "", None);
        assert_eq!(nh.lanes(), 2);
        assert_eq!(nh.unit_value("L0", VarRef::Unit("A"), 0, -1, 0), Some(1.0));
        assert_eq!(nh.unit_value("L0", VarRef::Unit("A"), 0, -1, 1), Some(9.0));
        assert_eq!(nh.unit_value("L0", VarRef::Unit("A"), 0, -1, 2), None);
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((0.0, 9.0)));
    }

    #[test]
    fn unit_var_change_resets_history() {
        let mut net = TestNet::with_layers(&[2], &["A"]);
        let mut nh = NetHistory::init(&net, cfg(4));
        nh.record(&net, "", None);
        nh.record(&net, "", None);
        net.set_unit_vars(&["A", "B"]);
        assert!(nh.configure(&net));
        assert!(nh.is_empty());
        nh.record(&net, "", None);
        assert_eq!(nh.len(), 1);
        assert_eq!(nh.unit_value("L0", VarRef::Unit("B"), 0, -1, 0), Some(0.0));
    }

    #[test]
    fn resized_layer_loses_only_its_own_history() {
        let mut net = TestNet::with_layers(&[2, 2], &["A"]);
        net.fill_unit("L0", "A", 1.0);
        net.fill_unit("L1", "A", 1.0);
        let mut nh = NetHistory::init(&net, cfg(4));
        nh.record(&net, "", None);

        net.resize_layer("L1", 3);
        net.fill_unit("L0", "A", 2.0);
        net.fill_unit("L1", "A", 2.0);
        nh.record(&net, "", None);

        assert_eq!(nh.len(), 2);
        assert_eq!(unit_a(&nh, "L0", 0), Some(1.0));
        assert_eq!(unit_a(&nh, "L1", 0), None);
        assert_eq!(unit_a(&nh, "L1", 1), Some(2.0));
    }

    #[test]
    fn resized_layer_values_leave_the_range() {
        let mut net = TestNet::with_layers(&[2, 2], &["A"]);
        net.fill_unit("L0", "A", 1.0);
        net.fill_unit("L1", "A", 90.0);
        let mut nh = NetHistory::init(&net, cfg(4));
        nh.record(&net, "", None);
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((1.0, 90.0)));

        net.resize_layer("L1", 3);
        assert!(!nh.configure(&net));
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((1.0, 1.0)));

        net.fill_unit("L1", "A", -4.0);
        nh.record(&net, "", None);
        assert_eq!(nh.var_range(VarRef::Unit("A")), Some((-4.0, 1.0)));
    }

    #[test]
    fn reordered_synaptic_vars_never_alias() {
        let mut net = TestNet::with_layers(&[2, 2], &["A"]);
        net.connect("L0", "L1", "Forward", &["Wt", "DWt"]);
        net.set_syn("L0", "L1", "Forward", "Wt", 0, 0.5);
        net.set_syn("L0", "L1", "Forward", "DWt", 0, 0.01);
        let mut nh = NetHistory::init(&net, cfg(4));
        nh.record(&net, "", None);
        nh.record_synapses(&net);
        nh.select_unit("L1", 0);
        let r_wt = VarRef::parse("r.Wt");
        assert_eq!(nh.unit_value("L0", r_wt, 0, -1, 0), Some(0.5));

        net.set_syn_vars("L0", "L1", "Forward", &["DWt", "Wt"]);
        nh.record(&net, "", None);
        assert_eq!(nh.unit_value("L0", r_wt, 0, -1, 0), None);

        nh.record_synapses(&net);
        assert_eq!(nh.unit_value("L0", r_wt, 0, -1, 0), Some(0.5));
        assert_eq!(nh.unit_value("L0", VarRef::parse("r.DWt"), 0, -1, 0), Some(0.01));
    }

    #[test]
    fn projections_read_relative_to_selected_unit() {
        let mut net = TestNet::with_layers(&[2, 3], &["A"]);
        net.connect("L0", "L1", "Forward", &["Wt"]);
        // L0 unit 1 -> L1 unit 2
        net.set_syn("L0", "L1", "Forward", "Wt", 2 * 2 + 1, 0.5);
        // L0 unit 0 -> L1 unit 2
        net.set_syn("L0", "L1", "Forward", "Wt", 2 * 2, f32::NAN);

        let mut nh = NetHistory::init(&net, cfg(4));
        nh.record(&net, "", None);
        nh.record_synapses(&net);

        let r_wt = VarRef::parse("r.Wt");
        let s_wt = VarRef::parse("s.Wt");
        assert_eq!(nh.unit_value("L0", r_wt, 1, -1, 0), None, "nothing selected");

        nh.select_unit("L1", 2);
        assert_eq!(nh.unit_value("L0", r_wt, 1, -1, 0), Some(0.5));
        assert_eq!(nh.unit_value("L0", r_wt, 0, -1, 0), None);
        assert_eq!(nh.unit_value("L0", VarRef::parse("r.DWt"), 1, -1, 0), None);

        nh.select_unit("L0", 1);
        assert_eq!(nh.unit_value("L1", s_wt, 2, -1, 0), Some(0.5));
        assert_eq!(nh.unit_value("L1", s_wt, 0, -1, 0), Some(0.0));
        assert_eq!(nh.var_range(r_wt), Some((0.0, 0.5)));
    }

    #[test]
    fn no_syn_data_skips_synapses() {
        let mut net = TestNet::with_layers(&[2, 2], &["A"]);
        net.connect("L0", "L1", "Forward", &["Wt"]);
        let mut nh = NetHistory::init(&net, cfg(4).with_no_syn_data(true));
        nh.record(&net, "", None);
        nh.record_synapses(&net);
        nh.select_unit("L1", 0);
        assert!(nh.synapses().is_empty());
        assert_eq!(nh.unit_value("L0", VarRef::parse("r.Wt"), 0, -1, 0), None);
        assert_eq!(nh.var_range(VarRef::parse("r.Wt")), None);
    }

    #[test]
    fn selected_trace_walks_live_window() {
        let mut net = TestNet::with_layers(&[2], &["A", "B"]);
        let mut nh = NetHistory::init(&net, cfg(2));
        for v in [1.0, 2.0, 3.0] {
            net.set_unit("L0", "A", 0, 1, v);
            net.set_unit("L0", "B", 0, 1, f32::NAN);
            nh.record(&net, &format!("{v}"), None);
        }
        assert!(nh.selected_unit_trace(0).is_none());
        nh.select_unit("L0", 1);
        let trace = nh.selected_unit_trace(0).unwrap();
        assert_eq!(trace.vars, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(trace.rows.len(), 2);
        assert_eq!(trace.rows[0].values, vec![Some(2.0), None]);
        assert_eq!(trace.rows[1].values, vec![Some(3.0), None]);
        assert_eq!(trace.rows[1].counters, "3");
        assert_eq!(trace.rows[1].record, 1);
    }

    #[test]
    fn record_last_counters_overwrites_latest() {
        let net = TestNet::with_layers(&[1], &["A"]);
        let mut nh = NetHistory::init(&net, cfg(3));
        nh.record_last_counters("ignored");
        nh.record(&net, "a", None);
        nh.record(&net, "b", None);
        nh.record_last_counters("c");
        assert_eq!(nh.counter_rec(0), "a");
        assert_eq!(nh.counter_rec(-1), "c");
    }
}
