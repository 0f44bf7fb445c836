//! Latest synaptic state per pathway.
//!
//! Synapses are far too numerous to keep a window of history, so each
//! pathway holds a single `[var][synapse]` buffer overwritten on every
//! synaptic record. Buffers are owned by the sending layer's entry; the
//! receiving layer only keeps [`PathRef`] back-references into them.

use hashbrown::HashMap;
use tracing::debug;

use crate::catalog::VarList;
use crate::error::{HistoryError, Result};
use crate::network::{LiveNetwork, LivePathway, PathwayKey, SynapseLayout};
use crate::range::MinMax;

#[derive(Debug, Clone)]
pub struct PathwayData {
    key: PathwayKey,
    vars: VarList,
    layout: SynapseLayout,
    data: Vec<f32>,
}

impl PathwayData {
    pub fn new(path: &dyn LivePathway) -> Self {
        let mut pd = Self {
            key: PathwayKey::of(path),
            vars: VarList::default(),
            layout: path.layout().clone(),
            data: Vec::new(),
        };
        pd.allocate(path);
        pd
    }

    pub fn from_parts(
        key: PathwayKey,
        vars: &[String],
        layout: SynapseLayout,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = vars.len().checked_mul(layout.synapse_count()).ok_or_else(|| {
            HistoryError::format(format!(
                "pathway {} -> {}: synapse count overflows",
                key.sender, key.receiver
            ))
        })?;
        if data.len() != expected {
            return Err(HistoryError::shape(
                format!("pathway {} -> {}", key.sender, key.receiver),
                expected,
                data.len(),
            ));
        }
        Ok(Self {
            key,
            vars: VarList::from_names(vars),
            layout,
            data,
        })
    }

    /// Size the buffer for `vars * synapses`. A shrink keeps the allocation.
    ///
    /// A changed variable list or layout invalidates every stored value:
    /// the old contents are addressed by the old `[var][synapse]` order.
    pub fn allocate(&mut self, path: &dyn LivePathway) {
        let vars_changed = self.vars.names() != path.syn_var_names();
        if vars_changed || self.layout != *path.layout() {
            self.vars = VarList::from_names(path.syn_var_names());
            self.layout = path.layout().clone();
            self.data.fill(f32::NAN);
        }
        let total = self.vars.len() * path.synapse_count();
        if self.data.len() != total {
            if total > self.data.capacity() {
                debug!(
                    sender = path.sender(),
                    receiver = path.receiver(),
                    total,
                    "allocating pathway synapse buffer"
                );
            }
            self.data.resize(total, f32::NAN);
        }
    }

    /// Copy every synaptic variable of `path` in one pass per variable,
    /// folding ranges into `ranges` (indexed by the network-wide catalog).
    pub fn record(&mut self, path: &dyn LivePathway, catalog: &VarList, ranges: &mut [MinMax]) {
        self.allocate(path);
        let nsyn = self.synapse_count();
        for (vi, vname) in self.vars.names().iter().enumerate() {
            let region = &mut self.data[vi * nsyn..(vi + 1) * nsyn];
            path.syn_values(region, vname);
            if let Some(ci) = catalog.index_of(vname) {
                ranges[ci].merge(MinMax::of(region));
            }
        }
    }

    /// Value of `var` on the synapse from `send` to `recv`.
    pub fn lookup(&self, var: &str, send: usize, recv: usize) -> Option<f32> {
        let vi = self.vars.index_of(var)?;
        let si = self.layout.syn_index(send, recv)?;
        let nsyn = self.synapse_count();
        if si >= nsyn {
            return None;
        }
        let v = *self.data.get(vi * nsyn + si)?;
        (!v.is_nan()).then_some(v)
    }

    pub fn synapse_count(&self) -> usize {
        if self.vars.is_empty() {
            0
        } else {
            self.data.len() / self.vars.len()
        }
    }

    pub fn key(&self) -> &PathwayKey {
        &self.key
    }

    pub fn vars(&self) -> &[String] {
        self.vars.names()
    }

    pub fn layout(&self) -> &SynapseLayout {
        &self.layout
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Non-owning reference to a pathway held by a sending layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRef {
    pub layer: usize,
    pub path: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LayerSynapses {
    name: String,
    send: Vec<PathwayData>,
    recv: Vec<PathRef>,
}

impl LayerSynapses {
    pub fn new(name: impl Into<String>, send: Vec<PathwayData>) -> Self {
        Self {
            name: name.into(),
            send,
            recv: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn send(&self) -> &[PathwayData] {
        &self.send
    }

    pub fn recv(&self) -> &[PathRef] {
        &self.recv
    }
}

#[derive(Debug, Clone, Default)]
pub struct SynapseStore {
    layers: Vec<LayerSynapses>,
    index: HashMap<String, usize>,
}

impl SynapseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match pathway buffers to the network. Buffers of pathways that still
    /// exist are resized in place; the layer/pathway structure is rebuilt
    /// only when it changed.
    pub fn ensure_shape(&mut self, net: &dyn LiveNetwork) {
        let nlay = net.layer_count();
        let same_structure = self.layers.len() == nlay
            && self.layers.iter().enumerate().all(|(li, ls)| {
                let lay = net.layer(li);
                ls.name == lay.name()
                    && ls.send.len() == lay.send_pathway_count()
                    && ls
                        .send
                        .iter()
                        .enumerate()
                        .all(|(si, pd)| pd.key.matches(lay.send_pathway(si)))
            });

        if same_structure {
            for (li, ls) in self.layers.iter_mut().enumerate() {
                let lay = net.layer(li);
                for (si, pd) in ls.send.iter_mut().enumerate() {
                    pd.allocate(lay.send_pathway(si));
                }
            }
            return;
        }

        debug!(layers = nlay, "rebuilding pathway structure");
        let layers = (0..nlay)
            .map(|li| {
                let lay = net.layer(li);
                let send = (0..lay.send_pathway_count())
                    .map(|si| PathwayData::new(lay.send_pathway(si)))
                    .collect();
                LayerSynapses::new(lay.name(), send)
            })
            .collect();
        self.set_layers(layers);
    }

    /// Record every pathway. `ranges` is indexed by the synaptic catalog.
    pub fn record(&mut self, net: &dyn LiveNetwork, catalog: &VarList, ranges: &mut [MinMax]) {
        for (li, ls) in self.layers.iter_mut().enumerate() {
            let lay = net.layer(li);
            for (si, pd) in ls.send.iter_mut().enumerate() {
                pd.record(lay.send_pathway(si), catalog, ranges);
            }
        }
    }

    /// Pathway sent by `layer` to `receiver`, preferring `kind` when given
    /// and falling back to any pathway between the two layers.
    pub fn find_send(&self, layer: &str, receiver: &str, kind: Option<&str>) -> Option<&PathwayData> {
        let ls = &self.layers[*self.index.get(layer)?];
        let mut candidates = ls.send.iter().filter(|pd| pd.key.receiver == receiver);
        pick_kind(&mut candidates, kind)
    }

    /// Pathway received by `layer` from `sender`, resolved through the
    /// back-references into the sender's buffers.
    pub fn find_recv(&self, layer: &str, sender: &str, kind: Option<&str>) -> Option<&PathwayData> {
        let ls = &self.layers[*self.index.get(layer)?];
        let mut candidates = ls
            .recv
            .iter()
            .map(|r| &self.layers[r.layer].send[r.path])
            .filter(|pd| pd.key.sender == sender);
        pick_kind(&mut candidates, kind)
    }

    pub fn layers(&self) -> &[LayerSynapses] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
        self.index.clear();
    }

    /// Install layers and derive every receiving layer's back-references
    /// from the pathway keys.
    pub(crate) fn set_layers(&mut self, mut layers: Vec<LayerSynapses>) {
        self.index = layers
            .iter()
            .enumerate()
            .map(|(i, ls)| (ls.name.clone(), i))
            .collect();
        for ls in layers.iter_mut() {
            ls.recv.clear();
        }
        let mut links = Vec::new();
        for (li, ls) in layers.iter().enumerate() {
            for (si, pd) in ls.send.iter().enumerate() {
                if let Some(&ri) = self.index.get(&pd.key.receiver) {
                    links.push((ri, PathRef { layer: li, path: si }));
                }
            }
        }
        for (ri, link) in links {
            layers[ri].recv.push(link);
        }
        self.layers = layers;
    }
}

fn pick_kind<'a>(
    candidates: &mut dyn Iterator<Item = &'a PathwayData>,
    kind: Option<&str>,
) -> Option<&'a PathwayData> {
    let mut first = None;
    for pd in candidates {
        match kind {
            Some(k) if pd.key.kind == k => return Some(pd),
            None => return Some(pd),
            _ => {
                first.get_or_insert(pd);
            }
        }
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::TestNet;

    fn wired() -> TestNet {
        let mut net = TestNet::with_layers(&[2, 3], &["Act"]);
        net.connect("L0", "L1", "Forward", &["Wt", "DWt"]);
        net.connect("L1", "L0", "Back", &["Wt"]);
        net
    }

    #[test]
    fn recv_side_shares_sender_buffer() {
        let mut net = wired();
        // synapse from L0 unit 1 to L1 unit 2: 2 * 2 + 1
        net.set_syn("L0", "L1", "Forward", "Wt", 5, 0.75);

        let mut store = SynapseStore::new();
        store.ensure_shape(&net);
        let cat = VarList::from_names(&net.syn_vars);
        let mut ranges = vec![MinMax::EMPTY; cat.len()];
        store.record(&net, &cat, &mut ranges);

        let via_send = store.find_send("L0", "L1", None).unwrap();
        let via_recv = store.find_recv("L1", "L0", None).unwrap();
        assert!(std::ptr::eq(via_send, via_recv));
        assert_eq!(via_send.lookup("Wt", 1, 2), Some(0.75));
        assert_eq!(via_send.lookup("DWt", 1, 2), Some(0.0));
        assert_eq!(via_send.lookup("Nope", 1, 2), None);
        assert_eq!(via_send.lookup("Wt", 5, 2), None);
        assert_eq!(ranges[cat.index_of("Wt").unwrap()].get(), Some((0.0, 0.75)));
    }

    #[test]
    fn kind_filter_falls_back_to_any_pathway() {
        let mut net = wired();
        net.connect("L0", "L1", "Inhib", &["Wt"]);
        let mut store = SynapseStore::new();
        store.ensure_shape(&net);

        let inhib = store.find_send("L0", "L1", Some("Inhib")).unwrap();
        assert_eq!(inhib.key().kind, "Inhib");
        let fallback = store.find_send("L0", "L1", Some("Lateral")).unwrap();
        assert_eq!(fallback.key().kind, "Forward");
        assert!(store.find_send("L0", "L0", None).is_none());
        assert!(store.find_recv("L0", "L1", None).is_some());
    }

    #[test]
    fn sparse_pathway_reports_missing_synapse() {
        let mut net = TestNet::with_layers(&[3, 2], &["Act"]);
        let layout = SynapseLayout::Sparse {
            recv_offsets: vec![0, 1, 2],
            send_units: vec![2, 0],
        };
        net.connect_with("L0", "L1", "Forward", &["Wt"], layout);
        net.set_syn("L0", "L1", "Forward", "Wt", 0, 0.4);
        net.set_syn("L0", "L1", "Forward", "Wt", 1, f32::NAN);

        let mut store = SynapseStore::new();
        store.ensure_shape(&net);
        let cat = VarList::from_names(&net.syn_vars);
        let mut ranges = vec![MinMax::EMPTY; cat.len()];
        store.record(&net, &cat, &mut ranges);

        let pd = store.find_send("L0", "L1", None).unwrap();
        assert_eq!(pd.lookup("Wt", 2, 0), Some(0.4));
        assert_eq!(pd.lookup("Wt", 1, 0), None);
        assert_eq!(pd.lookup("Wt", 0, 1), None);
    }

    #[test]
    fn shrinking_pathway_keeps_allocation() {
        let mut net = wired();
        let mut store = SynapseStore::new();
        store.ensure_shape(&net);
        let before = store.find_send("L0", "L1", None).unwrap().data.capacity();

        net.resize_layer("L1", 1);
        net.layers[0].send[0].layout = SynapseLayout::Dense {
            send_units: 2,
            recv_units: 1,
        };
        store.ensure_shape(&net);
        let pd = store.find_send("L0", "L1", None).unwrap();
        assert_eq!(pd.data().len(), 2 * 2);
        assert_eq!(pd.data.capacity(), before);
    }

    #[test]
    fn layout_change_clears_stale_values() {
        let mut net = wired();
        net.set_syn("L0", "L1", "Forward", "Wt", 0, 0.3);
        let mut store = SynapseStore::new();
        store.ensure_shape(&net);
        let cat = VarList::from_names(&net.syn_vars);
        let mut ranges = vec![MinMax::EMPTY; cat.len()];
        store.record(&net, &cat, &mut ranges);
        assert_eq!(store.find_send("L0", "L1", None).unwrap().lookup("Wt", 0, 0), Some(0.3));

        // Same synapse count, different wiring.
        net.layers[0].send[0].layout = SynapseLayout::Sparse {
            recv_offsets: vec![0, 2, 4, 6],
            send_units: vec![1, 0, 1, 0, 1, 0],
        };
        store.ensure_shape(&net);
        let pd = store.find_send("L0", "L1", None).unwrap();
        assert!(matches!(pd.layout(), SynapseLayout::Sparse { .. }));
        assert_eq!(pd.lookup("Wt", 0, 0), None);
        assert_eq!(pd.lookup("Wt", 1, 0), None);
    }

    #[test]
    fn from_parts_checks_length() {
        let key = PathwayKey {
            sender: "A".into(),
            receiver: "B".into(),
            kind: "Forward".into(),
        };
        let layout = SynapseLayout::Dense {
            send_units: 2,
            recv_units: 2,
        };
        let err = PathwayData::from_parts(key, &["Wt".to_string()], layout, vec![0.0; 3]);
        assert!(matches!(err, Err(HistoryError::ShapeMismatch { expected: 4, .. })));
    }
}
