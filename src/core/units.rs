//! Ring-indexed unit snapshots, one flat buffer per layer.
//!
//! Layout per layer: `[slot][var][lane][unit]`, so one variable of one lane
//! in one slot is a contiguous run of `units` samples and can be filled by a
//! single bulk copy from the live layer.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::VarList;
use crate::error::{HistoryError, Result};
use crate::network::LiveNetwork;
use crate::range::{MinMax, RangeTracker};

/// Dimensions of one layer buffer. Two buffers with equal shapes are
/// interchangeable; any difference forces reallocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerShape {
    pub capacity: usize,
    pub vars: usize,
    pub lanes: usize,
    pub units: usize,
}

impl LayerShape {
    #[inline]
    pub fn len(&self) -> usize {
        self.capacity * self.vars * self.lanes * self.units
    }

    /// [`LayerShape::len`] for shapes that did not come from a live network;
    /// `None` when the product does not fit in `usize`.
    pub fn checked_len(&self) -> Option<usize> {
        self.capacity
            .checked_mul(self.vars)?
            .checked_mul(self.lanes)?
            .checked_mul(self.units)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn offset(&self, slot: usize, var: usize, lane: usize, unit: usize) -> usize {
        ((slot * self.vars + var) * self.lanes + lane) * self.units + unit
    }

    #[inline]
    fn contains(&self, slot: usize, var: usize, lane: usize, unit: usize) -> bool {
        slot < self.capacity && var < self.vars && lane < self.lanes && unit < self.units
    }
}

#[derive(Debug, Clone)]
pub struct LayerData {
    name: String,
    shape: LayerShape,
    data: Vec<f32>,
}

impl LayerData {
    /// A fresh buffer with every sample absent.
    pub fn new(name: impl Into<String>, shape: LayerShape) -> Self {
        Self {
            name: name.into(),
            shape,
            data: vec![f32::NAN; shape.len()],
        }
    }

    /// Adopt an existing buffer, which must match `shape` exactly.
    pub fn from_parts(name: String, shape: LayerShape, data: Vec<f32>) -> Result<Self> {
        let expected = shape
            .checked_len()
            .ok_or_else(|| HistoryError::format(format!("layer {name}: shape {shape:?} overflows")))?;
        if data.len() != expected {
            return Err(HistoryError::shape(format!("layer {name}"), expected, data.len()));
        }
        Ok(Self { name, shape, data })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> LayerShape {
        self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn read(&self, slot: usize, var: usize, lane: usize, unit: usize) -> Option<f32> {
        if !self.shape.contains(slot, var, lane, unit) {
            return None;
        }
        let v = self.data[self.shape.offset(slot, var, lane, unit)];
        (!v.is_nan()).then_some(v)
    }

    fn region(&self, slot: usize, var: usize, lane: usize) -> &[f32] {
        let start = self.shape.offset(slot, var, lane, 0);
        &self.data[start..start + self.shape.units]
    }

    fn region_mut(&mut self, slot: usize, var: usize, lane: usize) -> &mut [f32] {
        let start = self.shape.offset(slot, var, lane, 0);
        &mut self.data[start..start + self.shape.units]
    }
}

/// Unit history for every layer of the viewed network, in network order.
#[derive(Debug, Clone, Default)]
pub struct UnitStore {
    layers: Vec<LayerData>,
    index: HashMap<String, usize>,
}

impl UnitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match the store to the network's layers. Layers whose name and shape
    /// are unchanged keep their buffers (and history); the rest get a fresh
    /// all-absent buffer. Returns the number of layers reallocated.
    pub fn ensure_shape(
        &mut self,
        net: &dyn LiveNetwork,
        vars: usize,
        lanes: usize,
        capacity: usize,
    ) -> usize {
        let shape_of = |units| LayerShape {
            capacity,
            vars,
            lanes,
            units,
        };

        let nlay = net.layer_count();
        let unchanged = self.layers.len() == nlay
            && self.layers.iter().enumerate().all(|(i, ld)| {
                let lay = net.layer(i);
                ld.name == lay.name() && ld.shape == shape_of(lay.unit_count())
            });
        if unchanged {
            return 0;
        }

        let mut old: Vec<Option<LayerData>> = self.layers.drain(..).map(Some).collect();
        let mut reallocated = 0;
        let mut layers = Vec::with_capacity(nlay);
        for li in 0..nlay {
            let lay = net.layer(li);
            let shape = shape_of(lay.unit_count());
            let kept = self
                .index
                .get(lay.name())
                .and_then(|&oi| old[oi].take())
                .filter(|ld| ld.shape == shape);
            match kept {
                Some(ld) => layers.push(ld),
                None => {
                    debug!(layer = lay.name(), ?shape, "allocating layer history");
                    reallocated += 1;
                    layers.push(LayerData::new(lay.name(), shape));
                }
            }
        }
        self.set_layers(layers);
        reallocated
    }

    /// Copy the network's current unit values into `slot`, folding each
    /// variable's range into `ranges`. NaN samples are stored as-is.
    ///
    /// The store must already match `net` (see [`UnitStore::ensure_shape`]).
    pub fn write_snapshot(
        &mut self,
        slot: usize,
        net: &dyn LiveNetwork,
        vars: &VarList,
        ranges: &mut RangeTracker,
    ) {
        for (li, ld) in self.layers.iter_mut().enumerate() {
            let lay = net.layer(li);
            for (vi, vname) in vars.names().iter().enumerate() {
                for lane in 0..ld.shape.lanes {
                    let region = ld.region_mut(slot, vi, lane);
                    lay.unit_values(region, vname, lane);
                    ranges.merge(slot, vi, MinMax::of(region));
                }
            }
        }
    }

    /// Rebuild the per-slot ranges of `slots` from the buffers as they are
    /// now, so values discarded with a reallocated layer stop counting.
    pub fn refold_ranges(&self, slots: impl Iterator<Item = usize>, ranges: &mut RangeTracker) {
        for slot in slots {
            ranges.begin_record(slot);
            for ld in &self.layers {
                for vi in 0..ld.shape.vars {
                    for lane in 0..ld.shape.lanes {
                        ranges.merge(slot, vi, MinMax::of(ld.region(slot, vi, lane)));
                    }
                }
            }
        }
    }

    pub fn layer(&self, name: &str) -> Option<&LayerData> {
        self.index.get(name).map(|&i| &self.layers[i])
    }

    pub fn layers(&self) -> &[LayerData] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn read_value(
        &self,
        layer: &str,
        var: usize,
        unit: usize,
        slot: usize,
        lane: usize,
    ) -> Option<f32> {
        self.layer(layer)?.read(slot, var, lane, unit)
    }

    pub(crate) fn set_layers(&mut self, layers: Vec<LayerData>) {
        self.index = layers
            .iter()
            .enumerate()
            .map(|(i, ld)| (ld.name.clone(), i))
            .collect();
        self.layers = layers;
    }
}
