//! The live network as seen by the recorder.
//!
//! The recorder only borrows a network for the duration of a `record*` call;
//! nothing here is retained afterwards. Anything needed later to answer a
//! query (unit counts, synapse addressing) is copied out.

use serde::{Deserialize, Serialize};

/// A network whose per-unit and per-synapse state can be bulk-copied.
pub trait LiveNetwork {
    fn layer_count(&self) -> usize;

    fn layer(&self, index: usize) -> &dyn LiveLayer;

    /// Unit variable names, in recording order.
    fn unit_var_names(&self) -> &[String];

    /// Union of synaptic variable names over all pathways.
    fn syn_var_names(&self) -> &[String];

    /// Number of data-parallel lanes simulated side by side.
    fn lanes(&self) -> usize {
        1
    }
}

pub trait LiveLayer {
    fn name(&self) -> &str;

    fn unit_count(&self) -> usize;

    /// Copy the current value of `var` for every unit in `lane` into `out`
    /// (`out.len() == unit_count()`). Units without a value get NaN.
    fn unit_values(&self, out: &mut [f32], var: &str, lane: usize);

    fn send_pathway_count(&self) -> usize;

    /// Pathways this layer sends. Each pathway is listed once, by its
    /// sender; the receiving side is derived from [`LivePathway::receiver`].
    fn send_pathway(&self, index: usize) -> &dyn LivePathway;
}

pub trait LivePathway {
    fn sender(&self) -> &str;

    fn receiver(&self) -> &str;

    /// Pathway class, e.g. "Forward", "Back", "Inhib".
    fn kind(&self) -> &str;

    /// Synaptic variables this pathway carries, in buffer order.
    fn syn_var_names(&self) -> &[String];

    fn synapse_count(&self) -> usize;

    /// Copy every synapse's value of `var` into `out`
    /// (`out.len() == synapse_count()`), in [`SynapseLayout`] order.
    fn syn_values(&self, out: &mut [f32], var: &str);

    fn layout(&self) -> &SynapseLayout;
}

/// Identity of a pathway independent of any live object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathwayKey {
    pub sender: String,
    pub receiver: String,
    pub kind: String,
}

impl PathwayKey {
    pub fn of(path: &dyn LivePathway) -> Self {
        Self {
            sender: path.sender().to_string(),
            receiver: path.receiver().to_string(),
            kind: path.kind().to_string(),
        }
    }

    pub fn matches(&self, path: &dyn LivePathway) -> bool {
        self.sender == path.sender() && self.receiver == path.receiver() && self.kind == path.kind()
    }
}

/// How a pathway's flat synapse index maps to (sending unit, receiving unit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynapseLayout {
    /// Every sender connects to every receiver; synapses are grouped by
    /// receiving unit: `recv * send_units + send`.
    Dense { send_units: usize, recv_units: usize },

    /// CSR rows keyed by receiving unit: receiver `r` owns synapses at
    /// `recv_offsets[r]..recv_offsets[r + 1]`, and `send_units[i]` is the
    /// sending unit of synapse `i`.
    Sparse {
        recv_offsets: Vec<u32>,
        send_units: Vec<u32>,
    },
}

impl Default for SynapseLayout {
    fn default() -> Self {
        Self::Dense {
            send_units: 0,
            recv_units: 0,
        }
    }
}

impl SynapseLayout {
    pub fn synapse_count(&self) -> usize {
        match self {
            Self::Dense {
                send_units,
                recv_units,
            } => send_units.saturating_mul(*recv_units),
            Self::Sparse { send_units, .. } => send_units.len(),
        }
    }

    /// Flat index of the synapse from `send` to `recv`, if one exists.
    pub fn syn_index(&self, send: usize, recv: usize) -> Option<usize> {
        match self {
            Self::Dense {
                send_units,
                recv_units,
            } => (send < *send_units && recv < *recv_units).then(|| recv * send_units + send),
            Self::Sparse {
                recv_offsets,
                send_units,
            } => {
                let start = *recv_offsets.get(recv)? as usize;
                let end = *recv_offsets.get(recv + 1)? as usize;
                let row = send_units.get(start..end)?;
                row.iter()
                    .position(|&s| s as usize == send)
                    .map(|i| start + i)
            }
        }
    }
}
