//! # netdata
//!
//! Rolling history of a running neural network's state, for a viewer that
//! scrubs back through recent updates.
//!
//! Each [`record`](history::NetHistory::record) copies every unit variable of
//! every layer into a fixed-capacity ring; the oldest record is overwritten
//! once the ring is full. Synapse values are kept for the latest update only
//! and are read as projections relative to a selected unit.
//!
//! ## Quick Start
//!
//! ```ignore
//! use netdata::prelude::*;
//!
//! let mut hist = NetHistory::init(&net, HistoryConfig::default().with_max_records(100));
//! hist.record(&net, "Trial: 3  Cycle: 25", None);
//! hist.record_synapses(&net);
//!
//! let latest = hist.unit_value("Hidden", VarRef::parse("Act"), 7, -1, 0);
//! let (lo, hi) = hist.var_range(VarRef::parse("Act")).unwrap_or((0.0, 1.0));
//!
//! hist.select_unit("Hidden", 7);
//! let wt = hist.unit_value("Input", VarRef::parse("r.Wt"), 3, -1, 0);
//! ```
//!
//! ## Modules
//!
//! - [`history`]: The recorder and its read path
//! - [`network`]: Traits a live network implements to be recorded
//! - [`shared`]: Lock-guarded handle for a recorder thread plus viewers
//! - [`persist`]: Saving and loading a recorded history

#[path = "core/error.rs"]
pub mod error;

#[path = "core/config.rs"]
pub mod config;

#[path = "core/ring.rs"]
pub mod ring;

#[path = "core/catalog.rs"]
pub mod catalog;

#[path = "core/network.rs"]
pub mod network;

#[path = "core/range.rs"]
pub mod range;

#[path = "core/raster.rs"]
pub mod raster;

#[path = "core/units.rs"]
pub mod units;

#[path = "core/synapses.rs"]
pub mod synapses;

#[path = "core/history.rs"]
pub mod history;

#[path = "core/shared.rs"]
pub mod shared;

#[path = "core/storage.rs"]
pub mod storage;

#[path = "core/persist.rs"]
pub mod persist;

#[cfg(test)]
#[path = "core/testnet.rs"]
mod testnet;

pub mod prelude {
    pub use crate::catalog::{PathSide, VarRef};
    pub use crate::config::HistoryConfig;
    pub use crate::error::{HistoryError, Result};
    pub use crate::history::{NetHistory, TraceRow, UnitSelection, UnitTrace};
    pub use crate::network::{LiveLayer, LiveNetwork, LivePathway, PathwayKey, SynapseLayout};
    pub use crate::persist::Compression;
    pub use crate::shared::SharedHistory;
}
