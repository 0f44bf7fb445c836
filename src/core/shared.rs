//! Thread-shared handle to a [`NetHistory`].
//!
//! One lock guards the whole recorder: the ring position, the buffers and
//! the ranges must change together. Recording takes the write lock for the
//! full update; a viewer holds one read guard for a whole frame so it never
//! sees a half-written record.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::catalog::VarRef;
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::history::NetHistory;
use crate::network::LiveNetwork;
use crate::persist::Compression;

#[derive(Debug, Clone, Default)]
pub struct SharedHistory {
    inner: Arc<RwLock<NetHistory>>,
}

impl SharedHistory {
    pub fn new(history: NetHistory) -> Self {
        Self {
            inner: Arc::new(RwLock::new(history)),
        }
    }

    pub fn init(net: &dyn LiveNetwork, cfg: HistoryConfig) -> Self {
        Self::new(NetHistory::init(net, cfg))
    }

    /// Shared guard for a consistent multi-value read (e.g. one frame).
    pub fn read(&self) -> RwLockReadGuard<'_, NetHistory> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, NetHistory> {
        self.inner.write()
    }

    pub fn configure(&self, net: &dyn LiveNetwork) -> bool {
        self.inner.write().configure(net)
    }

    pub fn record(&self, net: &dyn LiveNetwork, counters: &str, raster: Option<usize>) {
        self.inner.write().record(net, counters, raster);
    }

    pub fn record_synapses(&self, net: &dyn LiveNetwork) {
        self.inner.write().record_synapses(net);
    }

    pub fn unit_value(
        &self,
        layer: &str,
        var: VarRef<'_>,
        unit: usize,
        record: isize,
        lane: usize,
    ) -> Option<f32> {
        self.inner.read().unit_value(layer, var, unit, record, lane)
    }

    pub fn unit_value_raster(
        &self,
        layer: &str,
        var: VarRef<'_>,
        unit: usize,
        raster: usize,
        lane: usize,
    ) -> Option<f32> {
        self.inner
            .read()
            .unit_value_raster(layer, var, unit, raster, lane)
    }

    pub fn var_range(&self, var: VarRef<'_>) -> Option<(f32, f32)> {
        self.inner.read().var_range(var)
    }

    pub fn counter_rec(&self, record: isize) -> String {
        self.inner.read().counter_rec(record).to_string()
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn save_to<W: Write>(&self, w: &mut W, compression: Compression) -> Result<()> {
        self.inner.read().save_to(w, compression)
    }

    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.read().save_file(path)
    }

    /// Replace the recorded contents. The current contents survive a failed
    /// load.
    pub fn load_from<R: Read>(&self, r: &mut R) -> Result<()> {
        let cfg = self.inner.read().config().clone();
        let loaded = NetHistory::load_from(r, cfg)?;
        *self.inner.write() = loaded;
        Ok(())
    }

    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let cfg = self.inner.read().config().clone();
        let loaded = NetHistory::open_file(path, cfg)?;
        *self.inner.write() = loaded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::TestNet;
    use std::thread;

    #[test]
    fn reader_sees_whole_records_only() {
        let net = TestNet::with_layers(&[64, 64], &["A"]);
        let shared = SharedHistory::init(&net, HistoryConfig::default().with_max_records(8));

        let writer = {
            let shared = shared.clone();
            let mut net = net.clone();
            thread::spawn(move || {
                for step in 1..=200 {
                    net.fill_unit("L0", "A", step as f32);
                    net.fill_unit("L1", "A", step as f32);
                    shared.record(&net, &step.to_string(), None);
                }
            })
        };

        let reader = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    let frame = shared.read();
                    if frame.is_empty() {
                        continue;
                    }
                    let a = VarRef::Unit("A");
                    let first = frame.unit_value("L0", a, 0, -1, 0);
                    for layer in ["L0", "L1"] {
                        for u in 0..64 {
                            assert_eq!(frame.unit_value(layer, a, u, -1, 0), first);
                        }
                    }
                    let label = frame.counter_rec(-1).to_string();
                    assert_eq!(first.map(|v| (v as usize).to_string()), Some(label));
                }
            })
        };

        writer.join().unwrap();
        reader.join().unwrap();
        assert_eq!(shared.len(), 8);
        assert_eq!(shared.counter_rec(-1), "200");
        assert_eq!(shared.var_range(VarRef::Unit("A")), Some((193.0, 200.0)));
    }

    #[test]
    fn failed_load_keeps_current_history() {
        let mut net = TestNet::with_layers(&[2], &["A"]);
        let shared = SharedHistory::init(&net, HistoryConfig::default().with_max_records(4));
        net.fill_unit("L0", "A", 1.5);
        shared.record(&net, "first", None);

        let mut saved = Vec::new();
        shared.save_to(&mut saved, Compression::Lz4).unwrap();

        net.fill_unit("L0", "A", 2.5);
        shared.record(&net, "second", None);
        assert!(shared.load_from(&mut &b"{broken"[..]).is_err());
        assert_eq!(shared.len(), 2);

        shared.load_from(&mut saved.as_slice()).unwrap();
        assert_eq!(shared.len(), 1);
        assert_eq!(shared.counter_rec(-1), "first");
        assert_eq!(shared.unit_value("L0", VarRef::Unit("A"), 1, -1, 0), Some(1.5));
    }
}
