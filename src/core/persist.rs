//! Saving and loading recorded history.
//!
//! The history is written as one JSON document. JSON has no NaN or
//! infinity: absent samples are written as [`NAN_SUB`] and turned back into
//! NaN on load (so a genuine sample equal to `NAN_SUB` also loads as
//! absent), and infinities are written as the strings `"inf"` and `"-inf"`.
//!
//! The document is either written as-is or wrapped in the `NETDAT01` frame
//! (see [`crate::storage`]) as one LZ4 block tagged `NDAT`. Loading detects
//! which.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::info;

use crate::catalog::VariableCatalog;
use crate::config::HistoryConfig;
use crate::error::{HistoryError, Result};
use crate::history::{NetHistory, UnitSelection};
use crate::network::{PathwayKey, SynapseLayout};
use crate::range::{MinMax, RangeTracker};
use crate::raster::RasterIndex;
use crate::ring::RingIndex;
use crate::storage;
use crate::synapses::{LayerSynapses, PathwayData, SynapseStore};
use crate::units::{LayerData, LayerShape, UnitStore};

/// Stand-in for NaN in saved sample arrays.
const NAN_SUB: f32 = -1.11e-37;

const TAG_DATA: [u8; 4] = *b"NDAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    Lz4,
}

impl Compression {
    /// LZ4 for `*.lz4` paths, plain JSON otherwise.
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("lz4") => Self::Lz4,
            _ => Self::None,
        }
    }
}

const POS_INF: &str = "inf";
const NEG_INF: &str = "-inf";

/// One sample in its JSON-safe form.
struct Sample(f32);

impl Serialize for Sample {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_nan() {
            s.serialize_f32(NAN_SUB)
        } else if v.is_infinite() {
            s.serialize_str(if v > 0.0 { POS_INF } else { NEG_INF })
        } else {
            s.serialize_f32(v)
        }
    }
}

impl<'de> Deserialize<'de> for Sample {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        d.deserialize_any(SampleVisitor)
    }
}

struct SampleVisitor;

impl<'de> Visitor<'de> for SampleVisitor {
    type Value = Sample;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, \"inf\" or \"-inf\"")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<Sample, E> {
        let v = v as f32;
        Ok(Sample(if v == NAN_SUB { f32::NAN } else { v }))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Sample, E> {
        Ok(Sample(v as f32))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Sample, E> {
        Ok(Sample(v as f32))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Sample, E> {
        match v {
            POS_INF => Ok(Sample(f32::INFINITY)),
            NEG_INF => Ok(Sample(f32::NEG_INFINITY)),
            _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
        }
    }
}

/// A flat sample buffer, written through [`Sample`].
#[derive(Debug, Clone, Default)]
struct Samples(Vec<f32>);

impl Serialize for Samples {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_seq(self.0.iter().map(|&v| Sample(v)))
    }
}

impl<'de> Deserialize<'de> for Samples {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let raw = Vec::<Sample>::deserialize(d)?;
        Ok(Self(raw.into_iter().map(|s| s.0).collect()))
    }
}

/// Ranges are stored flat as `[min, max, min, max, ...]`.
fn ranges_to_samples(ranges: &[MinMax]) -> Samples {
    Samples(ranges.iter().flat_map(|r| [r.min, r.max]).collect())
}

fn ranges_from_samples(what: &str, samples: Samples, count: usize) -> Result<Vec<MinMax>> {
    let expected = count
        .checked_mul(2)
        .ok_or_else(|| HistoryError::format(format!("{what}: {count} ranges overflow")))?;
    check_len(what, expected, samples.0.len())?;
    Ok(samples
        .0
        .chunks_exact(2)
        .map(|p| MinMax { min: p[0], max: p[1] })
        .collect())
}

/// Counts bytes instead of keeping them.
#[derive(Default)]
struct ByteCount(usize);

impl Write for ByteCount {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct LayerDoc {
    name: String,
    shape: LayerShape,
    data: Samples,
}

#[derive(Debug, Serialize, Deserialize)]
struct PathwayDoc {
    key: PathwayKey,
    vars: Vec<String>,
    layout: SynapseLayout,
    data: Samples,
}

#[derive(Debug, Serialize, Deserialize)]
struct SynLayerDoc {
    name: String,
    send: Vec<PathwayDoc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetDataDoc {
    version: u32,
    capacity: usize,
    len: usize,
    next: usize,
    lanes: usize,
    unit_vars: Vec<String>,
    syn_vars: Vec<String>,
    layers: Vec<LayerDoc>,
    syn_layers: Vec<SynLayerDoc>,
    slot_ranges: Samples,
    syn_ranges: Samples,
    counters: Vec<String>,
    raster_counters: Vec<Option<usize>>,
    raster_map: Vec<(usize, usize)>,
    raster_next: usize,
    selection: Option<(String, usize)>,
}

fn check_len(what: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(HistoryError::shape(what, expected, actual));
    }
    Ok(())
}

impl NetHistory {
    fn to_doc(&self) -> NetDataDoc {
        let mut raster_map: Vec<(usize, usize)> = self.raster.entries().collect();
        raster_map.sort_unstable();
        NetDataDoc {
            version: storage::VERSION,
            capacity: self.ring.capacity(),
            len: self.ring.len(),
            next: self.ring.next_slot(),
            lanes: self.lanes,
            unit_vars: self.catalog.units().names().to_vec(),
            syn_vars: self.catalog.synapses().names().to_vec(),
            layers: self
                .units
                .layers()
                .iter()
                .map(|ld| LayerDoc {
                    name: ld.name().to_string(),
                    shape: ld.shape(),
                    data: Samples(ld.data().to_vec()),
                })
                .collect(),
            syn_layers: self
                .synapses
                .layers()
                .iter()
                .map(|ls| SynLayerDoc {
                    name: ls.name().to_string(),
                    send: ls
                        .send()
                        .iter()
                        .map(|pd| PathwayDoc {
                            key: pd.key().clone(),
                            vars: pd.vars().to_vec(),
                            layout: pd.layout().clone(),
                            data: Samples(pd.data().to_vec()),
                        })
                        .collect(),
                })
                .collect(),
            slot_ranges: ranges_to_samples(self.ranges.per_slot()),
            syn_ranges: ranges_to_samples(&self.syn_ranges),
            counters: self.counters.clone(),
            raster_counters: self.raster.slot_counters().to_vec(),
            raster_map,
            raster_next: self.raster.internal_counter(),
            selection: self
                .selection
                .as_ref()
                .map(|s| (s.layer.clone(), s.unit)),
        }
    }

    fn from_doc(doc: NetDataDoc, mut cfg: HistoryConfig) -> Result<Self> {
        if doc.version != storage::VERSION {
            return Err(HistoryError::format(format!(
                "unsupported net data version {}",
                doc.version
            )));
        }
        // One counter per slot: bounds `capacity` by data actually present.
        check_len("counters", doc.capacity, doc.counters.len())?;
        check_len("raster counters", doc.capacity, doc.raster_counters.len())?;
        if doc.lanes == 0 {
            return Err(HistoryError::format("lane count must be > 0"));
        }
        let ring = RingIndex::from_parts(doc.capacity, doc.len, doc.next).ok_or_else(|| {
            HistoryError::format(format!(
                "inconsistent ring: capacity {}, len {}, next {}",
                doc.capacity, doc.len, doc.next
            ))
        })?;
        let capacity = doc.capacity;
        let nvars = doc.unit_vars.len();
        let slot_vars = capacity.checked_mul(nvars).ok_or_else(|| {
            HistoryError::format(format!("{capacity} slots x {nvars} vars overflows"))
        })?;

        let mut layers = Vec::with_capacity(doc.layers.len());
        for ld in doc.layers {
            check_len(&format!("layer {} capacity", ld.name), capacity, ld.shape.capacity)?;
            check_len(&format!("layer {} vars", ld.name), nvars, ld.shape.vars)?;
            check_len(&format!("layer {} lanes", ld.name), doc.lanes, ld.shape.lanes)?;
            layers.push(LayerData::from_parts(ld.name, ld.shape, ld.data.0)?);
        }
        let mut units = UnitStore::new();
        units.set_layers(layers);

        let mut syn_layers = Vec::with_capacity(doc.syn_layers.len());
        for sl in doc.syn_layers {
            let send = sl
                .send
                .into_iter()
                .map(|pd| PathwayData::from_parts(pd.key, &pd.vars, pd.layout, pd.data.0))
                .collect::<Result<Vec<_>>>()?;
            syn_layers.push(LayerSynapses::new(sl.name, send));
        }
        let mut synapses = SynapseStore::new();
        synapses.set_layers(syn_layers);

        let slot_ranges = ranges_from_samples("slot ranges", doc.slot_ranges, slot_vars)?;
        let syn_ranges = ranges_from_samples("synaptic ranges", doc.syn_ranges, doc.syn_vars.len())?;
        if let Some(&(ctr, slot)) = doc.raster_map.iter().find(|(_, s)| *s >= capacity) {
            return Err(HistoryError::format(format!(
                "raster counter {ctr} maps to slot {slot} beyond capacity {capacity}"
            )));
        }

        let mut ranges = RangeTracker::new(capacity, nvars);
        ranges.set_per_slot(slot_ranges);
        ranges.recompute_aggregate(&ring);

        cfg.max_records = capacity;
        Ok(Self {
            cfg,
            lanes: doc.lanes,
            ring,
            catalog: VariableCatalog::new(&doc.unit_vars, &doc.syn_vars),
            units,
            synapses,
            ranges,
            syn_ranges,
            counters: doc.counters,
            raster: RasterIndex::from_parts(doc.raster_counters, doc.raster_map, doc.raster_next),
            selection: doc
                .selection
                .map(|(layer, unit)| UnitSelection { layer, unit }),
        })
    }

    /// Write the whole history to `w`.
    pub fn save_to<W: Write>(&self, w: &mut W, compression: Compression) -> Result<()> {
        let doc = self.to_doc();
        match compression {
            Compression::None => serde_json::to_writer(&mut *w, &doc)?,
            Compression::Lz4 => {
                let json = serde_json::to_vec(&doc)?;
                storage::write_frame(w, TAG_DATA, &json)?;
            }
        }
        w.flush()?;
        Ok(())
    }

    /// Read a history written by [`NetHistory::save_to`], compressed or not.
    /// `cfg` supplies the settings that are not part of the recording; its
    /// capacity is replaced by the recorded one.
    pub fn load_from<R: Read>(r: &mut R, cfg: HistoryConfig) -> Result<Self> {
        let mut bytes = Vec::new();
        r.read_to_end(&mut bytes)?;

        let json = if storage::is_framed(&bytes) {
            let (tag, payload) = storage::read_frame(&bytes)?;
            if tag != TAG_DATA {
                return Err(HistoryError::format("missing NDAT chunk"));
            }
            payload
        } else {
            bytes
        };

        let doc: NetDataDoc = serde_json::from_slice(&json)?;
        Self::from_doc(doc, cfg)
    }

    pub fn save_bytes(&self, compression: Compression) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.save_to(&mut buf, compression)?;
        Ok(buf)
    }

    pub fn load_bytes(bytes: &[u8], cfg: HistoryConfig) -> Result<Self> {
        Self::load_from(&mut io::Cursor::new(bytes), cfg)
    }

    /// Exact size in bytes of what [`NetHistory::save_to`] would write.
    pub fn saved_size_bytes(&self, compression: Compression) -> Result<usize> {
        let mut count = ByteCount::default();
        self.save_to(&mut count, compression)?;
        Ok(count.0)
    }

    /// Save to a file, LZ4-compressed when the path ends in `.lz4`.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let compression = Compression::for_path(path);
        let mut w = BufWriter::new(File::create(path)?);
        self.save_to(&mut w, compression)?;
        info!(
            path = %path.display(),
            records = self.len(),
            ?compression,
            "saved net data"
        );
        Ok(())
    }

    pub fn open_file(path: impl AsRef<Path>, cfg: HistoryConfig) -> Result<Self> {
        let path = path.as_ref();
        let mut r = BufReader::new(File::open(path)?);
        let nh = Self::load_from(&mut r, cfg)?;
        info!(
            path = %path.display(),
            records = nh.len(),
            layers = nh.units().len(),
            "loaded net data"
        );
        Ok(nh)
    }
}
