use serde::{Deserialize, Serialize};

/// Recorder settings chosen by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Ring capacity: how many records can be scrubbed back through.
    pub max_records: usize,

    /// Skip synapse-level recording entirely. Useful for very large
    /// networks where copying every synapse each update is prohibitive.
    pub no_syn_data: bool,

    /// Wrap point of the internal raster counter used when the caller does
    /// not supply one.
    pub raster_max: usize,

    /// Preferred pathway class (e.g. "Forward", "Inhib") when two layers are
    /// joined by more than one pathway.
    pub path_type: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_records: Self::DEFAULT_MAX_RECORDS,
            no_syn_data: false,
            raster_max: Self::DEFAULT_RASTER_MAX,
            path_type: None,
        }
    }
}

impl HistoryConfig {
    pub const DEFAULT_MAX_RECORDS: usize = 210;
    pub const DEFAULT_RASTER_MAX: usize = 200;
    /// Capacity used when zero is requested.
    pub const MIN_RECORDS: usize = 2;

    pub fn with_max_records(mut self, max_records: usize) -> Self {
        self.max_records = max_records;
        self
    }

    pub fn with_no_syn_data(mut self, no_syn_data: bool) -> Self {
        self.no_syn_data = no_syn_data;
        self
    }

    pub fn with_raster_max(mut self, raster_max: usize) -> Self {
        self.raster_max = raster_max;
        self
    }

    pub fn with_path_type(mut self, path_type: impl Into<String>) -> Self {
        self.path_type = Some(path_type.into());
        self
    }

    /// Validate the configuration, returning an error message if invalid.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.max_records == 0 {
            return Err("max_records must be > 0");
        }
        if self.raster_max == 0 {
            return Err("raster_max must be > 0");
        }
        if matches!(self.path_type.as_deref(), Some("")) {
            return Err("path_type must not be empty");
        }
        Ok(())
    }

    /// Ring capacity actually used: a zero request falls back to
    /// [`HistoryConfig::MIN_RECORDS`].
    pub fn capacity(&self) -> usize {
        if self.max_records == 0 {
            Self::MIN_RECORDS
        } else {
            self.max_records
        }
    }
}
