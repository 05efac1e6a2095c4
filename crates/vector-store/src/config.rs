use crate::error::{Result, VectorStoreError};
use crate::metric::DistanceMetric;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_M: usize = 16;
pub const DEFAULT_EF_CONSTRUCTION: usize = 200;
pub const DEFAULT_EF_SEARCH: usize = 50;
pub const DEFAULT_COMPACTION_THRESHOLD: f32 = 0.2;

/// Hard cap on the level a node can be drawn at.
pub const MAX_LEVEL: usize = 16;

/// Largest accepted `m`.
pub const MAX_M: usize = 1024;

/// Largest accepted `ef_construction` / `ef_search`.
pub const MAX_EF: usize = 1 << 20;

/// Configuration for building and querying an HNSW index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Max neighbours per node on layers above 0 (layer 0 keeps `2 * m`)
    pub m: usize,

    /// Beam width used while inserting
    pub ef_construction: usize,

    /// Default beam width for queries that don't pass their own `ef`
    pub ef_search: usize,

    /// Distance metric, fixed for the lifetime of the index
    pub metric: DistanceMetric,

    /// Seed for level assignment. `None` draws a random seed.
    pub seed: Option<u64>,

    /// Tombstone ratio at which [`crate::HnswIndex::should_compact`] reports true
    pub compaction_threshold: f32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            m: DEFAULT_M,
            ef_construction: DEFAULT_EF_CONSTRUCTION,
            ef_search: DEFAULT_EF_SEARCH,
            metric: DistanceMetric::default(),
            seed: None,
            compaction_threshold: DEFAULT_COMPACTION_THRESHOLD,
        }
    }
}

impl IndexConfig {
    /// Small beams, for tests and tiny corpora.
    pub fn for_speed() -> Self {
        Self {
            m: 8,
            ef_construction: 64,
            ef_search: 32,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Neighbour cap for a given layer.
    pub const fn max_neighbors(&self, layer: usize) -> usize {
        if layer == 0 {
            self.m * 2
        } else {
            self.m
        }
    }

    /// `mL = 1 / ln(M)`, the scale of the geometric level distribution.
    pub fn level_multiplier(&self) -> f64 {
        1.0 / (self.m as f64).ln()
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=MAX_M).contains(&self.m) {
            return Err(VectorStoreError::invalid_config(format!(
                "m must be in 2..={MAX_M} (got {})",
                self.m
            )));
        }

        if self.ef_construction == 0 || self.ef_search == 0 {
            return Err(VectorStoreError::invalid_config(
                "ef_construction and ef_search must be > 0",
            ));
        }

        if self.ef_construction > MAX_EF || self.ef_search > MAX_EF {
            return Err(VectorStoreError::invalid_config(format!(
                "ef_construction and ef_search must be <= {MAX_EF}"
            )));
        }

        if self.ef_construction < self.m {
            return Err(VectorStoreError::invalid_config(format!(
                "ef_construction ({}) cannot be smaller than m ({})",
                self.ef_construction, self.m
            )));
        }

        if !(self.compaction_threshold > 0.0 && self.compaction_threshold <= 1.0) {
            return Err(VectorStoreError::invalid_config(format!(
                "compaction_threshold must be in (0, 1] (got {})",
                self.compaction_threshold
            )));
        }

        Ok(())
    }

    /// Parse and validate a TOML document. Missing keys fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|err| VectorStoreError::invalid_config(format!("invalid TOML: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            VectorStoreError::InvalidConfig(msg) => {
                VectorStoreError::InvalidConfig(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }
}
