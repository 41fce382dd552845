//! Configuration and statistics types.
//!
//! [`Config`] follows the same pattern as the rest of the crate's value types:
//! serializable, validated up front, and adjusted through `with_*` builder
//! methods.

use serde::de::Error;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the grid granularity imposed by the cell coordinate
/// encoding: a cell key is `(level << 22) | (y * granularity + x)`, so the
/// per-level offset must stay below `2^22` for every level to have a disjoint
/// key range. `2048^2 == 2^22`, hence granularity above 2048 would let keys
/// from different levels collide and corrupt the cell map.
pub const MAX_GRID_GRANULARITY: usize = 2048;

/// Tuning knobs for a [`SpatextIndex`](crate::SpatextIndex).
///
/// # Example
///
/// ```rust
/// use spatext::Config;
///
/// let config = Config::default()
///     .with_granularity(512)
///     .with_max_level(9)
///     .with_cleaning_budget(16);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Number of cells per axis at the finest pyramid level. Must be a power
    /// of two no larger than [`MAX_GRID_GRANULARITY`].
    #[serde(default = "Config::default_granularity")]
    pub grid_granularity: usize,

    /// Coarsest pyramid level. Must be at least `log2(grid_granularity)`
    /// and is clamped to it at construction, so the top of the pyramid is
    /// always a single cell spanning the whole space. A kNN query with an
    /// unsettled radius is filed exactly once, into that cell.
    #[serde(default = "Config::default_max_level")]
    pub max_level: usize,

    /// Per-keyword list size at which a list node is promoted into a trie
    /// node, re-filing its queries by their next keyword.
    #[serde(default = "Config::default_split_threshold")]
    pub split_threshold: usize,

    /// Total trie size at or below which cleaning merges a trie node back
    /// into a flat list.
    #[serde(default = "Config::default_merge_threshold")]
    pub merge_threshold: usize,

    /// Governs kNN descent: a query drops to a finer level once its answer
    /// radius times this ratio falls below the current level's cell width.
    #[serde(default = "Config::default_degradation_ratio")]
    pub degradation_ratio: f64,

    /// Maximum number of top-level keyword entries one cleaning call visits.
    #[serde(default = "Config::default_cleaning_budget")]
    pub cleaning_budget: usize,

    /// When set, degraded kNN queries are reinserted at level 0 instead of
    /// the finest level whose cells still cover their answer disk.
    #[serde(default)]
    pub push_to_lowest: bool,
}

impl Config {
    const fn default_granularity() -> usize {
        512
    }

    const fn default_max_level() -> usize {
        9
    }

    const fn default_split_threshold() -> usize {
        2
    }

    const fn default_merge_threshold() -> usize {
        2
    }

    const fn default_degradation_ratio() -> f64 {
        2.0
    }

    const fn default_cleaning_budget() -> usize {
        10
    }

    pub fn with_granularity(mut self, granularity: usize) -> Self {
        self.grid_granularity = granularity;
        self
    }

    pub fn with_max_level(mut self, max_level: usize) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_split_threshold(mut self, threshold: usize) -> Self {
        self.split_threshold = threshold;
        self
    }

    pub fn with_merge_threshold(mut self, threshold: usize) -> Self {
        self.merge_threshold = threshold;
        self
    }

    pub fn with_degradation_ratio(mut self, ratio: f64) -> Self {
        self.degradation_ratio = ratio;
        self
    }

    pub fn with_cleaning_budget(mut self, budget: usize) -> Self {
        self.cleaning_budget = budget;
        self
    }

    pub fn with_push_to_lowest(mut self, push_to_lowest: bool) -> Self {
        self.push_to_lowest = push_to_lowest;
        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.grid_granularity == 0 || !self.grid_granularity.is_power_of_two() {
            return Err(format!(
                "grid granularity must be a power of two, got {}",
                self.grid_granularity
            ));
        }
        if self.grid_granularity > MAX_GRID_GRANULARITY {
            return Err(format!(
                "grid granularity must not exceed {} (cell key encoding)",
                MAX_GRID_GRANULARITY
            ));
        }
        if self.max_level < self.grid_granularity.trailing_zeros() as usize {
            return Err(format!(
                "max level {} stops short of the single-cell level; it must be at least log2(grid granularity) = {}",
                self.max_level,
                self.grid_granularity.trailing_zeros()
            ));
        }
        if self.split_threshold == 0 {
            return Err("split threshold must be at least 1".to_string());
        }
        if self.merge_threshold == 0 {
            return Err("merge threshold must be at least 1".to_string());
        }
        if !self.degradation_ratio.is_finite() || self.degradation_ratio <= 0.0 {
            return Err("degradation ratio must be finite and positive".to_string());
        }
        if self.cleaning_budget == 0 {
            return Err("cleaning budget must be at least 1".to_string());
        }
        Ok(())
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Serialize configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            grid_granularity: Self::default_granularity(),
            max_level: Self::default_max_level(),
            split_threshold: Self::default_split_threshold(),
            merge_threshold: Self::default_merge_threshold(),
            degradation_ratio: Self::default_degradation_ratio(),
            cleaning_budget: Self::default_cleaning_budget(),
            push_to_lowest: false,
        }
    }
}

/// Counters describing the work an index instance has performed.
///
/// All counters are owned by the index and reset on construction; `cells` is
/// sampled from the live cell map when [`SpatextIndex::stats`] is called.
///
/// [`SpatextIndex::stats`]: crate::SpatextIndex::stats
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of live cells across all pyramid levels.
    pub cells: usize,
    /// Continuous queries accepted through the public entry point.
    pub queries_inserted: u64,
    /// Query insertions counted once per cell touched (replication included).
    pub insertions_with_replication: u64,
    /// Data objects run through the search path.
    pub objects_searched: u64,
    /// List/single nodes visited while searching.
    pub list_node_visits: u64,
    /// Trie nodes visited while searching.
    pub trie_node_visits: u64,
    /// kNN queries pushed to a finer level by radius degradation.
    pub knn_descents: u64,
    /// Query references removed by cleaning (expired or stale copies).
    pub cleaned_entries: u64,
}

impl IndexStats {
    pub(crate) fn record_query(&mut self) {
        self.queries_inserted += 1;
    }

    pub(crate) fn record_replicated_insertion(&mut self) {
        self.insertions_with_replication += 1;
    }

    pub(crate) fn record_object(&mut self) {
        self.objects_searched += 1;
    }

    pub(crate) fn record_descents(&mut self, count: usize) {
        self.knn_descents += count as u64;
    }

    pub(crate) fn record_cleaned(&mut self, count: usize) {
        self.cleaned_entries += count as u64;
    }
}
