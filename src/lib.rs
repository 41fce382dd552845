//! # spatext
//!
//! A continuous spatial-keyword index: register a large, dynamic set of
//! standing range and k-nearest-neighbor queries, each with a keyword
//! filter, then stream geotagged, keyword-tagged objects through it and get
//! back the queries each object satisfies. Built for workloads where
//! standing queries vastly outnumber objects and matching must be near real
//! time, such as location-based alerting and continuous kNN monitoring.
//!
//! Queries are filed into a pyramid of grid levels, coarse to fine; each
//! populated cell keeps a hybrid list/trie keyword index keyed by a
//! low-frequency pivot keyword, so one object probes a single cell per level
//! instead of scanning the query set. Expired queries are reclaimed lazily
//! by bounded cleaning slices.
//!
//! ## Example
//!
//! ```
//! use geo::Point;
//! use spatext::{Config, DataObject, Query, RangeQuery, SpatextIndex};
//!
//! # fn main() -> spatext::Result<()> {
//! let bounds = spatext::spatial::rect(0.0, 0.0, 512.0, 512.0)?;
//! let mut index = SpatextIndex::new(bounds, Config::default())?;
//!
//! let query = RangeQuery::new(
//!     1,
//!     vec!["cafe".to_string(), "wifi".to_string()],
//!     spatext::spatial::rect(100.0, 100.0, 120.0, 120.0)?,
//!     u64::MAX,
//! )?;
//! index.insert(Query::Range(query))?;
//!
//! let object = DataObject::new(
//!     7,
//!     Point::new(110.0, 110.0),
//!     vec!["wifi".to_string(), "parking".to_string()],
//!     u64::MAX,
//! )?;
//! assert_eq!(index.search(&object), vec![1]);
//! # Ok(())
//! # }
//! ```

mod cell;
mod error;
mod frequency;
mod index;
mod query;
pub mod spatial;
mod textual;
mod types;

pub use error::{Result, SpatextError};
pub use frequency::{FrequencyTracker, KeywordFrequency};
pub use index::SpatextIndex;
pub use query::{DataObject, KeywordSet, KnnQuery, Query, QueryHandle, RangeQuery};
pub use types::{Config, IndexStats, MAX_GRID_GRANULARITY};

// Spatial primitives come from the `geo` ecosystem; re-exported so callers
// do not need a direct dependency for the common types.
pub use geo::{Point, Rect};

/// Commonly used imports.
pub mod prelude {
    pub use crate::{
        Config, DataObject, IndexStats, KnnQuery, Query, RangeQuery, Result, SpatextError,
        SpatextIndex,
    };
    pub use geo::{Point, Rect};
}

/// Library version from the crate manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
