//! Query, data-object and arena types.
//!
//! Queries live in a single [`QueryArena`] owned by the index; cells and trie
//! nodes only ever hold [`QueryHandle`] indices into it. That keeps a query
//! that is replicated across many cells a single object, so the kNN answer
//! radius updated on one path is immediately visible on every other.

use crate::error::{Result, SpatextError};
use crate::spatial;
use geo::{Point, Rect};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Sorted, deduplicated keyword set of a standing query.
pub type KeywordSet = SmallVec<[String; 4]>;

/// Index of a query inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryHandle(pub(crate) u32);

/// Sort and deduplicate a raw keyword list, rejecting empty sets.
pub(crate) fn normalize_keywords<I>(keywords: I) -> Result<KeywordSet>
where
    I: IntoIterator<Item = String>,
{
    let mut set: KeywordSet = keywords.into_iter().collect();
    set.sort_unstable();
    set.dedup();
    if set.is_empty() {
        return Err(SpatextError::EmptyKeywords);
    }
    Ok(set)
}

/// First keyword strictly after `after` in sorted order.
///
/// Trie paths follow the sorted keyword order starting from the pivot, so
/// this is the child key a query is re-filed under during promotion.
pub(crate) fn next_keyword<'a>(keywords: &'a KeywordSet, after: &str) -> Option<&'a str> {
    let idx = keywords.partition_point(|k| k.as_str() <= after);
    keywords.get(idx).map(|k| k.as_str())
}

/// A standing range query: matches objects inside a fixed rectangle.
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub id: u64,
    pub keywords: KeywordSet,
    pub range: Rect,
    pub expires_at: u64,
}

impl RangeQuery {
    /// Build a range query, sorting and deduplicating its keywords.
    ///
    /// # Errors
    ///
    /// [`SpatextError::EmptyKeywords`] when no keywords are given,
    /// [`SpatextError::InvalidBounds`] for a non-finite or zero-area range.
    pub fn new(
        id: u64,
        keywords: impl IntoIterator<Item = String>,
        range: Rect,
        expires_at: u64,
    ) -> Result<Self> {
        let finite = range.min().x.is_finite()
            && range.min().y.is_finite()
            && range.max().x.is_finite()
            && range.max().y.is_finite();
        if !finite || range.width() <= 0.0 || range.height() <= 0.0 {
            return Err(SpatextError::InvalidBounds(
                "query range must have positive width and height".to_string(),
            ));
        }
        Ok(Self {
            id,
            keywords: normalize_keywords(keywords)?,
            range,
            expires_at,
        })
    }
}

/// Candidate distance kept in a kNN query's bounded max-heap.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Neighbor(f64);

impl Eq for Neighbor {}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A continuous k-nearest-neighbor query.
///
/// The answer radius `ar` starts infinite and shrinks as candidate objects
/// stream in; once `k` candidates are known it equals the distance to the
/// current k-th nearest. `ar` and `current_level` are only ever mutated by
/// the index's search/degradation path.
#[derive(Debug, Clone)]
pub struct KnnQuery {
    pub id: u64,
    pub keywords: KeywordSet,
    pub center: Point,
    pub k: usize,
    pub expires_at: u64,
    ar: f64,
    current_level: usize,
    neighbors: BinaryHeap<Neighbor>,
}

impl KnnQuery {
    /// Build a kNN query, sorting and deduplicating its keywords.
    ///
    /// # Errors
    ///
    /// [`SpatextError::EmptyKeywords`] for an empty keyword set,
    /// [`SpatextError::InvalidConfig`] for `k == 0`.
    pub fn new(
        id: u64,
        keywords: impl IntoIterator<Item = String>,
        center: Point,
        k: usize,
        expires_at: u64,
    ) -> Result<Self> {
        if k == 0 {
            return Err(SpatextError::InvalidConfig(
                "kNN query requires k >= 1".to_string(),
            ));
        }
        Ok(Self {
            id,
            keywords: normalize_keywords(keywords)?,
            center,
            k,
            expires_at,
            ar: f64::INFINITY,
            current_level: 0,
            neighbors: BinaryHeap::new(),
        })
    }

    /// Current answer radius; infinite until `k` candidates have been seen.
    pub fn answer_radius(&self) -> f64 {
        self.ar
    }

    /// Pyramid level the query is currently filed at.
    pub fn current_level(&self) -> usize {
        self.current_level
    }

    pub(crate) fn set_level(&mut self, level: usize) {
        self.current_level = level;
    }

    /// Feed a candidate distance into the answer set.
    ///
    /// Returns `true` when the object lies within the current answer radius
    /// (it is a result for this query). The radius never grows.
    pub(crate) fn offer(&mut self, dist: f64) -> bool {
        if dist > self.ar {
            return false;
        }
        if self.neighbors.len() < self.k {
            self.neighbors.push(Neighbor(dist));
            if self.neighbors.len() == self.k {
                self.ar = self.neighbors.peek().map(|n| n.0).unwrap_or(f64::INFINITY);
            }
        } else if dist < self.ar {
            self.neighbors.pop();
            self.neighbors.push(Neighbor(dist));
            self.ar = self.neighbors.peek().map(|n| n.0).unwrap_or(f64::INFINITY);
        }
        true
    }

    /// Bounding box of the answer disk, clamped to the global bounds.
    pub(crate) fn spatial_box(&self, bounds: &Rect) -> Rect {
        spatial::disk_box(&self.center, self.ar, bounds)
    }
}

/// A standing continuous query, dispatched by variant.
#[derive(Debug, Clone)]
pub enum Query {
    Range(RangeQuery),
    Knn(KnnQuery),
}

impl Query {
    pub fn id(&self) -> u64 {
        match self {
            Query::Range(q) => q.id,
            Query::Knn(q) => q.id,
        }
    }

    pub fn keywords(&self) -> &KeywordSet {
        match self {
            Query::Range(q) => &q.keywords,
            Query::Knn(q) => &q.keywords,
        }
    }

    pub fn expires_at(&self) -> u64 {
        match self {
            Query::Range(q) => q.expires_at,
            Query::Knn(q) => q.expires_at,
        }
    }

    /// A query is past its expiration once the logical clock moves beyond it.
    pub(crate) fn is_expired(&self, clock: u64) -> bool {
        self.expires_at() < clock
    }

    /// Spatial footprint used when replicating the query over a cell span.
    pub(crate) fn spatial_box(&self, bounds: &Rect) -> Rect {
        match self {
            Query::Range(q) => q.range,
            Query::Knn(q) => q.spatial_box(bounds),
        }
    }
}

/// A geotagged, keyword-tagged data object arriving on the stream.
///
/// Keywords are kept unsorted, exactly as received; the search path looks
/// them up by value, not by position.
#[derive(Debug, Clone)]
pub struct DataObject {
    pub id: u64,
    pub location: Point,
    pub keywords: Vec<String>,
    pub expires_at: u64,
}

impl DataObject {
    /// # Errors
    ///
    /// [`SpatextError::EmptyKeywords`] when no keywords are given.
    pub fn new(
        id: u64,
        location: Point,
        keywords: Vec<String>,
        expires_at: u64,
    ) -> Result<Self> {
        if keywords.is_empty() {
            return Err(SpatextError::EmptyKeywords);
        }
        Ok(Self {
            id,
            location,
            keywords,
            expires_at,
        })
    }
}

/// Transient work item: a query to file at the next finer level, restricted
/// to a narrower spatial range. Produced and consumed within one insertion
/// pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReinsertEntry {
    pub range: Rect,
    pub query: QueryHandle,
}

/// Ownership arena for all standing queries of one index.
#[derive(Debug, Default)]
pub struct QueryArena {
    queries: Vec<Query>,
}

impl QueryArena {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, query: Query) -> QueryHandle {
        let handle = QueryHandle(self.queries.len() as u32);
        self.queries.push(query);
        handle
    }

    pub(crate) fn get(&self, handle: QueryHandle) -> &Query {
        &self.queries[handle.0 as usize]
    }

    pub(crate) fn get_mut(&mut self, handle: QueryHandle) -> &mut Query {
        &mut self.queries[handle.0 as usize]
    }

    pub(crate) fn len(&self) -> usize {
        self.queries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (QueryHandle, &Query)> {
        self.queries
            .iter()
            .enumerate()
            .map(|(i, q)| (QueryHandle(i as u32), q))
    }
}
