//! The continuous spatial-keyword index.
//!
//! [`SpatextIndex`] maintains a large set of standing range and kNN queries
//! over a bounded space and matches each arriving data object against them in
//! one pass. Queries are filed into a pyramid of grid cells, starting at the
//! coarsest level and descending only where keyword lists overflow; each cell
//! keeps a hybrid list/trie keyword index so that objects probe a handful of
//! cells on one vertical path instead of the whole query set.
//!
//! The index is single-writer: insertion, search and cleaning all take
//! `&mut self`. The cell map itself is concurrent so read-side diagnostics
//! can run from other threads, but the matching pipeline is designed to be
//! driven by one stream consumer.

use crate::cell::{CellCoord, Grid, SpatialCell};
use crate::error::{Result, SpatextError};
use crate::frequency::{FrequencyTracker, KeywordFrequency};
use crate::query::{DataObject, KnnQuery, Query, QueryArena, QueryHandle, ReinsertEntry};
use crate::spatial;
use crate::textual::SharedQueryList;
use crate::types::{Config, IndexStats};
use dashmap::DashMap;
use geo::Rect;
use rustc_hash::FxHasher;
use std::fmt::Write as _;
use std::hash::BuildHasherDefault;

type CellMap = DashMap<CellCoord, SpatialCell, BuildHasherDefault<FxHasher>>;

/// A multi-resolution grid index over standing spatial-keyword queries.
pub struct SpatextIndex {
    config: Config,
    grid: Grid,
    cells: CellMap,
    arena: QueryArena,
    frequencies: FrequencyTracker,
    /// Logical clock; ticks once per insert or search call.
    clock: u64,
    min_inserted_level: Option<usize>,
    max_inserted_level: Option<usize>,
    clean_cursor: Option<CellCoord>,
    stats: IndexStats,
}

impl SpatextIndex {
    /// Build an empty index over `bounds`.
    ///
    /// # Errors
    ///
    /// [`SpatextError::InvalidConfig`] when the configuration fails
    /// [`Config::validate`], [`SpatextError::InvalidBounds`] for degenerate
    /// or non-finite bounds.
    pub fn new(bounds: Rect, config: Config) -> Result<Self> {
        config.validate().map_err(SpatextError::InvalidConfig)?;
        if !(bounds.min().x.is_finite()
            && bounds.min().y.is_finite()
            && bounds.max().x.is_finite()
            && bounds.max().y.is_finite())
        {
            return Err(SpatextError::InvalidBounds(
                "bounds must be finite".to_string(),
            ));
        }
        if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
            return Err(SpatextError::InvalidBounds(
                "bounds must have positive width and height".to_string(),
            ));
        }
        let grid = Grid::new(
            bounds,
            config.grid_granularity,
            config.max_level,
            config.degradation_ratio,
        );
        log::info!(
            "spatext index created: granularity {}, {} levels",
            config.grid_granularity,
            grid.max_level() + 1
        );
        Ok(Self {
            config,
            grid,
            cells: CellMap::default(),
            arena: QueryArena::new(),
            frequencies: FrequencyTracker::new(),
            clock: 0,
            min_inserted_level: None,
            max_inserted_level: None,
            clean_cursor: None,
            stats: IndexStats::default(),
        })
    }

    /// Register a standing query and file it into the pyramid.
    ///
    /// Range queries are clamped to the global bounds; kNN queries start at
    /// the root level with an infinite answer radius and migrate down as
    /// objects shrink it.
    ///
    /// # Errors
    ///
    /// [`SpatextError::InvalidBounds`] when a range query does not intersect
    /// the global bounds at all.
    pub fn insert(&mut self, query: Query) -> Result<QueryHandle> {
        self.clock += 1;
        let seed_range = match &query {
            Query::Range(rq) => spatial::intersection(&rq.range, self.grid.bounds())
                .ok_or_else(|| {
                    SpatextError::InvalidBounds(
                        "query range lies outside the index bounds".to_string(),
                    )
                })?,
            // Infinite answer radius: the root cell covers it.
            Query::Knn(_) => *self.grid.bounds(),
        };
        let handle = self.arena.push(query);
        self.stats.record_query();
        let seed = ReinsertEntry {
            range: seed_range,
            query: handle,
        };
        self.file_entries(vec![seed], self.grid.max_level());
        Ok(handle)
    }

    /// Match one streamed object against all standing queries.
    ///
    /// Returns the ids of queries the object is a result for. The object's
    /// cell is probed at every level it could have queries on, walking from
    /// the coarsest populated level down; kNN queries whose answer radius has
    /// shrunk below their level's resolution are re-filed at a finer level
    /// before returning.
    pub fn search(&mut self, object: &DataObject) -> Vec<u64> {
        self.clock += 1;
        self.stats.record_object();
        self.frequencies
            .note_object(object.keywords.iter().map(String::as_str), self.clock);

        let (Some(min_level), Some(max_level)) =
            (self.min_inserted_level, self.max_inserted_level)
        else {
            return Vec::new();
        };
        if !spatial::contains_point(self.grid.bounds(), &object.location) {
            return Vec::new();
        }

        // Duplicate keywords would probe the same entry twice.
        let mut probe: Vec<&str> = Vec::with_capacity(object.keywords.len());
        for keyword in &object.keywords {
            if !probe.contains(&keyword.as_str()) {
                probe.push(keyword.as_str());
            }
        }

        let mut results: Vec<QueryHandle> = Vec::new();
        let mut descents: Vec<QueryHandle> = Vec::new();
        for level in (min_level..=max_level).rev() {
            let (x, y) = self.grid.locate(level, &object.location);
            let coord = self.grid.encode(level, x, y);
            if let Some(cell) = self.cells.get(&coord) {
                // Descent decisions are only taken at the top of the walk;
                // below it a shrunken radius still matches in place.
                let pending = (level == max_level).then_some(&mut descents);
                cell.search(
                    object,
                    &probe,
                    &mut self.arena,
                    &self.grid,
                    self.clock,
                    &mut results,
                    pending,
                    &mut self.stats,
                );
            }
        }

        if !descents.is_empty() {
            // A query flagged for descent is re-filed instead of being
            // reported for this object; it resumes matching from its new
            // level.
            self.stats.record_descents(descents.len());
            self.refile_descended(descents);
        }

        results.iter().map(|h| self.arena.get(*h).id()).collect()
    }

    /// Run one bounded slice of lazy cleanup.
    ///
    /// Visits at most [`Config::cleaning_budget`] keyword entries of one
    /// cell, removing expired queries and stale kNN copies, and remembers
    /// where it stopped. Returns the number of query references reclaimed.
    /// Cells emptied by cleaning are dropped from the pyramid.
    pub fn clean_next_entries(&mut self) -> usize {
        let mut keys: Vec<CellCoord> = self.cells.iter().map(|e| *e.key()).collect();
        if keys.is_empty() {
            self.clean_cursor = None;
            return 0;
        }
        keys.sort_unstable();
        let idx = match self.clean_cursor {
            Some(cursor) => keys.iter().position(|k| *k >= cursor).unwrap_or(0),
            None => 0,
        };
        let coord = keys[idx];

        let mut removed = 0;
        let finished = match self.cells.get_mut(&coord) {
            Some(mut cell) => {
                let finished = cell.clean(
                    &self.arena,
                    self.clock,
                    self.config.merge_threshold,
                    self.config.cleaning_budget,
                    &mut removed,
                );
                let empty = cell.is_empty();
                drop(cell);
                if empty {
                    self.cells.remove(&coord);
                }
                finished
            }
            None => true,
        };

        self.clean_cursor = if finished {
            // Advance to the next cell; None wraps the sweep around.
            keys.get(idx + 1).copied()
        } else {
            Some(coord)
        };
        self.stats.record_cleaned(removed);
        removed
    }

    /// File a batch of entries starting at `start_level`, carrying overflow
    /// down one level at a time. Entries reaching level 0 always stick.
    fn file_entries(&mut self, seed: Vec<ReinsertEntry>, start_level: usize) {
        let mut pending = seed;
        let mut level = start_level as isize;
        while level >= 0 && !pending.is_empty() {
            let lvl = level as usize;
            let at_root = lvl == self.grid.max_level();
            let batch = std::mem::take(&mut pending);
            for entry in batch {
                self.file_entry(entry, lvl, at_root, &mut pending);
            }
            level -= 1;
        }
        debug_assert!(pending.is_empty(), "entries overflowed past level 0");
    }

    /// Replicate one entry over its cell span at `level`.
    fn file_entry(
        &mut self,
        entry: ReinsertEntry,
        level: usize,
        at_root: bool,
        overflow: &mut Vec<ReinsertEntry>,
    ) {
        let pivot = self.frequencies.pick_pivot(
            self.arena.get(entry.query).keywords(),
            at_root,
            self.clock,
        );
        if let Query::Knn(kq) = self.arena.get_mut(entry.query) {
            kq.set_level(level);
        }

        let (x0, y0, x1, y1) = self.grid.span(level, &entry.range);

        // First cell to build a fresh list hands it to its siblings; only
        // range queries use the fast path, a kNN query's footprint is
        // re-checked per cell anyway.
        let sharable = matches!(self.arena.get(entry.query), Query::Range(_));
        let mut shared: Option<SharedQueryList> = None;
        let mut inserted_any = false;
        for y in y0..=y1 {
            for x in x0..=x1 {
                let cell_bounds = self.grid.cell_bounds(level, x, y);
                // Check the real footprint before touching the cell: ranges
                // need shared area, kNN queries need their answer disk to
                // reach the cell.
                let overlap = match self.arena.get(entry.query) {
                    Query::Range(_) => {
                        spatial::intersection(&entry.range, &cell_bounds).is_some()
                    }
                    Query::Knn(kq) => spatial::disk_overlaps_rect(
                        &kq.center,
                        kq.answer_radius(),
                        &cell_bounds,
                    ),
                };
                if !overlap {
                    continue;
                }
                self.stats.record_replicated_insertion();

                let coord = self.grid.encode(level, x, y);
                let mut cell = self
                    .cells
                    .entry(coord)
                    .or_insert_with(|| SpatialCell::new(cell_bounds, coord, level));
                let fresh = cell.insert(
                    &pivot,
                    entry.query,
                    if sharable { shared.as_ref() } else { None },
                    &self.arena,
                    self.config.split_threshold,
                    overflow,
                );
                let became_empty = cell.is_empty();
                drop(cell);
                // A promotion can push every member down and leave the cell
                // hollow.
                if became_empty {
                    self.cells.remove(&coord);
                } else {
                    inserted_any = true;
                }
                if shared.is_none() {
                    shared = fresh;
                }
            }
        }

        if inserted_any {
            self.min_inserted_level = Some(match self.min_inserted_level {
                Some(min) => min.min(level),
                None => level,
            });
            self.max_inserted_level = Some(match self.max_inserted_level {
                Some(max) => max.max(level),
                None => level,
            });
        }
    }

    /// Move kNN queries whose answer radius outgrew their level down to the
    /// level that fits it (or all the way to level 0 when configured). The
    /// copies left behind are reclaimed lazily by cleaning.
    fn refile_descended(&mut self, descents: Vec<QueryHandle>) {
        for handle in descents {
            let target = match self.arena.get(handle) {
                Query::Knn(kq) => {
                    if self.config.push_to_lowest {
                        0
                    } else {
                        self.grid.min_fitting_level(kq.answer_radius())
                    }
                }
                Query::Range(_) => {
                    debug_assert!(false, "range query in kNN descent set");
                    log::error!("range query in kNN descent set; skipping");
                    continue;
                }
            };
            let range = match self.arena.get(handle) {
                Query::Knn(kq) => kq.spatial_box(self.grid.bounds()),
                Query::Range(_) => continue,
            };
            log::debug!(
                "knn query {} descends to level {}",
                self.arena.get(handle).id(),
                target
            );
            let seed = ReinsertEntry {
                range,
                query: handle,
            };
            self.file_entries(vec![seed], target);
        }
    }

    /// Snapshot of the index counters.
    pub fn stats(&self) -> IndexStats {
        let mut stats = self.stats.clone();
        stats.cells = self.cells.len();
        stats
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current logical clock value.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Number of queries ever registered, expired ones included.
    pub fn query_count(&self) -> usize {
        self.arena.len()
    }

    /// Look a registered query back up by its handle.
    pub fn query(&self, handle: QueryHandle) -> &Query {
        self.arena.get(handle)
    }

    /// Observed frequency of one keyword across queries and objects.
    pub fn keyword_frequency(&self, keyword: &str) -> Option<&KeywordFrequency> {
        self.frequencies.get(keyword)
    }

    pub fn frequencies(&self) -> &FrequencyTracker {
        &self.frequencies
    }

    /// All registered kNN queries with their current refinement state,
    /// useful for harnesses snapshotting answer radii and levels.
    pub fn all_knn_queries(&self) -> impl Iterator<Item = &KnnQuery> {
        self.arena.iter().filter_map(|(_, q)| match q {
            Query::Knn(kq) => Some(kq),
            Query::Range(_) => None,
        })
    }

    /// Mean populated-list length across all cells, a load-balance
    /// diagnostic: a high mean means pivots are concentrating queries.
    pub fn average_list_size(&self) -> f64 {
        let mut lists = 0usize;
        let mut queries = 0usize;
        for cell in self.cells.iter() {
            let (l, q) = cell.list_size_sample();
            lists += l;
            queries += q;
        }
        if lists == 0 {
            0.0
        } else {
            queries as f64 / lists as f64
        }
    }

    /// Render the pyramid contents for debugging, trie depth capped at
    /// `max_depth` per cell.
    pub fn dump(&self, max_depth: usize) -> String {
        let mut keys: Vec<CellCoord> = self.cells.iter().map(|e| *e.key()).collect();
        keys.sort_unstable();
        let mut out = String::new();
        for coord in keys {
            if let Some(cell) = self.cells.get(&coord) {
                let _ = writeln!(
                    out,
                    "cell {:#010x} level {} [{}, {}] -> [{}, {}] ({} entries)",
                    cell.coord,
                    cell.level,
                    cell.bounds.min().x,
                    cell.bounds.min().y,
                    cell.bounds.max().x,
                    cell.bounds.max().y,
                    cell.entry_count(),
                );
                cell.render(&self.arena, &mut out, max_depth);
            }
        }
        out
    }
}

impl std::fmt::Debug for SpatextIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatextIndex")
            .field("cells", &self.cells.len())
            .field("queries", &self.arena.len())
            .field("clock", &self.clock)
            .field("min_inserted_level", &self.min_inserted_level)
            .field("max_inserted_level", &self.max_inserted_level)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{KnnQuery, RangeQuery};
    use crate::spatial::rect;
    use geo::Point;

    fn kw(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn index_512() -> SpatextIndex {
        let bounds = rect(0.0, 0.0, 512.0, 512.0).unwrap();
        SpatextIndex::new(bounds, Config::default()).unwrap()
    }

    fn range(id: u64, words: &[&str], r: Rect) -> Query {
        Query::Range(RangeQuery::new(id, kw(words), r, u64::MAX).unwrap())
    }

    fn object(id: u64, x: f64, y: f64, words: &[&str]) -> DataObject {
        DataObject::new(id, Point::new(x, y), kw(words), u64::MAX).unwrap()
    }

    #[test]
    fn test_new_rejects_bad_inputs() {
        let bounds = rect(0.0, 0.0, 512.0, 512.0).unwrap();
        let bad = Config::default().with_granularity(100);
        assert!(matches!(
            SpatextIndex::new(bounds, bad),
            Err(SpatextError::InvalidConfig(_))
        ));

        let flat = Rect::new(
            geo::Coord { x: 0.0, y: 0.0 },
            geo::Coord { x: 10.0, y: 0.0 },
        );
        assert!(matches!(
            SpatextIndex::new(flat, Config::default()),
            Err(SpatextError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_range_query_matches_inside_only() {
        let mut index = index_512();
        let r = rect(100.0, 100.0, 120.0, 120.0).unwrap();
        index.insert(range(1, &["cafe", "wifi"], r)).unwrap();

        // Inside the range, sharing a keyword.
        assert_eq!(index.search(&object(1, 110.0, 110.0, &["wifi"])), vec![1]);
        // Outside the range.
        assert!(index.search(&object(2, 200.0, 200.0, &["wifi"])).is_empty());
        // Inside but no shared keyword.
        assert!(index.search(&object(3, 110.0, 110.0, &["tea"])).is_empty());
    }

    #[test]
    fn test_match_is_gated_by_the_pivot_keyword() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 50.0, 50.0).unwrap();
        // Both keywords are unseen; the pivot lands on the later one.
        index.insert(range(1, &["cafe", "wifi"], r)).unwrap();
        // Carrying the pivot keyword is enough to match.
        assert_eq!(
            index.search(&object(1, 10.0, 10.0, &["wifi", "sushi"])),
            vec![1]
        );
        // An object with only the non-pivot keyword never reaches the entry.
        assert!(index.search(&object(2, 10.0, 10.0, &["cafe"])).is_empty());
    }

    #[test]
    fn test_range_outside_bounds_rejected() {
        let mut index = index_512();
        let outside = rect(600.0, 600.0, 700.0, 700.0).unwrap();
        assert!(matches!(
            index.insert(range(1, &["cafe"], outside)),
            Err(SpatextError::InvalidBounds(_))
        ));
    }

    #[test]
    fn test_expired_queries_stop_matching() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 512.0, 512.0).unwrap();
        index
            .insert(Query::Range(
                RangeQuery::new(1, kw(&["cafe"]), r, 2).unwrap(),
            ))
            .unwrap();

        // Clock is 1 after insert, 2 after this search: still live.
        assert_eq!(index.search(&object(1, 10.0, 10.0, &["cafe"])), vec![1]);
        // Clock 3: past expires_at 2.
        assert!(index.search(&object(2, 10.0, 10.0, &["cafe"])).is_empty());
    }

    #[test]
    fn test_knn_radius_settles_on_kth_distance() {
        let mut index = index_512();
        let q = KnnQuery::new(7, kw(&["cafe"]), Point::new(100.0, 100.0), 3, u64::MAX).unwrap();
        let handle = index.insert(Query::Knn(q)).unwrap();

        // Until k objects arrive every candidate matches.
        assert_eq!(index.search(&object(1, 101.0, 100.0, &["cafe"])), vec![7]);
        assert_eq!(index.search(&object(2, 103.0, 100.0, &["cafe"])), vec![7]);
        match index.query(handle) {
            Query::Knn(kq) => assert!(kq.answer_radius().is_infinite()),
            Query::Range(_) => unreachable!(),
        }

        // The third candidate settles the radius at 5 and pushes the query
        // to a finer level; it is re-filed instead of reported here.
        assert!(index.search(&object(3, 105.0, 100.0, &["cafe"])).is_empty());
        match index.query(handle) {
            Query::Knn(kq) => assert_eq!(kq.answer_radius(), 5.0),
            Query::Range(_) => unreachable!(),
        }

        // Beyond the third-nearest distance: no longer a result.
        assert!(index.search(&object(4, 110.0, 100.0, &["cafe"])).is_empty());
        // Closer than the current radius: evicts the farthest.
        assert_eq!(index.search(&object(5, 102.0, 100.0, &["cafe"])), vec![7]);
        match index.query(handle) {
            Query::Knn(kq) => assert_eq!(kq.answer_radius(), 3.0),
            Query::Range(_) => unreachable!(),
        }
    }

    #[test]
    fn test_knn_descends_when_radius_shrinks() {
        let mut index = index_512();
        let q = KnnQuery::new(7, kw(&["cafe"]), Point::new(100.0, 100.0), 2, u64::MAX).unwrap();
        let handle = index.insert(Query::Knn(q)).unwrap();
        let top = match index.query(handle) {
            Query::Knn(kq) => kq.current_level(),
            Query::Range(_) => unreachable!(),
        };

        index.search(&object(1, 101.0, 100.0, &["cafe"]));
        // The second candidate settles the radius at 1.5 and triggers the
        // descent; this object is not a result.
        assert!(index.search(&object(2, 100.0, 101.5, &["cafe"])).is_empty());
        let after = match index.query(handle) {
            Query::Knn(kq) => kq.current_level(),
            Query::Range(_) => unreachable!(),
        };
        assert!(after < top);
        assert!(index.stats().knn_descents > 0);
        assert_eq!(index.all_knn_queries().count(), 1);

        // Still matched at its new level.
        assert_eq!(index.search(&object(3, 100.5, 100.0, &["cafe"])), vec![7]);
    }

    #[test]
    fn test_descending_knn_is_refiled_not_reported() {
        let mut index = index_512();
        let q = KnnQuery::new(7, kw(&["cafe"]), Point::new(100.0, 100.0), 1, u64::MAX).unwrap();
        index.insert(Query::Knn(q)).unwrap();

        // The very first candidate settles the radius and pushes the query
        // down; it must not be reported for that object.
        assert!(index.search(&object(1, 101.0, 100.0, &["cafe"])).is_empty());
        assert_eq!(index.stats().knn_descents, 1);

        // The re-filed query matches from its new level.
        assert_eq!(index.search(&object(2, 100.5, 100.0, &["cafe"])), vec![7]);
    }

    #[test]
    fn test_knn_is_filed_once_at_the_root() {
        let mut index = index_512();
        let q = KnnQuery::new(7, kw(&["cafe"]), Point::new(100.0, 100.0), 3, u64::MAX).unwrap();
        index.insert(Query::Knn(q)).unwrap();
        // Infinite answer radius, single root cell: exactly one cell holds
        // the query.
        assert_eq!(index.cell_count(), 1);
    }

    #[test]
    fn test_overflow_replicates_across_finer_cells() {
        let mut index = index_512();
        // Three same-pivot queries overflow the root list; none covers the
        // whole space, so they descend and replicate over finer cells.
        let r = rect(0.0, 0.0, 400.0, 400.0).unwrap();
        for id in 1..=3 {
            index.insert(range(id, &["cafe"], r)).unwrap();
        }
        assert!(index.stats().insertions_with_replication > 0);

        for (ox, oy) in [(10.0, 10.0), (390.0, 390.0), (200.0, 10.0)] {
            // Exactly one copy of each query on any vertical path: the ids
            // come back once apiece.
            let mut ids = index.search(&object(1, ox, oy, &["cafe"]));
            ids.sort_unstable();
            assert_eq!(ids, vec![1, 2, 3]);
        }
        assert!(index.search(&object(2, 450.0, 450.0, &["cafe"])).is_empty());
        // The overflow cascade settles where the pieces cover their cells;
        // it must not shed zero-area slivers down to level 0.
        assert!(index.cell_count() < 64, "cells: {}", index.cell_count());
    }

    #[test]
    fn test_cleaning_reclaims_and_drops_cells() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 512.0, 512.0).unwrap();
        index
            .insert(Query::Range(
                RangeQuery::new(1, kw(&["cafe"]), r, 1).unwrap(),
            ))
            .unwrap();
        assert_eq!(index.cell_count(), 1);

        // Push the clock past the expiration.
        index.search(&object(1, 10.0, 10.0, &["tea"]));
        index.search(&object(2, 10.0, 10.0, &["tea"]));

        let mut removed = 0;
        for _ in 0..8 {
            removed += index.clean_next_entries();
        }
        assert_eq!(removed, 1);
        assert_eq!(index.cell_count(), 0);
        assert_eq!(index.stats().cleaned_entries, 1);
    }

    #[test]
    fn test_search_before_any_insert_is_empty() {
        let mut index = index_512();
        assert!(index.search(&object(1, 10.0, 10.0, &["cafe"])).is_empty());
        assert!(index
            .search(&object(2, 600.0, 600.0, &["cafe"]))
            .is_empty());
    }

    #[test]
    fn test_duplicate_object_keywords_match_once() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 50.0, 50.0).unwrap();
        index.insert(range(1, &["cafe"], r)).unwrap();
        let o = object(1, 10.0, 10.0, &["cafe", "cafe", "cafe"]);
        assert_eq!(index.search(&o), vec![1]);
    }

    #[test]
    fn test_frequencies_track_queries_and_objects() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 50.0, 50.0).unwrap();
        index.insert(range(1, &["cafe", "wifi"], r)).unwrap();
        index.search(&object(1, 10.0, 10.0, &["cafe"]));

        let f = index.keyword_frequency("cafe").unwrap();
        assert!(f.query_count >= 1);
        assert_eq!(f.object_count, 1);
        assert!(index.keyword_frequency("sushi").is_none());
    }

    #[test]
    fn test_pivot_prefers_rare_keyword() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 512.0, 512.0).unwrap();
        // Make "cafe" common.
        for id in 0..4 {
            index.insert(range(id, &["cafe"], r)).unwrap();
        }
        // A query with a fresh keyword pivots on it, so an object carrying
        // only "cafe" never reaches it through the rare entry.
        index.insert(range(99, &["cafe", "zebra"], r)).unwrap();
        let ids = index.search(&object(1, 10.0, 10.0, &["zebra"]));
        assert_eq!(ids, vec![99]);
    }

    #[test]
    fn test_dump_lists_cells() {
        let mut index = index_512();
        let r = rect(0.0, 0.0, 50.0, 50.0).unwrap();
        index.insert(range(1, &["cafe"], r)).unwrap();
        let dump = index.dump(4);
        assert!(dump.contains("cafe"));
        assert!(dump.contains("level"));
        assert!(index.average_list_size() >= 1.0);
    }
}
