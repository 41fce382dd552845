//! Pyramid grid arithmetic and the spatial cell.
//!
//! The pyramid partitions the global bounds at every level: level 0 is the
//! full `granularity x granularity` grid, each level above halves the
//! resolution, and the top level is a single cell spanning the whole space.
//! A cell is addressed by one encoded key, `(level << 22) | (y * g + x)`
//! where `g` is the granularity at that level; [`Config::validate`] caps the
//! granularity at 2048 so the per-level offsets stay below `2^22` and keys
//! from different levels can never collide.
//!
//! [`Config::validate`]: crate::Config::validate

use crate::query::{DataObject, KnnQuery, QueryArena, QueryHandle, ReinsertEntry};
use crate::textual::{InsertCtx, SearchCtx, SharedQueryList, TextualIndex};
use crate::types::IndexStats;
use geo::{Coord, Point, Rect};

/// Encoded cell key: level in the high bits, row-major cell index below.
pub type CellCoord = u32;

const LEVEL_SHIFT: u32 = 22;

/// Immutable grid parameters shared by insertion, search and kNN descent.
#[derive(Debug, Clone)]
pub(crate) struct Grid {
    bounds: Rect,
    granularity: usize,
    max_level: usize,
    degradation_ratio: f64,
}

impl Grid {
    pub(crate) fn new(
        bounds: Rect,
        granularity: usize,
        max_level: usize,
        degradation_ratio: f64,
    ) -> Self {
        // The top level must be a single cell spanning the whole space.
        let max_level = max_level.min(granularity.trailing_zeros() as usize);
        Self {
            bounds,
            granularity,
            max_level,
            degradation_ratio,
        }
    }

    pub(crate) fn bounds(&self) -> &Rect {
        &self.bounds
    }

    pub(crate) fn max_level(&self) -> usize {
        self.max_level
    }

    /// Cells per axis at `level`.
    pub(crate) fn granularity_at(&self, level: usize) -> usize {
        (self.granularity >> level).max(1)
    }

    /// Cell width at `level`.
    pub(crate) fn step_x(&self, level: usize) -> f64 {
        self.bounds.width() / self.granularity_at(level) as f64
    }

    /// Cell height at `level`.
    pub(crate) fn step_y(&self, level: usize) -> f64 {
        self.bounds.height() / self.granularity_at(level) as f64
    }

    pub(crate) fn encode(&self, level: usize, x: usize, y: usize) -> CellCoord {
        let g = self.granularity_at(level);
        debug_assert!(x < g && y < g, "cell index out of range");
        ((level as CellCoord) << LEVEL_SHIFT) | (y * g + x) as CellCoord
    }

    /// Geometric bounds of cell `(x, y)` at `level`.
    pub(crate) fn cell_bounds(&self, level: usize, x: usize, y: usize) -> Rect {
        let sx = self.step_x(level);
        let sy = self.step_y(level);
        let min_x = self.bounds.min().x + x as f64 * sx;
        let min_y = self.bounds.min().y + y as f64 * sy;
        Rect::new(
            Coord { x: min_x, y: min_y },
            Coord {
                x: min_x + sx,
                y: min_y + sy,
            },
        )
    }

    /// Map a point to its cell index at `level`.
    ///
    /// Floor division attributes a boundary coordinate to the cell starting
    /// there; points on the global maximum edge clamp into the last cell so
    /// that insertion and search agree there.
    pub(crate) fn locate(&self, level: usize, point: &Point) -> (usize, usize) {
        let g = self.granularity_at(level);
        let x = ((point.x() - self.bounds.min().x) / self.step_x(level)) as isize;
        let y = ((point.y() - self.bounds.min().y) / self.step_y(level)) as isize;
        (
            x.clamp(0, g as isize - 1) as usize,
            y.clamp(0, g as isize - 1) as usize,
        )
    }

    /// Cell-index span of a rectangle at `level`, clamped to the grid.
    ///
    /// The upper bound is exclusive at exact cell boundaries: a rectangle
    /// whose maximum edge sits on a boundary does not span into the cell
    /// starting there. Without this a query would be filed (and re-filed,
    /// level after level) into cells it only touches with a zero-area strip.
    pub(crate) fn span(&self, level: usize, range: &Rect) -> (usize, usize, usize, usize) {
        let (min_x, min_y) = self.locate(level, &Point::new(range.min().x, range.min().y));
        let max_x = self.upper_index(range.max().x - self.bounds.min().x, self.step_x(level), level);
        let max_y = self.upper_index(range.max().y - self.bounds.min().y, self.step_y(level), level);
        (min_x, min_y, max_x.max(min_x), max_y.max(min_y))
    }

    fn upper_index(&self, offset: f64, step: f64, level: usize) -> usize {
        let g = self.granularity_at(level);
        let mut idx = (offset / step) as isize;
        if idx as f64 * step == offset {
            idx -= 1;
        }
        idx.clamp(0, g as isize - 1) as usize
    }

    /// Finest level whose cells still cover the scaled answer disk.
    pub(crate) fn min_fitting_level(&self, answer_radius: f64) -> usize {
        let target = answer_radius * self.degradation_ratio;
        (0..=self.max_level)
            .find(|level| self.step_x(*level) >= target)
            .unwrap_or(self.max_level)
    }

    /// Whether a kNN query's radius has shrunk enough to push it to a finer
    /// level.
    pub(crate) fn should_descend(&self, query: &KnnQuery) -> bool {
        query.answer_radius().is_finite()
            && query.current_level() > 0
            && self.min_fitting_level(query.answer_radius()) < query.current_level()
    }

    #[cfg(test)]
    pub(crate) fn test_grid() -> Self {
        let bounds = Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 512.0, y: 512.0 });
        Self::new(bounds, 512, 9, 2.0)
    }
}

/// One cell of the pyramid: its bounds, level, key and keyword index.
#[derive(Debug)]
pub(crate) struct SpatialCell {
    pub(crate) bounds: Rect,
    pub(crate) level: usize,
    pub(crate) coord: CellCoord,
    textual: TextualIndex,
    clean_cursor: Option<String>,
}

impl SpatialCell {
    pub(crate) fn new(bounds: Rect, coord: CellCoord, level: usize) -> Self {
        Self {
            bounds,
            level,
            coord,
            textual: TextualIndex::new(),
            clean_cursor: None,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.textual.is_empty()
    }

    /// File a query in this cell's keyword index. The caller has already
    /// verified that the query spatially overlaps this cell.
    pub(crate) fn insert(
        &mut self,
        pivot: &str,
        handle: QueryHandle,
        shared: Option<&SharedQueryList>,
        arena: &QueryArena,
        split_threshold: usize,
        reinserts: &mut Vec<ReinsertEntry>,
    ) -> Option<SharedQueryList> {
        let ctx = InsertCtx {
            arena,
            cell_bounds: self.bounds,
            level: self.level,
            split_threshold,
        };
        self.textual.insert(pivot, handle, shared, &ctx, reinserts)
    }

    /// Probe this cell for queries matching the object.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn search(
        &self,
        object: &DataObject,
        probe_keywords: &[&str],
        arena: &mut QueryArena,
        grid: &Grid,
        clock: u64,
        results: &mut Vec<QueryHandle>,
        pending_descents: Option<&mut Vec<QueryHandle>>,
        stats: &mut IndexStats,
    ) {
        let ctx = SearchCtx {
            clock,
            cell_level: self.level,
            grid,
        };
        self.textual.search(
            object,
            probe_keywords,
            arena,
            &ctx,
            results,
            pending_descents,
            stats,
        );
    }

    /// One bounded cleaning slice over this cell. Returns `true` when the
    /// sweep over the whole cell has completed.
    pub(crate) fn clean(
        &mut self,
        arena: &QueryArena,
        clock: u64,
        merge_threshold: usize,
        budget: usize,
        removed: &mut usize,
    ) -> bool {
        self.textual.clean(
            arena,
            clock,
            self.level,
            merge_threshold,
            budget,
            &mut self.clean_cursor,
            removed,
        )
    }

    pub(crate) fn list_size_sample(&self) -> (usize, usize) {
        self.textual.list_size_sample()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.textual.entry_count()
    }

    pub(crate) fn render(&self, arena: &QueryArena, out: &mut String, max_depth: usize) {
        self.textual.render(arena, out, max_depth);
    }
}
