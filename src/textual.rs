//! Per-cell hybrid list/trie keyword index.
//!
//! Each spatial cell maps a pivot keyword to a [`TextualNode`]: a single
//! query, a flat query list, or a trie node once the list outgrows the split
//! threshold. Promotion re-files queries by their next keyword in sorted
//! order, so queries sharing keyword prefixes share trie paths and one probe
//! amortizes their matching cost.
//!
//! List nodes are reference counted: when one range query is replicated into
//! several sibling cells at the same level, the first cell builds the list
//! and the remaining cells install the same handle instead of rebuilding it.

use crate::cell::Grid;
use crate::query::{next_keyword, DataObject, Query, QueryArena, QueryHandle, ReinsertEntry};
use crate::spatial;
use crate::types::IndexStats;
use geo::Rect;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

/// Query list shared across sibling cells by the fast-path insert.
pub(crate) type SharedQueryList = Arc<RwLock<Vec<QueryHandle>>>;

/// Node of a cell's textual index.
#[derive(Debug)]
pub(crate) enum TextualNode {
    /// Degenerate single-query case (used inside trie sub-maps).
    Single(QueryHandle),
    /// Unordered queries sharing the keyword path up to this node.
    List(SharedQueryList),
    /// Promoted node: queries terminating here plus a sub-map keyed by the
    /// next keyword in sorted order.
    Trie(TrieNode),
}

#[derive(Debug, Default)]
pub(crate) struct TrieNode {
    terminal: Vec<QueryHandle>,
    children: BTreeMap<String, TextualNode>,
}

impl TrieNode {
    fn is_empty(&self) -> bool {
        self.terminal.is_empty() && self.children.is_empty()
    }

    fn total_size(&self) -> usize {
        self.terminal.len()
            + self
                .children
                .values()
                .map(|child| match child {
                    TextualNode::Single(_) => 1,
                    TextualNode::List(list) => list.read().len(),
                    TextualNode::Trie(t) => t.total_size(),
                })
                .sum::<usize>()
    }

    fn collect_into(&self, out: &mut Vec<QueryHandle>) {
        out.extend_from_slice(&self.terminal);
        for child in self.children.values() {
            match child {
                TextualNode::Single(h) => out.push(*h),
                TextualNode::List(list) => out.extend_from_slice(&list.read()),
                TextualNode::Trie(t) => t.collect_into(out),
            }
        }
    }
}

/// Parameters of one textual insertion, fixed per cell.
pub(crate) struct InsertCtx<'a> {
    pub arena: &'a QueryArena,
    pub cell_bounds: Rect,
    pub level: usize,
    pub split_threshold: usize,
}

/// Parameters of one object probe, fixed per cell.
pub(crate) struct SearchCtx<'a> {
    pub clock: u64,
    pub cell_level: usize,
    pub grid: &'a Grid,
}

/// The per-cell keyword index. An empty index means the owning cell is
/// logically dead and gets removed from the pyramid map.
#[derive(Debug, Default)]
pub(crate) struct TextualIndex {
    entries: BTreeMap<String, TextualNode>,
}

impl TextualIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// File `handle` under `pivot`.
    ///
    /// When `shared` is given and the slot is empty, the already-built list
    /// is installed as-is. The return value is a shareable handle to a list
    /// that was freshly created for exactly this query; lists that already
    /// held other queries are never shared, so the fast path cannot alias
    /// unrelated queries into a sibling cell. An append through one copy of
    /// a shared list is visible in every copy, so filing a query into a list
    /// that already contains it is a no-op.
    ///
    /// Queries that make a list overflow at a level above the finest are not
    /// forced into the trie when their range only partially covers the cell:
    /// they come back out as [`ReinsertEntry`]s for the next finer level.
    pub(crate) fn insert(
        &mut self,
        pivot: &str,
        handle: QueryHandle,
        shared: Option<&SharedQueryList>,
        ctx: &InsertCtx<'_>,
        reinserts: &mut Vec<ReinsertEntry>,
    ) -> Option<SharedQueryList> {
        enum Slot {
            Empty,
            Single(QueryHandle),
            List(SharedQueryList),
            Trie,
        }

        let slot = match self.entries.get(pivot) {
            None => Slot::Empty,
            Some(TextualNode::Single(h)) => Slot::Single(*h),
            Some(TextualNode::List(list)) => Slot::List(list.clone()),
            Some(TextualNode::Trie(_)) => Slot::Trie,
        };

        match slot {
            Slot::Empty => {
                if let Some(list) = shared {
                    self.entries
                        .insert(pivot.to_string(), TextualNode::List(list.clone()));
                    None
                } else {
                    let list: SharedQueryList = Arc::new(RwLock::new(vec![handle]));
                    self.entries
                        .insert(pivot.to_string(), TextualNode::List(list.clone()));
                    Some(list)
                }
            }
            Slot::Single(existing) => {
                if existing == handle {
                    return None;
                }
                self.entries.insert(
                    pivot.to_string(),
                    TextualNode::List(Arc::new(RwLock::new(vec![existing, handle]))),
                );
                None
            }
            Slot::List(list) => {
                // A list shared with a sibling cell may already hold this
                // query: an append through any cell mutates every copy.
                if list.read().contains(&handle) {
                    return None;
                }
                if list.read().len() < ctx.split_threshold {
                    list.write().push(handle);
                    return None;
                }
                // Past the split threshold: promote into a trie, re-filing
                // each query by its next keyword after the pivot. Members of
                // the old list stay visible through any sibling cells that
                // still share it.
                let members: Vec<QueryHandle> = list.read().clone();
                let mut trie = TrieNode::default();
                for member in members.into_iter().chain(std::iter::once(handle)) {
                    if let Some(entry) = overflow_entry(member, ctx) {
                        reinserts.push(entry);
                        continue;
                    }
                    file_in_trie(&mut trie, pivot, member, ctx);
                }
                if trie.is_empty() {
                    self.entries.remove(pivot);
                } else {
                    self.entries
                        .insert(pivot.to_string(), TextualNode::Trie(trie));
                }
                None
            }
            Slot::Trie => {
                if let Some(entry) = overflow_entry(handle, ctx) {
                    reinserts.push(entry);
                    return None;
                }
                if let Some(TextualNode::Trie(trie)) = self.entries.get_mut(pivot) {
                    file_in_trie(trie, pivot, handle, ctx);
                }
                None
            }
        }
    }

    /// Probe the index with an object's keyword list.
    ///
    /// Matches are appended to `results`. When `pending_descents` is given
    /// (top search level only), kNN matches whose shrunken radius demands a
    /// finer level are recorded there instead of being emitted.
    pub(crate) fn search(
        &self,
        object: &DataObject,
        probe_keywords: &[&str],
        arena: &mut QueryArena,
        ctx: &SearchCtx<'_>,
        results: &mut Vec<QueryHandle>,
        mut pending_descents: Option<&mut Vec<QueryHandle>>,
        stats: &mut IndexStats,
    ) {
        for keyword in probe_keywords {
            if let Some(node) = self.entries.get(*keyword) {
                visit(
                    node,
                    object,
                    probe_keywords,
                    arena,
                    ctx,
                    results,
                    pending_descents.as_deref_mut(),
                    stats,
                );
            }
        }
    }

    /// Remove expired queries and stale kNN copies, visiting at most
    /// `budget` top-level entries per call and resuming from `cursor`.
    ///
    /// Returns `true` once the whole index has been swept; the caller checks
    /// [`is_empty`](Self::is_empty) afterwards to decide whether the owning
    /// cell should die.
    pub(crate) fn clean(
        &mut self,
        arena: &QueryArena,
        clock: u64,
        cell_level: usize,
        merge_threshold: usize,
        budget: usize,
        cursor: &mut Option<String>,
        removed: &mut usize,
    ) -> bool {
        let keys: Vec<String> = match cursor {
            Some(last) => self
                .entries
                .range::<str, _>((
                    std::ops::Bound::Excluded(last.as_str()),
                    std::ops::Bound::Unbounded,
                ))
                .take(budget)
                .map(|(k, _)| k.clone())
                .collect(),
            None => self.entries.keys().take(budget).cloned().collect(),
        };

        for key in &keys {
            if let Some(node) = self.entries.get_mut(key) {
                if !clean_node(node, arena, clock, cell_level, merge_threshold, removed) {
                    self.entries.remove(key);
                }
            }
        }

        match keys.last() {
            Some(last) if keys.len() == budget => {
                let remaining = self
                    .entries
                    .range::<str, _>((
                        std::ops::Bound::Excluded(last.as_str()),
                        std::ops::Bound::Unbounded,
                    ))
                    .next()
                    .is_some();
                if remaining {
                    *cursor = Some(last.clone());
                    false
                } else {
                    *cursor = None;
                    true
                }
            }
            _ => {
                *cursor = None;
                true
            }
        }
    }

    /// Count of populated list entries and total queries across them, used
    /// for the average-list-size diagnostic.
    pub(crate) fn list_size_sample(&self) -> (usize, usize) {
        let mut lists = 0;
        let mut queries = 0;
        for node in self.entries.values() {
            match node {
                TextualNode::Single(_) => {}
                TextualNode::List(list) => {
                    let len = list.read().len();
                    if len > 0 {
                        lists += 1;
                        queries += len;
                    }
                }
                TextualNode::Trie(trie) => {
                    if !trie.terminal.is_empty() {
                        lists += 1;
                        queries += trie.terminal.len();
                    }
                }
            }
        }
        (lists, queries)
    }

    /// Render the keyword entries of this cell, depth-limited.
    pub(crate) fn render(&self, arena: &QueryArena, out: &mut String, max_depth: usize) {
        for (keyword, node) in &self.entries {
            render_node(keyword, node, arena, out, 1, max_depth);
        }
    }
}

/// Decide whether a query overflows out of this cell instead of joining the
/// trie: only range queries descend, and only when the cell is above the
/// finest level and the query's range does not fully cover the cell.
fn overflow_entry(handle: QueryHandle, ctx: &InsertCtx<'_>) -> Option<ReinsertEntry> {
    if ctx.level == 0 {
        return None;
    }
    match ctx.arena.get(handle) {
        Query::Range(rq) => {
            if spatial::covers(&rq.range, &ctx.cell_bounds) {
                None
            } else {
                let range = spatial::intersection(&rq.range, &ctx.cell_bounds)?;
                Some(ReinsertEntry {
                    range,
                    query: handle,
                })
            }
        }
        Query::Knn(_) => None,
    }
}

/// File a query inside a trie node, following its sorted keywords after
/// `after`. Queries with no further keyword terminate at this node.
fn file_in_trie(trie: &mut TrieNode, after: &str, handle: QueryHandle, ctx: &InsertCtx<'_>) {
    let keywords = ctx.arena.get(handle).keywords();
    match next_keyword(keywords, after) {
        None => {
            // A query must never appear twice in one node.
            if !trie.terminal.contains(&handle) {
                trie.terminal.push(handle);
            }
        }
        Some(kw) => {
            let kw = kw.to_string();
            insert_child(trie, &kw, handle, ctx);
        }
    }
}

fn insert_child(trie: &mut TrieNode, keyword: &str, handle: QueryHandle, ctx: &InsertCtx<'_>) {
    enum Slot {
        Empty,
        Single(QueryHandle),
        List(SharedQueryList),
        Trie,
    }

    let slot = match trie.children.get(keyword) {
        None => Slot::Empty,
        Some(TextualNode::Single(h)) => Slot::Single(*h),
        Some(TextualNode::List(list)) => Slot::List(list.clone()),
        Some(TextualNode::Trie(_)) => Slot::Trie,
    };

    match slot {
        Slot::Empty => {
            trie.children
                .insert(keyword.to_string(), TextualNode::Single(handle));
        }
        Slot::Single(existing) => {
            if existing == handle {
                return;
            }
            trie.children.insert(
                keyword.to_string(),
                TextualNode::List(Arc::new(RwLock::new(vec![existing, handle]))),
            );
        }
        Slot::List(list) => {
            if list.read().contains(&handle) {
                return;
            }
            if list.read().len() < ctx.split_threshold {
                list.write().push(handle);
                return;
            }
            let members: Vec<QueryHandle> = list.read().clone();
            let mut sub = TrieNode::default();
            for member in members.into_iter().chain(std::iter::once(handle)) {
                file_in_trie(&mut sub, keyword, member, ctx);
            }
            trie.children
                .insert(keyword.to_string(), TextualNode::Trie(sub));
        }
        Slot::Trie => {
            if let Some(TextualNode::Trie(sub)) = trie.children.get_mut(keyword) {
                file_in_trie(sub, keyword, handle, ctx);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn visit(
    node: &TextualNode,
    object: &DataObject,
    probe_keywords: &[&str],
    arena: &mut QueryArena,
    ctx: &SearchCtx<'_>,
    results: &mut Vec<QueryHandle>,
    mut pending_descents: Option<&mut Vec<QueryHandle>>,
    stats: &mut IndexStats,
) {
    match node {
        TextualNode::Single(handle) => {
            stats.list_node_visits += 1;
            emit(*handle, object, arena, ctx, results, pending_descents);
        }
        TextualNode::List(list) => {
            stats.list_node_visits += 1;
            for handle in list.read().iter() {
                emit(
                    *handle,
                    object,
                    arena,
                    ctx,
                    results,
                    pending_descents.as_deref_mut(),
                );
            }
        }
        TextualNode::Trie(trie) => {
            stats.trie_node_visits += 1;
            for handle in &trie.terminal {
                emit(
                    *handle,
                    object,
                    arena,
                    ctx,
                    results,
                    pending_descents.as_deref_mut(),
                );
            }
            // Recurse only into children whose keyword the object carries.
            for keyword in probe_keywords {
                if let Some(child) = trie.children.get(*keyword) {
                    visit(
                        child,
                        object,
                        probe_keywords,
                        arena,
                        ctx,
                        results,
                        pending_descents.as_deref_mut(),
                        stats,
                    );
                }
            }
        }
    }
}

/// Keyword reachability is established by the node path; the spatial
/// predicate is checked here, at emission time.
fn emit(
    handle: QueryHandle,
    object: &DataObject,
    arena: &mut QueryArena,
    ctx: &SearchCtx<'_>,
    results: &mut Vec<QueryHandle>,
    pending_descents: Option<&mut Vec<QueryHandle>>,
) {
    let query = arena.get_mut(handle);
    if query.is_expired(ctx.clock) {
        return;
    }
    match query {
        Query::Range(rq) => {
            if spatial::contains_point(&rq.range, &object.location) {
                results.push(handle);
            }
        }
        Query::Knn(kq) => {
            // Copies left behind by a descent are skipped until cleaning
            // reclaims them.
            if kq.current_level() != ctx.cell_level {
                return;
            }
            let dist = spatial::distance(&kq.center, &object.location);
            if kq.offer(dist) {
                match pending_descents {
                    Some(pending) if ctx.grid.should_descend(kq) => pending.push(handle),
                    _ => results.push(handle),
                }
            }
        }
    }
}

/// Remove expired queries and stale kNN copies from a node; returns `false`
/// when the node became empty and should be dropped by its parent.
fn clean_node(
    node: &mut TextualNode,
    arena: &QueryArena,
    clock: u64,
    cell_level: usize,
    merge_threshold: usize,
    removed: &mut usize,
) -> bool {
    let reclaimable = |handle: QueryHandle| -> bool {
        let query = arena.get(handle);
        query.is_expired(clock)
            || matches!(query, Query::Knn(kq) if kq.current_level() != cell_level)
    };

    match node {
        TextualNode::Single(handle) => {
            if reclaimable(*handle) {
                *removed += 1;
                false
            } else {
                true
            }
        }
        TextualNode::List(list) => {
            let mut guard = list.write();
            let before = guard.len();
            guard.retain(|h| !reclaimable(*h));
            *removed += before - guard.len();
            !guard.is_empty()
        }
        TextualNode::Trie(trie) => {
            let before = trie.terminal.len();
            trie.terminal.retain(|h| !reclaimable(*h));
            *removed += before - trie.terminal.len();
            trie.children.retain(|_, child| {
                clean_node(child, arena, clock, cell_level, merge_threshold, removed)
            });
            if trie.is_empty() {
                return false;
            }
            // Shrunken tries degrade back into flat lists.
            if trie.total_size() <= merge_threshold {
                let mut handles = Vec::new();
                trie.collect_into(&mut handles);
                *node = TextualNode::List(Arc::new(RwLock::new(handles)));
            }
            true
        }
    }
}

fn render_node(
    keyword: &str,
    node: &TextualNode,
    arena: &QueryArena,
    out: &mut String,
    depth: usize,
    max_depth: usize,
) {
    if depth > max_depth {
        return;
    }
    let _ = write!(out, "|{}{} -> ", "──".repeat(depth), keyword);
    match node {
        TextualNode::Single(handle) => {
            let _ = writeln!(out, "{}", arena.get(*handle).id());
        }
        TextualNode::List(list) => {
            let ids: Vec<String> = list
                .read()
                .iter()
                .map(|h| arena.get(*h).id().to_string())
                .collect();
            let _ = writeln!(out, "[{}]", ids.join(", "));
        }
        TextualNode::Trie(trie) => {
            let ids: Vec<String> = trie
                .terminal
                .iter()
                .map(|h| arena.get(*h).id().to_string())
                .collect();
            let _ = writeln!(out, "[{}]", ids.join(", "));
            for (kw, child) in &trie.children {
                render_node(kw, child, arena, out, depth + 1, max_depth);
            }
        }
    }
}
