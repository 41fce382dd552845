//! Keyword frequency tracking and pivot selection.
//!
//! Every query is filed in a cell's textual index under a single "pivot"
//! keyword. Picking the least frequent keyword of the set keeps fan-out at
//! each trie node low and node sizes balanced. Frequencies are owned by the
//! index instance (reset on construction) and entries are never deleted, so
//! the table is bounded by vocabulary size rather than query count.

use crate::query::KeywordSet;
use rustc_hash::FxHashMap;

/// Per-keyword observation counts.
#[derive(Debug, Clone, Copy)]
pub struct KeywordFrequency {
    /// Queries filed with this keyword in their set, counted once per
    /// logical query (only at the root insertion level, not per replica).
    pub query_count: u32,
    /// Data objects seen carrying this keyword.
    pub object_count: u32,
    /// Logical timestamp of the last update.
    pub last_seen: u64,
}

#[derive(Debug, Default)]
pub struct FrequencyTracker {
    map: FxHashMap<String, KeywordFrequency>,
}

impl FrequencyTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Pick the pivot keyword for a query: the one with the lowest observed
    /// query count, ties broken by first-seen order within the set.
    ///
    /// Counts are bumped only when `at_root` is set, i.e. once per logical
    /// query rather than once per replicated cell, so replication cannot
    /// skew the heuristic.
    pub(crate) fn pick_pivot(&mut self, keywords: &KeywordSet, at_root: bool, clock: u64) -> String {
        let mut pivot: Option<&str> = None;
        let mut min_count = u32::MAX;
        for keyword in keywords {
            match self.map.get_mut(keyword.as_str()) {
                None => {
                    self.map.insert(
                        keyword.clone(),
                        KeywordFrequency {
                            query_count: 1,
                            object_count: 0,
                            last_seen: clock,
                        },
                    );
                    // A never-seen keyword is the rarest possible choice.
                    pivot = Some(keyword);
                    min_count = 0;
                }
                Some(stats) => {
                    if at_root {
                        stats.query_count += 1;
                        stats.last_seen = clock;
                    }
                    if stats.query_count < min_count {
                        min_count = stats.query_count;
                        pivot = Some(keyword);
                    }
                }
            }
        }
        pivot.expect("pivot selection requires a non-empty keyword set").to_string()
    }

    /// Record one data object's keywords.
    pub(crate) fn note_object<'a>(&mut self, keywords: impl Iterator<Item = &'a str>, clock: u64) {
        for keyword in keywords {
            match self.map.get_mut(keyword) {
                Some(stats) => {
                    stats.object_count += 1;
                    stats.last_seen = clock;
                }
                None => {
                    self.map.insert(
                        keyword.to_string(),
                        KeywordFrequency {
                            query_count: 0,
                            object_count: 1,
                            last_seen: clock,
                        },
                    );
                }
            }
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&KeywordFrequency> {
        self.map.get(keyword)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &KeywordFrequency)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
