//! The location index: (file, line, column-range) -> node key.
//!
//! Built incrementally while the converter processes files, finalized
//! (sorted) once before queries, and searched with binary search per line.
//! Overlapping ranges are disambiguated toward the smallest enclosing range,
//! with assignment nodes preferred over reads at identical positions.

use rustc_hash::FxHashMap;

use mallard_common::Span;

use crate::node::{Node, NodeKey};

#[derive(Debug, Clone)]
struct Entry {
    line: u32,
    columns: Span,
    key: NodeKey,
    assignment: bool,
}

#[derive(Debug, Default)]
pub struct LocationIndex {
    files: FxHashMap<String, Vec<Entry>>,
    finalized: bool,
}

impl LocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node under its carried location. Nodes without a location
    /// are skipped.
    pub fn add(&mut self, file: &str, node: &Node) {
        let Some(loc) = node.loc else { return };
        self.files.entry(file.to_string()).or_default().push(Entry {
            line: loc.line,
            columns: loc.columns,
            key: node.key(),
            assignment: node.is_assignment(),
        });
        self.finalized = false;
    }

    /// Sort all per-file entries by (line, column start), enabling binary
    /// search. Must be called after indexing and before queries.
    pub fn finalize(&mut self) {
        for entries in self.files.values_mut() {
            entries.sort_by_key(|e| (e.line, e.columns.start));
        }
        self.finalized = true;
    }

    pub fn has_file(&self, file: &str) -> bool {
        self.files.contains_key(file)
    }

    /// Find the node at a 1-based (line, column) position.
    ///
    /// With a file the search is restricted to it; with `None` every indexed
    /// file is searched and the best candidate overall wins. Selection is
    /// smallest enclosing column range first, assignment-over-read on ties.
    pub fn find(&self, file: Option<&str>, line: u32, column: u32) -> Option<&NodeKey> {
        debug_assert!(self.finalized, "location index queried before finalize()");
        let candidates: Box<dyn Iterator<Item = &Entry>> = match file {
            Some(file) => Box::new(
                self.files
                    .get(file)
                    .into_iter()
                    .flat_map(|entries| Self::line_slice(entries, line)),
            ),
            None => Box::new(
                self.files
                    .values()
                    .flat_map(|entries| Self::line_slice(entries, line)),
            ),
        };
        candidates
            .filter(|e| e.columns.contains(column))
            .min_by_key(|e| (e.columns.len(), !e.assignment))
            .map(|e| &e.key)
    }

    /// Binary-search the sorted entries down to the single matching line.
    fn line_slice(entries: &[Entry], line: u32) -> &[Entry] {
        let start = entries.partition_point(|e| e.line < line);
        let end = entries.partition_point(|e| e.line <= line);
        &entries[start..end]
    }

    /// Drop all entries for a file in O(entries-in-file).
    pub fn remove_file(&mut self, file: &str) {
        self.files.remove(file);
    }
}
