use serde::{Deserialize, Serialize};

/// Byte-offset span into source text. Start is inclusive, end is exclusive.
///
/// In the location index a `Span` measures columns within a single line;
/// on nodes it records the raw byte extent the external converter saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    /// Create a new span from byte offsets.
    pub fn new(start: u32, end: u32) -> Self {
        debug_assert!(start <= end, "span start ({start}) must be <= end ({end})");
        Self { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Whether the span is empty (zero-length).
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `pos` falls inside the span (half-open).
    pub fn contains(&self, pos: u32) -> bool {
        self.start <= pos && pos < self.end
    }
}

/// A resolved source position attached to an IR node.
///
/// Nodes carry both the raw byte offset and the derived 1-based line plus
/// column span, because the location index is keyed by (line, column-range)
/// while node identity hashes the offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLoc {
    /// Byte offset of the start of the construct.
    pub offset: u32,
    /// 1-based line number.
    pub line: u32,
    /// Column range on that line, 1-based, end exclusive.
    pub columns: Span,
}

impl SourceLoc {
    pub fn new(offset: u32, line: u32, columns: Span) -> Self {
        Self { offset, line, columns }
    }
}

/// Pre-computed index of line start positions for on-demand line/column lookup.
///
/// Constructed once per source file by the converter, then used to stamp
/// [`SourceLoc`]s onto nodes as byte offsets are translated.
#[derive(Debug)]
pub struct LineIndex {
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<u32>,
}

impl LineIndex {
    /// Build a line index by scanning the source text for newline characters.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0u32];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 1-based (line, column) pair.
    ///
    /// Uses binary search on the pre-computed line start positions.
    /// Column is measured in bytes from the start of the line (1-based).
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let line_idx = self.line_starts.partition_point(|&start| start <= offset);
        let line_idx = line_idx.saturating_sub(1);
        let line = (line_idx as u32) + 1;
        let col = offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Build a [`SourceLoc`] for the byte range `[start, end)`.
    pub fn source_loc(&self, start: u32, end: u32) -> SourceLoc {
        let (line, col) = self.line_col(start);
        let width = end.saturating_sub(start);
        SourceLoc::new(start, line, Span::new(col, col + width.max(1)))
    }

    /// Return the number of lines in the source.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_new_and_len() {
        let span = Span::new(5, 10);
        assert_eq!(span.len(), 5);
        assert!(!span.is_empty());
        assert!(span.contains(5));
        assert!(span.contains(9));
        assert!(!span.contains(10));
    }

    #[test]
    fn span_empty() {
        let span = Span::new(3, 3);
        assert!(span.is_empty());
        assert!(!span.contains(3));
    }

    #[test]
    fn line_index_multiple_lines() {
        let src = "hello\nworld\nfoo";
        let idx = LineIndex::new(src);
        assert_eq!(idx.line_col(0), (1, 1));
        assert_eq!(idx.line_col(6), (2, 1));
        assert_eq!(idx.line_col(12), (3, 1));
        assert_eq!(idx.line_col(13), (3, 2));
        assert_eq!(idx.line_count(), 3);
    }

    #[test]
    fn source_loc_from_range() {
        let src = "a = 1\nbb = 22\n";
        let idx = LineIndex::new(src);
        // "bb" starts at offset 6, line 2, columns 1..3
        let loc = idx.source_loc(6, 8);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.columns, Span::new(1, 3));
        assert_eq!(loc.offset, 6);
    }

    #[test]
    fn source_loc_zero_width_gets_one_column() {
        let idx = LineIndex::new("abc");
        let loc = idx.source_loc(1, 1);
        assert_eq!(loc.columns, Span::new(2, 3));
    }
}
