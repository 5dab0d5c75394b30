//! Positions in program text, for reader diagnostics.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Line, column (both from 1) and byte offset of a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number
    pub line: usize,
    /// Column, counted in characters
    pub column: usize,
    /// Byte offset from the start of the text
    pub offset: usize,
}

impl SourceLocation {
    /// Create a location.
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Half-open range `[start, end)` of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// First character
    pub start: SourceLocation,
    /// One past the last character
    pub end: SourceLocation,
}

impl Span {
    /// Span between two locations.
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    /// Empty span at `at`, used for end of input.
    pub fn point(at: SourceLocation) -> Self {
        Self { start: at, end: at }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    /// True when the span covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of columns to underline on the first line, at least one.
    fn width(&self) -> usize {
        if self.end.line == self.start.line {
            self.end.column.saturating_sub(self.start.column).max(1)
        } else {
            1
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}-{}", self.start, self.end.column)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Line index over a text, for quoting the line an error points at.
#[derive(Debug, Clone)]
pub struct SourceMap<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    /// Index the line starts of `source`.
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { source, line_starts }
    }

    /// Text of line `number` (from 1) without its line break.
    pub fn line(&self, number: usize) -> Option<&'a str> {
        let start = *self.line_starts.get(number.checked_sub(1)?)?;
        let end = self.line_starts.get(number).copied().unwrap_or(self.source.len());
        Some(self.source[start..end].trim_end_matches(['\n', '\r']))
    }

    /// The first line of `span` with carets under the span.
    pub fn excerpt(&self, span: &Span) -> Option<String> {
        let text = self.line(span.start.line)?;
        let pad = " ".repeat(span.start.column.saturating_sub(1));
        Some(format!("{:>4} | {}\n     | {}{}", span.start.line, text, pad, "^".repeat(span.width())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(line: usize, from: usize, to_line: usize, to: usize) -> Span {
        Span::new(SourceLocation::new(line, from, 0), SourceLocation::new(to_line, to, 0))
    }

    #[test]
    fn test_span_display() {
        assert_eq!(span(1, 5, 1, 10).to_string(), "1:5-10");
        assert_eq!(span(1, 5, 3, 10).to_string(), "1:5-3:10");
    }

    #[test]
    fn test_excerpt() {
        let map = SourceMap::new("c\n1 3\n2 1 0\n");
        assert_eq!(map.line(3), Some("2 1 0"));
        assert_eq!(map.line(0), None);
        assert_eq!(map.line(9), None);
        assert_eq!(map.excerpt(&span(3, 1, 3, 2)).unwrap(), "   3 | 2 1 0\n     | ^");
        assert_eq!(map.excerpt(&span(2, 3, 2, 4)).unwrap(), "   2 | 1 3\n     |   ^");
    }
}
