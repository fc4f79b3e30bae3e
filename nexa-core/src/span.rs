//! Source locations.

use std::fmt;

/// A region of the source text.
///
/// `start` / `end` are byte offsets; `line` / `column` are the 1-based
/// position of `start`, kept alongside so diagnostics never have to
/// re-scan the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(start: u32, end: u32, line: u32, column: u32) -> Self {
        Span {
            start,
            end,
            line,
            column,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let first = if other.start < self.start { other } else { self };
        Span {
            end: self.end.max(other.end),
            ..first
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}
