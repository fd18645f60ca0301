use super::Span;

/// Where a span lands in its source, ready for a caret line.
///
/// `col` and `width` count chars rather than bytes, so carets stay under
/// the right text when a line holds multi-byte string literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, in chars.
    pub col: usize,
    /// The whole line, without its line ending.
    pub text: &'a str,
    /// Chars the span covers on this line; at least 1.
    pub width: usize,
}

/// Line index over one source text.
pub struct SourceMap<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceMap<'a> {
    pub fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        SourceMap { source, line_starts }
    }

    /// Locate `span`. Offsets past the end clamp to the end, and a span
    /// running onto later lines is cut at the end of its first line.
    pub fn locate(&self, span: Span) -> Location<'a> {
        let start = self.char_floor(span.start);
        let line = self.line_starts.partition_point(|&s| s <= start);
        let line_start = self.line_starts[line - 1];
        let text = self.line(line);

        let end = self.char_floor(span.end.min(line_start + text.len())).max(start);
        Location {
            line,
            col: self.source[line_start..start].chars().count() + 1,
            text,
            width: self.source[start..end].chars().count().max(1),
        }
    }

    /// Text of the 1-based `line`, or `""` when there is no such line.
    pub fn line(&self, line: usize) -> &'a str {
        let Some(&start) = line.checked_sub(1).and_then(|i| self.line_starts.get(i)) else {
            return "";
        };
        let end = self.line_starts.get(line).copied().unwrap_or(self.source.len());
        self.source[start..end].trim_end_matches('\n').trim_end_matches('\r')
    }

    fn char_floor(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.source.len());
        while !self.source.is_char_boundary(offset) {
            offset -= 1;
        }
        offset
    }
}
