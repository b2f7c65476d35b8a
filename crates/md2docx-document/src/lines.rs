//! Byte offset to source line mapping.

/// Maps byte offsets in a markdown source to 1-based line numbers.
///
/// Built once per document; lookups are a binary search over the offsets of
/// every line start.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    /// Index the line starts of `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut starts = Vec::with_capacity(text.len() / 32 + 1);
        starts.push(0);
        starts.extend(newline_positions(text).map(|pos| pos + 1));
        Self { starts }
    }

    /// 1-based line containing `offset`.
    ///
    /// Offsets past the end map to the last line.
    #[must_use]
    pub fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(index) => index + 1,
            Err(index) => index,
        }
    }

    /// Number of lines in the indexed text.
    #[must_use]
    pub fn len(&self) -> usize {
        self.starts.len()
    }

    /// Whether the index is empty (never true, an empty text has one line).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }
}

fn newline_positions(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.bytes()
        .enumerate()
        .filter_map(|(pos, byte)| (byte == b'\n').then_some(pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_of_first_line() {
        let index = LineIndex::new("abc\ndef\n");
        assert_eq!(index.line_of(0), 1);
        assert_eq!(index.line_of(2), 1);
        assert_eq!(index.line_of(3), 1);
    }

    #[test]
    fn test_line_of_following_lines() {
        let index = LineIndex::new("abc\ndef\nghi");
        assert_eq!(index.line_of(4), 2);
        assert_eq!(index.line_of(8), 3);
        assert_eq!(index.line_of(10), 3);
    }

    #[test]
    fn test_line_of_past_end() {
        let index = LineIndex::new("a\nb");
        assert_eq!(index.line_of(100), 2);
    }

    #[test]
    fn test_empty_text_has_one_line() {
        let index = LineIndex::new("");
        assert_eq!(index.len(), 1);
        assert_eq!(index.line_of(0), 1);
    }
}
