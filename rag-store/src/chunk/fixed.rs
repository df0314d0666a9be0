use crate::chunk::{Chunk, Chunker, assemble, validate};
use crate::document::Document;
use crate::errors::RagError;

/// Fixed-size chunker: a sliding window of `size` characters moving by
/// `size - overlap`.
///
/// Consecutive chunks share exactly `overlap` characters. The last window
/// ends at the document end and is never fully contained in its predecessor.
#[derive(Debug, Clone, Copy)]
pub struct FixedSizeChunker {
    size: usize,
    overlap: usize,
}

impl FixedSizeChunker {
    /// # Errors
    /// [`RagError::InvalidChunking`] if `overlap >= size` or `size == 0`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, RagError> {
        validate(size, overlap)?;
        Ok(Self { size, overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn name(&self) -> &str {
        "fixed"
    }

    fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let pieces = FixedWindows::new(&doc.text, self.size, self.overlap)
            .map(|(pos, text)| (pos, text.to_string()))
            .collect();
        assemble(&doc.source, pieces)
    }
}

/// Single-pass iterator of `(char_position, window)` over a string.
#[derive(Debug)]
pub struct FixedWindows<'a> {
    text: &'a str,
    /// Byte offset of every char start, plus `text.len()`.
    bounds: Vec<usize>,
    size: usize,
    stride: usize,
    next_start: Option<usize>,
}

impl<'a> FixedWindows<'a> {
    pub(crate) fn new(text: &'a str, size: usize, overlap: usize) -> Self {
        let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        bounds.push(text.len());
        let chars = bounds.len() - 1;
        Self {
            text,
            bounds,
            size,
            stride: size.saturating_sub(overlap).max(1),
            next_start: (chars > 0).then_some(0),
        }
    }
}

impl<'a> Iterator for FixedWindows<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let chars = self.bounds.len() - 1;
        let end = (start + self.size).min(chars);
        self.next_start = (end < chars).then_some(start + self.stride);
        Some((start, &self.text[self.bounds[start]..self.bounds[end]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk;

    fn doc(text: &str) -> Document {
        Document {
            source: "test.txt".into(),
            text: text.into(),
        }
    }

    #[test]
    fn test_basic_chunking() {
        let chunker = FixedSizeChunker::new(10, 0).unwrap();
        let chunks = chunker.chunk(&doc("0123456789abcdefghij"));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "0123456789");
        assert_eq!(chunks[1].text, "abcdefghij");
        assert_eq!(chunks[1].metadata.position, 10);
    }

    #[test]
    fn test_overlap_is_exact_and_tail_not_contained() {
        let windows: Vec<_> = chunk("0123456789abcdefghij", 10, 5).unwrap().collect();

        // stride=5: 0..10, 5..15, 10..20; 15..20 would be contained in 10..20
        assert_eq!(
            windows,
            vec![(0, "0123456789"), (5, "56789abcde"), (10, "abcdefghij")]
        );
    }

    #[test]
    fn test_short_tail() {
        let windows: Vec<_> = chunk("abcdefg", 4, 1).unwrap().map(|(_, t)| t).collect();
        assert_eq!(windows, vec!["abcd", "defg"]);

        let windows: Vec<_> = chunk("abcdefgh", 4, 1).unwrap().map(|(_, t)| t).collect();
        assert_eq!(windows, vec!["abcd", "defg", "gh"]);
    }

    #[test]
    fn test_coverage_and_overlap_property() {
        let text = "Soil forms from weathered rock. Loam mixes sand, silt and clay; peat is organic.";
        for size in 1..20 {
            for overlap in 0..size {
                let windows: Vec<_> = chunk(text, size, overlap).unwrap().collect();
                let mut rebuilt = String::from(windows[0].1);
                for pair in windows.windows(2) {
                    let (prev_pos, prev) = pair[0];
                    let (pos, cur) = pair[1];
                    assert_eq!(pos - prev_pos, size - overlap);
                    assert!(cur.chars().count() <= size);
                    let shared: String = prev.chars().skip(size - overlap).collect();
                    assert_eq!(shared.chars().count(), overlap);
                    assert!(cur.starts_with(&shared));
                    rebuilt.extend(cur.chars().skip(overlap));
                }
                assert_eq!(rebuilt, text, "size={size} overlap={overlap}");
            }
        }
    }

    #[test]
    fn test_unicode_safety() {
        let windows: Vec<_> = chunk("Hello 👋 Wörld", 5, 1).unwrap().map(|(_, t)| t).collect();
        assert_eq!(windows, vec!["Hello", "o 👋 W", "Wörld"]);
    }

    #[test]
    fn test_empty_content() {
        assert_eq!(chunk("", 10, 0).unwrap().count(), 0);
        let chunker = FixedSizeChunker::new(10, 0).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
    }
}
