use std::collections::VecDeque;

use crate::chunk::{Chunk, Chunker, assemble, validate};
use crate::document::Document;
use crate::errors::RagError;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Byte range `start..end` into the document.
type Span = (usize, usize);

/// Separator-aware chunker.
///
/// Splits on the coarsest separator present (paragraphs, then lines, then
/// words, then characters), recursing into pieces longer than `size`, and
/// packs neighbouring pieces back together up to `size` characters. Up to
/// `overlap` characters of trailing pieces are carried into the next chunk.
///
/// Every chunk is a trimmed slice of the input, separators included, so
/// runs of blank lines or spaces survive and positions stay exact.
/// Whitespace-only chunks are dropped.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveChunker {
    size: usize,
    overlap: usize,
}

impl RecursiveChunker {
    /// # Errors
    /// [`RagError::InvalidChunking`] if `overlap >= size` or `size == 0`.
    pub fn new(size: usize, overlap: usize) -> Result<Self, RagError> {
        validate(size, overlap)?;
        Ok(Self { size, overlap })
    }

    /// Splits raw text into chunk strings.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.slices(text)
            .into_iter()
            .map(|(_, chunk)| chunk.to_string())
            .collect()
    }

    /// Chunks as `(byte_offset, slice)` pairs of `text`, in order.
    fn slices<'t>(&self, text: &'t str) -> Vec<(usize, &'t str)> {
        self.split(text, (0, text.len()), &SEPARATORS)
            .into_iter()
            .filter_map(|span| trimmed(text, span))
            .collect()
    }

    fn split(&self, text: &str, span: Span, separators: &[&str]) -> Vec<Span> {
        let part = &text[span.0..span.1];
        let (idx, sep) = separators
            .iter()
            .enumerate()
            .find(|(_, s)| s.is_empty() || part.contains(**s))
            .map(|(i, s)| (i, *s))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let finer = &separators[(idx + 1).min(separators.len())..];

        let pieces: Vec<Span> = if sep.is_empty() {
            part.char_indices()
                .map(|(i, c)| (span.0 + i, span.0 + i + c.len_utf8()))
                .collect()
        } else {
            separated(part, sep)
                .into_iter()
                .filter(|(s, e)| s < e)
                .map(|(s, e)| (span.0 + s, span.0 + e))
                .collect()
        };

        let mut out = Vec::new();
        let mut fitting: Vec<Span> = Vec::new();
        for piece in pieces {
            if width(text, piece.0, piece.1) <= self.size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                out.extend(self.merge(text, &fitting));
                fitting.clear();
            }
            if finer.is_empty() {
                out.push(piece);
            } else {
                out.extend(self.split(text, piece, finer));
            }
        }
        if !fitting.is_empty() {
            out.extend(self.merge(text, &fitting));
        }
        out
    }

    /// Packs consecutive pieces (each ≤ size) into spans of at most `size`
    /// characters, measured on the source including whatever lies between.
    fn merge(&self, text: &str, pieces: &[Span]) -> Vec<Span> {
        let mut out = Vec::new();
        let mut window: VecDeque<Span> = VecDeque::new();

        for &piece in pieces {
            let overflows = window
                .front()
                .is_some_and(|&(start, _)| width(text, start, piece.1) > self.size);
            if overflows {
                out.extend(covering(&window));
                let end = window.back().map_or(piece.0, |w| w.1);
                while let Some(&(front, _)) = window.front() {
                    if width(text, front, end) <= self.overlap
                        && width(text, front, piece.1) <= self.size
                    {
                        break;
                    }
                    window.pop_front();
                }
            }
            window.push_back(piece);
        }
        out.extend(covering(&window));
        out
    }
}

impl Chunker for RecursiveChunker {
    fn name(&self) -> &str {
        "recursive"
    }

    fn chunk(&self, doc: &Document) -> Vec<Chunk> {
        let mut byte = 0usize;
        let mut chars = 0usize;
        let pieces = self
            .slices(&doc.text)
            .into_iter()
            .map(|(start, text)| {
                // starts never decrease; count characters incrementally
                chars += doc.text[byte..start].chars().count();
                byte = start;
                (chars, text.to_string())
            })
            .collect();
        assemble(&doc.source, pieces)
    }
}

/// Spans between occurrences of `sep`, empty ones included.
fn separated(part: &str, sep: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (at, _) in part.match_indices(sep) {
        spans.push((start, at));
        start = at + sep.len();
    }
    spans.push((start, part.len()));
    spans
}

fn width(text: &str, start: usize, end: usize) -> usize {
    text[start..end].chars().count()
}

fn covering(window: &VecDeque<Span>) -> Option<Span> {
    Some((window.front()?.0, window.back()?.1))
}

fn trimmed(text: &str, (start, end): Span) -> Option<(usize, &str)> {
    let slice = &text[start..end];
    let body = slice.trim();
    if body.is_empty() {
        return None;
    }
    let lead = slice.len() - slice.trim_start().len();
    Some((start + lead, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HISTORY: &str = "Soil is a mixture of minerals, organic matter, gases and water.\n\n\
Sandy soil drains quickly. Clay soil holds water and nutrients.\n\
Loam balances sand, silt and clay.\n\n\
Peat soil is rich in organic matter.";

    #[test]
    fn chunks_respect_size() {
        let chunker = RecursiveChunker::new(60, 0).unwrap();
        let chunks = chunker.split_text(HISTORY);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.chars().count() <= 60, "too long: {c:?}");
            assert_eq!(c.trim(), c);
        }
    }

    #[test]
    fn paragraphs_that_fit_are_packed_together() {
        let chunker = RecursiveChunker::new(200, 0).unwrap();
        let chunks = chunker.split_text("First paragraph.\n\nSecond paragraph.");
        assert_eq!(chunks, vec!["First paragraph.\n\nSecond paragraph."]);
    }

    #[test]
    fn words_are_not_lost() {
        let chunker = RecursiveChunker::new(12, 0).unwrap();
        let text = "alpha beta gamma delta epsilon";
        let chunks = chunker.split_text(text);
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn overlap_carries_trailing_words() {
        let chunker = RecursiveChunker::new(11, 5).unwrap();
        let chunks = chunker.split_text("aa bb cc dd ee");
        assert_eq!(chunks, vec!["aa bb cc dd", "cc dd ee"]);
    }

    #[test]
    fn long_words_fall_back_to_characters() {
        let chunker = RecursiveChunker::new(4, 0).unwrap();
        assert_eq!(chunker.split_text("abcdefghij"), vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn positions_follow_document_order() {
        let chunker = RecursiveChunker::new(60, 0).unwrap();
        let doc = Document {
            source: "History.txt".into(),
            text: HISTORY.into(),
        };
        let chunks = chunker.chunk(&doc);
        assert_eq!(chunks[0].metadata.position, 0);
        for pair in chunks.windows(2) {
            assert!(pair[1].metadata.position > pair[0].metadata.position);
        }
        assert!(chunks.iter().all(|c| c.metadata.total_chunks == chunks.len()));
    }

    #[test]
    fn repeated_separators_are_kept_verbatim() {
        let chunker = RecursiveChunker::new(10, 0).unwrap();
        assert_eq!(
            chunker.split_text("aaaa  bbbb  cccc  dddd"),
            vec!["aaaa  bbbb", "cccc  dddd"]
        );

        let text = "Sandy soil.\n\n\n\nClay soil  holds water.\n\n\nLoam.";
        let doc = Document {
            source: "History.txt".into(),
            text: text.into(),
        };
        let chunks = RecursiveChunker::new(16, 4).unwrap().chunk(&doc);
        assert!(chunks.len() > 2);
        let chars: Vec<char> = text.chars().collect();
        for c in &chunks {
            let n = c.text.chars().count();
            let at: String = chars[c.metadata.position..c.metadata.position + n].iter().collect();
            assert_eq!(at, c.text);
            assert!(n <= 16, "too long: {:?}", c.text);
        }
        for pair in chunks.windows(2) {
            assert!(pair[1].metadata.position > pair[0].metadata.position);
        }
    }

    #[test]
    fn positions_count_characters() {
        let chunker = RecursiveChunker::new(6, 0).unwrap();
        let doc = Document {
            source: "s".into(),
            text: "état  sol  eau".into(),
        };
        let positions: Vec<_> = chunker.chunk(&doc).iter().map(|c| c.metadata.position).collect();
        assert_eq!(positions, vec![0, 6, 11]);
    }
}
