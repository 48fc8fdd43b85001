//! Word indexer and offset resolution.
//!
//! [`index`] is a pure function: the same text always yields the same spans,
//! which the engine relies on when it restarts speech from a stored offset.

use std::sync::Arc;

use serde::Serialize;

// ---------------------------------------------------------------------------
// WordSpan
// ---------------------------------------------------------------------------

/// A word token and its `[start, end)` char range in the page text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordSpan {
    pub word: String,
    pub start: usize,
    pub end: usize,
}

impl WordSpan {
    /// Number of chars in the word.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// `true` when `offset` lies inside the word.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

// ---------------------------------------------------------------------------
// index
// ---------------------------------------------------------------------------

/// Split `text` on runs of whitespace.
///
/// Spans are left-to-right, non-overlapping and never include whitespace.
/// Empty or all-whitespace input yields an empty vector.
///
/// ```
/// use read_along::text::index;
///
/// let spans = index("The cat  sat.");
/// let words: Vec<_> = spans.iter().map(|s| (s.word.as_str(), s.start, s.end)).collect();
/// assert_eq!(words, vec![("The", 0, 3), ("cat", 4, 7), ("sat.", 9, 13)]);
/// ```
pub fn index(text: &str) -> Vec<WordSpan> {
    let mut spans = Vec::new();
    let mut word = String::new();
    let mut start = 0;
    let mut len = 0;

    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            if !word.is_empty() {
                spans.push(WordSpan {
                    word: std::mem::take(&mut word),
                    start,
                    end: i,
                });
            }
        } else {
            if word.is_empty() {
                start = i;
            }
            word.push(ch);
        }
        len = i + 1;
    }

    if !word.is_empty() {
        spans.push(WordSpan {
            word,
            start,
            end: len,
        });
    }

    spans
}

// ---------------------------------------------------------------------------
// WordIndex
// ---------------------------------------------------------------------------

/// Page text plus its word spans, built once per `play`.
///
/// Cheap to share: the text is an `Arc<str>`.
#[derive(Debug, Clone)]
pub struct WordIndex {
    text: Arc<str>,
    spans: Vec<WordSpan>,
    char_len: usize,
}

impl WordIndex {
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        let text = text.into();
        let spans = index(&text);
        let char_len = text.chars().count();
        Self {
            text,
            spans,
            char_len,
        }
    }

    pub fn text(&self) -> &Arc<str> {
        &self.text
    }

    pub fn spans(&self) -> &[WordSpan] {
        &self.spans
    }

    /// Length of the text in chars.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    /// Position of the first span that ends after `offset`.
    ///
    /// That span either contains `offset` or is the nearest one following it,
    /// so offsets that land in whitespace resolve forward.
    pub fn span_index_at(&self, offset: usize) -> Option<usize> {
        let i = self.spans.partition_point(|s| s.end <= offset);
        (i < self.spans.len()).then_some(i)
    }

    /// Resolve a char offset reported by a synthesizer to a word.
    ///
    /// Offsets inside inter-word whitespace resolve to the following word;
    /// offsets past the last word resolve to `None`.
    pub fn resolve(&self, offset: usize) -> Option<&WordSpan> {
        self.span_index_at(offset).map(|i| &self.spans[i])
    }

    /// Spans from the word at (or following) `offset` to the end.
    pub fn spans_from(&self, offset: usize) -> &[WordSpan] {
        match self.span_index_at(offset) {
            Some(i) => &self.spans[i..],
            None => &[],
        }
    }

    /// The text from char `offset` onward, as handed to the synthesizer
    /// when speech starts mid-page.
    pub fn suffix_from(&self, offset: usize) -> &str {
        match self.text.char_indices().nth(offset) {
            Some((byte, _)) => &self.text[byte..],
            None => "",
        }
    }

    /// Percentage of the text before `position`, clamped to `0..=100`.
    pub fn progress(&self, position: usize) -> f32 {
        if self.char_len == 0 {
            return 0.0;
        }
        (position as f32 / self.char_len as f32 * 100.0).clamp(0.0, 100.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn words(spans: &[WordSpan]) -> Vec<&str> {
        spans.iter().map(|s| s.word.as_str()).collect()
    }

    #[test]
    fn empty_text_has_no_spans() {
        assert!(index("").is_empty());
        assert!(index("   \n\t ").is_empty());
    }

    #[test]
    fn scenario_sentence_offsets() {
        let spans = index("The cat sat.");
        assert_eq!(
            spans,
            vec![
                WordSpan { word: "The".into(), start: 0, end: 3 },
                WordSpan { word: "cat".into(), start: 4, end: 7 },
                WordSpan { word: "sat.".into(), start: 8, end: 12 },
            ]
        );
    }

    #[test]
    fn leading_and_trailing_whitespace_is_excluded() {
        let spans = index("  hello\tworld \n");
        assert_eq!(words(&spans), vec!["hello", "world"]);
        assert_eq!((spans[0].start, spans[0].end), (2, 7));
        assert_eq!((spans[1].start, spans[1].end), (8, 13));
    }

    #[test]
    fn joined_words_collapse_whitespace_runs() {
        let texts = [
            "one  two\n\nthree",
            "  padded   out  ",
            "single",
            "tabs\tand\r\nnewlines",
            "ñandú café  über",
        ];
        for t in texts {
            let joined = words(&index(t)).join(" ");
            let collapsed = t.split_whitespace().collect::<Vec<_>>().join(" ");
            assert_eq!(joined, collapsed, "text: {t:?}");
        }
    }

    #[test]
    fn spans_are_monotonic_and_within_bounds() {
        let t = "a bb  ccc\tdddd \n eeeee";
        let spans = index(t);
        let len = t.chars().count();
        for s in &spans {
            assert!(s.start < s.end && s.end <= len);
        }
        for pair in spans.windows(2) {
            assert!(pair[0].end <= pair[1].start);
        }
    }

    #[test]
    fn offsets_are_chars_not_bytes() {
        let spans = index("día más");
        assert_eq!((spans[0].start, spans[0].end), (0, 3));
        assert_eq!((spans[1].start, spans[1].end), (4, 7));
    }

    #[test]
    fn index_is_deterministic() {
        let t = "same text, same spans";
        assert_eq!(index(t), index(t));
    }

    #[test]
    fn resolve_inside_word() {
        let idx = WordIndex::new("The cat sat.");
        assert_eq!(idx.resolve(5).map(|s| s.word.as_str()), Some("cat"));
        assert_eq!(idx.resolve(0).map(|s| s.word.as_str()), Some("The"));
    }

    #[test]
    fn resolve_whitespace_goes_forward() {
        let idx = WordIndex::new("The cat sat.");
        assert_eq!(idx.resolve(3).map(|s| s.word.as_str()), Some("cat"));
        assert_eq!(idx.resolve(7).map(|s| s.word.as_str()), Some("sat."));
    }

    #[test]
    fn resolve_at_end_is_none() {
        let idx = WordIndex::new("The cat sat.");
        assert!(idx.resolve(12).is_none());
        assert!(idx.resolve(400).is_none());

        let trailing = WordIndex::new("end   ");
        assert!(trailing.resolve(4).is_none());
    }

    #[test]
    fn suffix_from_char_offset() {
        let idx = WordIndex::new("día más");
        assert_eq!(idx.suffix_from(4), "más");
        assert_eq!(idx.suffix_from(0), "día más");
        assert_eq!(idx.suffix_from(7), "");
    }

    #[test]
    fn spans_from_mid_word_includes_that_word() {
        let idx = WordIndex::new("The cat sat.");
        assert_eq!(words(idx.spans_from(5)), vec!["cat", "sat."]);
        assert!(idx.spans_from(12).is_empty());
    }

    #[test]
    fn progress_is_clamped() {
        let idx = WordIndex::new("The cat sat.");
        assert_eq!(idx.progress(0), 0.0);
        assert!((idx.progress(6) - 50.0).abs() < 1e-4);
        assert_eq!(idx.progress(99), 100.0);
        assert_eq!(WordIndex::new("").progress(3), 0.0);
    }
}
