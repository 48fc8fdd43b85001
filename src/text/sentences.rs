//! Sentence chunking for synthesizers that speak one sentence per call.
//!
//! A sentence runs up to and including a run of `.`, `!` or `?`.  Text after
//! the last terminator is kept as a final sentence.  Surrounding whitespace
//! is trimmed; `start` stays a char offset into the original text.

/// One sentence chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    pub text: String,
    /// Char offset of the first non-whitespace char.
    pub start: usize,
}

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

/// Split `text` into trimmed sentences.
///
/// ```
/// use read_along::text::split_sentences;
///
/// let s = split_sentences("Hi there. Ready?! go");
/// let texts: Vec<_> = s.iter().map(|s| s.text.as_str()).collect();
/// assert_eq!(texts, vec!["Hi there.", "Ready?!", "go"]);
/// assert_eq!(s[1].start, 10);
/// ```
pub fn split_sentences(text: &str) -> Vec<Sentence> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut seg_start = 0;
    let mut i = 0;

    while i < chars.len() {
        if is_terminator(chars[i]) {
            while i + 1 < chars.len() && is_terminator(chars[i + 1]) {
                i += 1;
            }
            push_trimmed(&chars[seg_start..=i], seg_start, &mut sentences);
            seg_start = i + 1;
        }
        i += 1;
    }

    if seg_start < chars.len() {
        push_trimmed(&chars[seg_start..], seg_start, &mut sentences);
    }

    sentences
}

fn push_trimmed(segment: &[char], offset: usize, out: &mut Vec<Sentence>) {
    let Some(first) = segment.iter().position(|c| !c.is_whitespace()) else {
        return;
    };
    let last = segment
        .iter()
        .rposition(|c| !c.is_whitespace())
        .unwrap_or(first);
    out.push(Sentence {
        text: segment[first..=last].iter().collect(),
        start: offset + first,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(s: &[Sentence]) -> Vec<&str> {
        s.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn empty_and_blank_text() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("  \n ").is_empty());
    }

    #[test]
    fn no_terminator_is_one_sentence() {
        let s = split_sentences("  no end in sight ");
        assert_eq!(texts(&s), vec!["no end in sight"]);
        assert_eq!(s[0].start, 2);
    }

    #[test]
    fn terminator_runs_stay_together() {
        let s = split_sentences("Wait... What?! Fine.");
        assert_eq!(texts(&s), vec!["Wait...", "What?!", "Fine."]);
        assert_eq!(s[1].start, 8);
        assert_eq!(s[2].start, 15);
    }

    #[test]
    fn lone_punctuation_is_kept() {
        let s = split_sentences("One. . Two.");
        assert_eq!(texts(&s), vec!["One.", ".", "Two."]);
    }

    #[test]
    fn starts_are_char_offsets() {
        let s = split_sentences("¿Qué? Sí.");
        assert_eq!(texts(&s), vec!["¿Qué?", "Sí."]);
        assert_eq!(s[1].start, 6);
    }
}
