//! Per-utterance word schedule.
//!
//! A [`WordTimingPlan`] is built once per `play` from the start offset
//! onward.  Entries are consumed strictly in order through a cursor; an
//! entry is never modified after it is built.  A rate change or resume
//! builds a fresh plan over the remaining suffix instead.

use std::collections::VecDeque;
use std::time::Duration;

use crate::text::{WordIndex, WordSpan};
use crate::timing::DurationEstimator;

/// One scheduled word.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWord {
    pub span: WordSpan,
    pub estimated_ms: f64,
}

impl PlannedWord {
    pub fn duration(&self) -> Duration {
        ms_to_duration(self.estimated_ms)
    }
}

/// Milliseconds to a `Duration`, rounded to the microsecond.
pub fn ms_to_duration(ms: f64) -> Duration {
    if !ms.is_finite() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((ms * 1_000.0).round() as u64)
}

/// Ordered word schedule with a consumption cursor.
#[derive(Debug, Clone, Default)]
pub struct WordTimingPlan {
    pending: VecDeque<PlannedWord>,
    consumed: usize,
}

impl WordTimingPlan {
    /// Plan every word from the one at (or following) `from` to the end.
    ///
    /// Durations already include the `rate` adjustment.
    pub fn build(
        index: &WordIndex,
        from: usize,
        rate: f32,
        estimator: &dyn DurationEstimator,
    ) -> Self {
        let pending = index
            .spans_from(from)
            .iter()
            .map(|span| PlannedWord {
                estimated_ms: estimator.estimate_ms(&span.word, rate),
                span: span.clone(),
            })
            .collect();
        Self {
            pending,
            consumed: 0,
        }
    }

    /// Consume the next word.
    pub fn pop(&mut self) -> Option<PlannedWord> {
        let next = self.pending.pop_front();
        if next.is_some() {
            self.consumed += 1;
        }
        next
    }

    /// Next word without consuming it.
    pub fn peek(&self) -> Option<&PlannedWord> {
        self.pending.front()
    }

    /// Skip every word that would already have finished `elapsed_ms` into
    /// the plan.
    ///
    /// Returns how far into the next (unconsumed) word `elapsed_ms` lands.
    pub fn fast_forward(&mut self, elapsed_ms: f64) -> f64 {
        let mut remaining = elapsed_ms.max(0.0);
        while let Some(front) = self.pending.front() {
            if front.estimated_ms > remaining {
                break;
            }
            remaining -= front.estimated_ms;
            self.pop();
        }
        if self.pending.is_empty() {
            0.0
        } else {
            remaining
        }
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Sum of the estimated durations still pending.
    pub fn remaining_ms(&self) -> f64 {
        self.pending.iter().map(|w| w.estimated_ms).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::LinearEstimator;

    fn plan(text: &str, from: usize, rate: f32) -> WordTimingPlan {
        WordTimingPlan::build(&WordIndex::new(text), from, rate, &LinearEstimator::default())
    }

    #[test]
    fn builds_in_order_with_rate_applied() {
        let mut p = plan("The cat sat.", 0, 2.0);
        assert_eq!(p.remaining(), 3);
        assert_eq!(p.remaining_ms(), 175.0 + 175.0 + 200.0);

        let first = p.pop().unwrap();
        assert_eq!(first.span.word, "The");
        assert_eq!(first.estimated_ms, 175.0);
        assert_eq!(p.consumed(), 1);
        assert_eq!(p.peek().map(|w| w.span.word.as_str()), Some("cat"));
    }

    #[test]
    fn builds_from_offset() {
        let p = plan("The cat sat.", 4, 1.0);
        assert_eq!(p.peek().map(|w| w.span.start), Some(4));
        assert_eq!(p.remaining(), 2);
    }

    #[test]
    fn empty_text_gives_empty_plan() {
        let mut p = plan("", 0, 1.0);
        assert!(p.is_exhausted());
        assert!(p.pop().is_none());
        assert_eq!(p.consumed(), 0);
    }

    #[test]
    fn fast_forward_skips_finished_words() {
        // The=350, cat=350, sat.=400 at rate 1.0
        let mut p = plan("The cat sat.", 0, 1.0);
        let into = p.fast_forward(500.0);
        assert_eq!(p.consumed(), 1);
        assert_eq!(into, 150.0);
        assert_eq!(p.peek().map(|w| w.span.word.as_str()), Some("cat"));
    }

    #[test]
    fn fast_forward_exact_boundary_moves_to_next_word() {
        let mut p = plan("The cat sat.", 0, 1.0);
        assert_eq!(p.fast_forward(350.0), 0.0);
        assert_eq!(p.peek().map(|w| w.span.word.as_str()), Some("cat"));
    }

    #[test]
    fn fast_forward_past_end_exhausts() {
        let mut p = plan("The cat sat.", 0, 1.0);
        assert_eq!(p.fast_forward(10_000.0), 0.0);
        assert!(p.is_exhausted());
        assert_eq!(p.consumed(), 3);
    }

    #[test]
    fn duration_conversion() {
        let p = plan("The", 0, 1.0);
        assert_eq!(p.peek().unwrap().duration(), Duration::from_millis(350));
    }
}
