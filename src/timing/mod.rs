//! Synthetic word timing.
//!
//! Used when the synthesizer gives no usable word-boundary events:
//!
//! * [`DurationEstimator`] / [`LinearEstimator`]: guesses how long a word
//!   takes to speak at a given rate.
//! * [`WordTimingPlan`]: the ordered per-word schedule for one utterance.

pub mod estimator;
pub mod plan;

pub use estimator::{DurationEstimator, LinearEstimator};
pub use plan::{ms_to_duration, PlannedWord, WordTimingPlan};
