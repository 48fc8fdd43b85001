//! Spoken-duration heuristic.
//!
//! `duration_ms = (base_ms + chars * per_char_ms) / rate`
//!
//! The constants are approximate.  Real per-device calibration data, when
//! available, should replace them through [`TimingConfig`](crate::config::TimingConfig).

use crate::config::TimingConfig;

/// Estimates how long a word takes to speak.
///
/// Object-safe and `Send + Sync` so the engine can hold it as
/// `Arc<dyn DurationEstimator>`.
///
/// # Contract
///
/// - Output is strictly positive.
/// - Output strictly decreases as `rate` increases.
/// - Output does not decrease as the word gets longer.
pub trait DurationEstimator: Send + Sync {
    /// Estimated duration of `word` at `rate`, in milliseconds.
    ///
    /// `rate` must be finite and positive.
    fn estimate_ms(&self, word: &str, rate: f32) -> f64;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn DurationEstimator>) {}
};

// ---------------------------------------------------------------------------
// LinearEstimator
// ---------------------------------------------------------------------------

/// Linear base-plus-per-char model.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearEstimator {
    base_ms: f64,
    per_char_ms: f64,
}

impl LinearEstimator {
    pub const DEFAULT_BASE_MS: f64 = 200.0;
    pub const DEFAULT_PER_CHAR_MS: f64 = 50.0;

    /// # Panics
    ///
    /// Panics unless `base_ms > 0` and `per_char_ms >= 0`.
    pub fn new(base_ms: f64, per_char_ms: f64) -> Self {
        assert!(
            base_ms.is_finite() && base_ms > 0.0,
            "base_ms must be positive, got {base_ms}"
        );
        assert!(
            per_char_ms.is_finite() && per_char_ms >= 0.0,
            "per_char_ms must be non-negative, got {per_char_ms}"
        );
        Self {
            base_ms,
            per_char_ms,
        }
    }

    /// Build from config, falling back to the defaults for unusable values.
    pub fn from_config(config: &TimingConfig) -> Self {
        let base = if config.base_ms.is_finite() && config.base_ms > 0.0 {
            config.base_ms
        } else {
            log::warn!(
                "timing: base_ms {} is not positive, using {}",
                config.base_ms,
                Self::DEFAULT_BASE_MS
            );
            Self::DEFAULT_BASE_MS
        };
        let per_char = if config.per_char_ms.is_finite() && config.per_char_ms >= 0.0 {
            config.per_char_ms
        } else {
            log::warn!(
                "timing: per_char_ms {} is negative, using {}",
                config.per_char_ms,
                Self::DEFAULT_PER_CHAR_MS
            );
            Self::DEFAULT_PER_CHAR_MS
        };
        Self::new(base, per_char)
    }
}

impl Default for LinearEstimator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BASE_MS, Self::DEFAULT_PER_CHAR_MS)
    }
}

impl DurationEstimator for LinearEstimator {
    fn estimate_ms(&self, word: &str, rate: f32) -> f64 {
        assert!(
            rate.is_finite() && rate > 0.0,
            "rate must be finite and positive, got {rate}"
        );
        let chars = word.chars().count() as f64;
        (self.base_ms + chars * self.per_char_ms) / f64::from(rate)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_values_at_rate_one() {
        let e = LinearEstimator::default();
        assert_eq!(e.estimate_ms("The", 1.0), 350.0);
        assert_eq!(e.estimate_ms("sat.", 1.0), 400.0);
    }

    #[test]
    fn double_rate_halves_duration() {
        let e = LinearEstimator::default();
        for w in ["The", "cat", "sat.", "extraordinary"] {
            assert_eq!(e.estimate_ms(w, 2.0), e.estimate_ms(w, 1.0) / 2.0);
        }
    }

    #[test]
    fn decreasing_in_rate() {
        let e = LinearEstimator::default();
        let rates = [0.25f32, 0.5, 0.9, 1.0, 1.5, 2.0, 4.0];
        for pair in rates.windows(2) {
            assert!(e.estimate_ms("word", pair[0]) > e.estimate_ms("word", pair[1]));
        }
    }

    #[test]
    fn increasing_in_length() {
        let e = LinearEstimator::default();
        assert!(e.estimate_ms("a", 1.0) < e.estimate_ms("ab", 1.0));
        assert!(e.estimate_ms("ab", 1.0) < e.estimate_ms("abcdef", 1.0));
    }

    #[test]
    fn empty_word_is_still_positive() {
        let e = LinearEstimator::default();
        assert!(e.estimate_ms("", 10.0) > 0.0);
    }

    #[test]
    fn counts_chars_not_bytes() {
        let e = LinearEstimator::default();
        assert_eq!(e.estimate_ms("más", 1.0), e.estimate_ms("mas", 1.0));
    }

    #[test]
    #[should_panic]
    fn zero_rate_is_rejected() {
        LinearEstimator::default().estimate_ms("word", 0.0);
    }

    #[test]
    fn from_config_replaces_bad_constants() {
        let mut cfg = TimingConfig::default();
        cfg.base_ms = -5.0;
        cfg.per_char_ms = f64::NAN;
        assert_eq!(LinearEstimator::from_config(&cfg), LinearEstimator::default());
    }
}
