//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::driver::BoundarySupport;

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Utterance settings shared by every backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// BCP-47 language tag handed to the synthesizer (e.g. `"en-US"`).
    pub language: String,
    /// Rate used for normal-speed reading.
    pub normal_rate: f32,
    /// Rate used when the reader toggles to slow reading.
    pub slow_rate: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            normal_rate: 1.0,
            slow_rate: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// TimingConfig
// ---------------------------------------------------------------------------

/// Constants for synthetic word timing.
///
/// The defaults are a single reasonable estimator, not device calibration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Fixed cost of every word at rate 1.0, in milliseconds.
    pub base_ms: f64,
    /// Additional cost per char at rate 1.0, in milliseconds.
    pub per_char_ms: f64,
    /// How long to wait for a first native boundary from a synthesizer whose
    /// boundaries are unreliable before switching to synthetic timing.
    pub boundary_grace_ms: u64,
    /// Lowest accepted playback rate; lower requests are clamped.
    pub min_rate: f32,
    /// Highest accepted playback rate; higher requests are clamped.
    pub max_rate: f32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            base_ms: 200.0,
            per_char_ms: 50.0,
            boundary_grace_ms: 750,
            min_rate: 0.1,
            max_rate: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// DriverBackend / DriverConfig
// ---------------------------------------------------------------------------

/// Which synthesizer backend speaks the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverBackend {
    /// Silent, timer-driven synthesizer.  Needs no audio hardware.
    Simulated,
    /// External TTS program spawned per sentence (e.g. `espeak-ng`).
    Command,
}

impl Default for DriverBackend {
    fn default() -> Self {
        Self::Simulated
    }
}

/// Behaviour of the simulated backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedConfig {
    /// Boundary capability the simulated synthesizer declares.
    pub boundaries: BoundarySupport,
    /// Whether it actually delivers boundaries.  With
    /// `boundaries = Unreliable` this decides which way the probe goes.
    pub emit_boundaries: bool,
    /// Whether it supports true pause/resume.
    pub true_pause: bool,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            boundaries: BoundarySupport::Reliable,
            emit_boundaries: true,
            true_pause: true,
        }
    }
}

/// Synthesizer backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Selected backend.
    pub backend: DriverBackend,
    /// Program run by the command backend.
    pub command: String,
    /// Speaking speed passed to the command backend at rate 1.0.
    pub words_per_minute: u32,
    /// Interval for the pause+resume nudge that keeps some native
    /// synthesizers from stalling on long utterances.  `0` disables it.
    pub keep_alive_secs: u64,
    /// Simulated backend settings.
    pub simulated: SimulatedConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: DriverBackend::default(),
            command: "espeak-ng".into(),
            words_per_minute: 175,
            keep_alive_secs: 14,
            simulated: SimulatedConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ReaderConfig
// ---------------------------------------------------------------------------

/// Page-reading behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Continue with the next page when a page finishes.
    pub auto_advance: bool,
    /// Separator between pages in plain-text books.
    pub page_separator: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            auto_advance: true,
            page_separator: "\u{c}".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use read_along::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Utterance settings.
    pub speech: SpeechConfig,
    /// Synthetic timing constants.
    pub timing: TimingConfig,
    /// Synthesizer backend.
    pub driver: DriverConfig,
    /// Page-reading behaviour.
    pub reader: ReaderConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.speech.language, loaded.speech.language);
        assert_eq!(original.speech.normal_rate, loaded.speech.normal_rate);
        assert_eq!(original.speech.slow_rate, loaded.speech.slow_rate);

        assert_eq!(original.timing.base_ms, loaded.timing.base_ms);
        assert_eq!(original.timing.per_char_ms, loaded.timing.per_char_ms);
        assert_eq!(
            original.timing.boundary_grace_ms,
            loaded.timing.boundary_grace_ms
        );

        assert_eq!(original.driver.backend, loaded.driver.backend);
        assert_eq!(original.driver.command, loaded.driver.command);
        assert_eq!(original.driver.keep_alive_secs, loaded.driver.keep_alive_secs);
        assert_eq!(
            original.driver.simulated.boundaries,
            loaded.driver.simulated.boundaries
        );

        assert_eq!(original.reader.auto_advance, loaded.reader.auto_advance);
        assert_eq!(original.reader.page_separator, loaded.reader.page_separator);
    }

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.speech.language, default.speech.language);
        assert_eq!(config.timing.base_ms, default.timing.base_ms);
        assert_eq!(config.driver.backend, default.driver.backend);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.speech.language, "en-US");
        assert_eq!(cfg.speech.normal_rate, 1.0);
        assert_eq!(cfg.speech.slow_rate, 0.5);
        assert_eq!(cfg.timing.base_ms, 200.0);
        assert_eq!(cfg.timing.per_char_ms, 50.0);
        assert_eq!(cfg.driver.backend, DriverBackend::Simulated);
        assert_eq!(cfg.driver.command, "espeak-ng");
        assert_eq!(cfg.driver.keep_alive_secs, 14);
        assert!(cfg.reader.auto_advance);
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("modified.toml");

        let mut cfg = AppConfig::default();
        cfg.speech.language = "es-ES".into();
        cfg.timing.boundary_grace_ms = 1_200;
        cfg.driver.backend = DriverBackend::Command;
        cfg.driver.keep_alive_secs = 0;
        cfg.driver.simulated.boundaries = BoundarySupport::Unreliable;
        cfg.driver.simulated.emit_boundaries = false;
        cfg.reader.auto_advance = false;

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.speech.language, "es-ES");
        assert_eq!(loaded.timing.boundary_grace_ms, 1_200);
        assert_eq!(loaded.driver.backend, DriverBackend::Command);
        assert_eq!(loaded.driver.keep_alive_secs, 0);
        assert_eq!(loaded.driver.simulated.boundaries, BoundarySupport::Unreliable);
        assert!(!loaded.driver.simulated.emit_boundaries);
        assert!(!loaded.reader.auto_advance);
    }

    #[test]
    fn partial_file_fills_missing_keys() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[speech]\nlanguage = \"es-ES\"\n\n[driver]\ncommand = \"espeak\"\n",
        )
        .expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");
        let default = AppConfig::default();

        assert_eq!(loaded.speech.language, "es-ES");
        assert_eq!(loaded.speech.normal_rate, default.speech.normal_rate);
        assert_eq!(loaded.speech.slow_rate, default.speech.slow_rate);
        assert_eq!(loaded.driver.command, "espeak");
        assert_eq!(loaded.driver.words_per_minute, default.driver.words_per_minute);
        assert_eq!(loaded.driver.keep_alive_secs, default.driver.keep_alive_secs);
        assert!(loaded.driver.simulated.true_pause);
        assert_eq!(loaded.timing.base_ms, default.timing.base_ms);
        assert_eq!(loaded.reader.page_separator, default.reader.page_separator);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "speech = 12").expect("write");
        assert!(AppConfig::load_from(&path).is_err());
    }
}
