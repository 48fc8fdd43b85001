//! Configuration module for the read-along engine.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each subsystem,
//! `AppPaths` for the config and book library directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, DriverBackend, DriverConfig, ReaderConfig, SimulatedConfig, SpeechConfig,
    TimingConfig,
};
