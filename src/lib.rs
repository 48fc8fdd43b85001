//! Read-along speech engine.
//!
//! Speaks page text through a platform synthesizer and keeps a word-level
//! highlight in step with the audio, whether or not the synthesizer reports
//! native word boundaries.
//!
//! ```text
//! text::index ──▶ WordIndex ──▶ sync::SyncMachine ◀── driver::SpeechDriver
//!                                   │      ▲
//!                 timing::plan ─────┘      │ timers / driver notices
//!                                   ▼
//!                         SpeechEvent (broadcast) ──▶ reader / UI
//! ```

pub mod config;
pub mod driver;
pub mod reader;
pub mod sync;
pub mod text;
pub mod timing;
