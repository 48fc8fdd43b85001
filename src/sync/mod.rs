//! Synchronization engine: keeps the word highlight in step with speech.
//!
//! * [`state`]: [`SpeechState`], [`PlaybackState`], the [`SpeechEvent`]
//!   stream and the [`PlaybackStatus`] snapshot.
//! * [`machine`]: [`SyncMachine`], a pure `(state, event) -> effects`
//!   transition function.
//! * [`runner`]: [`SpeechEngine`], which performs the effects on tokio, and
//!   [`EngineHandle`] for driving a spawned engine.

pub mod machine;
pub mod runner;
pub mod state;

pub use machine::{
    Command, Effect, EngineError, EngineEvent, EngineOptions, SyncMachine, TimerId, TimerKind,
    TimingMode,
};
pub use runner::{EngineHandle, Request, SpeechEngine};
pub use state::{PlaybackState, PlaybackStatus, SpeechEvent, SpeechState};
