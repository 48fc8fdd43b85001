//! Engine states, per-session playback state and the outward event stream.
//!
//! [`SpeechState`] is the coarse state machine:
//!
//! ```text
//! Idle ──play──▶ Speaking ──pause──▶ Paused ──resume──▶ Speaking
//!                   │                   │
//!                   ├──stop / end───────┴──stop──▶ Idle
//!                   └──driver error──▶ Idle
//! ```
//!
//! [`PlaybackState`] exists only while a session is `Speaking` or `Paused`.

use std::sync::Arc;

use serde::Serialize;

use crate::text::{WordIndex, WordSpan};

// ---------------------------------------------------------------------------
// SpeechState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SpeechState {
    /// Nothing is playing.
    #[default]
    Idle,
    /// An utterance is playing and words are being highlighted.
    Speaking,
    /// Speech is suspended; the position is kept for resume.
    Paused,
}

impl SpeechState {
    /// `true` while a session exists (`Speaking` or `Paused`).
    ///
    /// ```
    /// use read_along::sync::SpeechState;
    ///
    /// assert!(!SpeechState::Idle.is_active());
    /// assert!(SpeechState::Speaking.is_active());
    /// assert!(SpeechState::Paused.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        !matches!(self, SpeechState::Idle)
    }

    /// A short label suitable for a status line.
    pub fn label(&self) -> &'static str {
        match self {
            SpeechState::Idle => "Idle",
            SpeechState::Speaking => "Speaking",
            SpeechState::Paused => "Paused",
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackState
// ---------------------------------------------------------------------------

/// Everything the engine knows about the current session.
#[derive(Debug, Clone)]
pub struct PlaybackState {
    /// The full page text and its word spans.
    pub index: Arc<WordIndex>,
    pub rate: f32,
    /// Char offset where the current utterance began.
    pub start_position: usize,
    /// Best-known char offset of the playback head.
    pub current_position: usize,
    pub last_highlighted: Option<WordSpan>,
}

impl PlaybackState {
    pub fn new(index: Arc<WordIndex>, rate: f32, start_position: usize) -> Self {
        Self {
            index,
            rate,
            start_position,
            current_position: start_position,
            last_highlighted: None,
        }
    }

    pub fn progress(&self) -> f32 {
        self.index.progress(self.current_position)
    }
}

// ---------------------------------------------------------------------------
// SpeechEvent
// ---------------------------------------------------------------------------

/// What the engine tells its subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SpeechEvent {
    /// The word to highlight, or `None` to clear the highlight.
    Word(Option<WordSpan>),
    /// Playback progress through the page text, `0..=100`.
    Progress(f32),
    /// The page finished playing on its own.
    End,
    /// Synthesis failed mid-utterance; playback is back to idle.
    Error(String),
    /// No speech synthesizer is available; playback controls should be
    /// disabled.
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// Snapshot of the engine for polling UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: SpeechState,
    pub position: usize,
    pub rate: f32,
    pub progress: f32,
    pub word: Option<WordSpan>,
    /// Set once the synthesizer turned out to be unavailable.
    pub unavailable: bool,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: SpeechState::Idle,
            position: 0,
            rate: 1.0,
            progress: 0.0,
            word: None,
            unavailable: false,
        }
    }
}
