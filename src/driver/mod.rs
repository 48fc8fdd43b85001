//! Playback drivers: the only code that talks to a speech synthesizer.
//!
//! # Architecture
//!
//! ```text
//!   SyncMachine ──Effect──▶ SpeechEngine ──start/pause/resume/cancel──▶ SpeechDriver
//!        ▲                                                                 │
//!        └──────────── DriverNotice { handle, event } ◀── DriverSink ◀────┘
//! ```
//!
//! A synthesizer is a process-wide singleton: a driver owns it and plays at
//! most one utterance at a time.  `start` replaces whatever is playing.
//!
//! Every driver declares its [`DriverCapabilities`] up front.  The engine
//! picks native or synthetic word timing from them once per utterance and
//! never branches on the concrete driver type.

pub mod command;
pub mod simulated;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use command::CommandDriver;
pub use simulated::SimulatedDriver;

// ---------------------------------------------------------------------------
// DriverError
// ---------------------------------------------------------------------------

/// Errors a driver can report synchronously from [`SpeechDriver::start`].
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The platform has no usable speech synthesizer.
    #[error("speech synthesis unavailable: {0}")]
    Unavailable(String),

    /// The synthesizer exists but refused the utterance.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// How far a synthesizer's word-boundary events can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundarySupport {
    /// A boundary with a char offset fires for every word.
    Reliable,
    /// Boundaries may or may not arrive; the engine probes for them.
    Unreliable,
    /// No boundaries at all.  Only the end of speech is reported.
    None,
}

/// What a driver can do, declared once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverCapabilities {
    pub boundaries: BoundarySupport,
    /// Pause/resume keep the utterance's position.  Without it the engine
    /// cancels on pause and restarts from its own position on resume.
    pub true_pause: bool,
    /// Interval for the pause+resume nudge some synthesizers need to keep
    /// long utterances from stalling.
    pub keep_alive: Option<Duration>,
}

impl Default for DriverCapabilities {
    fn default() -> Self {
        Self {
            boundaries: BoundarySupport::Reliable,
            true_pause: true,
            keep_alive: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Utterances and notices
// ---------------------------------------------------------------------------

/// Identifies one utterance.  Assigned by the engine (its session
/// generation), so notices from superseded utterances can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceHandle(pub u64);

/// What to speak.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    /// Text handed to the synthesizer: the page text from the start
    /// position onward.
    pub text: String,
    pub rate: f32,
    /// BCP-47 language tag.
    pub language: String,
}

/// Something the synthesizer reported during an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    /// Speech reached `char_index`, relative to [`UtteranceRequest::text`].
    WordBoundary { char_index: usize },
    /// Speech finished on its own.
    End,
    /// Synthesis failed mid-utterance.
    Error(String),
}

/// A [`DriverEvent`] tagged with the utterance it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverNotice {
    pub handle: UtteranceHandle,
    pub event: DriverEvent,
}

/// Where a driver reports events for one utterance.
///
/// Cheap to clone.  Sending never fails from the driver's point of view: if
/// the engine has gone away the notice is dropped.
#[derive(Debug, Clone)]
pub struct DriverSink {
    handle: UtteranceHandle,
    tx: mpsc::UnboundedSender<DriverNotice>,
}

impl DriverSink {
    pub fn new(handle: UtteranceHandle, tx: mpsc::UnboundedSender<DriverNotice>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> UtteranceHandle {
        self.handle
    }

    pub fn word_boundary(&self, char_index: usize) {
        self.send(DriverEvent::WordBoundary { char_index });
    }

    pub fn end(&self) {
        self.send(DriverEvent::End);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(DriverEvent::Error(message.into()));
    }

    fn send(&self, event: DriverEvent) {
        let _ = self.tx.send(DriverNotice {
            handle: self.handle,
            event,
        });
    }
}

// ---------------------------------------------------------------------------
// SpeechDriver trait
// ---------------------------------------------------------------------------

/// Executor for one platform synthesizer.
///
/// # Contract
///
/// - `start` surfaces a missing synthesizer as
///   [`DriverError::Unavailable`] synchronously.
/// - `start` silences any utterance still playing before speaking.
/// - After `cancel`, no further notice (in particular no `End`) is sent for
///   that utterance.  Cancelling an already finished or unknown utterance is
///   a no-op.
/// - Calls naming an utterance other than the active one are ignored.
/// - Runtime synthesis failures are reported through the sink as
///   [`DriverEvent::Error`], never as panics.
pub trait SpeechDriver: Send {
    fn capabilities(&self) -> DriverCapabilities;

    fn start(
        &mut self,
        request: UtteranceRequest,
        sink: DriverSink,
    ) -> Result<UtteranceHandle, DriverError>;

    fn pause(&mut self, handle: UtteranceHandle);

    fn resume(&mut self, handle: UtteranceHandle);

    fn cancel(&mut self, handle: UtteranceHandle);
}

impl SpeechDriver for Box<dyn SpeechDriver> {
    fn capabilities(&self) -> DriverCapabilities {
        (**self).capabilities()
    }

    fn start(
        &mut self,
        request: UtteranceRequest,
        sink: DriverSink,
    ) -> Result<UtteranceHandle, DriverError> {
        (**self).start(request, sink)
    }

    fn pause(&mut self, handle: UtteranceHandle) {
        (**self).pause(handle)
    }

    fn resume(&mut self, handle: UtteranceHandle) {
        (**self).resume(handle)
    }

    fn cancel(&mut self, handle: UtteranceHandle) {
        (**self).cancel(handle)
    }
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechDriver>) {}
};

// ---------------------------------------------------------------------------
// RecordingDriver  (test-only)
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_tags_events_with_handle() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = DriverSink::new(UtteranceHandle(7), tx);

        sink.word_boundary(4);
        sink.end();
        sink.error("boom");

        assert_eq!(
            rx.try_recv().unwrap(),
            DriverNotice {
                handle: UtteranceHandle(7),
                event: DriverEvent::WordBoundary { char_index: 4 },
            }
        );
        assert_eq!(rx.try_recv().unwrap().event, DriverEvent::End);
        assert_eq!(
            rx.try_recv().unwrap().event,
            DriverEvent::Error("boom".into())
        );
    }

    #[test]
    fn sink_survives_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        DriverSink::new(UtteranceHandle(1), tx).end();
    }

    #[test]
    fn driver_error_display() {
        let e = DriverError::Unavailable("no voices".into());
        assert!(e.to_string().contains("unavailable"));
        assert!(e.to_string().contains("no voices"));
    }

    #[test]
    fn boxed_driver_forwards_capabilities() {
        let caps = DriverCapabilities {
            boundaries: BoundarySupport::None,
            true_pause: false,
            keep_alive: None,
        };
        let (driver, _log) = testing::RecordingDriver::new(caps);
        let boxed: Box<dyn SpeechDriver> = Box::new(driver);
        assert_eq!(boxed.capabilities(), caps);
    }
}
