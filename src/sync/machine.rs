//! The synchronization state machine.
//!
//! [`SyncMachine::handle`] is the only place engine state changes.  It takes
//! one [`EngineEvent`] and returns the [`Effect`]s the runtime has to carry
//! out, so every transition is testable without a synthesizer or a clock.
//!
//! # Staleness
//!
//! Every `play` starts a new *generation*; every pause, stop and restart
//! bumps the *ticket*.  Timers capture both and are discarded unless both
//! still match and the machine is `Speaking`.  Driver notices carry the
//! handle of the utterance that produced them and are discarded unless it
//! is the active one.
//!
//! # Timing modes
//!
//! ```text
//! Reliable   ──▶ Native
//! Unreliable ──▶ Probing ──first boundary──▶ Native
//!                        ──grace expired───▶ Synthetic (fast-forwarded)
//! None       ──▶ Synthetic
//! ```

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::AppConfig;
use crate::driver::{
    BoundarySupport, DriverCapabilities, DriverError, DriverEvent, DriverNotice, UtteranceHandle,
    UtteranceRequest,
};
use crate::text::{WordIndex, WordSpan};
use crate::timing::{ms_to_duration, DurationEstimator, LinearEstimator, WordTimingPlan};

use super::state::{PlaybackState, PlaybackStatus, SpeechEvent, SpeechState};

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors returned to the caller of an engine command.
///
/// Commands that make no sense in the current state (pausing while idle,
/// resuming while speaking) are not errors; they are ignored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The platform has no usable synthesizer.  Playback controls should be
    /// disabled.
    #[error("speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// The synthesizer refused to start the utterance.
    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    /// A precondition on a command argument was violated.  Nothing changed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The engine task has shut down.
    #[error("speech engine is not running")]
    Closed,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A controller command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Speak `text` from char `start_position`.  `rate: None` uses the most
    /// recently chosen rate.  Restarts if something is already playing.
    Play {
        text: Arc<str>,
        start_position: usize,
        rate: Option<f32>,
    },
    Pause,
    Resume,
    Stop,
    SetRate(f32),
}

/// What a deferred timer is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Emit the next synthetic word.
    WordTick,
    /// Give up waiting for a first native boundary.
    BoundaryGrace,
    /// Nudge a synthesizer that stalls on long utterances.
    KeepAlive,
}

/// Identity of a scheduled timer.  See the module docs on staleness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId {
    pub generation: u64,
    pub ticket: u64,
    pub kind: TimerKind,
}

/// Everything that can drive a transition.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    Command(Command),
    Driver(DriverNotice),
    Timer(TimerId),
    /// The runtime could not start an utterance the machine asked for.
    StartFailed {
        handle: UtteranceHandle,
        error: DriverError,
    },
}

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// Work the runtime performs on the machine's behalf, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartUtterance {
        handle: UtteranceHandle,
        request: UtteranceRequest,
    },
    PauseUtterance(UtteranceHandle),
    ResumeUtterance(UtteranceHandle),
    CancelUtterance(UtteranceHandle),
    /// Pause and immediately resume, to keep a stalling synthesizer alive.
    NudgeUtterance(UtteranceHandle),
    ScheduleTimer { id: TimerId, delay: Duration },
    /// Abort every pending timer.
    CancelTimers,
    Emit(SpeechEvent),
}

/// Where word timing comes from for the current utterance.
#[derive(Debug, Clone)]
pub enum TimingMode {
    /// Native boundary events drive the highlight.
    Native,
    /// Waiting for a first native boundary; `plan` takes over if none comes.
    Probing { plan: WordTimingPlan },
    /// The engine's own timer drives the highlight.
    Synthetic { plan: WordTimingPlan },
}

impl TimingMode {
    pub fn label(&self) -> &'static str {
        match self {
            TimingMode::Native => "native",
            TimingMode::Probing { .. } => "probing",
            TimingMode::Synthetic { .. } => "synthetic",
        }
    }
}

// ---------------------------------------------------------------------------
// EngineOptions
// ---------------------------------------------------------------------------

/// Settings the machine needs from configuration.
#[derive(Clone)]
pub struct EngineOptions {
    /// BCP-47 tag passed with every utterance.
    pub language: String,
    /// Rate used by `play` when none is given.
    pub rate: f32,
    /// How long to wait for a first boundary from an unreliable driver.
    pub boundary_grace: Duration,
    pub min_rate: f32,
    pub max_rate: f32,
    pub estimator: Arc<dyn DurationEstimator>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            rate: 1.0,
            boundary_grace: Duration::from_millis(750),
            min_rate: 0.1,
            max_rate: 10.0,
            estimator: Arc::new(LinearEstimator::default()),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        let defaults = Self::default();
        let timing = &config.timing;

        let (min_rate, max_rate) = if timing.min_rate.is_finite()
            && timing.max_rate.is_finite()
            && timing.min_rate > 0.0
            && timing.min_rate <= timing.max_rate
        {
            (timing.min_rate, timing.max_rate)
        } else {
            log::warn!(
                "sync: rate bounds {}..{} are unusable, using {}..{}",
                timing.min_rate,
                timing.max_rate,
                defaults.min_rate,
                defaults.max_rate
            );
            (defaults.min_rate, defaults.max_rate)
        };

        let rate = config.speech.normal_rate;
        let rate = if rate.is_finite() && rate > 0.0 {
            rate.clamp(min_rate, max_rate)
        } else {
            log::warn!("sync: normal_rate {rate} is not positive, using 1.0");
            defaults.rate
        };

        Self {
            language: config.speech.language.clone(),
            rate,
            boundary_grace: Duration::from_millis(timing.boundary_grace_ms),
            min_rate,
            max_rate,
            estimator: Arc::new(LinearEstimator::from_config(timing)),
        }
    }
}

impl std::fmt::Debug for EngineOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineOptions")
            .field("language", &self.language)
            .field("rate", &self.rate)
            .field("boundary_grace", &self.boundary_grace)
            .field("min_rate", &self.min_rate)
            .field("max_rate", &self.max_rate)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SyncMachine
// ---------------------------------------------------------------------------

/// Playback state plus the transition function over it.
pub struct SyncMachine {
    options: EngineOptions,
    capabilities: DriverCapabilities,
    state: SpeechState,
    playback: Option<PlaybackState>,
    mode: TimingMode,
    generation: u64,
    ticket: u64,
    /// Utterance the driver is currently holding for us.
    active: Option<UtteranceHandle>,
    paused_natively: bool,
    preferred_rate: f32,
    /// Whether the last `Word` event emitted carried a word.
    highlight_shown: bool,
    /// Last `Progress` value emitted.
    progress: f32,
    unavailable: bool,
}

impl SyncMachine {
    pub fn new(options: EngineOptions, capabilities: DriverCapabilities) -> Self {
        let preferred_rate = options.rate;
        Self {
            options,
            capabilities,
            state: SpeechState::Idle,
            playback: None,
            mode: TimingMode::Native,
            generation: 0,
            ticket: 0,
            active: None,
            paused_natively: false,
            preferred_rate,
            highlight_shown: false,
            progress: 0.0,
            unavailable: false,
        }
    }

    pub fn state(&self) -> SpeechState {
        self.state
    }

    pub fn mode(&self) -> &TimingMode {
        &self.mode
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn playback(&self) -> Option<&PlaybackState> {
        self.playback.as_ref()
    }

    /// Snapshot for polling UIs.
    pub fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            state: self.state,
            position: self.playback.as_ref().map_or(0, |p| p.current_position),
            rate: self
                .playback
                .as_ref()
                .map_or(self.preferred_rate, |p| p.rate),
            progress: self.progress,
            word: if self.highlight_shown {
                self.playback
                    .as_ref()
                    .and_then(|p| p.last_highlighted.clone())
            } else {
                None
            },
            unavailable: self.unavailable,
        }
    }

    /// Apply one event.
    ///
    /// Only commands can fail, and only on argument preconditions; a failed
    /// command leaves the machine untouched.
    pub fn handle(&mut self, event: EngineEvent) -> Result<Vec<Effect>, EngineError> {
        let mut fx = Vec::new();
        match event {
            EngineEvent::Command(command) => self.on_command(command, &mut fx)?,
            EngineEvent::Driver(notice) => self.on_driver(notice, &mut fx),
            EngineEvent::Timer(id) => self.on_timer(id, &mut fx),
            EngineEvent::StartFailed { handle, error } => {
                self.on_start_failed(handle, error, &mut fx)
            }
        }
        Ok(fx)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn on_command(&mut self, command: Command, fx: &mut Vec<Effect>) -> Result<(), EngineError> {
        match command {
            Command::Play {
                text,
                start_position,
                rate,
            } => {
                let rate = self.check_rate(rate.unwrap_or(self.preferred_rate))?;
                let (index, same_text) = self.index_for(text);
                if start_position > index.char_len() {
                    return Err(EngineError::InvalidArgument(format!(
                        "start position {start_position} is past the end of the text ({} chars)",
                        index.char_len()
                    )));
                }
                self.preferred_rate = rate;
                if !same_text {
                    self.clear_highlight(fx);
                }
                self.start(index, start_position, rate, fx);
            }
            Command::Pause => self.pause(fx),
            Command::Resume => self.resume(fx),
            Command::Stop => self.stop(fx),
            Command::SetRate(rate) => {
                let rate = self.check_rate(rate)?;
                self.set_rate(rate, fx);
            }
        }
        Ok(())
    }

    fn check_rate(&self, rate: f32) -> Result<f32, EngineError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "rate must be a positive number, got {rate}"
            )));
        }
        Ok(rate.clamp(self.options.min_rate, self.options.max_rate))
    }

    /// Reuse the current index when the text has not changed.
    fn index_for(&self, text: Arc<str>) -> (Arc<WordIndex>, bool) {
        match self.playback.as_ref() {
            Some(p) if p.index.text().as_ref() == text.as_ref() => (Arc::clone(&p.index), true),
            _ => (Arc::new(WordIndex::new(text)), false),
        }
    }

    fn start(
        &mut self,
        index: Arc<WordIndex>,
        start_position: usize,
        rate: f32,
        fx: &mut Vec<Effect>,
    ) {
        self.halt(fx);
        self.generation += 1;
        let handle = UtteranceHandle(self.generation);

        self.mode = match self.capabilities.boundaries {
            BoundarySupport::Reliable => TimingMode::Native,
            BoundarySupport::Unreliable => {
                self.schedule(TimerKind::BoundaryGrace, self.options.boundary_grace, fx);
                TimingMode::Probing {
                    plan: self.plan(&index, start_position, rate),
                }
            }
            BoundarySupport::None => {
                self.schedule(TimerKind::WordTick, Duration::ZERO, fx);
                TimingMode::Synthetic {
                    plan: self.plan(&index, start_position, rate),
                }
            }
        };
        if let Some(every) = self.capabilities.keep_alive {
            self.schedule(TimerKind::KeepAlive, every, fx);
        }

        log::info!(
            "sync: utterance {} from char {start_position} at rate {rate} ({} timing)",
            handle.0,
            self.mode.label()
        );

        let request = UtteranceRequest {
            text: index.suffix_from(start_position).to_owned(),
            rate,
            language: self.options.language.clone(),
        };
        self.playback = Some(PlaybackState::new(index, rate, start_position));
        self.state = SpeechState::Speaking;
        self.active = Some(handle);
        fx.push(Effect::StartUtterance { handle, request });
    }

    fn plan(&self, index: &WordIndex, from: usize, rate: f32) -> WordTimingPlan {
        WordTimingPlan::build(index, from, rate, self.options.estimator.as_ref())
    }

    fn pause(&mut self, fx: &mut Vec<Effect>) {
        if self.state != SpeechState::Speaking {
            log::debug!("sync: pause ignored while {}", self.state.label());
            return;
        }

        self.ticket += 1;
        fx.push(Effect::CancelTimers);

        let native = self.capabilities.true_pause && matches!(self.mode, TimingMode::Native);
        match self.active {
            Some(handle) if native => {
                fx.push(Effect::PauseUtterance(handle));
                self.paused_natively = true;
            }
            _ => {
                if let Some(handle) = self.active.take() {
                    fx.push(Effect::CancelUtterance(handle));
                }
                self.paused_natively = false;
            }
        }

        self.state = SpeechState::Paused;
        self.highlight_shown = false;
        fx.push(Effect::Emit(SpeechEvent::Word(None)));
        log::debug!(
            "sync: paused at char {} ({})",
            self.status().position,
            if self.paused_natively {
                "native"
            } else {
                "cancelled"
            }
        );
    }

    fn resume(&mut self, fx: &mut Vec<Effect>) {
        if self.state != SpeechState::Paused {
            log::debug!("sync: resume ignored while {}", self.state.label());
            return;
        }

        match (self.paused_natively, self.active) {
            (true, Some(handle)) => {
                self.paused_natively = false;
                self.state = SpeechState::Speaking;
                fx.push(Effect::ResumeUtterance(handle));
                let last = self
                    .playback
                    .as_ref()
                    .and_then(|p| p.last_highlighted.clone());
                if let Some(span) = last {
                    self.highlight(span, fx);
                }
                if let Some(every) = self.capabilities.keep_alive {
                    self.schedule(TimerKind::KeepAlive, every, fx);
                }
                log::debug!("sync: resumed utterance {}", handle.0);
            }
            _ => {
                let restart = self
                    .playback
                    .as_ref()
                    .map(|p| (Arc::clone(&p.index), p.current_position, p.rate));
                match restart {
                    Some((index, position, rate)) => self.start(index, position, rate, fx),
                    None => {
                        log::warn!("sync: paused without playback state, going idle");
                        self.stop(fx);
                    }
                }
            }
        }
    }

    fn stop(&mut self, fx: &mut Vec<Effect>) {
        let was = self.state;
        self.halt(fx);
        self.state = SpeechState::Idle;
        self.playback = None;
        self.mode = TimingMode::Native;

        self.clear_highlight(fx);
        if self.progress > 0.0 {
            self.progress = 0.0;
            fx.push(Effect::Emit(SpeechEvent::Progress(0.0)));
        }
        if was.is_active() {
            log::info!("sync: stopped");
        }
    }

    fn set_rate(&mut self, rate: f32, fx: &mut Vec<Effect>) {
        self.preferred_rate = rate;
        match self.state {
            SpeechState::Speaking => {
                let restart = self
                    .playback
                    .as_ref()
                    .map(|p| (Arc::clone(&p.index), p.current_position));
                if let Some((index, position)) = restart {
                    log::debug!("sync: rate {rate}, restarting from char {position}");
                    self.start(index, position, rate, fx);
                }
            }
            SpeechState::Paused => {
                if let Some(p) = self.playback.as_mut() {
                    p.rate = rate;
                }
                // A native pause cannot resume at a different rate.
                if self.paused_natively {
                    if let Some(handle) = self.active.take() {
                        fx.push(Effect::CancelUtterance(handle));
                    }
                    self.paused_natively = false;
                }
            }
            SpeechState::Idle => {}
        }
    }

    /// Cancel the active utterance and invalidate every pending timer.
    fn halt(&mut self, fx: &mut Vec<Effect>) {
        self.ticket += 1;
        fx.push(Effect::CancelTimers);
        if let Some(handle) = self.active.take() {
            fx.push(Effect::CancelUtterance(handle));
        }
        self.paused_natively = false;
    }

    // -----------------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------------

    fn schedule(&self, kind: TimerKind, delay: Duration, fx: &mut Vec<Effect>) {
        fx.push(Effect::ScheduleTimer {
            id: TimerId {
                generation: self.generation,
                ticket: self.ticket,
                kind,
            },
            delay,
        });
    }

    fn on_timer(&mut self, id: TimerId, fx: &mut Vec<Effect>) {
        if id.generation != self.generation
            || id.ticket != self.ticket
            || self.state != SpeechState::Speaking
        {
            log::trace!("sync: stale {:?} timer dropped", id.kind);
            return;
        }

        match id.kind {
            TimerKind::WordTick => self.tick(0.0, fx),
            TimerKind::BoundaryGrace => self.abandon_probe(fx),
            TimerKind::KeepAlive => {
                if let Some(handle) = self.active {
                    fx.push(Effect::NudgeUtterance(handle));
                    if let Some(every) = self.capabilities.keep_alive {
                        self.schedule(TimerKind::KeepAlive, every, fx);
                    }
                }
            }
        }
    }

    /// Emit the next planned word.  `skip_ms` of it has already elapsed.
    fn tick(&mut self, skip_ms: f64, fx: &mut Vec<Effect>) {
        let next = match &mut self.mode {
            TimingMode::Synthetic { plan } => plan.pop(),
            _ => return,
        };
        match next {
            Some(word) => {
                let delay = ms_to_duration(word.estimated_ms - skip_ms);
                self.highlight(word.span, fx);
                self.schedule(TimerKind::WordTick, delay, fx);
            }
            None => log::debug!("sync: timing plan exhausted, waiting for end of speech"),
        }
    }

    fn abandon_probe(&mut self, fx: &mut Vec<Effect>) {
        let mut plan = match mem::replace(&mut self.mode, TimingMode::Native) {
            TimingMode::Probing { plan } => plan,
            other => {
                self.mode = other;
                return;
            }
        };

        let grace_ms = self.options.boundary_grace.as_millis() as f64;
        let into_next = plan.fast_forward(grace_ms);
        log::info!(
            "sync: no word boundary within {grace_ms}ms, switching to synthetic timing ({} words skipped)",
            plan.consumed()
        );
        self.mode = TimingMode::Synthetic { plan };
        self.tick(into_next, fx);
    }

    // -----------------------------------------------------------------------
    // Driver notices
    // -----------------------------------------------------------------------

    fn on_driver(&mut self, notice: DriverNotice, fx: &mut Vec<Effect>) {
        if self.active != Some(notice.handle) {
            log::debug!(
                "sync: {:?} from superseded utterance {} dropped",
                notice.event,
                notice.handle.0
            );
            return;
        }

        match notice.event {
            DriverEvent::WordBoundary { char_index } => self.on_boundary(char_index, fx),
            DriverEvent::End => self.on_end(fx),
            DriverEvent::Error(message) => self.on_driver_error(message, fx),
        }
    }

    fn on_boundary(&mut self, char_index: usize, fx: &mut Vec<Effect>) {
        if self.state != SpeechState::Speaking {
            return;
        }
        match self.mode {
            TimingMode::Native => {}
            TimingMode::Probing { .. } => {
                log::debug!("sync: native word boundaries confirmed");
                self.mode = TimingMode::Native;
            }
            TimingMode::Synthetic { .. } => {
                log::trace!("sync: late native boundary ignored under synthetic timing");
                return;
            }
        }

        // Boundary offsets are relative to the text handed to the driver.
        let (offset, resolved, position, last) = match self.playback.as_ref() {
            Some(p) => {
                let offset = (p.start_position + char_index).min(p.index.char_len());
                (
                    offset,
                    p.index.resolve(offset).cloned(),
                    p.current_position,
                    p.last_highlighted.clone(),
                )
            }
            None => return,
        };

        match resolved {
            Some(span) => {
                if self.highlight_shown && last.as_ref() == Some(&span) {
                    return;
                }
                self.highlight(span, fx);
            }
            None => {
                if !self.highlight_shown && position == offset {
                    return;
                }
                if let Some(p) = self.playback.as_mut() {
                    p.current_position = offset;
                }
                self.clear_highlight(fx);
                self.emit_progress(fx);
            }
        }
    }

    fn on_end(&mut self, fx: &mut Vec<Effect>) {
        if self.state != SpeechState::Speaking {
            log::debug!("sync: end of speech ignored while {}", self.state.label());
            return;
        }

        // The utterance is finished; there is nothing left to cancel.
        self.active = None;
        self.halt(fx);
        self.state = SpeechState::Idle;
        self.playback = None;
        self.mode = TimingMode::Native;

        self.highlight_shown = false;
        self.progress = 100.0;
        fx.push(Effect::Emit(SpeechEvent::Word(None)));
        fx.push(Effect::Emit(SpeechEvent::Progress(100.0)));
        fx.push(Effect::Emit(SpeechEvent::End));
        log::info!("sync: utterance finished");
    }

    fn on_driver_error(&mut self, message: String, fx: &mut Vec<Effect>) {
        log::warn!("sync: synthesis failed mid-utterance: {message}");

        self.active = None;
        self.halt(fx);
        self.state = SpeechState::Idle;
        self.playback = None;
        self.mode = TimingMode::Native;

        self.highlight_shown = false;
        fx.push(Effect::Emit(SpeechEvent::Word(None)));
        fx.push(Effect::Emit(SpeechEvent::Error(message)));
    }

    fn on_start_failed(&mut self, handle: UtteranceHandle, error: DriverError, fx: &mut Vec<Effect>) {
        if self.active != Some(handle) {
            return;
        }

        self.active = None;
        self.halt(fx);
        self.state = SpeechState::Idle;
        self.playback = None;
        self.mode = TimingMode::Native;
        self.clear_highlight(fx);

        match error {
            DriverError::Unavailable(message) => {
                log::warn!("sync: no speech synthesizer: {message}");
                self.unavailable = true;
                fx.push(Effect::Emit(SpeechEvent::Unavailable(message)));
            }
            DriverError::Synthesis(message) => {
                log::warn!("sync: utterance {} refused: {message}", handle.0);
                fx.push(Effect::Emit(SpeechEvent::Error(message)));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Emission
    // -----------------------------------------------------------------------

    /// Highlight `span` and move the playback head to its start.
    fn highlight(&mut self, span: WordSpan, fx: &mut Vec<Effect>) {
        if let Some(p) = self.playback.as_mut() {
            p.current_position = span.start;
            p.last_highlighted = Some(span.clone());
        }
        self.highlight_shown = true;
        fx.push(Effect::Emit(SpeechEvent::Word(Some(span))));
        self.emit_progress(fx);
    }

    fn clear_highlight(&mut self, fx: &mut Vec<Effect>) {
        if self.highlight_shown {
            self.highlight_shown = false;
            fx.push(Effect::Emit(SpeechEvent::Word(None)));
        }
    }

    fn emit_progress(&mut self, fx: &mut Vec<Effect>) {
        let progress = self.playback.as_ref().map_or(0.0, |p| p.progress());
        self.progress = progress;
        fx.push(Effect::Emit(SpeechEvent::Progress(progress)));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
