//! Engine runtime: carries out the machine's effects on tokio.
//!
//! [`SpeechEngine`] owns the [`SyncMachine`], the driver and every pending
//! timer.  All state changes happen on whichever task owns the engine, so
//! the machine never sees two events at once.
//!
//! ```text
//! EngineHandle ──Request──▶ SpeechEngine::run ──Effect──▶ SpeechDriver
//!      ▲                       ▲       ▲                    │
//!      │ broadcast/watch       │       └── TimerId ◀── tokio::time::sleep
//!      └───────────────────────┴────────── DriverNotice ◀───┘
//! ```
//!
//! The engine can be driven directly through its synchronous methods
//! (tests, single-task hosts) or spawned and driven through an
//! [`EngineHandle`].

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::driver::{DriverError, DriverNotice, DriverSink, SpeechDriver};
use crate::text::WordSpan;

use super::machine::{Command, Effect, EngineError, EngineEvent, EngineOptions, SyncMachine, TimerId};
use super::state::{PlaybackStatus, SpeechEvent, SpeechState};

const EVENT_CAPACITY: usize = 256;
const REQUEST_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// SpeechEngine
// ---------------------------------------------------------------------------

/// A controller command together with the channel its result goes back on.
#[derive(Debug)]
pub struct Request {
    pub command: Command,
    pub reply: oneshot::Sender<Result<(), EngineError>>,
}

/// Drives one [`SpeechDriver`] from a [`SyncMachine`].
///
/// Must be created and used inside a tokio runtime.
///
/// ```rust,no_run
/// use read_along::driver::SimulatedDriver;
/// use read_along::config::AppConfig;
/// use read_along::sync::{EngineOptions, SpeechEngine, SpeechEvent};
///
/// # async fn example() -> Result<(), read_along::sync::EngineError> {
/// let config = AppConfig::default();
/// let driver = SimulatedDriver::from_config(&config.driver);
/// let engine = SpeechEngine::new(driver, EngineOptions::from_config(&config));
/// let handle = engine.spawn();
///
/// let mut events = handle.subscribe();
/// handle.play("The cat sat.", 0, None).await?;
/// while let Ok(event) = events.recv().await {
///     if event == SpeechEvent::End {
///         break;
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SpeechEngine<D: SpeechDriver> {
    machine: SyncMachine,
    driver: D,
    events: broadcast::Sender<SpeechEvent>,
    status: watch::Sender<PlaybackStatus>,
    notice_tx: mpsc::UnboundedSender<DriverNotice>,
    notice_rx: mpsc::UnboundedReceiver<DriverNotice>,
    timer_tx: mpsc::UnboundedSender<TimerId>,
    timer_rx: mpsc::UnboundedReceiver<TimerId>,
    timers: Vec<JoinHandle<()>>,
}

impl<D: SpeechDriver> SpeechEngine<D> {
    pub fn new(driver: D, options: EngineOptions) -> Self {
        let machine = SyncMachine::new(options, driver.capabilities());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (status, _) = watch::channel(machine.status());
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();
        Self {
            machine,
            driver,
            events,
            status,
            notice_tx,
            notice_rx,
            timer_tx,
            timer_rx,
            timers: Vec::new(),
        }
    }

    /// Receive every [`SpeechEvent`] emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }

    /// Watch the [`PlaybackStatus`] snapshot.
    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.machine.status()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Speak `text` from char `start_position`.
    ///
    /// Fails with [`EngineError::SynthesisUnavailable`] when the platform
    /// has no synthesizer, and with [`EngineError::InvalidArgument`] on a
    /// bad rate or start position.
    pub fn play(
        &mut self,
        text: impl Into<Arc<str>>,
        start_position: usize,
        rate: Option<f32>,
    ) -> Result<(), EngineError> {
        self.command(Command::Play {
            text: text.into(),
            start_position,
            rate,
        })
    }

    pub fn pause(&mut self) {
        self.log_failure(Command::Pause);
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.command(Command::Resume)
    }

    pub fn stop(&mut self) {
        self.log_failure(Command::Stop);
    }

    pub fn set_rate(&mut self, rate: f32) -> Result<(), EngineError> {
        self.command(Command::SetRate(rate))
    }

    pub fn command(&mut self, command: Command) -> Result<(), EngineError> {
        self.dispatch(EngineEvent::Command(command))
    }

    fn log_failure(&mut self, command: Command) {
        if let Err(e) = self.command(command) {
            log::warn!("sync: {e}");
        }
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Wait for the next driver notice or timer and apply it.
    pub async fn step(&mut self) {
        let event = tokio::select! {
            Some(notice) = self.notice_rx.recv() => EngineEvent::Driver(notice),
            Some(id) = self.timer_rx.recv() => EngineEvent::Timer(id),
            else => return,
        };
        if let Err(e) = self.dispatch(event) {
            log::warn!("sync: {e}");
        }
    }

    /// Serve requests until every sender of `requests` is dropped, then stop
    /// playback.
    pub async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        log::info!("sync: engine running");
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(Request { command, reply }) => {
                        let result = self.command(command);
                        let _ = reply.send(result);
                    }
                    None => break,
                },
                _ = self.step() => {}
            }
        }
        self.stop();
        log::info!("sync: request channel closed, engine shutting down");
    }

    /// Move the engine onto its own task and return a handle to it.
    pub fn spawn(self) -> EngineHandle
    where
        D: 'static,
    {
        let (tx, rx) = mpsc::channel(REQUEST_CAPACITY);
        let handle = EngineHandle {
            requests: tx,
            events: self.events.clone(),
            status: self.status.subscribe(),
        };
        tokio::spawn(self.run(rx));
        handle
    }

    // -----------------------------------------------------------------------
    // Effects
    // -----------------------------------------------------------------------

    fn dispatch(&mut self, event: EngineEvent) -> Result<(), EngineError> {
        let effects = self.machine.handle(event)?;
        let result = self.apply(effects);
        self.status.send_replace(self.machine.status());
        result
    }

    /// Carry out `effects` in order.  A failed start is fed back into the
    /// machine and its follow-up effects run in the same pass.
    fn apply(&mut self, effects: Vec<Effect>) -> Result<(), EngineError> {
        let mut queue: VecDeque<Effect> = effects.into();
        let mut result = Ok(());

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::StartUtterance { handle, request } => {
                    let sink = DriverSink::new(handle, self.notice_tx.clone());
                    if let Err(error) = self.driver.start(request, sink) {
                        result = Err(match &error {
                            DriverError::Unavailable(msg) => {
                                EngineError::SynthesisUnavailable(msg.clone())
                            }
                            DriverError::Synthesis(msg) => EngineError::Synthesis(msg.clone()),
                        });
                        let follow_up = self
                            .machine
                            .handle(EngineEvent::StartFailed { handle, error })?;
                        queue.extend(follow_up);
                    }
                }
                Effect::PauseUtterance(handle) => self.driver.pause(handle),
                Effect::ResumeUtterance(handle) => self.driver.resume(handle),
                Effect::CancelUtterance(handle) => self.driver.cancel(handle),
                Effect::NudgeUtterance(handle) => {
                    log::trace!("sync: keep-alive nudge for utterance {}", handle.0);
                    self.driver.pause(handle);
                    self.driver.resume(handle);
                }
                Effect::ScheduleTimer { id, delay } => {
                    self.timers.retain(|t| !t.is_finished());
                    let tx = self.timer_tx.clone();
                    self.timers.push(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(id);
                    }));
                }
                Effect::CancelTimers => {
                    for timer in self.timers.drain(..) {
                        timer.abort();
                    }
                }
                Effect::Emit(event) => {
                    // No subscribers is not an error.
                    let _ = self.events.send(event);
                }
            }
        }
        result
    }
}

impl<D: SpeechDriver> Drop for SpeechEngine<D> {
    fn drop(&mut self) {
        for timer in self.timers.drain(..) {
            timer.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// EngineHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable front end to a spawned [`SpeechEngine`].
///
/// The engine task ends, stopping playback, once every handle is dropped.
#[derive(Clone)]
pub struct EngineHandle {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<SpeechEvent>,
    status: watch::Receiver<PlaybackStatus>,
}

impl EngineHandle {
    pub async fn play(
        &self,
        text: impl Into<Arc<str>>,
        start_position: usize,
        rate: Option<f32>,
    ) -> Result<(), EngineError> {
        self.send(Command::Play {
            text: text.into(),
            start_position,
            rate,
        })
        .await
    }

    pub async fn pause(&self) -> Result<(), EngineError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.send(Command::Resume).await
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        self.send(Command::Stop).await
    }

    pub async fn set_rate(&self, rate: f32) -> Result<(), EngineError> {
        self.send(Command::SetRate(rate)).await
    }

    pub async fn send(&self, command: Command) -> Result<(), EngineError> {
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request { command, reply })
            .await
            .map_err(|_| EngineError::Closed)?;
        rx.await.map_err(|_| EngineError::Closed)?
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.events.subscribe()
    }

    /// Latest status snapshot.
    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    pub fn state(&self) -> SpeechState {
        self.status.borrow().state
    }

    /// Call `callback` with every highlight change.
    pub fn on_word<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(Option<WordSpan>) + Send + 'static,
    {
        self.listen(move |event| {
            if let SpeechEvent::Word(word) = event {
                callback(word);
            }
        })
    }

    /// Call `callback` with every progress percentage.
    pub fn on_progress<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(f32) + Send + 'static,
    {
        self.listen(move |event| {
            if let SpeechEvent::Progress(percent) = event {
                callback(percent);
            }
        })
    }

    /// Call `callback` each time a page finishes on its own.
    pub fn on_end<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut() + Send + 'static,
    {
        self.listen(move |event| {
            if event == SpeechEvent::End {
                callback();
            }
        })
    }

    fn listen<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(SpeechEvent) + Send + 'static,
    {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        log::warn!("sync: listener lagged, {missed} events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
