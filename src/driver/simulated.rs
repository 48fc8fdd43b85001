//! Silent, timer-driven synthesizer.
//!
//! [`SimulatedDriver`] "speaks" an utterance word by word on a tokio task,
//! taking each word's estimated duration.  Its declared capabilities and
//! actual behaviour are configurable independently, which covers every
//! synthesizer class the engine has to cope with:
//!
//! | boundaries   | emit_boundaries | behaves like                          |
//! |--------------|-----------------|---------------------------------------|
//! | `Reliable`   | `true`          | desktop browser synthesizer           |
//! | `Unreliable` | `true`/`false`  | synthesizer that may or may not fire  |
//! | `None`       | —               | mobile/embedded synthesizer           |
//!
//! Must be used from within a tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::DriverConfig;
use crate::text::index;
use crate::timing::{ms_to_duration, DurationEstimator, LinearEstimator};

use super::{
    BoundarySupport, DriverCapabilities, DriverError, DriverSink, SpeechDriver, UtteranceHandle,
    UtteranceRequest,
};

struct Active {
    handle: UtteranceHandle,
    paused: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Timer-driven synthesizer double.
pub struct SimulatedDriver {
    capabilities: DriverCapabilities,
    emit_boundaries: bool,
    estimator: Arc<dyn DurationEstimator>,
    active: Option<Active>,
}

impl SimulatedDriver {
    pub fn new(
        capabilities: DriverCapabilities,
        emit_boundaries: bool,
        estimator: Arc<dyn DurationEstimator>,
    ) -> Self {
        Self {
            capabilities,
            emit_boundaries: emit_boundaries && capabilities.boundaries != BoundarySupport::None,
            estimator,
            active: None,
        }
    }

    /// Build from `[driver]` settings.  The simulated pace follows the
    /// default estimator so synthetic and "spoken" timing agree.
    pub fn from_config(config: &DriverConfig) -> Self {
        let capabilities = DriverCapabilities {
            boundaries: config.simulated.boundaries,
            true_pause: config.simulated.true_pause,
            keep_alive: (config.keep_alive_secs > 0)
                .then(|| Duration::from_secs(config.keep_alive_secs)),
        };
        Self::new(
            capabilities,
            config.simulated.emit_boundaries,
            Arc::new(LinearEstimator::default()),
        )
    }

    fn is_active(&self, handle: UtteranceHandle) -> bool {
        self.active.as_ref().is_some_and(|a| a.handle == handle)
    }

    fn silence(&mut self) {
        if let Some(active) = self.active.take() {
            log::debug!("driver: simulated utterance {} cancelled", active.handle.0);
            active.task.abort();
        }
    }
}

impl SpeechDriver for SimulatedDriver {
    fn capabilities(&self) -> DriverCapabilities {
        self.capabilities
    }

    fn start(
        &mut self,
        request: UtteranceRequest,
        sink: DriverSink,
    ) -> Result<UtteranceHandle, DriverError> {
        if !(request.rate.is_finite() && request.rate > 0.0) {
            return Err(DriverError::Synthesis(format!(
                "unsupported rate {}",
                request.rate
            )));
        }
        self.silence();

        let handle = sink.handle();
        let (paused_tx, mut paused_rx) = watch::channel(false);
        let emit = self.emit_boundaries;
        let estimator = Arc::clone(&self.estimator);

        let task = tokio::spawn(async move {
            for span in index(&request.text) {
                while *paused_rx.borrow() {
                    if paused_rx.changed().await.is_err() {
                        return;
                    }
                }
                if emit {
                    sink.word_boundary(span.start);
                }
                let ms = estimator.estimate_ms(&span.word, request.rate);
                tokio::time::sleep(ms_to_duration(ms)).await;
            }
            while *paused_rx.borrow() {
                if paused_rx.changed().await.is_err() {
                    return;
                }
            }
            sink.end();
        });

        self.active = Some(Active {
            handle,
            paused: paused_tx,
            task,
        });
        Ok(handle)
    }

    fn pause(&mut self, handle: UtteranceHandle) {
        if !self.capabilities.true_pause {
            return;
        }
        if let Some(active) = self.active.as_ref().filter(|a| a.handle == handle) {
            let _ = active.paused.send(true);
        }
    }

    fn resume(&mut self, handle: UtteranceHandle) {
        if let Some(active) = self.active.as_ref().filter(|a| a.handle == handle) {
            let _ = active.paused.send(false);
        }
    }

    fn cancel(&mut self, handle: UtteranceHandle) {
        if self.is_active(handle) {
            self.silence();
        }
    }
}

impl Drop for SimulatedDriver {
    fn drop(&mut self) {
        self.silence();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverEvent, DriverNotice};
    use tokio::sync::mpsc;

    fn caps(boundaries: BoundarySupport) -> DriverCapabilities {
        DriverCapabilities {
            boundaries,
            true_pause: true,
            keep_alive: None,
        }
    }

    #[test]
    fn from_config_maps_keep_alive_interval() {
        let mut config = DriverConfig::default();
        let driver = SimulatedDriver::from_config(&config);
        assert_eq!(
            driver.capabilities().keep_alive,
            Some(Duration::from_secs(14))
        );

        config.keep_alive_secs = 0;
        let driver = SimulatedDriver::from_config(&config);
        assert_eq!(driver.capabilities().keep_alive, None);
    }

    fn request(text: &str) -> UtteranceRequest {
        UtteranceRequest {
            text: text.into(),
            rate: 1.0,
            language: "en-US".into(),
        }
    }

    fn driver(boundaries: BoundarySupport, emit: bool) -> SimulatedDriver {
        SimulatedDriver::new(caps(boundaries), emit, Arc::new(LinearEstimator::default()))
    }

    async fn drain(rx: &mut mpsc::UnboundedReceiver<DriverNotice>) -> Vec<DriverEvent> {
        let mut out = Vec::new();
        while let Some(n) = rx.recv().await {
            let done = n.event == DriverEvent::End;
            out.push(n.event);
            if done {
                break;
            }
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn reliable_driver_reports_every_word_then_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = driver(BoundarySupport::Reliable, true);
        d.start(request("The cat sat."), DriverSink::new(UtteranceHandle(1), tx))
            .unwrap();

        let events = drain(&mut rx).await;
        assert_eq!(
            events,
            vec![
                DriverEvent::WordBoundary { char_index: 0 },
                DriverEvent::WordBoundary { char_index: 4 },
                DriverEvent::WordBoundary { char_index: 8 },
                DriverEvent::End,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn boundaryless_driver_reports_only_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = driver(BoundarySupport::None, true);
        d.start(request("The cat sat."), DriverSink::new(UtteranceHandle(1), tx))
            .unwrap();

        assert_eq!(drain(&mut rx).await, vec![DriverEvent::End]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_end() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = driver(BoundarySupport::None, false);
        d.start(request("The cat sat."), DriverSink::new(UtteranceHandle(3), tx))
            .unwrap();
        d.cancel(UtteranceHandle(3));
        drop(d);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_of_stale_handle_is_ignored() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = driver(BoundarySupport::None, false);
        d.start(request("Hi."), DriverSink::new(UtteranceHandle(2), tx))
            .unwrap();
        d.cancel(UtteranceHandle(1));

        assert_eq!(drain(&mut rx).await, vec![DriverEvent::End]);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_back_end_until_resume() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = driver(BoundarySupport::None, false);
        let h = d
            .start(request("Hi."), DriverSink::new(UtteranceHandle(1), tx))
            .unwrap();
        d.pause(h);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());

        d.resume(h);
        assert_eq!(drain(&mut rx).await, vec![DriverEvent::End]);
    }

    #[tokio::test(start_paused = true)]
    async fn start_replaces_active_utterance() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = driver(BoundarySupport::None, false);
        d.start(request("first."), DriverSink::new(UtteranceHandle(1), tx.clone()))
            .unwrap();
        d.start(request("second."), DriverSink::new(UtteranceHandle(2), tx))
            .unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.handle, UtteranceHandle(2));
        assert_eq!(first.event, DriverEvent::End);
    }

    #[test]
    fn none_capability_never_emits() {
        let d = driver(BoundarySupport::None, true);
        assert!(!d.emit_boundaries);
    }
}
