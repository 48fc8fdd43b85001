//! External-program synthesizer (e.g. `espeak-ng`).
//!
//! The text is spoken one sentence per process so a cancel takes effect
//! within a sentence and no single invocation carries a whole page.  The
//! program reports nothing but its exit, so this driver declares no word
//! boundaries and no true pause: the engine times words itself and restarts
//! from its own position on resume.

use std::io;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::DriverConfig;
use crate::text::split_sentences;

use super::{
    BoundarySupport, DriverCapabilities, DriverError, DriverSink, SpeechDriver, UtteranceHandle,
    UtteranceRequest,
};

const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 500.0;

struct Active {
    handle: UtteranceHandle,
    task: JoinHandle<()>,
}

/// Speaks through an external TTS program, one process per sentence.
///
/// The program is invoked as `<program> -v <voice> -s <wpm> -- <sentence>`,
/// the `espeak`/`espeak-ng` command line.
pub struct CommandDriver {
    program: String,
    words_per_minute: u32,
    active: Option<Active>,
}

impl CommandDriver {
    pub fn new(program: impl Into<String>, words_per_minute: u32) -> Self {
        Self {
            program: program.into(),
            words_per_minute,
            active: None,
        }
    }

    pub fn from_config(config: &DriverConfig) -> Self {
        Self::new(config.command.clone(), config.words_per_minute)
    }

    fn silence(&mut self) {
        if let Some(active) = self.active.take() {
            log::debug!("driver: command utterance {} cancelled", active.handle.0);
            // Dropping the aborted task drops its child, which kills it.
            active.task.abort();
        }
    }
}

fn spawn_speaker(
    program: &str,
    request: &UtteranceRequest,
    words_per_minute: u32,
    sentence: &str,
) -> io::Result<Child> {
    Command::new(program)
        .args(speak_args(
            &request.language,
            request.rate,
            words_per_minute,
            sentence,
        ))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

/// Command-line arguments for one sentence.
///
/// `en-US` becomes the voice `en-us`; the speed is scaled by `rate` and
/// clamped to what espeak accepts.
pub fn speak_args(language: &str, rate: f32, words_per_minute: u32, text: &str) -> Vec<String> {
    let wpm = (words_per_minute as f32 * rate).clamp(MIN_WPM, MAX_WPM).round() as u32;
    vec![
        "-v".into(),
        language.to_ascii_lowercase(),
        "-s".into(),
        wpm.to_string(),
        "--".into(),
        text.into(),
    ]
}

impl SpeechDriver for CommandDriver {
    fn capabilities(&self) -> DriverCapabilities {
        DriverCapabilities {
            boundaries: BoundarySupport::None,
            true_pause: false,
            keep_alive: None,
        }
    }

    fn start(
        &mut self,
        request: UtteranceRequest,
        sink: DriverSink,
    ) -> Result<UtteranceHandle, DriverError> {
        self.silence();

        let handle = sink.handle();
        let sentences = split_sentences(&request.text);
        let mut pending = sentences.into_iter();

        let first = match pending.next() {
            Some(sentence) => Some({
                log::debug!("command: speaking sentence at char {}", sentence.start);
                spawn_speaker(&self.program, &request, self.words_per_minute, &sentence.text)
                    .map_err(|e| match e.kind() {
                        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                            DriverError::Unavailable(format!("{}: {e}", self.program))
                        }
                        _ => DriverError::Synthesis(format!("{}: {e}", self.program)),
                    })?
            }),
            None => None,
        };

        let program = self.program.clone();
        let words_per_minute = self.words_per_minute;
        let task = tokio::spawn(async move {
            let mut child = first;
            while let Some(mut running) = child.take() {
                match running.wait().await {
                    Ok(status) if status.success() => {}
                    Ok(status) => {
                        sink.error(format!("{program} exited with {status}"));
                        return;
                    }
                    Err(e) => {
                        sink.error(format!("{program}: {e}"));
                        return;
                    }
                }

                if let Some(sentence) = pending.next() {
                    log::debug!("command: speaking sentence at char {}", sentence.start);
                    let spawned =
                        spawn_speaker(&program, &request, words_per_minute, &sentence.text);
                    match spawned {
                        Ok(next) => child = Some(next),
                        Err(e) => {
                            sink.error(format!("{program}: {e}"));
                            return;
                        }
                    }
                }
            }
            sink.end();
        });

        self.active = Some(Active { handle, task });
        Ok(handle)
    }

    fn pause(&mut self, _handle: UtteranceHandle) {}

    fn resume(&mut self, _handle: UtteranceHandle) {}

    fn cancel(&mut self, handle: UtteranceHandle) {
        if self.active.as_ref().is_some_and(|a| a.handle == handle) {
            self.silence();
        }
    }
}

impl Drop for CommandDriver {
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
    use crate::driver::DriverEvent;
    use tokio::sync::mpsc;

    fn request(text: &str) -> UtteranceRequest {
        UtteranceRequest {
            text: text.into(),
            rate: 1.0,
            language: "en-US".into(),
        }
    }

    #[test]
    fn args_scale_speed_by_rate() {
        let args = speak_args("en-US", 0.5, 180, "Hello.");
        assert_eq!(args, vec!["-v", "en-us", "-s", "90", "--", "Hello."]);
    }

    #[test]
    fn args_clamp_speed() {
        assert_eq!(speak_args("en", 0.1, 175, "x")[3], "80");
        assert_eq!(speak_args("en", 10.0, 175, "x")[3], "500");
    }

    #[test]
    fn declares_no_boundaries_and_no_true_pause() {
        let caps = CommandDriver::new("espeak-ng", 175).capabilities();
        assert_eq!(caps.boundaries, BoundarySupport::None);
        assert!(!caps.true_pause);
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut d = CommandDriver::new("read-along-no-such-synthesizer", 175);
        let err = d
            .start(request("Hello there."), DriverSink::new(UtteranceHandle(1), tx))
            .unwrap_err();
        assert!(matches!(err, DriverError::Unavailable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_text_ends_immediately() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = CommandDriver::new("read-along-no-such-synthesizer", 175);
        d.start(request("   "), DriverSink::new(UtteranceHandle(1), tx))
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().event, DriverEvent::End);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_program_ends_after_every_sentence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = CommandDriver::new("true", 175);
        d.start(request("One. Two. Three."), DriverSink::new(UtteranceHandle(4), tx))
            .unwrap();
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.handle, UtteranceHandle(4));
        assert_eq!(notice.event, DriverEvent::End);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_program_reports_error() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut d = CommandDriver::new("false", 175);
        d.start(request("One."), DriverSink::new(UtteranceHandle(1), tx))
            .unwrap();
        assert!(matches!(
            rx.recv().await.unwrap().event,
            DriverEvent::Error(_)
        ));
    }
}
