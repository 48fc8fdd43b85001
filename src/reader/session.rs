//! Read-aloud session: pages, speed and auto-advance over one engine.
//!
//! ```text
//! play_current ──▶ EngineHandle::play(page text, 0, rate)
//!      ▲                        │
//!      │                  SpeechEvent::End
//!      └── auto_advance ◀───────┘   (stops after the last page)
//! ```

use crate::config::AppConfig;
use crate::sync::{EngineError, EngineHandle, SpeechEvent, SpeechState};

use super::{PageCursor, PageSource, ReaderError};

// ---------------------------------------------------------------------------
// Speed
// ---------------------------------------------------------------------------

/// The two reading speeds the reader offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    #[default]
    Normal,
    Slow,
}

impl Speed {
    pub fn toggled(self) -> Self {
        match self {
            Speed::Normal => Speed::Slow,
            Speed::Slow => Speed::Normal,
        }
    }
}

// ---------------------------------------------------------------------------
// ReadAloudSession
// ---------------------------------------------------------------------------

/// Reads a [`PageSource`] aloud page by page.
pub struct ReadAloudSession<S: PageSource> {
    source: S,
    cursor: PageCursor,
    engine: EngineHandle,
    speed: Speed,
    normal_rate: f32,
    slow_rate: f32,
    auto_advance: bool,
}

impl<S: PageSource> ReadAloudSession<S> {
    pub fn new(source: S, engine: EngineHandle, config: &AppConfig) -> Result<Self, ReaderError> {
        let cursor = PageCursor::new(source.page_count())?;
        Ok(Self {
            source,
            cursor,
            engine,
            speed: Speed::Normal,
            normal_rate: config.speech.normal_rate,
            slow_rate: config.speech.slow_rate,
            auto_advance: config.reader.auto_advance,
        })
    }

    pub fn page(&self) -> usize {
        self.cursor.page()
    }

    pub fn page_count(&self) -> usize {
        self.cursor.count()
    }

    pub fn speed(&self) -> Speed {
        self.speed
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn rate(&self) -> f32 {
        match self.speed {
            Speed::Normal => self.normal_rate,
            Speed::Slow => self.slow_rate,
        }
    }

    // -----------------------------------------------------------------------
    // Playback
    // -----------------------------------------------------------------------

    /// Start reading the current page from its beginning.
    pub async fn play_current(&mut self) -> Result<(), ReaderError> {
        let text = self.source.page_text(self.cursor.page()).await?;
        log::info!(
            "reader: page {}/{} at {:?} speed",
            self.cursor.page(),
            self.cursor.count(),
            self.speed
        );
        self.engine.play(text, 0, Some(self.rate())).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<(), ReaderError> {
        Ok(self.engine.pause().await?)
    }

    pub async fn resume(&self) -> Result<(), ReaderError> {
        Ok(self.engine.resume().await?)
    }

    pub async fn stop(&self) -> Result<(), ReaderError> {
        Ok(self.engine.stop().await?)
    }

    /// Switch between normal and slow reading.  Speech in progress continues
    /// from the current word at the new rate.
    pub async fn toggle_speed(&mut self) -> Result<Speed, ReaderError> {
        self.speed = self.speed.toggled();
        self.engine.set_rate(self.rate()).await?;
        log::debug!("reader: speed {:?}", self.speed);
        Ok(self.speed)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Changing page stops speech; the new page starts from its beginning.
    pub async fn next_page(&mut self) -> Result<bool, ReaderError> {
        self.stop().await?;
        Ok(self.cursor.next())
    }

    pub async fn previous_page(&mut self) -> Result<bool, ReaderError> {
        self.stop().await?;
        Ok(self.cursor.previous())
    }

    pub async fn go_to_page(&mut self, page: usize) -> Result<(), ReaderError> {
        let mut target = self.cursor;
        target.go_to(page)?;
        self.stop().await?;
        self.cursor = target;
        Ok(())
    }

    /// React to a page finishing on its own.  Returns `true` when reading
    /// continued on the next page.
    pub async fn page_finished(&mut self) -> Result<bool, ReaderError> {
        if !self.auto_advance || !self.cursor.next() {
            return Ok(false);
        }
        self.play_current().await?;
        Ok(true)
    }

    /// Read from the current page until the book (or, without auto-advance,
    /// the page) is finished, or speech fails.
    pub async fn run(&mut self) -> Result<(), ReaderError> {
        let mut events = self.engine.subscribe();
        self.play_current().await?;

        loop {
            match events.recv().await {
                Ok(SpeechEvent::End) => {
                    if !self.page_finished().await? {
                        log::info!("reader: finished on page {}", self.cursor.page());
                        return Ok(());
                    }
                }
                Ok(SpeechEvent::Error(message)) => {
                    log::warn!("reader: speech stopped on page {}: {message}", self.cursor.page());
                    return Ok(());
                }
                Ok(SpeechEvent::Unavailable(message)) => {
                    return Err(EngineError::SynthesisUnavailable(message).into());
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("reader: missed {missed} speech events");
                    if self.engine.state() == SpeechState::Idle {
                        return Ok(());
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err(EngineError::Closed.into());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
