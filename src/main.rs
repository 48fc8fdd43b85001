//! Application entry point: read a book aloud with word highlighting.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Parse the command line.
//! 4. Create the [`tokio`] runtime.
//! 5. Load the book (`.json` or plain text), looking bare names up in the
//!    library directory.
//! 6. Build the configured synthesizer driver and spawn the speech engine.
//! 7. Read until the book ends or Ctrl-C is pressed.
//!
//! ```text
//! read-along <book.json | book.txt> [--page N] [--slow]
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use read_along::{
    config::{AppConfig, AppPaths, DriverBackend},
    driver::{CommandDriver, SimulatedDriver, SpeechDriver},
    reader::{Book, ReadAloudSession},
    sync::{EngineOptions, SpeechEngine},
};

// ---------------------------------------------------------------------------
// Command line
// ---------------------------------------------------------------------------

/// Read a book aloud, printing each word as it is spoken.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Book file (`.json` or plain text), or a name in the book library
    book: PathBuf,

    /// Page to start reading from (1-based)
    #[arg(long, default_value_t = 1)]
    page: usize,

    /// Start at the slow reading speed
    #[arg(long)]
    slow: bool,
}

fn build_driver(config: &AppConfig) -> Box<dyn SpeechDriver> {
    match config.driver.backend {
        DriverBackend::Simulated => {
            log::info!(
                "Using simulated synthesizer ({:?} boundaries)",
                config.driver.simulated.boundaries
            );
            Box::new(SimulatedDriver::from_config(&config.driver))
        }
        DriverBackend::Command => {
            log::info!("Using synthesizer program `{}`", config.driver.command);
            Box::new(CommandDriver::from_config(&config.driver))
        }
    }
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("read-along starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });

    // 3. Arguments
    let args = Args::parse();

    // 4. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(read_book(config, args))
}

async fn read_book(config: AppConfig, args: Args) -> Result<()> {
    // 5. Book
    let path = AppPaths::new().resolve_book(&args.book);
    let book = Book::load(&path, &config.reader.page_separator)
        .await
        .with_context(|| format!("loading {}", path.display()))?;
    log::info!(
        "Loaded \"{}\" ({} pages)",
        book.title,
        book.page_count()
    );

    // 6. Engine
    let engine = SpeechEngine::new(build_driver(&config), EngineOptions::from_config(&config));
    let handle = engine.spawn();

    let words = handle.on_word(|word| {
        if let Some(word) = word {
            print!("{} ", word.word);
            let _ = std::io::stdout().flush();
        }
    });
    let pages = handle.on_end(|| println!());

    let mut session = ReadAloudSession::new(book, handle.clone(), &config)?;
    session.go_to_page(args.page).await?;
    if args.slow {
        session.toggle_speed().await?;
    }

    // 7. Read until done or interrupted
    tokio::select! {
        result = session.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            log::info!("Interrupted on page {}", session.page());
            session.stop().await?;
        }
    }

    words.abort();
    pages.abort();
    log::info!("read-along shutting down");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn book_alone_uses_defaults() {
        let args = Args::try_parse_from(["read-along", "cuentos.json"]).unwrap();
        assert_eq!(args.book, PathBuf::from("cuentos.json"));
        assert_eq!(args.page, 1);
        assert!(!args.slow);
    }

    #[test]
    fn page_and_slow_flags() {
        let args =
            Args::try_parse_from(["read-along", "--page", "3", "book.txt", "--slow"]).unwrap();
        assert_eq!(args.book, PathBuf::from("book.txt"));
        assert_eq!(args.page, 3);
        assert!(args.slow);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(Args::try_parse_from(["read-along"]).is_err());
        assert!(Args::try_parse_from(["read-along", "b.txt", "--page", "two"]).is_err());
        assert!(Args::try_parse_from(["read-along", "a.txt", "b.txt"]).is_err());
    }
}
