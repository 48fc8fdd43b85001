//! Page-level reading on top of the speech engine.
//!
//! * [`Book`] / [`Page`]: the book model, loadable from JSON or plain text.
//! * [`PageSource`]: async seam the session pulls page text through.
//! * [`PageCursor`]: current page, 1-based.
//! * [`ReadAloudSession`]: plays pages, toggles speed and advances to the
//!   next page when one finishes.

pub mod book;
pub mod cursor;
pub mod session;

use thiserror::Error;

use crate::sync::EngineError;

pub use book::{Book, Page, PageSource};
pub use cursor::PageCursor;
pub use session::{ReadAloudSession, Speed};

/// Errors from loading books and navigating them.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("could not read book: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed book: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("book has no pages")]
    EmptyBook,

    #[error("page {page} is out of range (1..={count})")]
    PageOutOfRange { page: usize, count: usize },

    #[error("page {0} not found")]
    PageNotFound(usize),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
