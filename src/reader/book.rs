//! Books, pages and the [`PageSource`] seam.
//!
//! A book is stored as JSON in the shape the reader app's backend uses:
//!
//! ```json
//! { "title": "…", "author": "…", "content": [ { "pageNumber": 1, "text": "…" } ] }
//! ```
//!
//! Plain-text files are split into pages on a separator (form feed by
//! default).

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ReaderError;

// ---------------------------------------------------------------------------
// Book / Page
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// 1-based page number.
    pub page_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Pages ordered by page number.
    pub content: Vec<Page>,
}

impl Book {
    /// Parse a JSON book.  Pages are put in page-number order.
    pub fn from_json(json: &str) -> Result<Self, ReaderError> {
        let mut book: Book = serde_json::from_str(json)?;
        if book.content.is_empty() {
            return Err(ReaderError::EmptyBook);
        }
        book.content.sort_by_key(|p| p.page_number);
        Ok(book)
    }

    /// Split `text` into pages on `separator`, dropping blank pages.
    ///
    /// ```
    /// use read_along::reader::Book;
    ///
    /// let book = Book::from_plain_text("Notes", "One.\u{c}\u{c}Two.", "\u{c}").unwrap();
    /// assert_eq!(book.page_count(), 2);
    /// assert_eq!(book.page(2).unwrap().text, "Two.");
    /// ```
    pub fn from_plain_text(
        title: impl Into<String>,
        text: &str,
        separator: &str,
    ) -> Result<Self, ReaderError> {
        let pages: Vec<&str> = if separator.is_empty() {
            vec![text]
        } else {
            text.split(separator).collect()
        };
        let content: Vec<Page> = pages
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .enumerate()
            .map(|(i, t)| Page {
                page_number: i + 1,
                text: t.to_string(),
            })
            .collect();
        if content.is_empty() {
            return Err(ReaderError::EmptyBook);
        }
        Ok(Self {
            title: title.into(),
            author: String::new(),
            category: None,
            content,
        })
    }

    /// Load a book from disk: `.json` files as JSON, anything else as plain
    /// text split on `separator`.
    pub async fn load(path: &Path, separator: &str) -> Result<Self, ReaderError> {
        let raw = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&raw)
        } else {
            let title = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Untitled");
            Self::from_plain_text(title, &raw, separator)
        }
    }

    pub fn page_count(&self) -> usize {
        self.content.len()
    }

    /// The page numbered `number`, if any.
    pub fn page(&self, number: usize) -> Option<&Page> {
        self.content.iter().find(|p| p.page_number == number)
    }
}

// ---------------------------------------------------------------------------
// PageSource
// ---------------------------------------------------------------------------

/// Supplies page text to a reading session.
///
/// Pages are numbered `1..=page_count()`.  Implementations may fetch text
/// lazily (from a server, say); [`Book`] serves it from memory.
#[async_trait]
pub trait PageSource: Send + Sync {
    fn title(&self) -> &str;

    fn page_count(&self) -> usize;

    async fn page_text(&self, number: usize) -> Result<String, ReaderError>;
}

#[async_trait]
impl PageSource for Book {
    fn title(&self) -> &str {
        &self.title
    }

    fn page_count(&self) -> usize {
        self.content.len()
    }

    async fn page_text(&self, number: usize) -> Result<String, ReaderError> {
        self.page(number)
            .map(|p| p.text.clone())
            .ok_or(ReaderError::PageNotFound(number))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
