//! Current-page bookkeeping.

use super::ReaderError;

/// 1-based position within a book of `count` pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    page: usize,
    count: usize,
}

impl PageCursor {
    /// A cursor on page 1.  A book needs at least one page.
    pub fn new(count: usize) -> Result<Self, ReaderError> {
        if count == 0 {
            return Err(ReaderError::EmptyBook);
        }
        Ok(Self { page: 1, count })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_first(&self) -> bool {
        self.page == 1
    }

    pub fn is_last(&self) -> bool {
        self.page == self.count
    }

    /// Move forward one page.  Returns `false` on the last page.
    pub fn next(&mut self) -> bool {
        if self.is_last() {
            return false;
        }
        self.page += 1;
        true
    }

    /// Move back one page.  Returns `false` on the first page.
    pub fn previous(&mut self) -> bool {
        if self.is_first() {
            return false;
        }
        self.page -= 1;
        true
    }

    /// Jump to `page`, which must be in `1..=count`.
    pub fn go_to(&mut self, page: usize) -> Result<(), ReaderError> {
        if page == 0 || page > self.count {
            return Err(ReaderError::PageOutOfRange {
                page,
                count: self.count,
            });
        }
        self.page = page;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_first_page() {
        let c = PageCursor::new(3).unwrap();
        assert_eq!(c.page(), 1);
        assert!(c.is_first());
        assert!(!c.is_last());
    }

    #[test]
    fn empty_book_has_no_cursor() {
        assert!(matches!(PageCursor::new(0), Err(ReaderError::EmptyBook)));
    }

    #[test]
    fn next_and_previous_stop_at_the_ends() {
        let mut c = PageCursor::new(2).unwrap();
        assert!(!c.previous());
        assert!(c.next());
        assert!(c.is_last());
        assert!(!c.next());
        assert_eq!(c.page(), 2);
        assert!(c.previous());
        assert_eq!(c.page(), 1);
    }

    #[test]
    fn go_to_rejects_out_of_range() {
        let mut c = PageCursor::new(3).unwrap();
        assert!(c.go_to(0).is_err());
        assert!(c.go_to(4).is_err());
        assert_eq!(c.page(), 1);
        c.go_to(3).unwrap();
        assert!(c.is_last());
    }
}
