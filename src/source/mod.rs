//! Upstream corpus sources
//!
//! A source answers two questions: what does entry N of a collection look
//! like, and how is the collection divided into books. The import pipeline
//! only ever talks to the [`CorpusSource`] trait so tests can swap in a mock
//! HTTP server or an in-memory fake.

pub mod rate_limit;
pub mod sunnah;

pub use rate_limit::RequestLimiter;
pub use sunnah::SunnahApiSource;

use crate::error::Result;
use async_trait::async_trait;

/// Result of fetching a single entry
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The upstream returned a payload for the entry
    Found(serde_json::Value),
    /// The upstream has no entry under this number
    NotFound,
}

/// One book of a collection as reported by the upstream book listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookListing {
    pub book_number: u32,
    pub name: String,
    /// First entry number, when the upstream reports it
    pub first_entry: Option<u32>,
    /// Last entry number, when the upstream reports it
    pub last_entry: Option<u32>,
}

impl BookListing {
    /// Whether the book's reported range covers `number`
    pub fn covers(&self, number: u32) -> bool {
        match (self.first_entry, self.last_entry) {
            (Some(first), Some(last)) => (first..=last).contains(&number),
            _ => false,
        }
    }
}

/// Trait for upstream corpus providers
#[async_trait]
pub trait CorpusSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Fetch one entry of a collection by number.
    ///
    /// Transient failures are retried inside the source; an error returned
    /// here is final for this entry.
    async fn fetch_entry(&self, api_name: &str, number: u32) -> Result<FetchOutcome>;

    /// List the books of a collection
    async fn list_books(&self, api_name: &str) -> Result<Vec<BookListing>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_listing_covers() {
        let book = BookListing {
            book_number: 2,
            name: "Belief".to_string(),
            first_entry: Some(8),
            last_entry: Some(58),
        };
        assert!(book.covers(8));
        assert!(book.covers(58));
        assert!(!book.covers(59));

        let open = BookListing {
            first_entry: None,
            ..book
        };
        assert!(!open.covers(10));
    }
}
