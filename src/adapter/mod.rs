//! Site adapter seam
//!
//! An adapter holds every site-specific rule: which links on a listing page
//! are items, how to tell a composite page from a simple one, and how to turn
//! a page into a record. Adapters are synchronous and side-effect free; the
//! engine runs them on the blocking thread pool.

mod links;
mod selector;

pub use links::{collect_links, resolve_link};
pub use selector::SelectorAdapter;

use crate::crawler::{Document, Record, Task};
use std::time::Duration;
use thiserror::Error;

/// Why a document could not be turned into a result
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("required field(s) missing: {0}")]
    MissingField(String),

    #[error("field '{field}' is not a number: '{value}'")]
    InvalidNumber { field: String, value: String },

    #[error("composite page {0} lists no child references")]
    EmptyComposite(String),

    #[error("document has no usable base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("adapter panicked: {0}")]
    Panicked(String),

    #[error("extraction timed out after {0:?}")]
    TimedOut(Duration),

    /// Free-form failure for adapters outside this crate
    #[error("{0}")]
    Other(String),
}

/// What an adapter found on an item or composite page
#[derive(Debug)]
pub enum Extracted {
    /// A simple page: one record
    Record(Record),

    /// A composite page: references to further pages
    References(Vec<String>),

    /// Recognized, but nothing to emit
    Empty,
}

/// Site-specific classification and extraction rules
pub trait SiteAdapter: Send + Sync {
    /// Returns the item references listed on a discovery page
    fn discover(&self, document: &Document) -> Result<Vec<String>, ExtractionError>;

    /// Classifies an item page and extracts its record or child references
    fn extract_record(&self, task: &Task, document: &Document)
        -> Result<Extracted, ExtractionError>;

    /// Returns the number of the last listing page, read from pagination
    ///
    /// Used to enumerate catalog pages before the run starts. Adapters that
    /// cannot tell return `None`.
    fn page_count(&self, _document: &Document) -> Option<u32> {
        None
    }
}
