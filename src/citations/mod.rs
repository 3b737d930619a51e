//! Citation scraper core.
//!
//! Traverses the (officer, sequence) key space of the citation lookup
//! application, surviving page-load stalls via a watchdog, and appends
//! deduplicated records to a delimited store in checkpointed batches.

pub mod controller;
pub mod fetcher;
pub mod parser;
pub mod store;
mod types;
pub mod watchdog;

pub use controller::PaginationController;
pub use fetcher::RecordFetcher;
pub use store::{BatchBuffer, CitationStore, ErrorLog};
pub use types::{
    Checkpoint, CitationKey, FetchOutcome, PaymentStatus, RawBlock, Record, ScrapeSummary,
};
pub use watchdog::LoadSignal;
