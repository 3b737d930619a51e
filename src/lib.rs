//! Citation scraper library
//!
//! Drives a paginated citation lookup web application through a browser,
//! enumerating the (officer, sequence) key space and appending structured
//! records to a delimited file. A per-phase watchdog recovers from stuck
//! page loads by forcing a full re-navigation and retrying the same key,
//! and the traversal can resume from an explicit checkpoint.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use citation_scraper::{ChromiumDriver, PaginationController, ScraperConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ScraperConfig::default().with_headless(false);
//!     let driver = Arc::new(ChromiumDriver::launch(&config).await.unwrap());
//!
//!     // Authenticate in the opened browser first, then:
//!     let mut controller = PaginationController::new(driver, config).unwrap();
//!     let summary = controller.run().await.unwrap();
//!     println!("Wrote {} records", summary.records_written);
//! }
//! ```
//!
//! # Resuming after an interruption
//!
//! ```rust,ignore
//! use citation_scraper::{Checkpoint, ScraperConfig};
//!
//! let config = ScraperConfig::default()
//!     .with_checkpoint(Checkpoint::resume_at(4, 12_000));
//! ```

pub mod citations;
pub mod config;
pub mod driver;
pub mod error;
pub mod service;

pub use citations::{
    Checkpoint, CitationKey, PaginationController, PaymentStatus, Record, ScrapeSummary,
};
pub use config::ScraperConfig;
pub use driver::{ChromiumDriver, PageDriver};
pub use error::ScraperError;
pub use service::{ScrapeRequest, ScraperService};
