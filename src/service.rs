use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::citations::{Checkpoint, PaginationController, ScrapeSummary};
use crate::config::ScraperConfig;
use crate::driver::ChromiumDriver;
use crate::error::ScraperError;

/// One traversal request. The session is assumed to be authenticated by
/// other means (cookies in the profile, an SSO-free deployment); the
/// interactive login gate lives in the demo binary, not here.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
    pub output_path: PathBuf,
    pub checkpoint: Checkpoint,
    pub headless: bool,
}

impl ScrapeRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            output_path: PathBuf::from("ParkingCitations.csv"),
            checkpoint: Checkpoint::default(),
            headless: true,
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }
}

impl From<ScrapeRequest> for ScraperConfig {
    fn from(req: ScrapeRequest) -> Self {
        ScraperConfig::new(req.url)
            .with_output_path(req.output_path)
            .with_checkpoint(req.checkpoint)
            .with_headless(req.headless)
    }
}

/// tower::Service front for the scraper.
#[derive(Debug, Clone, Default)]
pub struct ScraperService {
    // Room for rate limiting or shared browser reuse later
}

impl ScraperService {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Service<ScrapeRequest> for ScraperService {
    type Response = ScrapeSummary;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ScrapeRequest) -> Self::Future {
        info!("Scrape request received: url={}", req.url);

        Box::pin(async move {
            let config: ScraperConfig = req.into();
            let driver = Arc::new(ChromiumDriver::launch(&config).await?);
            let mut controller = PaginationController::new(driver, config)?;
            let summary = controller.run().await?;

            info!(
                "Scrape complete: {} records written, {} keys visited",
                summary.records_written, summary.keys_visited
            );
            Ok(summary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrape_request_builder() {
        let req = ScrapeRequest::new("http://localhost/citations/")
            .with_output_path("/tmp/out.csv")
            .with_checkpoint(Checkpoint::resume_at(2, 500))
            .with_headless(false);

        assert_eq!(req.url, "http://localhost/citations/");
        assert_eq!(req.output_path, PathBuf::from("/tmp/out.csv"));
        assert_eq!(req.checkpoint.officer, 2);
        assert!(!req.headless);
    }

    #[test]
    fn test_scrape_request_to_config() {
        let req = ScrapeRequest::new("http://localhost/citations/")
            .with_checkpoint(Checkpoint::resume_at(3, 42));
        let config: ScraperConfig = req.into();

        assert_eq!(config.url, "http://localhost/citations/");
        assert_eq!(config.checkpoint.officer, 3);
        assert_eq!(config.checkpoint.sequence, 42);
        assert!(config.checkpoint.resume_officer);
    }
}
