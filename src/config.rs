use std::path::PathBuf;
use std::time::Duration;

use crate::citations::Checkpoint;

/// Default entry page of the citation lookup application.
pub const DEFAULT_URL: &str = "https://cars.byu.edu/citations/";

#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Entry URL of the lookup application; also the watchdog's reset target.
    pub url: String,
    /// Destination of the delimited citation table.
    pub output_path: PathBuf,
    /// Append-only log of failed keys.
    pub error_log_path: PathBuf,
    /// Officer ids are traversed in [1, max_officers].
    pub max_officers: u32,
    /// Sequence ids are traversed in [0, max_sequence] within an officer.
    pub max_sequence: u32,
    /// Watchdog stall threshold per supervised page phase.
    pub watchdog_threshold: Duration,
    /// Poll interval shared by the watchdog and the result wait.
    pub poll_interval: Duration,
    /// Flush the batch buffer every this many resolved keys.
    pub flush_every: u32,
    /// Consecutive empty results before an officer is considered exhausted.
    pub no_data_limit: u32,
    /// The exhaustion heuristic only fires while the last captured record
    /// was issued within this many days.
    pub recent_window_days: i64,
    /// Per-key retry budget for stalls and driver failures.
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    /// Position to resume the traversal from.
    pub checkpoint: Checkpoint,
    pub headless: bool,
    pub debug: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            output_path: PathBuf::from("ParkingCitations.csv"),
            error_log_path: PathBuf::from("scrape_errors.log"),
            max_officers: 10,
            max_sequence: 99_999,
            watchdog_threshold: Duration::from_millis(10_100),
            poll_interval: Duration::from_millis(100),
            flush_every: 1000,
            no_data_limit: 50,
            recent_window_days: 30,
            max_retries: Some(25),
            checkpoint: Checkpoint::default(),
            headless: true,
            debug: false,
        }
    }
}

impl ScraperConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn with_error_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log_path = path.into();
        self
    }

    pub fn with_key_space(mut self, max_officers: u32, max_sequence: u32) -> Self {
        self.max_officers = max_officers;
        self.max_sequence = max_sequence;
        self
    }

    pub fn with_watchdog_threshold(mut self, threshold: Duration) -> Self {
        self.watchdog_threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_flush_every(mut self, n: u32) -> Self {
        self.flush_every = n;
        self
    }

    pub fn with_max_retries(mut self, budget: Option<u32>) -> Self {
        self.max_retries = budget;
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

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ScraperConfig::new("http://localhost:8080/citations/")
            .with_output_path("/tmp/citations.csv")
            .with_key_space(2, 100)
            .with_watchdog_threshold(Duration::from_secs(5))
            .with_max_retries(None)
            .with_headless(false);

        assert_eq!(config.url, "http://localhost:8080/citations/");
        assert_eq!(config.output_path, PathBuf::from("/tmp/citations.csv"));
        assert_eq!(config.max_officers, 2);
        assert_eq!(config.max_sequence, 100);
        assert_eq!(config.watchdog_threshold, Duration::from_secs(5));
        assert_eq!(config.max_retries, None);
        assert!(!config.headless);
    }

    #[test]
    fn test_defaults_match_target_site() {
        let config = ScraperConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.max_officers, 10);
        assert_eq!(config.max_sequence, 99_999);
        assert_eq!(config.no_data_limit, 50);
        assert_eq!(config.flush_every, 1000);
        assert_eq!(config.watchdog_threshold, Duration::from_millis(10_100));
    }
}
