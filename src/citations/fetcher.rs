//! Single-key lookup execution.
//!
//! One fetch drives a key through two watchdog-supervised phases: query
//! submission (done the instant the search click returns) and the result
//! wait (polling for either the result columns or the no-data heading).
//! Driver failures propagate; the controller owns the retry policy.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::debug;

use super::parser;
use super::types::{CitationKey, FetchOutcome, RawBlock};
use super::watchdog::{self, LoadSignal};
use crate::config::ScraperConfig;
use crate::driver::PageDriver;
use crate::error::ScraperError;

/// CSS selectors of the lookup application. The app spoofs most element
/// ids, so everything is targeted through stable framework classes.
pub mod selectors {
    /// Button opening the citation lookup form from the entry page.
    pub const ENTRY_BUTTON: &str = ".v-btn__content";
    /// Search input of the lookup form.
    pub const QUERY_INPUT: &str = ".v-text-field__slot input";
    /// Magnifier button submitting the query.
    pub const SEARCH_BUTTON: &str = ".v-input__append-inner button";
    /// Result pane columns, one `label: value` fragment each.
    pub const RESULT_COLUMNS: &str = ".v-card__text .col";
    /// Heading shown when a key has no record.
    pub const NO_DATA_HEADING: &str = ".v-card__text .text-center h4";
    /// Appeal/pay action buttons of the result pane.
    pub const ACTION_BUTTONS: &str = ".v-card__actions button";
}

pub struct RecordFetcher<D: ?Sized> {
    driver: Arc<D>,
    signal: Arc<LoadSignal>,
    entry_url: String,
    threshold: Duration,
    poll_interval: Duration,
}

impl<D> RecordFetcher<D>
where
    D: PageDriver + ?Sized + 'static,
{
    pub fn new(driver: Arc<D>, config: &ScraperConfig) -> Self {
        Self {
            driver,
            signal: LoadSignal::new(),
            entry_url: config.url.clone(),
            threshold: config.watchdog_threshold,
            poll_interval: config.poll_interval,
        }
    }

    /// Open the lookup form from the entry page. Used at startup and
    /// after every stall-forced re-navigation.
    pub async fn open_lookup(&self) -> Result<(), ScraperError> {
        self.driver
            .wait_clickable(selectors::ENTRY_BUTTON, self.element_wait())
            .await?;
        self.driver.click(selectors::ENTRY_BUTTON).await
    }

    /// Drive one key lookup to resolution.
    pub async fn fetch(&self, key: CitationKey) -> Result<FetchOutcome, ScraperError> {
        let lookup = key.to_string();
        debug!("Fetching {}", lookup);

        // Submission phase
        self.signal.begin();
        let guard = self.spawn_watchdog();
        let submitted = self.submit(&lookup).await;
        self.signal.mark_loaded();
        let _ = guard.await;

        if self.signal.stalled() {
            return Ok(FetchOutcome::Stalled);
        }
        submitted?;

        // Result-wait phase
        self.signal.begin();
        let guard = self.spawn_watchdog();
        let outcome = self.await_result().await;
        self.signal.mark_loaded();
        let _ = guard.await;

        outcome
    }

    fn spawn_watchdog(&self) -> tokio::task::JoinHandle<()> {
        watchdog::supervise(
            Instant::now(),
            self.signal.clone(),
            self.driver.clone(),
            self.entry_url.clone(),
            self.threshold,
            self.poll_interval,
        )
    }

    /// Element waits stay just under the watchdog threshold so the
    /// watchdog is the one reporting a hang.
    fn element_wait(&self) -> Duration {
        self.threshold.saturating_sub(self.poll_interval)
    }

    async fn submit(&self, lookup: &str) -> Result<(), ScraperError> {
        self.driver
            .wait_clickable(selectors::QUERY_INPUT, self.element_wait())
            .await?;
        self.driver
            .set_value(selectors::QUERY_INPUT, lookup)
            .await?;
        self.driver
            .wait_clickable(selectors::SEARCH_BUTTON, self.element_wait())
            .await?;
        self.driver.click(selectors::SEARCH_BUTTON).await
    }

    /// Poll until the result pane renders data or the no-data heading,
    /// or the watchdog flags a stall.
    async fn await_result(&self) -> Result<FetchOutcome, ScraperError> {
        loop {
            if !self
                .driver
                .find_texts(selectors::NO_DATA_HEADING)
                .await?
                .is_empty()
            {
                return Ok(FetchOutcome::Empty);
            }

            let columns = self.driver.find_texts(selectors::RESULT_COLUMNS).await?;
            if !columns.is_empty() {
                let buttons = self.driver.find_texts(selectors::ACTION_BUTTONS).await?;
                return Ok(FetchOutcome::Found(
                    RawBlock(columns),
                    parser::check_payment(&buttons),
                ));
            }

            if self.signal.stalled() {
                return Ok(FetchOutcome::Stalled);
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    struct ScriptedDriver {
        /// Selector to rendered texts; unlisted selectors render nothing.
        panes: Mutex<HashMap<&'static str, Vec<String>>>,
        navigations: AtomicUsize,
    }

    impl ScriptedDriver {
        fn new(panes: HashMap<&'static str, Vec<String>>) -> Self {
            Self {
                panes: Mutex::new(panes),
                navigations: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageDriver for ScriptedDriver {
        async fn navigate(&self, _url: &str) -> Result<(), ScraperError> {
            self.navigations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn wait_clickable(
            &self,
            _selector: &str,
            _timeout: Duration,
        ) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn find_texts(&self, selector: &str) -> Result<Vec<String>, ScraperError> {
            Ok(self
                .panes
                .lock()
                .unwrap()
                .get(selector)
                .cloned()
                .unwrap_or_default())
        }

        async fn set_value(&self, _selector: &str, _text: &str) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> Result<(), ScraperError> {
            Ok(())
        }
    }

    fn fast_config() -> ScraperConfig {
        ScraperConfig::default()
            .with_watchdog_threshold(Duration::from_millis(40))
            .with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_fetch_resolves_record() {
        let driver = Arc::new(ScriptedDriver::new(HashMap::from([
            (
                selectors::RESULT_COLUMNS,
                vec!["Citation: P3-00042".to_string(), "Fine: $125.00".to_string()],
            ),
            (
                selectors::ACTION_BUTTONS,
                vec!["Appeal".to_string(), "Pay".to_string()],
            ),
        ])));
        let fetcher = RecordFetcher::new(driver, &fast_config());

        match fetcher.fetch(CitationKey::new(3, 42)).await.unwrap() {
            FetchOutcome::Found(block, payment) => {
                assert_eq!(block.0.len(), 2);
                assert!(payment.unpaid);
                assert_eq!(payment.citation_text.as_deref(), Some("Appeal"));
            }
            other => panic!("expected Found, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_resolves_empty() {
        let driver = Arc::new(ScriptedDriver::new(HashMap::from([(
            selectors::NO_DATA_HEADING,
            vec!["No citation found".to_string()],
        )])));
        let fetcher = RecordFetcher::new(driver, &fast_config());

        let outcome = fetcher.fetch(CitationKey::new(1, 0)).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Empty);
    }

    #[tokio::test]
    async fn test_fetch_stalls_when_nothing_renders() {
        let driver = Arc::new(ScriptedDriver::new(HashMap::new()));
        let fetcher = RecordFetcher::new(driver.clone(), &fast_config());

        let outcome = fetcher.fetch(CitationKey::new(2, 17)).await.unwrap();
        assert_eq!(outcome, FetchOutcome::Stalled);
        // The watchdog forced a reload of the entry page
        assert_eq!(driver.navigations.load(Ordering::SeqCst), 1);
    }
}
