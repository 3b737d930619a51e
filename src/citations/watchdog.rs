//! Stall detection for page operations.
//!
//! Page loads on the lookup application are not reliably event-driven, so
//! each supervised phase gets one concurrent watchdog task that polls a
//! shared signal. If the phase does not report completion within the
//! threshold, the watchdog flags a stall and forces a full re-navigation
//! to the entry page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{error, warn};

use crate::driver::PageDriver;

/// Shared completion/stall signal for one supervised phase.
///
/// Single-writer discipline: the fetcher clears both flags before a phase
/// and sets `loaded` on completion; the watchdog only ever sets `stalled`.
#[derive(Debug, Default)]
pub struct LoadSignal {
    loaded: AtomicBool,
    stalled: AtomicBool,
}

impl LoadSignal {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Clear both flags at the start of a supervised phase.
    pub fn begin(&self) {
        self.loaded.store(false, Ordering::SeqCst);
        self.stalled.store(false, Ordering::SeqCst);
    }

    pub fn mark_loaded(&self) {
        self.loaded.store(true, Ordering::SeqCst);
    }

    pub fn loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    pub fn mark_stalled(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }
}

/// Supervise one page phase. Exits the moment `loaded` is set; on
/// threshold it sets `stalled`, re-navigates to the entry page, and exits.
/// Never more than one watchdog is alive at a time.
pub fn supervise<D>(
    started: Instant,
    signal: Arc<LoadSignal>,
    driver: Arc<D>,
    entry_url: String,
    threshold: Duration,
    poll_interval: Duration,
) -> JoinHandle<()>
where
    D: PageDriver + ?Sized + 'static,
{
    tokio::spawn(async move {
        loop {
            if signal.loaded() {
                return;
            }
            if started.elapsed() >= threshold {
                warn!(
                    "Page operation stalled after {:?}, forcing reload of {}",
                    started.elapsed(),
                    entry_url
                );
                signal.mark_stalled();
                if let Err(e) = driver.navigate(&entry_url).await {
                    error!("Stall recovery navigation failed: {}", e);
                }
                return;
            }
            sleep(poll_interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use crate::error::ScraperError;

    #[derive(Default)]
    struct CountingDriver {
        navigations: AtomicUsize,
    }

    #[async_trait]
    impl PageDriver for CountingDriver {
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

        async fn find_texts(&self, _selector: &str) -> Result<Vec<String>, ScraperError> {
            Ok(Vec::new())
        }

        async fn set_value(&self, _selector: &str, _text: &str) -> Result<(), ScraperError> {
            Ok(())
        }

        async fn click(&self, _selector: &str) -> Result<(), ScraperError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_watchdog_flags_stall_and_renavigates() {
        let signal = LoadSignal::new();
        signal.begin();
        let driver = Arc::new(CountingDriver::default());

        let handle = supervise(
            Instant::now(),
            signal.clone(),
            driver.clone(),
            "http://entry".to_string(),
            Duration::from_millis(30),
            Duration::from_millis(5),
        );
        handle.await.unwrap();

        assert!(signal.stalled());
        assert!(!signal.loaded());
        assert_eq!(driver.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watchdog_exits_quietly_on_completion() {
        let signal = LoadSignal::new();
        signal.begin();
        let driver = Arc::new(CountingDriver::default());

        let handle = supervise(
            Instant::now(),
            signal.clone(),
            driver.clone(),
            "http://entry".to_string(),
            Duration::from_secs(10),
            Duration::from_millis(5),
        );
        signal.mark_loaded();
        handle.await.unwrap();

        assert!(!signal.stalled());
        assert_eq!(driver.navigations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_begin_clears_prior_stall() {
        let signal = LoadSignal::new();
        signal.mark_stalled();
        signal.mark_loaded();
        signal.begin();
        assert!(!signal.stalled());
        assert!(!signal.loaded());
    }
}
