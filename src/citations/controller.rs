//! The outer traversal state machine.
//!
//! Iterates the (officer, sequence) key space in ascending order, retries
//! stalled or failed keys in place after a full page reset, applies the
//! end-of-data heuristic per officer, and flushes the batch buffer on a
//! fixed cadence and on every terminal condition.

use std::sync::Arc;
use std::time::Instant;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use super::fetcher::RecordFetcher;
use super::parser;
use super::store::{BatchBuffer, CitationStore, ErrorLog};
use super::types::{Checkpoint, CitationKey, FetchOutcome, ScrapeSummary};
use crate::config::ScraperConfig;
use crate::driver::PageDriver;
use crate::error::ScraperError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TraversalState {
    /// Moving forward through the key space.
    Advancing,
    /// Current key failed; accounting for another attempt.
    Retrying,
    /// Re-navigating to the entry page before re-attempting the key.
    Resetting,
    /// Key space exhausted.
    Done,
}

pub struct PaginationController<D: ?Sized> {
    driver: Arc<D>,
    fetcher: RecordFetcher<D>,
    config: ScraperConfig,
    buffer: BatchBuffer,
    store: CitationStore,
    error_log: ErrorLog,
}

/// Traversal cursor plus the streak/retry counters tied to it.
struct Cursor {
    officer: u32,
    sequence: u32,
    no_data_streak: u32,
    retries_for_key: u32,
}

impl Cursor {
    fn key(&self) -> CitationKey {
        CitationKey::new(self.officer, self.sequence)
    }

    /// Move to the next sequence id. Returns true when this finished the
    /// officer's full pass.
    fn advance(&mut self, max_sequence: u32) -> bool {
        if self.sequence >= max_sequence {
            self.next_officer();
            true
        } else {
            self.sequence += 1;
            false
        }
    }

    fn next_officer(&mut self) {
        self.officer += 1;
        self.sequence = 0;
        self.no_data_streak = 0;
    }
}

impl<D> PaginationController<D>
where
    D: PageDriver + ?Sized + 'static,
{
    pub fn new(driver: Arc<D>, config: ScraperConfig) -> Result<Self, ScraperError> {
        let store = CitationStore::open(&config.output_path)?;
        // Seed the duplicate filter so a resumed run never re-writes a
        // citation it already persisted
        let buffer = BatchBuffer::with_seen(store.seen_citations()?);
        let fetcher = RecordFetcher::new(driver.clone(), &config);
        let error_log = ErrorLog::new(&config.error_log_path);

        Ok(Self {
            driver,
            fetcher,
            config,
            buffer,
            store,
            error_log,
        })
    }

    /// Run the traversal to completion, starting from the configured
    /// checkpoint. Assumes an authenticated session is already active in
    /// the driver's browser.
    pub async fn run(&mut self) -> Result<ScrapeSummary, ScraperError> {
        let started = Instant::now();
        let Checkpoint {
            officer,
            sequence,
            resume_officer,
            resume_sequence,
        } = self.config.checkpoint;

        let mut cursor = Cursor {
            officer: if resume_officer { officer.max(1) } else { 1 },
            sequence: if resume_sequence { sequence } else { 0 },
            no_data_streak: 0,
            retries_for_key: 0,
        };
        let mut state = TraversalState::Advancing;
        let mut last_issued: Option<NaiveDateTime> = None;
        let mut resolved: u64 = 0;
        let mut keys_visited: u64 = 0;
        let mut retries: u64 = 0;
        let mut records_written: u64 = 0;

        info!(
            "Starting traversal at {} (officers 1..={}, sequences 0..={})",
            cursor.key(),
            self.config.max_officers,
            self.config.max_sequence
        );
        self.driver.navigate(&self.config.url).await?;
        self.fetcher.open_lookup().await?;

        loop {
            if cursor.officer > self.config.max_officers {
                state = TraversalState::Done;
            }

            match state {
                TraversalState::Done => {
                    records_written += self.store.flush(&mut self.buffer)? as u64;
                    let summary = ScrapeSummary {
                        records_written,
                        keys_visited,
                        retries,
                        elapsed: started.elapsed(),
                    };
                    info!("Finished scraping all the data.");
                    report_timing(&summary);
                    return Ok(summary);
                }

                TraversalState::Retrying => {
                    cursor.retries_for_key += 1;
                    retries += 1;
                    if let Some(budget) = self.config.max_retries {
                        if cursor.retries_for_key > budget {
                            // Early termination: keep what we have
                            self.flush_lossy(&mut records_written);
                            return Err(ScraperError::RetryBudget {
                                key: cursor.key().to_string(),
                                attempts: cursor.retries_for_key,
                            });
                        }
                    }
                    state = TraversalState::Resetting;
                }

                TraversalState::Resetting => {
                    debug!("Resetting page before retrying {}", cursor.key());
                    match self.reset().await {
                        Ok(()) => state = TraversalState::Advancing,
                        Err(e) => {
                            warn!("Page reset failed: {}", e);
                            self.error_log.record(&cursor.key(), &e);
                            if !e.is_retryable() {
                                self.flush_lossy(&mut records_written);
                                return Err(e);
                            }
                            state = TraversalState::Retrying;
                        }
                    }
                }

                TraversalState::Advancing => {
                    let key = cursor.key();
                    match self.fetcher.fetch(key).await {
                        Ok(FetchOutcome::Found(block, payment)) => {
                            keys_visited += 1;
                            resolved += 1;
                            cursor.retries_for_key = 0;
                            cursor.no_data_streak = 0;

                            let record = parser::build_record(&block, &payment);
                            if let Some(issued) =
                                record.get("Issued").and_then(parser::parse_issued)
                            {
                                last_issued = Some(issued);
                            }
                            info!(
                                "Captured record for {} ({})",
                                key,
                                record.get("Citation").unwrap_or("no citation field")
                            );
                            if !self.buffer.append(record) {
                                debug!("Duplicate citation for {}, skipped", key);
                            }

                            self.periodic_flush(resolved, &mut records_written);
                            if cursor.advance(self.config.max_sequence) {
                                self.flush_lossy(&mut records_written);
                            }
                            self.report_progress(&cursor, started, keys_visited);
                        }

                        Ok(FetchOutcome::Empty) => {
                            keys_visited += 1;
                            resolved += 1;
                            cursor.retries_for_key = 0;
                            cursor.no_data_streak += 1;
                            debug!("No data for {}", key);

                            self.periodic_flush(resolved, &mut records_written);
                            if officer_exhausted(
                                cursor.no_data_streak,
                                self.config.no_data_limit,
                                last_issued,
                                Local::now().naive_local(),
                                self.config.recent_window_days,
                            ) {
                                info!(
                                    "Officer {} finished after {} consecutive empty results",
                                    cursor.officer, cursor.no_data_streak
                                );
                                self.flush_lossy(&mut records_written);
                                cursor.next_officer();
                            } else if cursor.advance(self.config.max_sequence) {
                                self.flush_lossy(&mut records_written);
                            }
                            self.report_progress(&cursor, started, keys_visited);
                        }

                        Ok(FetchOutcome::Stalled) => {
                            let err = ScraperError::Stall(key.to_string());
                            warn!("{}", err);
                            self.error_log.record(&key, &err);
                            if self.config.debug {
                                self.driver.debug_snapshot(&key.to_string()).await;
                            }
                            // The watchdog already re-navigated; re-open
                            // the form and retry the same key
                            state = TraversalState::Retrying;
                        }

                        Err(e) => {
                            warn!("Fetch failed for {}: {}", key, e);
                            self.error_log.record(&key, &e);
                            if !e.is_retryable() {
                                self.flush_lossy(&mut records_written);
                                return Err(e);
                            }
                            state = TraversalState::Retrying;
                        }
                    }
                }
            }
        }
    }

    /// Full page reset: back to the entry page, re-open the lookup form.
    async fn reset(&self) -> Result<(), ScraperError> {
        self.driver.navigate(&self.config.url).await?;
        self.fetcher.open_lookup().await
    }

    /// Fixed-cadence flush. Counts every resolved key, found or empty, so
    /// buffered records never wait out a long run of empty results.
    fn periodic_flush(&mut self, resolved: u64, records_written: &mut u64) {
        if resolved % u64::from(self.config.flush_every) == 0 {
            self.flush_lossy(records_written);
        }
    }

    /// Flush, keeping the buffer on persistence failure for the next
    /// trigger. Only the terminal flush propagates its error.
    fn flush_lossy(&mut self, records_written: &mut u64) {
        match self.store.flush(&mut self.buffer) {
            Ok(written) => *records_written += written as u64,
            Err(e) => warn!(
                "Flush failed, retaining {} buffered records: {}",
                self.buffer.len(),
                e
            ),
        }
    }

    fn report_progress(&self, cursor: &Cursor, started: Instant, keys_visited: u64) {
        if cursor.sequence % 10 == 0 {
            let elapsed = started.elapsed();
            info!(
                "At {}: {} keys visited, {} records buffered, {:.1}s elapsed",
                cursor.key(),
                keys_visited,
                self.buffer.len(),
                elapsed.as_secs_f64()
            );
        }
    }
}

/// End-of-data heuristic: a long run of consecutive empty results only
/// means the officer's citations are exhausted while the most recent
/// captured record is fresh; with no record captured yet it never fires.
fn officer_exhausted(
    streak: u32,
    limit: u32,
    last_issued: Option<NaiveDateTime>,
    now: NaiveDateTime,
    window_days: i64,
) -> bool {
    if streak < limit {
        return false;
    }
    match last_issued {
        Some(issued) => now.signed_duration_since(issued) <= chrono::Duration::days(window_days),
        None => false,
    }
}

fn report_timing(summary: &ScrapeSummary) {
    let (hours, minutes, seconds) = summary.elapsed_breakdown();
    info!(
        "Total seconds elapsed: {:.4}",
        summary.elapsed.as_secs_f64()
    );
    info!(
        "That's {} hours, {} minutes, and {:.4} seconds. {} keys visited, {} records written, {} retries.",
        hours, minutes, seconds, summary.keys_visited, summary.records_written, summary.retries
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration as ChronoDuration;

    fn now() -> NaiveDateTime {
        Local::now().naive_local()
    }

    #[test]
    fn test_streak_below_limit_never_fires() {
        assert!(!officer_exhausted(49, 50, Some(now()), now(), 30));
    }

    #[test]
    fn test_streak_at_limit_with_fresh_record_fires() {
        let issued = now() - ChronoDuration::days(5);
        assert!(officer_exhausted(50, 50, Some(issued), now(), 30));
    }

    #[test]
    fn test_streak_at_limit_with_stale_record_does_not_fire() {
        let issued = now() - ChronoDuration::days(31);
        assert!(!officer_exhausted(50, 50, Some(issued), now(), 30));
    }

    #[test]
    fn test_no_record_yet_never_fires() {
        assert!(!officer_exhausted(500, 50, None, now(), 30));
    }

    #[test]
    fn test_cursor_advance_wraps_officer() {
        let mut cursor = Cursor {
            officer: 1,
            sequence: 3,
            no_data_streak: 7,
            retries_for_key: 0,
        };
        assert!(!cursor.advance(4));
        assert_eq!(cursor.sequence, 4);
        assert!(cursor.advance(4));
        assert_eq!((cursor.officer, cursor.sequence), (2, 0));
        assert_eq!(cursor.no_data_streak, 0);
    }
}
