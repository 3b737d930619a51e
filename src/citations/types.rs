//! Citation scraper data types.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One lookup query in the two-dimensional key space.
///
/// Not every key maps to an existing record; most lookups resolve empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationKey {
    pub officer: u32,
    pub sequence: u32,
}

impl CitationKey {
    pub fn new(officer: u32, sequence: u32) -> Self {
        Self { officer, sequence }
    }
}

impl fmt::Display for CitationKey {
    /// The fixed-width lookup string the search form expects,
    /// e.g. `P3-00042`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}-{:05}", self.officer, self.sequence)
    }
}

/// Raw text fragments read from the result pane for one key.
/// Discarded after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBlock(pub Vec<String>);

/// Payment state derived from the result pane's action buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub citation_text: Option<String>,
    pub unpaid: bool,
}

/// The durable unit: field name to raw string value, in arrival order.
/// Immutable once appended to the batch buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite a field, keeping arrival order for new names.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Resolution of one key lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result pane rendered a record.
    Found(RawBlock, PaymentStatus),
    /// The no-data indicator appeared.
    Empty,
    /// The watchdog flagged a stall before either appeared.
    Stalled,
}

/// Position to resume the traversal from after an interruption.
///
/// The core never persists this; an external caller may capture and
/// supply it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub officer: u32,
    pub sequence: u32,
    /// Start the officer loop at `officer` instead of 1.
    pub resume_officer: bool,
    /// Start the first visited officer at `sequence` instead of 0.
    pub resume_sequence: bool,
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            officer: 1,
            sequence: 0,
            resume_officer: false,
            resume_sequence: false,
        }
    }
}

impl Checkpoint {
    pub fn resume_at(officer: u32, sequence: u32) -> Self {
        Self {
            officer,
            sequence,
            resume_officer: true,
            resume_sequence: true,
        }
    }
}

/// Completion report of one traversal run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeSummary {
    pub records_written: u64,
    pub keys_visited: u64,
    pub retries: u64,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ScrapeSummary {
    /// Elapsed time broken into hours, minutes and fractional seconds.
    pub fn elapsed_breakdown(&self) -> (u64, u64, f64) {
        let total = self.elapsed.as_secs_f64();
        let hours = (total / 3600.0).floor() as u64;
        let remaining = total % 3600.0;
        let minutes = (remaining / 60.0).floor() as u64;
        (hours, minutes, remaining % 60.0)
    }
}
