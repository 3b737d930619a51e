//! Batch buffering and persistent output.
//!
//! Records accumulate in memory and are flushed to an append-only
//! delimited table. The flush is all-or-nothing: the buffer is only
//! cleared after the write succeeds, so a failed write can be retried at
//! the next flush trigger.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{error, info};

use super::parser;
use super::types::{CitationKey, Record};
use crate::error::ScraperError;

/// Columns appended by field derivation at flush time, in output order.
const DERIVED_COLUMNS: [&str; 4] = ["Officer", "Residence", "IssuedDate", "IssuedTime"];

/// In-memory batch of parsed records, deduplicated on the citation id
/// against everything already persisted or buffered.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    records: Vec<Record>,
    seen: HashSet<String>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the duplicate filter, typically from an existing store.
    pub fn with_seen(seen: HashSet<String>) -> Self {
        Self {
            records: Vec::new(),
            seen,
        }
    }

    /// Append a record in arrival order. Returns false for a record with
    /// no fields, or one whose citation id was already buffered or
    /// persisted.
    pub fn append(&mut self, record: Record) -> bool {
        if record.is_empty() {
            return false;
        }
        if let Some(citation) = record.get("Citation") {
            if !self.seen.insert(citation.to_string()) {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Drop the buffered records, keeping the duplicate filter.
    fn clear_records(&mut self) {
        self.records.clear();
    }
}

/// Append-only delimited table with a header row on first write.
///
/// The column order is fixed by the first flush (or recovered from an
/// existing file's header) and never changes afterwards; fields a record
/// lacks render as empty cells.
#[derive(Debug)]
pub struct CitationStore {
    path: PathBuf,
    columns: Option<Vec<String>>,
}

impl CitationStore {
    /// Open a store, recovering the column order from an existing file.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ScraperError> {
        let path = path.into();
        let columns = match read_nonempty(&path)? {
            Some(content) => parse_delimited_records(&content).into_iter().next(),
            None => None,
        };
        Ok(Self { path, columns })
    }

    /// Citation ids already persisted, for seeding the duplicate filter
    /// when resuming after an interruption.
    pub fn seen_citations(&self) -> Result<HashSet<String>, ScraperError> {
        let content = match read_nonempty(&self.path)? {
            Some(content) => content,
            None => return Ok(HashSet::new()),
        };

        let mut records = parse_delimited_records(&content).into_iter();
        let header = records.next().unwrap_or_default();
        let citation_col = match header.iter().position(|c| c == "Citation") {
            Some(idx) => idx,
            None => return Ok(HashSet::new()),
        };

        Ok(records
            .filter_map(|fields| fields.into_iter().nth(citation_col))
            .filter(|c| !c.is_empty())
            .collect())
    }

    /// Derive the computed fields, append the whole batch, and clear it.
    /// An empty buffer is a no-op. On any write error the buffer is left
    /// intact for a later retry.
    pub fn flush(&mut self, buffer: &mut BatchBuffer) -> Result<usize, ScraperError> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let rows: Vec<Record> = buffer.records().iter().map(derive_row).collect();

        // Column order is fixed by the first batch ever flushed
        let columns = self.columns.get_or_insert_with(|| {
            let mut columns: Vec<String> = Vec::new();
            for row in &rows {
                for name in row.field_names() {
                    if !columns.iter().any(|c| c == name) {
                        columns.push(name.to_string());
                    }
                }
            }
            columns
        });

        let mut out = String::new();
        if read_nonempty(&self.path)?.is_none() {
            out.push_str(&format_delimited_line(
                columns.iter().map(String::as_str),
            ));
            out.push('\n');
        }
        for row in &rows {
            out.push_str(&format_delimited_line(
                columns.iter().map(|c| row.get(c).unwrap_or_default()),
            ));
            out.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(out.as_bytes())?;
        file.flush()?;

        let written = buffer.len();
        buffer.clear_records();
        info!("Flushed {} records to {:?}", written, self.path);
        Ok(written)
    }
}

/// Append-only log of failed keys: one line per failure with a wall-clock
/// timestamp, the formatted key, and the error description.
#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn record(&self, key: &CitationKey, err: &ScraperError) {
        let line = format!(
            "{}\t{}\t{}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            key,
            err
        );
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            error!("Failed to write error log entry for {}: {}", key, e);
        }
    }
}

/// Compute the derived columns onto a copy of the record. Every derived
/// column is always present so the header stays stable; a derivation with
/// a missing or malformed source renders empty.
fn derive_row(record: &Record) -> Record {
    let mut row = record.clone();

    let officer = record
        .get("Citation")
        .and_then(parser::derive_officer)
        .unwrap_or_default();
    let fine = record
        .get("Fine")
        .and_then(parser::derive_fine)
        .map(|f| f.to_string());
    let residence = record
        .get("License Plate/Vin")
        .and_then(parser::derive_residence)
        .unwrap_or_default()
        .to_string();
    let (issued_date, issued_time) = record
        .get("Issued")
        .and_then(parser::split_issued)
        .unwrap_or_default();

    if let Some(fine) = fine {
        row.set("Fine", fine);
    }
    let [officer_col, residence_col, date_col, time_col] = DERIVED_COLUMNS;
    row.set(officer_col, officer);
    row.set(residence_col, residence);
    row.set(date_col, issued_date);
    row.set(time_col, issued_time);
    row
}

fn read_nonempty(path: &Path) -> Result<Option<String>, ScraperError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    if content.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(content))
    }
}

fn format_delimited_line<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    fields
        .map(|field| {
            if field.contains([',', '"', '\n']) {
                format!("\"{}\"", field.replace('"', "\"\""))
            } else {
                field.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Split the whole file into records. Quoted fields may span physical
/// lines, so a record boundary is an unquoted newline, not `lines()`.
fn parse_delimited_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            '\r' if !in_quotes && chars.peek() == Some(&'\n') => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
                records.push(std::mem::take(&mut fields));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() || !fields.is_empty() {
        fields.push(current);
        records.push(fields);
    }
    records
}
