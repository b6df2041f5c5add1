//! Import counters and per-row failure log

use serde::Serialize;

/// A row that could not be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFailure {
    /// Source line, 0 when unknown
    pub line: u64,
    /// Card number, absent when the record could not be parsed at all
    pub no_kta: Option<String>,
    pub nik: Option<String>,
    pub reason: String,
}

/// How a flush was carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushMode {
    /// One multi-row statement
    Bulk,
    /// The bulk statement failed and rows were retried one by one
    Degraded,
}

/// Result of a single flush
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlushOutcome {
    pub mode: FlushMode,
    pub batch_size: usize,
    pub inserted: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Running totals of an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    /// Records read from the source, malformed ones included
    pub rows_read: u64,
    pub inserted: u64,
    /// Missing required fields plus duplicate card numbers
    pub skipped: u64,
    pub failed: u64,
    pub flushes: u64,
    pub degraded_flushes: u64,
    /// The first failures, up to the configured cap
    pub failures: Vec<RowFailure>,
    /// Failures counted but not kept in `failures`
    pub failures_truncated: u64,
    /// The run stopped early on request
    pub cancelled: bool,
}

impl ImportStats {
    /// Count a failed row, keeping its details while under `cap`
    pub fn record_failure(&mut self, failure: RowFailure, cap: usize) {
        self.failed += 1;
        if self.failures.len() < cap {
            self.failures.push(failure);
        } else {
            self.failures_truncated += 1;
        }
    }

    /// Fold a flush result into the totals
    pub fn record_flush(&mut self, outcome: &FlushOutcome) {
        self.flushes += 1;
        if outcome.mode == FlushMode::Degraded {
            self.degraded_flushes += 1;
        }
    }

    /// Rows that reached a final state
    pub fn processed(&self) -> u64 {
        self.inserted + self.skipped + self.failed
    }
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Inserted : {}", self.inserted)?;
        writeln!(f, "Skipped  : {}", self.skipped)?;
        write!(f, "Failed   : {}", self.failed)
    }
}
