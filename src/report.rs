/*!
 * Batch reporting.
 *
 * Every stage hands `(location, message, severity)` records to a
 * `ReportSink`. At the end of a batch the `BatchReport` lists which files
 * succeeded, which failed and which need a manual review.
 */

use log::{error, info, warn};
use parking_lot::Mutex;
use std::fmt;

/// Severity of a report record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Progress information
    Info,
    /// Needs a human look, processing went on
    Warning,
    /// Processing of the file stopped
    Error,
}

/// Where a record points to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub operation_id: Option<usize>,
    pub persistent_id: Option<String>,
}

impl Location {
    pub fn file(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            operation_id: None,
            persistent_id: None,
        }
    }

    pub fn with_operation(mut self, operation_id: usize) -> Self {
        self.operation_id = Some(operation_id);
        self
    }

    pub fn with_stid(mut self, persistent_id: impl Into<String>) -> Self {
        self.persistent_id = Some(persistent_id.into());
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        if let Some(id) = self.operation_id {
            write!(f, " op#{}", id)?;
        }
        if let Some(stid) = &self.persistent_id {
            write!(f, " [{}]", stid)?;
        }
        Ok(())
    }
}

/// A single report entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub location: Location,
    pub message: String,
    pub severity: Severity,
}

impl ReportRecord {
    pub fn new(location: Location, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            location,
            message: message.into(),
            severity,
        }
    }
}

/// Receives report records
pub trait ReportSink: Send + Sync {
    fn record(&self, record: ReportRecord);
}

/// Sink writing records to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn record(&self, record: ReportRecord) {
        match record.severity {
            Severity::Info => info!("{}: {}", record.location, record.message),
            Severity::Warning => warn!("{}: {}", record.location, record.message),
            Severity::Error => error!("{}: {}", record.location, record.message),
        }
    }
}

/// Sink keeping records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ReportRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<ReportRecord> {
        self.records.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }
}

impl ReportSink for MemorySink {
    fn record(&self, record: ReportRecord) {
        self.records.lock().push(record);
    }
}

/// How one file went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Processed; number of operations extracted or applied
    Succeeded { operations: usize },
    /// Processed, but some subtitles need a human look
    SucceededWithReview { operations: usize, reason: String },
    /// Aborted with an error
    Failed(String),
    /// Routed to manual review
    NeedsReview(String),
}

/// Per-file outcomes of a batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    outcomes: Vec<(String, FileOutcome)>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: impl Into<String>, outcome: FileOutcome) {
        self.outcomes.push((file.into(), outcome));
    }

    pub fn outcomes(&self) -> &[(String, FileOutcome)] {
        &self.outcomes
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, FileOutcome::Succeeded { .. }))
            .count()
    }

    /// Failed files with their error
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(file, o)| match o {
                FileOutcome::Failed(reason) => Some((file.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Files waiting for a manual review, with the reason; includes files
    /// that were written but carry review notes
    pub fn review_queue(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(file, o)| match o {
                FileOutcome::NeedsReview(reason)
                | FileOutcome::SucceededWithReview { reason, .. } => Some((file.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} files: {} succeeded, {} failed, {} require manual review",
            self.outcomes.len(),
            self.succeeded(),
            self.failures().len(),
            self.review_queue().len()
        )
    }

    /// Write the summary and both lists to the log
    pub fn log_summary(&self) {
        info!("{}", self.summary());
        for (file, reason) in self.failures() {
            error!("Failed: {} ({})", file, reason);
        }
        for (file, reason) in self.review_queue() {
            warn!("Requires manual review: {} ({})", file, reason);
        }
    }
}
