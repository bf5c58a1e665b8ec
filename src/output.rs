//! Batch results: the normalized table, the per-file failures, and run stats.

use crate::error::FileError;
use crate::record::{FieldRecord, ResultTable};
use serde::{Deserialize, Serialize};

/// What happened to one document (a file, or one page of a PDF).
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOutcome {
    /// File name, or `"name (page N)"` when a PDF was split.
    pub source: String,
    pub result: Result<FieldRecord, FileError>,
}

impl DocumentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// The result of a whole batch.
///
/// Returned whenever at least one document produced a record. Files that
/// failed are listed in `failures` in upload order; their rows are simply
/// absent from `table`.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub table: ResultTable,
    pub failures: Vec<FileError>,
    pub stats: BatchStats,
}

impl BatchOutput {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Counters and timings for one batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Inputs the caller supplied.
    pub files: usize,
    /// Documents attempted (files, or pages in each-page mode).
    pub documents: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    /// Time spent waiting on the model.
    pub llm_duration_ms: u64,
}

/// Split outcomes into successful records and failures, both in order.
pub(crate) fn partition(outcomes: Vec<DocumentOutcome>) -> (Vec<FieldRecord>, Vec<FileError>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(r) => records.push(r),
            Err(e) => failures.push(e),
        }
    }
    (records, failures)
}
