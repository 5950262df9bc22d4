//! Merge engine: the sequential fold of log files into one table.
//!
//! Each file is read into memory once. The line filter and the metadata
//! extractor both run over that text, then the table merger appends the
//! result. Files are merged strictly in the order they are given.

use tracing::info;

use crate::error::Result;
use crate::filter::filter_lines;
use crate::metadata::extract_metadata;
use crate::models::{FileReport, LogInput, MergeOptions};
use crate::storage;
use crate::table::MergedTable;

/// Final table and what each file contributed to it.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub table: MergedTable,
    pub reports: Vec<FileReport>,
}

impl MergeOutcome {
    pub fn total_rows(&self) -> usize {
        self.table.num_rows()
    }
}

/// Accumulates files into a [`MergedTable`].
pub struct MergeEngine {
    options: MergeOptions,
    table: MergedTable,
    reports: Vec<FileReport>,
}

impl MergeEngine {
    pub fn new(options: MergeOptions) -> Self {
        Self {
            options,
            table: MergedTable::new(),
            reports: vec![],
        }
    }

    pub fn options(&self) -> &MergeOptions {
        &self.options
    }

    /// Table as merged so far.
    pub fn table(&self) -> &MergedTable {
        &self.table
    }

    /// Merge the text of one log, labelling its rows with `label`.
    pub fn merge_text(&mut self, content: &str, label: &str) -> Result<&FileReport> {
        let dialect = &self.options.dialect;
        let filtered = filter_lines(content, &dialect.marker);
        let metadata = self
            .options
            .with_metadata
            .then(|| extract_metadata(content, dialect));

        let report = self
            .table
            .merge_file(&filtered, label, metadata.as_ref(), dialect)?;
        self.reports.push(report);
        Ok(&self.reports[self.reports.len() - 1])
    }

    /// Read `input` from disk and merge it.
    pub fn merge_file(&mut self, input: &LogInput) -> Result<&FileReport> {
        let content = storage::read_log(&input.path)?;
        let total_before = self.table.num_rows();
        let report = self.merge_text(&content, &input.label)?;
        let rows = report.rows;

        let idx = self.reports.len() - 1;
        self.reports[idx].path = Some(input.path.clone());

        info!(
            file = %input.path.display(),
            label = %input.label,
            rows,
            total_rows = total_before + rows,
            "Merged log"
        );
        Ok(&self.reports[idx])
    }

    /// Finalize: hand over the table and the per-file reports.
    pub fn finish(self) -> MergeOutcome {
        MergeOutcome {
            table: self.table,
            reports: self.reports,
        }
    }
}

/// Merge `inputs` in order. The first failing file aborts the whole merge.
pub fn merge_logs(inputs: &[LogInput], options: &MergeOptions) -> Result<MergeOutcome> {
    let mut engine = MergeEngine::new(options.clone());
    for input in inputs {
        engine.merge_file(input)?;
    }
    let outcome = engine.finish();
    info!(
        files = inputs.len(),
        rows = outcome.total_rows(),
        columns = outcome.table.column_names().len(),
        "Merge complete"
    );
    Ok(outcome)
}
