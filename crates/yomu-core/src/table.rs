//! The merged table: an Arrow batch grown one log file at a time.
//!
//! Each merge parses a file's marker lines into a segment, rebases the
//! segment's STEP/TIME counters on the table's last row, then appends it
//! with a diagonal concat (schemas unioned, absent columns filled with null).

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{
    new_null_array, Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray,
};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use tracing::{debug, warn};

use crate::error::{Result, YomuError};
use crate::filter::FilteredLog;
use crate::models::{
    FileMetadata, FileReport, LogDialect, ENSEMBLE_COLUMN, FORCEFIELD_COLUMN, TIMESTEP_COLUMN,
};

/// Rows merged so far, with the union of every file's columns.
///
/// Missing cells are Arrow nulls. STEP is `Int64`; label and metadata
/// strings are `Utf8`; everything else is `Float64`.
#[derive(Debug, Clone)]
pub struct MergedTable {
    batch: RecordBatch,
}

impl Default for MergedTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MergedTable {
    pub fn new() -> Self {
        Self {
            batch: RecordBatch::new_empty(Arc::new(Schema::empty())),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    /// Values of a `Float64` column, `None` if absent or of another type.
    pub fn f64_values(&self, name: &str) -> Option<Vec<Option<f64>>> {
        let col = self.batch.column_by_name(name)?;
        Some(col.as_primitive_opt::<Float64Type>()?.iter().collect())
    }

    /// Values of an `Int64` column, `None` if absent or of another type.
    pub fn i64_values(&self, name: &str) -> Option<Vec<Option<i64>>> {
        let col = self.batch.column_by_name(name)?;
        Some(col.as_primitive_opt::<Int64Type>()?.iter().collect())
    }

    /// Values of a `Utf8` column, `None` if absent or of another type.
    pub fn str_values(&self, name: &str) -> Option<Vec<Option<String>>> {
        let col = self.batch.column_by_name(name)?;
        Some(
            col.as_string_opt::<i32>()?
                .iter()
                .map(|v| v.map(str::to_string))
                .collect(),
        )
    }

    /// Last row's STEP, if the table has rows and that cell is set.
    pub fn last_step(&self, dialect: &LogDialect) -> Option<i64> {
        let col = self.batch.column_by_name(&dialect.step_column)?;
        let arr = col.as_primitive_opt::<Int64Type>()?;
        last_valid(arr).map(|idx| arr.value(idx))
    }

    /// Last row's TIME, if the table has rows and that cell is set.
    pub fn last_time(&self, dialect: &LogDialect) -> Option<f64> {
        let col = self.batch.column_by_name(&dialect.time_column)?;
        let arr = col.as_primitive_opt::<Float64Type>()?;
        last_valid(arr).map(|idx| arr.value(idx))
    }

    /// Merge one file's marker lines into the table.
    ///
    /// `metadata` adds the TIMESTEP/FORCEFIELD/ENSEMBLE columns. On error
    /// the table is left as it was.
    pub fn merge_file(
        &mut self,
        filtered: &FilteredLog<'_>,
        label: &str,
        metadata: Option<&FileMetadata>,
        dialect: &LogDialect,
    ) -> Result<FileReport> {
        let Some(header) = filtered.header else {
            warn!(label, "No tabular output found, skipping");
            return Ok(FileReport::empty(label));
        };

        let native: Vec<String> = header.fields().map(str::to_string).collect();
        let schema = Arc::new(segment_schema(&native, label, metadata.is_some(), dialect)?);

        // Parse data rows column-wise
        let width = native.len();
        let mut values: Vec<Vec<f64>> = vec![Vec::with_capacity(filtered.len()); width];
        for row in &filtered.rows {
            let tokens: Vec<&str> = row.fields().collect();
            if tokens.len() != width {
                return Err(YomuError::ColumnCount {
                    label: label.to_string(),
                    line: row.number,
                    expected: width,
                    found: tokens.len(),
                });
            }
            for (column, token) in values.iter_mut().zip(tokens) {
                let value = token.parse::<f64>().map_err(|_| YomuError::InvalidNumber {
                    label: label.to_string(),
                    line: row.number,
                    token: token.to_string(),
                })?;
                column.push(value);
            }
        }

        // Offsets come from the table as it stood before this file
        let has_step = native.contains(&dialect.step_column);
        let has_time = native.contains(&dialect.time_column);
        let step_offset = if has_step {
            self.offset(&dialect.step_column, label, |t| t.last_step(dialect))
        } else {
            None
        };
        let time_offset = if has_time {
            self.offset(&dialect.time_column, label, |t| t.last_time(dialect))
        } else {
            None
        };

        let n = filtered.len();
        let mut columns: Vec<ArrayRef> = vec![Arc::new(StringArray::from(vec![label; n]))];
        if let Some(meta) = metadata {
            columns.push(Arc::new(Float64Array::from(vec![meta.timestep; n])));
            columns.push(Arc::new(StringArray::from(vec![meta.forcefield.as_str(); n])));
            columns.push(Arc::new(StringArray::from(vec![meta.ensemble.as_str(); n])));
        }
        for (name, mut column) in native.iter().zip(values) {
            if *name == dialect.step_column {
                let offset = step_offset.unwrap_or(0) as f64;
                columns.push(Arc::new(Int64Array::from(rebase_steps(&column, offset))));
            } else {
                if *name == dialect.time_column {
                    if let Some(offset) = time_offset {
                        column.iter_mut().for_each(|t| *t += offset);
                    }
                }
                columns.push(Arc::new(Float64Array::from(column)));
            }
        }
        let segment = RecordBatch::try_new(schema, columns)?;

        let merged = concat_batches(&self.batch, &segment, label)?;
        self.batch = normalize_blanks(&merged)?;

        debug!(
            label,
            rows = n,
            total_rows = self.batch.num_rows(),
            columns = self.batch.num_columns(),
            "Merged segment"
        );

        Ok(FileReport {
            label: label.to_string(),
            path: None,
            rows: n,
            columns: native,
            step_offset,
            time_offset,
            metadata: metadata.cloned(),
        })
    }

    /// Offset for a rebased column, or `None` for the first file.
    fn offset<T>(&self, column: &str, label: &str, last: impl Fn(&Self) -> Option<T>) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = last(self);
        if value.is_none() {
            warn!(label, column, "Previous row has no value to rebase on, leaving column as is");
        }
        value
    }
}

fn last_valid(arr: &dyn Array) -> Option<usize> {
    let idx = arr.len().checked_sub(1)?;
    arr.is_valid(idx).then_some(idx)
}

/// Augmented header of one file: label, optional metadata, native columns.
fn segment_schema(
    native: &[String],
    label: &str,
    with_metadata: bool,
    dialect: &LogDialect,
) -> Result<Schema> {
    let mut fields = vec![Field::new(&dialect.label_column, DataType::Utf8, true)];
    if with_metadata {
        fields.push(Field::new(TIMESTEP_COLUMN, DataType::Float64, true));
        fields.push(Field::new(FORCEFIELD_COLUMN, DataType::Utf8, true));
        fields.push(Field::new(ENSEMBLE_COLUMN, DataType::Utf8, true));
    }
    for name in native {
        let data_type = if *name == dialect.step_column {
            DataType::Int64
        } else {
            DataType::Float64
        };
        fields.push(Field::new(name, data_type, true));
    }

    if let Some(column) = first_duplicate(&fields) {
        return Err(YomuError::DuplicateColumn {
            label: label.to_string(),
            column,
        });
    }
    Ok(Schema::new(fields))
}

fn first_duplicate(fields: &[Field]) -> Option<String> {
    let mut seen = HashSet::new();
    for field in fields {
        let name: &str = field.name();
        if !seen.insert(name) {
            return Some(name.to_string());
        }
    }
    None
}

/// Add `offset` and truncate to an integer step count. Steps that are not
/// finite or fall outside the `i64` range become null.
fn rebase_steps(steps: &[f64], offset: f64) -> Vec<Option<i64>> {
    // i64::MIN is exactly -2^63; i64::MAX rounds up to 2^63
    const LOWER: f64 = i64::MIN as f64;
    const UPPER: f64 = i64::MAX as f64;

    steps
        .iter()
        .map(|s| (s + offset).trunc())
        .map(|s| (s >= LOWER && s < UPPER).then_some(s as i64))
        .collect()
}

fn concat_batches(existing: &RecordBatch, new: &RecordBatch, label: &str) -> Result<RecordBatch> {
    // New segment may have columns not in the table, and vice versa
    let merged_schema = Arc::new(merge_schemas(existing.schema_ref(), new.schema_ref(), label)?);

    let existing_aligned = align_batch(existing, &merged_schema)?;
    let new_aligned = align_batch(new, &merged_schema)?;

    Ok(arrow::compute::concat_batches(
        &merged_schema,
        &[existing_aligned, new_aligned],
    )?)
}

/// Ordered union: `a`'s columns first, then `b`'s unseen ones.
fn merge_schemas(a: &Schema, b: &Schema, label: &str) -> Result<Schema> {
    let mut fields: Vec<Field> = a.fields().iter().map(|f| f.as_ref().clone()).collect();
    for field in b.fields() {
        match a.field_with_name(field.name()) {
            Ok(existing) if existing.data_type() != field.data_type() => {
                return Err(YomuError::SchemaConflict {
                    label: label.to_string(),
                    column: field.name().clone(),
                    existing: existing.data_type().clone(),
                    incoming: field.data_type().clone(),
                });
            }
            Ok(_) => {}
            Err(_) => fields.push(field.as_ref().clone()),
        }
    }
    Ok(Schema::new(fields))
}

fn align_batch(batch: &RecordBatch, target_schema: &SchemaRef) -> Result<RecordBatch> {
    let n = batch.num_rows();
    let columns: Vec<ArrayRef> = target_schema
        .fields()
        .iter()
        .map(|field| match batch.column_by_name(field.name()) {
            Some(col) => col.clone(),
            None => new_null_array(field.data_type(), n),
        })
        .collect();

    Ok(RecordBatch::try_new(target_schema.clone(), columns)?)
}

/// Replace empty and whitespace-only strings with null.
fn normalize_blanks(batch: &RecordBatch) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = batch
        .columns()
        .iter()
        .map(|col| match col.as_string_opt::<i32>() {
            Some(strings) if strings.iter().flatten().any(|s| s.trim().is_empty()) => {
                let cleaned: StringArray = strings
                    .iter()
                    .map(|s| s.filter(|s| !s.trim().is_empty()))
                    .collect();
                Arc::new(cleaned) as ArrayRef
            }
            _ => col.clone(),
        })
        .collect();

    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_lines;

    fn merge(table: &mut MergedTable, text: &str, label: &str) -> Result<FileReport> {
        let dialect = LogDialect::default();
        let filtered = filter_lines(text, &dialect.marker);
        table.merge_file(&filtered, label, None, &dialect)
    }

    #[test]
    fn first_file_is_not_rebased() {
        let mut table = MergedTable::new();
        let report = merge(&mut table, "INFO: STEP TIME\nINFO: 5 0.5\nINFO: 6 0.6\n", "a").unwrap();
        assert_eq!(report.rows, 2);
        assert_eq!(report.step_offset, None);
        assert_eq!(table.i64_values("STEP").unwrap(), [Some(5), Some(6)]);
        assert_eq!(table.column_names(), ["NAME", "STEP", "TIME"]);
    }

    #[test]
    fn rebases_on_last_row() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP TIME E\nINFO: 0 0.0 1\nINFO: 10 2.5 1\n", "a").unwrap();
        let report = merge(&mut table, "INFO: STEP TIME E\nINFO: 0 0.0 1\nINFO: 10 2.5 1\n", "b").unwrap();
        assert_eq!(report.step_offset, Some(10));
        assert_eq!(report.time_offset, Some(2.5));
        assert_eq!(
            table.i64_values("STEP").unwrap(),
            [Some(0), Some(10), Some(10), Some(20)]
        );
        assert_eq!(
            table.f64_values("TIME").unwrap(),
            [Some(0.0), Some(2.5), Some(2.5), Some(5.0)]
        );
        // other columns untouched
        assert_eq!(table.f64_values("E").unwrap(), [Some(1.0); 4]);
    }

    #[test]
    fn step_is_truncated_once_after_rebasing() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP\nINFO: 2.7\n", "a").unwrap();
        // last STEP is already an integer (2); 2 + 1.9 = 3.9 -> 3
        merge(&mut table, "INFO: STEP\nINFO: 1.9\n", "b").unwrap();
        assert_eq!(table.i64_values("STEP").unwrap(), [Some(2), Some(3)]);
    }

    #[test]
    fn missing_step_column_skips_rebasing() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP TIME\nINFO: 3 3.0\n", "a").unwrap();
        let report = merge(&mut table, "INFO: TIME\nINFO: 1.0\n", "b").unwrap();
        assert_eq!(report.step_offset, None);
        assert_eq!(report.time_offset, Some(3.0));
        assert_eq!(table.i64_values("STEP").unwrap(), [Some(3), None]);
        assert_eq!(table.f64_values("TIME").unwrap(), [Some(3.0), Some(4.0)]);

        // last row has no STEP: nothing to rebase on
        let report = merge(&mut table, "INFO: STEP\nINFO: 7\n", "c").unwrap();
        assert_eq!(report.step_offset, None);
        assert_eq!(table.i64_values("STEP").unwrap(), [Some(3), None, Some(7)]);
    }

    #[test]
    fn unions_columns_with_nulls() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP TIME X\nINFO: 0 0.0 1.5\n", "a").unwrap();
        merge(&mut table, "INFO: STEP TIME Y\nINFO: 0 0.0 7.0\n", "b").unwrap();
        assert_eq!(table.column_names(), ["NAME", "STEP", "TIME", "X", "Y"]);
        assert_eq!(table.f64_values("X").unwrap(), [Some(1.5), None]);
        assert_eq!(table.f64_values("Y").unwrap(), [None, Some(7.0)]);
        assert_eq!(
            table.str_values("NAME").unwrap(),
            [Some("a".to_string()), Some("b".to_string())]
        );
    }

    #[test]
    fn non_numeric_token_is_an_error() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP TIME\nINFO: 0 0.0\n", "a").unwrap();
        let err = merge(&mut table, "INFO: STEP TIME\nINFO: 0 abc\n", "b").unwrap_err();
        match err {
            YomuError::InvalidNumber { label, line, token } => {
                assert_eq!(label, "b");
                assert_eq!(line, 2);
                assert_eq!(token, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
        // table untouched
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn short_row_is_an_error() {
        let mut table = MergedTable::new();
        let err = merge(&mut table, "INFO: STEP TIME E\nINFO: 0 0.0\n", "a").unwrap_err();
        assert!(matches!(
            err,
            YomuError::ColumnCount { expected: 3, found: 2, .. }
        ));
    }

    #[test]
    fn duplicate_header_column_is_an_error() {
        let mut table = MergedTable::new();
        let err = merge(&mut table, "INFO: STEP NAME\nINFO: 0 1\n", "a").unwrap_err();
        assert!(matches!(err, YomuError::DuplicateColumn { ref column, .. } if column == "NAME"));
    }

    #[test]
    fn file_without_marker_lines_contributes_nothing() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP\nINFO: 1\n", "a").unwrap();
        let report = merge(&mut table, "no table here\n", "b").unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(table.num_rows(), 1);
    }

    #[test]
    fn header_only_file_extends_schema() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP\nINFO: 1\n", "a").unwrap();
        let report = merge(&mut table, "INFO: STEP PRESS\n", "b").unwrap();
        assert_eq!(report.rows, 0);
        assert_eq!(table.column_names(), ["NAME", "STEP", "PRESS"]);
        assert_eq!(table.f64_values("PRESS").unwrap(), [None]);
    }

    #[test]
    fn header_only_first_file_does_not_rebase_next() {
        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP TIME\n", "a").unwrap();
        assert!(table.is_empty());

        let report = merge(&mut table, "INFO: STEP TIME\nINFO: 4 0.8\n", "b").unwrap();
        assert_eq!(report.step_offset, None);
        assert_eq!(report.time_offset, None);
        assert_eq!(table.i64_values("STEP").unwrap(), [Some(4)]);
        assert_eq!(table.f64_values("TIME").unwrap(), [Some(0.8)]);
    }

    #[test]
    fn out_of_range_steps_become_null() {
        assert_eq!(
            rebase_steps(&[1e19, -1e19, f64::NAN, f64::INFINITY, 9.9], 0.0),
            [None, None, None, None, Some(9)]
        );
        // offset is applied before the range check
        assert_eq!(rebase_steps(&[9.0e18], 9.0e18), [None]);

        let mut table = MergedTable::new();
        merge(&mut table, "INFO: STEP\nINFO: 1e19\nINFO: 3\n", "a").unwrap();
        assert_eq!(table.i64_values("STEP").unwrap(), [None, Some(3)]);
    }

    #[test]
    fn blank_strings_become_null() {
        let mut table = MergedTable::new();
        let dialect = LogDialect::default();
        let meta = FileMetadata {
            timestep: 0.002,
            forcefield: "  ".to_string(),
            ensemble: "NVT".to_string(),
        };
        let filtered = filter_lines("INFO: STEP\nINFO: 0\n", "INFO");
        table.merge_file(&filtered, "", Some(&meta), &dialect).unwrap();

        assert_eq!(table.str_values("NAME").unwrap(), [None]);
        assert_eq!(table.str_values(FORCEFIELD_COLUMN).unwrap(), [None]);
        assert_eq!(table.str_values(ENSEMBLE_COLUMN).unwrap(), [Some("NVT".to_string())]);
        assert_eq!(table.f64_values(TIMESTEP_COLUMN).unwrap(), [Some(0.002)]);
    }

    #[test]
    fn conflicting_column_types_are_an_error() {
        let mut table = MergedTable::new();
        let dialect = LogDialect::default();
        let filtered = filter_lines("INFO: STEP\nINFO: 0\n", "INFO");
        table.merge_file(&filtered, "a", None, &dialect).unwrap();

        // "NAME" is the label column (Utf8) of the table
        let other = dialect.clone().with_label_column("SOURCE");
        let filtered = filter_lines("INFO: NAME\nINFO: 1\n", "INFO");
        let err = table.merge_file(&filtered, "b", None, &other).unwrap_err();
        assert!(matches!(err, YomuError::SchemaConflict { ref column, .. } if column == "NAME"));
    }
}
