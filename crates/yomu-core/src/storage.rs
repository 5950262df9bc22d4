//! Storage layer: log reading, output directory handling, CSV/Parquet/YAML writers.

use std::fs;
use std::path::{Path, PathBuf};

use arrow::array::{ArrayRef, AsArray, BooleanArray};
use arrow::datatypes::Float64Type;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tracing::{debug, warn};

use crate::error::{Result, YomuError};
use crate::models::{OutputFormat, OutputSpec};
use crate::table::MergedTable;

// ─── Input ───────────────────────────────────────────────────────────────────

/// Read a whole log file into memory.
pub fn read_log(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| YomuError::ReadLog {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Directory helpers ───────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

// ─── Table output ────────────────────────────────────────────────────────────

/// Write the merged table where `spec` says, creating the directory first.
pub fn write_table(spec: &OutputSpec, table: &MergedTable) -> Result<PathBuf> {
    ensure_dir(&spec.dir)?;
    let path = spec.path();

    if table.schema().fields().is_empty() {
        warn!(path = %path.display(), "No tabular output in any input, writing an empty file");
        fs::write(&path, "")?;
        return Ok(path);
    }

    match spec.format {
        OutputFormat::Csv => write_csv(&path, table.batch())?,
        OutputFormat::Parquet => write_parquet(&path, table.batch())?,
    }
    debug!(path = %path.display(), rows = table.num_rows(), "Wrote merged table");
    Ok(path)
}

/// Comma-separated, header row first, no index column. Nulls and NaN are
/// both written as empty fields.
pub fn write_csv(path: &Path, batch: &RecordBatch) -> Result<()> {
    let batch = nan_to_null(batch)?;
    let file = fs::File::create(path)?;
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(file);
    writer.write(&batch)?;
    Ok(())
}

/// Null out NaN cells of `Float64` columns, so CSV has one missing-value token.
fn nan_to_null(batch: &RecordBatch) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(batch.num_columns());
    for col in batch.columns() {
        match col.as_primitive_opt::<Float64Type>() {
            Some(floats) if floats.iter().flatten().any(f64::is_nan) => {
                let mask: BooleanArray = floats
                    .iter()
                    .map(|v| Some(v.is_some_and(f64::is_nan)))
                    .collect();
                columns.push(arrow::compute::nullif(col.as_ref(), &mask)?);
            }
            _ => columns.push(col.clone()),
        }
    }
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

pub fn write_parquet(path: &Path, batch: &RecordBatch) -> Result<()> {
    let file = fs::File::create(path)?;
    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

// ─── YAML I/O ────────────────────────────────────────────────────────────────

pub fn save_yaml<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }
    let content = serde_yaml::to_string(data)?;
    fs::write(path, content)?;
    Ok(())
}
