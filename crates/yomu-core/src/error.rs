//! Error types for yomu-core.

use std::path::PathBuf;

use arrow::datatypes::DataType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum YomuError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read log {}: {source}", path.display())]
    ReadLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{label}:{line}: '{token}' is not a number")]
    InvalidNumber {
        label: String,
        line: usize,
        token: String,
    },

    #[error("{label}:{line}: expected {expected} values, found {found}")]
    ColumnCount {
        label: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("{label}: column '{column}' appears more than once in the header")]
    DuplicateColumn { label: String, column: String },

    #[error("column '{column}' is {existing} in the merged table but {incoming} in {label}")]
    SchemaConflict {
        label: String,
        column: String,
        existing: DataType,
        incoming: DataType,
    },

    #[error("{labels} log names given for {files} input files")]
    LabelCount { files: usize, labels: usize },
}

pub type Result<T> = std::result::Result<T, YomuError>;
