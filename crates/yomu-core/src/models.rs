//! Data models for yomu.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, YomuError};

/// Textual conventions of the engine log being merged.
///
/// The defaults match GENESIS output: energy tables are written on lines
/// starting with `INFO:` and control parameters are echoed as
/// `timestep = 0.0020`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogDialect {
    /// Prefix of lines that carry tabular output (header and data rows)
    pub marker: String,
    /// Key of the timestep declaration line
    pub timestep_key: String,
    /// Key of the force field declaration line
    pub forcefield_key: String,
    /// Key of the ensemble declaration line
    pub ensemble_key: String,
    /// Name of the synthetic column holding the source label
    pub label_column: String,
    /// Cumulative step counter, rebased and stored as an integer
    pub step_column: String,
    /// Cumulative simulation time, rebased
    pub time_column: String,
}

impl Default for LogDialect {
    fn default() -> Self {
        Self {
            marker: "INFO".to_string(),
            timestep_key: "timestep".to_string(),
            forcefield_key: "forcefield".to_string(),
            ensemble_key: "ensemble".to_string(),
            label_column: "NAME".to_string(),
            step_column: "STEP".to_string(),
            time_column: "TIME".to_string(),
        }
    }
}

impl LogDialect {
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    pub fn with_label_column(mut self, name: impl Into<String>) -> Self {
        self.label_column = name.into();
        self
    }
}

pub const TIMESTEP_COLUMN: &str = "TIMESTEP";
pub const FORCEFIELD_COLUMN: &str = "FORCEFIELD";
pub const ENSEMBLE_COLUMN: &str = "ENSEMBLE";

/// Per-file configuration scalars, constant across all rows of that file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Integration timestep; NaN when the log does not declare one.
    pub timestep: f64,
    pub forcefield: String,
    pub ensemble: String,
}

impl Default for FileMetadata {
    fn default() -> Self {
        Self {
            timestep: f64::NAN,
            forcefield: String::new(),
            ensemble: String::new(),
        }
    }
}

/// Options that shape how every file is merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeOptions {
    pub dialect: LogDialect,
    /// Add TIMESTEP/FORCEFIELD/ENSEMBLE columns extracted from each log
    pub with_metadata: bool,
}

/// One log file to merge, with the label written into its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogInput {
    pub path: PathBuf,
    pub label: String,
}

impl LogInput {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    /// Label the input with its base name, extension stripped.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = default_label(&path);
        Self { path, label }
    }

    /// Pair input paths with explicit labels, positionally.
    ///
    /// `None` falls back to [`LogInput::from_path`] for every file. When
    /// labels are given their count must match the number of paths.
    pub fn pair(paths: &[PathBuf], labels: Option<&[String]>) -> Result<Vec<Self>> {
        match labels {
            None => Ok(paths.iter().cloned().map(Self::from_path).collect()),
            Some(labels) if labels.len() != paths.len() => Err(YomuError::LabelCount {
                files: paths.len(),
                labels: labels.len(),
            }),
            Some(labels) => Ok(paths
                .iter()
                .zip(labels)
                .map(|(path, label)| Self::new(path.clone(), label.clone()))
                .collect()),
        }
    }
}

/// `run_01.log` → `run_01`; `logs/eq.part2.log` → `eq.part2`.
pub fn default_label(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Serialization format of the merged table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Parquet,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Parquet => "parquet",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Where the merged table is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub dir: PathBuf,
    /// File name without extension
    pub name: String,
    pub format: OutputFormat,
}

impl OutputSpec {
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
            format: OutputFormat::Csv,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir
            .join(format!("{}.{}", self.name, self.format.extension()))
    }
}

/// Outcome of merging one file into the table.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub label: String,
    pub path: Option<PathBuf>,
    /// Data rows appended (header excluded)
    pub rows: usize,
    /// Native column names from the file's header, in order
    pub columns: Vec<String>,
    pub step_offset: Option<i64>,
    pub time_offset: Option<f64>,
    pub metadata: Option<FileMetadata>,
}

impl FileReport {
    pub fn empty(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            path: None,
            rows: 0,
            columns: vec![],
            step_offset: None,
            time_offset: None,
            metadata: None,
        }
    }
}
