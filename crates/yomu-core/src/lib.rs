//! yomu-core: merge a sequence of MD engine logs into one table.
//!
//! A log contributes its marker lines (a header, then numeric rows). Files
//! are folded in order into a [`MergedTable`]: STEP and TIME are rebased on
//! the previous file's last row so the output forms one timeline, and
//! columns are unioned so files reporting different observables still line up.

pub mod engine;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod models;
pub mod storage;
pub mod table;

pub use engine::{merge_logs, MergeEngine, MergeOutcome};
pub use error::{Result, YomuError};
pub use models::{
    FileMetadata, FileReport, LogDialect, LogInput, MergeOptions, OutputFormat, OutputSpec,
};
pub use table::MergedTable;
