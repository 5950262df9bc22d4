//! Metadata extraction: timestep, force field and ensemble declarations.
//!
//! This is a pass over the whole log text, independent of the line filter,
//! since the declarations live on ordinary (non-marker) lines.

use tracing::{debug, warn};

use crate::models::{FileMetadata, LogDialect};

/// Scan `content` for the first timestep, force field and ensemble lines.
///
/// Anything not found keeps its default (NaN, empty, empty). Never fails.
pub fn extract_metadata(content: &str, dialect: &LogDialect) -> FileMetadata {
    let mut timestep: Option<&str> = None;
    let mut forcefield: Option<&str> = None;
    let mut ensemble: Option<&str> = None;

    for line in content.lines() {
        if timestep.is_none() {
            timestep = declared_value(line, &dialect.timestep_key);
        }
        if forcefield.is_none() {
            forcefield = declared_value(line, &dialect.forcefield_key);
        }
        if ensemble.is_none() {
            ensemble = declared_value(line, &dialect.ensemble_key);
        }
        if timestep.is_some() && forcefield.is_some() && ensemble.is_some() {
            break;
        }
    }

    let mut meta = FileMetadata::default();
    if let Some(raw) = timestep {
        match raw.parse::<f64>() {
            Ok(value) => meta.timestep = value,
            Err(_) => warn!(value = raw, "Ignoring unparseable timestep declaration"),
        }
    }
    if let Some(value) = forcefield {
        meta.forcefield = value.to_string();
    }
    if let Some(value) = ensemble {
        meta.ensemble = value.to_string();
    }

    debug!(
        timestep = meta.timestep,
        forcefield = %meta.forcefield,
        ensemble = %meta.ensemble,
        "Extracted metadata"
    );
    meta
}

/// Value declared by `line` for `key`, if the line is such a declaration.
///
/// Accepted shapes: `key value`, `key = value` and `key= value`.
fn declared_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    let glued_eq = match first.strip_prefix(key) {
        Some("") => false,
        Some("=") => true,
        _ => return None,
    };
    let mut value = tokens.next()?;
    if !glued_eq && value == "=" {
        value = tokens.next()?;
    }
    Some(value)
}
