//! Line filter: keep only the marker lines that carry tabular output.

/// A retained marker line and where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerLine<'a> {
    /// 1-based line number in the source text
    pub number: usize,
    pub text: &'a str,
}

impl<'a> MarkerLine<'a> {
    /// Whitespace-separated tokens with the marker token dropped.
    pub fn fields(&self) -> impl Iterator<Item = &'a str> {
        self.text.split_whitespace().skip(1)
    }
}

/// Tabular section of one log: the header line and the data lines after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredLog<'a> {
    pub header: Option<MarkerLine<'a>>,
    pub rows: Vec<MarkerLine<'a>>,
}

impl FilteredLog<'_> {
    /// Number of data rows (header excluded).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Split a log into its marker lines.
///
/// Every line starting with `marker` is kept, surrounding whitespace trimmed.
/// The first one is the header; the rest are data rows. Banners, warnings
/// and control echoes are dropped.
pub fn filter_lines<'a>(content: &'a str, marker: &str) -> FilteredLog<'a> {
    let mut kept = content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.starts_with(marker))
        .map(|(idx, line)| MarkerLine {
            number: idx + 1,
            text: line.trim(),
        });

    let header = kept.next();
    FilteredLog {
        header,
        rows: kept.collect(),
    }
}
