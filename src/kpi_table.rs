//! KPI duration table
//!
//! The per-question `kpi_time` comes from a fixed table indexed by a value
//! parsed out of the question's attached filename (last `-`-delimited token
//! of the stem, 1-based). The table ships as a JSON data asset so it can be
//! swapped without recompiling; `data/kpi_time.json` is the compiled-in
//! default.

use std::path::Path;

use crate::errors::{AutomationError, AutomationResult};

const DEFAULT_TABLE_JSON: &str = include_str!("../data/kpi_time.json");

#[derive(Debug, Clone)]
pub struct KpiTable {
    durations: Vec<u64>,
}

impl KpiTable {
    /// Built-in table shipped with the binary.
    pub fn builtin() -> Self {
        // the bundled asset is validated by tests; a broken build asset is
        // unrecoverable anyway
        let durations: Vec<u64> =
            serde_json::from_str(DEFAULT_TABLE_JSON).expect("bundled KPI table is valid JSON");
        Self { durations }
    }

    pub fn from_file(path: impl AsRef<Path>) -> AutomationResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            AutomationError::config(format!(
                "cannot read KPI table {}: {e}",
                path.as_ref().display()
            ))
        })?;
        let durations: Vec<u64> = serde_json::from_str(&content)
            .map_err(|e| AutomationError::serialization("KPI table", e))?;
        if durations.is_empty() {
            return Err(AutomationError::config("KPI table must not be empty"));
        }
        Ok(Self { durations })
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Duration for a 1-based index, as extracted from a filename.
    pub fn duration_for_index(&self, index: usize) -> Option<u64> {
        if index == 0 {
            return None;
        }
        self.durations.get(index - 1).copied()
    }
}

/// Extract the table index from a filename: strip the extension, take the
/// last `-`-delimited token, parse as an integer. `exam-part-12.pdf` → 12.
pub fn index_from_filename(filename: &str) -> Option<usize> {
    let stem = filename.rsplit_once('.').map(|(s, _)| s).unwrap_or(filename);
    let token = stem.rsplit('-').next()?;
    token.parse::<usize>().ok()
}
