//! 2×2 contingency tabulation
//!
//! Cross-tabulates two derived 0/1 indicators (exposure, outcome) into the
//! count table consumed by the chi-square test. Zero cells pass through
//! untouched; degenerate tables are the tester's problem to report, not
//! this module's to repair.

use std::fmt;

use crate::error::{CohortError, Result};
use crate::rowset::RowSet;

/// A 2×2 exposure-by-outcome count table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    /// Name of the exposure indicator field
    pub exposure: String,
    /// Name of the outcome indicator field
    pub outcome: String,
    /// Exposed with outcome (a)
    pub exposed_outcome: u64,
    /// Exposed without outcome (b)
    pub exposed_no_outcome: u64,
    /// Unexposed with outcome (c)
    pub unexposed_outcome: u64,
    /// Unexposed without outcome (d)
    pub unexposed_no_outcome: u64,
}

/// Read a derived indicator cell, rejecting anything outside {0, 1}
fn indicator(rowset: &RowSet, row: usize, field: &str) -> Result<bool> {
    let value = rowset.get(row, field)?;
    match value.as_f64() {
        Some(f) if f == 1.0 => Ok(true),
        Some(f) if f == 0.0 => Ok(false),
        _ => Err(CohortError::InvalidIndicator {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

impl ContingencyTable {
    /// Cross-tabulate two indicator fields of a filtered row set
    ///
    /// # Errors
    /// Returns an error if either field is missing or holds a non-indicator
    /// value; derivation is expected to have run first.
    pub fn from_rowset(rowset: &RowSet, exposure: &str, outcome: &str) -> Result<Self> {
        let mut table = Self {
            exposure: exposure.to_string(),
            outcome: outcome.to_string(),
            exposed_outcome: 0,
            exposed_no_outcome: 0,
            unexposed_outcome: 0,
            unexposed_no_outcome: 0,
        };
        for row in 0..rowset.num_rows() {
            let exposed = indicator(rowset, row, exposure)?;
            let with_outcome = indicator(rowset, row, outcome)?;
            match (exposed, with_outcome) {
                (true, true) => table.exposed_outcome += 1,
                (true, false) => table.exposed_no_outcome += 1,
                (false, true) => table.unexposed_outcome += 1,
                (false, false) => table.unexposed_no_outcome += 1,
            }
        }
        Ok(table)
    }

    /// Counts as a 2×2 matrix, exposure rows by outcome columns
    #[must_use]
    pub fn counts(&self) -> [[f64; 2]; 2] {
        [
            [self.exposed_outcome as f64, self.exposed_no_outcome as f64],
            [
                self.unexposed_outcome as f64,
                self.unexposed_no_outcome as f64,
            ],
        ]
    }

    /// Total number of tabulated rows
    #[must_use]
    pub fn total(&self) -> u64 {
        self.exposed_outcome
            + self.exposed_no_outcome
            + self.unexposed_outcome
            + self.unexposed_no_outcome
    }

    /// Outcome rate conditional on exposure level:
    /// outcome / (outcome + non-outcome). NaN when the level is empty.
    #[must_use]
    pub fn outcome_rate(&self, exposed: bool) -> f64 {
        let (with_outcome, without_outcome) = if exposed {
            (self.exposed_outcome, self.exposed_no_outcome)
        } else {
            (self.unexposed_outcome, self.unexposed_no_outcome)
        };
        with_outcome as f64 / (with_outcome + without_outcome) as f64
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label_width = self.exposure.len() + 2;
        writeln!(
            f,
            "{:<label_width$} {:>12} {:>12} {:>8}",
            "",
            format!("{}=1", self.outcome),
            format!("{}=0", self.outcome),
            "RATE",
        )?;
        writeln!(
            f,
            "{:<label_width$} {:>12} {:>12} {:>8.4}",
            format!("{}=1", self.exposure),
            self.exposed_outcome,
            self.exposed_no_outcome,
            self.outcome_rate(true),
        )?;
        write!(
            f,
            "{:<label_width$} {:>12} {:>12} {:>8.4}",
            format!("{}=0", self.exposure),
            self.unexposed_outcome,
            self.unexposed_no_outcome,
            self.outcome_rate(false),
        )
    }
}
