//! A Rust library for extracting clinical study cohorts from relational
//! registries, with cohort filtering, feature derivation, and statistical
//! testing.

pub mod cohort;
pub mod config;
pub mod derive;
pub mod error;
pub mod rowset;
pub mod source;
pub mod stats;
pub mod study;
pub mod tabulate;

// Re-export the most common types for easier use
// Core types
pub use config::{SodiumOsmolarityConfig, TransfusionStudyConfig};
pub use error::{CohortError, Result};
pub use rowset::{RowSet, Value};
pub use source::{DataSource, SchemaOverrides};

// Tabulation and testing
pub use stats::{ChiSquareResult, LogitFit, LogitModel, chi2_contingency, design_matrix};
pub use tabulate::ContingencyTable;

// Cohort operations
pub use cohort::{filter_by_keys, intersect_keys, pair_on_timestamp};
