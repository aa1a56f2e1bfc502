//! Study configuration
//!
//! Both studies run from fixed literals (file paths, cohort-defining codes);
//! there are no CLI flags or environment lookups. The structs here exist so
//! tests and callers can point a pipeline at other files or flip the few
//! product-level toggles without touching pipeline code.

use std::path::PathBuf;

use crate::source::SchemaOverrides;

/// Configuration for the sodium/osmolarity pair extraction study
#[derive(Debug, Clone)]
pub struct SodiumOsmolarityConfig {
    /// MIMIC-style clinical database file
    pub database: PathBuf,
    /// Output file for the paired observations
    pub output: PathBuf,
    /// Minimum age in years for cohort membership, or `None` to admit all
    /// ages.
    pub min_age: Option<u32>,
}

impl Default for SodiumOsmolarityConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("MIMIC.db"),
            output: PathBuf::from("pairs.csv"),
            min_age: None,
        }
    }
}

/// Configuration for the transfusion-associated mortality study
#[derive(Debug, Clone)]
pub struct TransfusionStudyConfig {
    /// Yearly trauma-registry database files, processed in order
    pub databases: Vec<PathBuf>,
    /// Per-source AIS table lookup; the table name changed in 2016
    pub ais_tables: SchemaOverrides,
    /// Optional CSV export of the processed working table, off by default
    pub export: Option<PathBuf>,
}

impl Default for TransfusionStudyConfig {
    fn default() -> Self {
        Self {
            databases: vec![
                PathBuf::from("2013.db"),
                PathBuf::from("2014.db"),
                PathBuf::from("2015.db"),
                PathBuf::from("2016.db"),
            ],
            ais_tables: SchemaOverrides::new("RDS_AISCCODE").with_override("2016", "RDS_AISPCODE"),
            export: None,
        }
    }
}
