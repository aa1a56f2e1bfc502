//! Error handling for the cohort pipeline.

/// Specialized error type for cohort extraction and analysis
#[derive(Debug, thiserror::Error)]
pub enum CohortError {
    /// Error opening a source or executing a query
    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Error reading or writing an output artifact
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error writing the delimited output file
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A named column is missing from a row set
    #[error("column not found: {0}")]
    ColumnNotFound(String),

    /// A join key could not be coerced to the canonical numeric form
    #[error("non-numeric join key: {0}")]
    KeyCoercion(String),

    /// Row sets with incompatible columns were combined
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A field expected to hold a 0/1 indicator held something else
    #[error("invalid indicator value in '{field}': {value}")]
    InvalidIndicator {
        /// Name of the offending field
        field: String,
        /// Rendered value found in the field
        value: String,
    },

    /// A date or timestamp string could not be parsed
    #[error("date parse error: {0}")]
    DateParse(String),

    /// Error from the statistical backend (distribution setup, singular
    /// information matrix, non-convergence)
    #[error("statistics error: {0}")]
    Stats(String),
}

impl From<chrono::ParseError> for CohortError {
    fn from(error: chrono::ParseError) -> Self {
        Self::DateParse(error.to_string())
    }
}

/// Result type for cohort pipeline operations
pub type Result<T> = std::result::Result<T, CohortError>;
