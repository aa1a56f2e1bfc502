//! In-memory row sets with named columns
//!
//! This module provides the working representation shared by every pipeline
//! stage: a row-major table of loosely typed values, converted once from the
//! relational source at the system boundary. Join keys are normalized to a
//! single canonical integer form here, so later stages never re-coerce.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::error::{CohortError, Result};

/// A single cell value loaded from a relational source
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Integer value
    Int(i64),
    /// Floating-point value
    Real(f64),
    /// Text value
    Text(String),
}

impl Value {
    /// Whether this value is SQL NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Numeric view of the value, if it has one
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Text view of the value, if it is text
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Coerce the value to the canonical join-key representation.
    ///
    /// Source data stores the same key as integer, integral float, or numeric
    /// text ("42", "42.0") depending on the charting system that produced the
    /// row. All of these normalize to one `i64`. A non-numeric key is a hard
    /// error: the run aborts rather than silently dropping the row.
    pub fn as_key(&self) -> Result<i64> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Real(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i64),
            Self::Text(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    return Ok(i);
                }
                match trimmed.parse::<f64>() {
                    Ok(f) if f.is_finite() && f.fract() == 0.0 => Ok(f as i64),
                    _ => Err(CohortError::KeyCoercion(s.clone())),
                }
            }
            other => Err(CohortError::KeyCoercion(other.to_string())),
        }
    }

    /// Whether the value equals a numeric sentinel (integer or float form)
    #[must_use]
    pub fn eq_number(&self, number: f64) -> bool {
        match self {
            Self::Int(i) => (*i as f64) == number,
            Self::Real(f) => *f == number,
            _ => false,
        }
    }

    /// Type-tagged token used when deduplicating rows, so `Int(1)` and
    /// `Text("1")` stay distinct.
    fn dedup_token(&self) -> String {
        match self {
            Self::Null => "n:".to_string(),
            Self::Int(i) => format!("i:{i}"),
            Self::Real(f) => format!("r:{f}"),
            Self::Text(s) => format!("t:{s}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Real(r) => write!(f, "{r}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<rusqlite::types::Value> for Value {
    fn from(value: rusqlite::types::Value) -> Self {
        match value {
            rusqlite::types::Value::Null => Self::Null,
            rusqlite::types::Value::Integer(i) => Self::Int(i),
            rusqlite::types::Value::Real(f) => Self::Real(f),
            rusqlite::types::Value::Text(s) => Self::Text(s),
            // Blobs do not occur in the studied schemas; render as text so a
            // misdeclared column still fails loudly at key coercion.
            rusqlite::types::Value::Blob(b) => Self::Text(format!("{b:?}")),
        }
    }
}

/// A table of rows with named columns
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RowSet {
    /// Create an empty row set with the given column names
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Column names, in declaration order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether the row set has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, row-major
    #[must_use]
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Index of a named column
    ///
    /// # Errors
    /// Returns an error if the column does not exist.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| CohortError::ColumnNotFound(name.to_string()))
    }

    /// Append a row; the caller guarantees it matches the column count
    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    /// Value at (row, column name)
    pub fn get(&self, row: usize, column: &str) -> Result<&Value> {
        let idx = self.column_index(column)?;
        Ok(&self.rows[row][idx])
    }

    /// Canonical key set of a column, duplicates removed
    ///
    /// # Errors
    /// Returns an error if the column is missing or any key is non-numeric.
    pub fn key_set(&self, column: &str) -> Result<FxHashSet<i64>> {
        let idx = self.column_index(column)?;
        let mut keys = FxHashSet::default();
        for row in &self.rows {
            keys.insert(row[idx].as_key()?);
        }
        Ok(keys)
    }

    /// Keep only rows for which the predicate holds
    pub fn retain_rows<F: FnMut(&[Value]) -> bool>(&mut self, mut predicate: F) {
        self.rows.retain(|row| predicate(row));
    }

    /// Remove duplicate rows, keeping first occurrences in order
    pub fn dedup_rows(&mut self) {
        let mut seen = FxHashSet::default();
        self.rows.retain(|row| {
            let token = row
                .iter()
                .map(Value::dedup_token)
                .collect::<Vec<_>>()
                .join("|");
            seen.insert(token)
        });
    }

    /// Add a column, or replace it if a column of that name already exists
    ///
    /// # Errors
    /// Returns an error if the value count does not match the row count.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(CohortError::SchemaMismatch(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }
        if let Ok(idx) = self.column_index(name) {
            for (row, value) in self.rows.iter_mut().zip(values) {
                row[idx] = value;
            }
        } else {
            self.columns.push(name.to_string());
            for (row, value) in self.rows.iter_mut().zip(values) {
                row.push(value);
            }
        }
        Ok(())
    }

    /// Drop the named columns
    ///
    /// # Errors
    /// Returns an error if any named column does not exist.
    pub fn drop_columns(&mut self, names: &[&str]) -> Result<()> {
        for name in names {
            let idx = self.column_index(name)?;
            self.columns.remove(idx);
            for row in &mut self.rows {
                row.remove(idx);
            }
        }
        Ok(())
    }

    /// Append all rows of another row set with identical columns
    ///
    /// # Errors
    /// Returns an error if the column names differ.
    pub fn concat(&mut self, other: RowSet) -> Result<()> {
        if self.columns != other.columns {
            return Err(CohortError::SchemaMismatch(format!(
                "cannot concatenate columns {:?} with {:?}",
                self.columns, other.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }
}
