//! Relational source access
//!
//! The extractor issues read-only SQL against one source at a time and hands
//! every result back as a [`RowSet`]. Per-source schema variance (a lookup
//! table whose name depends on the data-file year) is resolved through
//! [`SchemaOverrides`] rather than conditionals scattered through query
//! construction.

use std::path::Path;

use itertools::Itertools;
use log::debug;
use rusqlite::{Connection, OpenFlags};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::rowset::{RowSet, Value};

/// Mapping from source identifier to a table-name override, with a default
///
/// A lookup that has no override for a given source falls back to the
/// default name; absence of even the default table surfaces as the
/// underlying SQL error when the query runs.
#[derive(Debug, Clone)]
pub struct SchemaOverrides {
    default: String,
    overrides: FxHashMap<String, String>,
}

impl SchemaOverrides {
    /// Create a lookup with the given default table name
    #[must_use]
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            overrides: FxHashMap::default(),
        }
    }

    /// Register an override for one source identifier
    #[must_use]
    pub fn with_override(mut self, source: impl Into<String>, table: impl Into<String>) -> Self {
        self.overrides.insert(source.into(), table.into());
        self
    }

    /// Table name to use for the given source
    #[must_use]
    pub fn table_for(&self, source: &str) -> &str {
        self.overrides
            .get(source)
            .map_or(self.default.as_str(), String::as_str)
    }
}

/// Render a `column IN (...)` clause from a canonical key set
///
/// Keys are sorted so generated SQL is deterministic across runs.
#[must_use]
pub fn in_clause(column: &str, keys: &FxHashSet<i64>) -> String {
    let list = keys.iter().sorted_unstable().join(",");
    format!("{column} IN ({list})")
}

/// Combine same-shaped selects into a single UNION query
///
/// UNION, not UNION ALL: rows duplicated across the combined selects
/// collapse in the database before they reach the filter.
#[must_use]
pub fn union(selects: &[&str]) -> String {
    selects.join(" UNION ")
}

/// A single relational data source with a scoped connection
///
/// The connection lives for the lifetime of the value and closes on drop,
/// before the next source is opened; sources are never interleaved.
pub struct DataSource {
    name: String,
    conn: Connection,
}

impl DataSource {
    /// Open a source file read-only
    ///
    /// The source identifier used for schema-override lookups is the file
    /// stem (`2016.db` → `2016`).
    pub fn open(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned());
        debug!("Opening source {} ({})", name, path.display());
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { name, conn })
    }

    /// Open an in-memory source, writable so fixtures can be loaded
    pub fn open_in_memory(name: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            conn: Connection::open_in_memory()?,
        })
    }

    /// Source identifier (file stem)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run one or more statements that return no rows (fixture loading)
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run a select and materialize the full result as a row set
    ///
    /// # Errors
    /// Any SQL failure (malformed query, missing table or column) is fatal
    /// and propagated unchanged; there is no retry.
    pub fn query(&self, sql: &str) -> Result<RowSet> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(ToString::to_string)
            .collect();
        let column_count = columns.len();

        let mut result = RowSet::new(columns);
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                let value: rusqlite::types::Value = row.get(idx)?;
                values.push(Value::from(value));
            }
            result.push_row(values);
        }
        debug!("{}: {} rows from query", self.name, result.num_rows());
        Ok(result)
    }
}
