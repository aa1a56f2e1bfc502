//! Cohort filtering
//!
//! Narrows row sets from independent queries down to the study population:
//! keys present in every input (inner-join semantics), with UNION-sourced
//! duplicates removed and every key coerced to the canonical form first.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Result;
use crate::rowset::{RowSet, Value};

/// Intersect the canonical key sets of several row sets
///
/// The result is the set of keys present in ALL inputs. An empty input slice
/// yields the empty set.
///
/// # Errors
/// Returns an error if any input lacks the key column or holds a
/// non-numeric key (coercion failure aborts the run).
pub fn intersect_keys(rowsets: &[&RowSet], key_column: &str) -> Result<FxHashSet<i64>> {
    let mut iter = rowsets.iter();
    let Some(first) = iter.next() else {
        return Ok(FxHashSet::default());
    };
    let mut keys = first.key_set(key_column)?;
    for rowset in iter {
        let other = rowset.key_set(key_column)?;
        keys.retain(|k| other.contains(k));
    }
    debug!("{} keys after intersecting {} row sets", keys.len(), rowsets.len());
    Ok(keys)
}

/// Restrict a row set to rows whose canonical key is in the given set
///
/// # Errors
/// Returns an error if the key column is missing or a key is non-numeric.
pub fn filter_by_keys(
    rowset: &RowSet,
    key_column: &str,
    keys: &FxHashSet<i64>,
) -> Result<RowSet> {
    let idx = rowset.column_index(key_column)?;
    let mut out = RowSet::new(rowset.columns().to_vec());
    for row in rowset.rows() {
        if keys.contains(&row[idx].as_key()?) {
            out.push_row(row.clone());
        }
    }
    Ok(out)
}

/// Pair two observation row sets on an exact (key, timestamp) match
///
/// Both inputs carry (key, timestamp, value) columns. The result holds one
/// (left value, right value) pair per match, in left row order; several
/// observations sharing a timestamp pair as a cross product, as an SQL
/// equijoin would.
///
/// # Errors
/// Returns an error if a column is missing or a key is non-numeric.
pub fn pair_on_timestamp(
    left: &RowSet,
    right: &RowSet,
    key_column: &str,
    time_column: &str,
    value_column: &str,
) -> Result<Vec<(Value, Value)>> {
    let right_key = right.column_index(key_column)?;
    let right_time = right.column_index(time_column)?;
    let right_value = right.column_index(value_column)?;

    let mut by_timestamp: FxHashMap<(i64, String), Vec<&Value>> = FxHashMap::default();
    for row in right.rows() {
        let entry = (row[right_key].as_key()?, row[right_time].to_string());
        by_timestamp.entry(entry).or_default().push(&row[right_value]);
    }

    let left_key = left.column_index(key_column)?;
    let left_time = left.column_index(time_column)?;
    let left_value = left.column_index(value_column)?;

    let mut pairs = Vec::new();
    for row in left.rows() {
        let entry = (row[left_key].as_key()?, row[left_time].to_string());
        if let Some(matches) = by_timestamp.get(&entry) {
            for matched in matches {
                pairs.push((row[left_value].clone(), (*matched).clone()));
            }
        }
    }
    debug!(
        "{} pairs from {} x {} observations",
        pairs.len(),
        left.num_rows(),
        right.num_rows()
    );
    Ok(pairs)
}
