//! Feature derivation rules
//!
//! Pure, order-independent rewrites applied to a working row set: indicator
//! binarization, text-to-indicator mapping, one-hot expansion, and the
//! sentinel/null row drops. Every rule is idempotent; applying it twice
//! yields the same table as applying it once.

use log::debug;

use crate::error::Result;
use crate::rowset::{RowSet, Value};

/// Numeric view of a cell, parsing numeric text as well
fn numeric_view(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    }
}

/// Rewrite a count/amount field to a 0/1 indicator: value > 0 becomes 1,
/// everything else (zero, negative, null, non-numeric) becomes 0.
///
/// # Errors
/// Returns an error if the field does not exist.
pub fn binarize(rowset: &mut RowSet, field: &str) -> Result<()> {
    let idx = rowset.column_index(field)?;
    let values: Vec<Value> = rowset
        .rows()
        .iter()
        .map(|row| {
            let positive = numeric_view(&row[idx]).is_some_and(|f| f > 0.0);
            Value::Int(i64::from(positive))
        })
        .collect();
    rowset.set_column(field, values)
}

/// Rewrite a free-text category field in place: text equal to `target`
/// becomes 1, any other text (or null) becomes 0. A field already holding a
/// 0/1 indicator passes through unchanged, so the rule is idempotent.
///
/// # Errors
/// Returns an error if the field does not exist.
pub fn map_text_equals(rowset: &mut RowSet, field: &str, target: &str) -> Result<()> {
    let idx = rowset.column_index(field)?;
    let values: Vec<Value> = rowset
        .rows()
        .iter()
        .map(|row| match &row[idx] {
            Value::Text(s) => Value::Int(i64::from(s == target)),
            Value::Int(i @ (0 | 1)) => Value::Int(*i),
            _ => Value::Int(0),
        })
        .collect();
    rowset.set_column(field, values)
}

/// Derive a 0/1 indicator column from a substring match against a preserved
/// text field: text containing `needle` maps to 1, anything else to 0.
///
/// # Errors
/// Returns an error if the source field does not exist.
pub fn map_text_contains(
    rowset: &mut RowSet,
    source_field: &str,
    target_field: &str,
    needle: &str,
) -> Result<()> {
    let idx = rowset.column_index(source_field)?;
    let values: Vec<Value> = rowset
        .rows()
        .iter()
        .map(|row| {
            let hit = row[idx].as_str().is_some_and(|s| s.contains(needle));
            Value::Int(i64::from(hit))
        })
        .collect();
    rowset.set_column(target_field, values)
}

/// Category label used for one-hot column names; integral floats render
/// without the fraction so `3` and `3.0` land in the same column.
fn category_label(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Int(i) => Some(i.to_string()),
        Value::Real(f) if f.is_finite() && f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        Value::Real(f) => Some(f.to_string()),
        Value::Text(s) => Some(s.clone()),
    }
}

/// Expand a categorical field into one indicator column per observed
/// category (`{prefix}_{category}`), preserving the original field.
/// Categories are ordered ascending; null cells produce no indicator.
///
/// # Errors
/// Returns an error if the field does not exist.
pub fn one_hot(rowset: &mut RowSet, field: &str, prefix: &str) -> Result<()> {
    let idx = rowset.column_index(field)?;
    let labels: Vec<Option<String>> = rowset
        .rows()
        .iter()
        .map(|row| category_label(&row[idx]))
        .collect();

    let mut categories: Vec<String> = labels.iter().flatten().cloned().collect();
    categories.sort_by(|a, b| match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.cmp(b),
    });
    categories.dedup();

    for category in &categories {
        let values: Vec<Value> = labels
            .iter()
            .map(|label| Value::Int(i64::from(label.as_deref() == Some(category.as_str()))))
            .collect();
        rowset.set_column(&format!("{prefix}_{category}"), values)?;
    }
    Ok(())
}

/// Drop every row holding the numeric sentinel in any field. This is the
/// only recoverable-by-omission condition in the pipeline; everything else
/// fails fast.
pub fn drop_sentinel(rowset: &mut RowSet, sentinel: f64) {
    let before = rowset.num_rows();
    rowset.retain_rows(|row| !row.iter().any(|v| v.eq_number(sentinel)));
    let dropped = before - rowset.num_rows();
    if dropped > 0 {
        debug!("Dropped {dropped} rows holding sentinel {sentinel}");
    }
}

/// Drop every row with a NULL in any field
pub fn drop_null(rowset: &mut RowSet) {
    let before = rowset.num_rows();
    rowset.retain_rows(|row| !row.iter().any(Value::is_null));
    let dropped = before - rowset.num_rows();
    if dropped > 0 {
        debug!("Dropped {dropped} rows with null fields");
    }
}
