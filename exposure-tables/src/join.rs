//! Inner equi-joins between tables of a snapshot.
//!
//! Keys are compared by their text rendering, so a `UInt32` row number in one
//! table matches an `Int64` row number in another. Output rows follow the
//! left table's order; a left row matching several right rows is repeated.
//! Left rows without a match are dropped and counted.

use std::collections::HashMap;

use arrow::{array::UInt32Array, record_batch::RecordBatch};
use exposure_bin_format::KeyValueColumns;

use crate::{
    error::{TableError, TableResult},
    util::{build_batch, column, key_strings, named_columns, take_rows},
};

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub table: RecordBatch,
    /// Left rows with no matching key on the right.
    pub dropped_rows: usize,
}

fn matching_rows(
    left_keys: &[Option<String>],
    right_keys: &[Option<String>],
) -> (Vec<u32>, Vec<u32>, usize) {
    let mut lookup: HashMap<&str, Vec<u32>> = HashMap::new();
    for (row, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            lookup.entry(key.as_str()).or_default().push(row as u32);
        }
    }

    let mut left_rows = Vec::with_capacity(left_keys.len());
    let mut right_rows = Vec::with_capacity(left_keys.len());
    let mut dropped = 0;
    for (row, key) in left_keys.iter().enumerate() {
        match key.as_deref().and_then(|key| lookup.get(key)) {
            Some(matches) => {
                for right in matches {
                    left_rows.push(row as u32);
                    right_rows.push(*right);
                }
            }
            None => dropped += 1,
        }
    }
    (left_rows, right_rows, dropped)
}

/// Joins `left[left_on] == right[right_on]`.
///
/// The output holds every left column followed by every right column except
/// the right key. Right columns sharing a name with a left column are an error.
pub fn inner_join(
    left: &RecordBatch,
    right: &RecordBatch,
    left_on: &str,
    right_on: &str,
) -> TableResult<JoinOutcome> {
    let left_keys = key_strings(column(left, left_on)?)?;
    let right_keys = key_strings(column(right, right_on)?)?;
    let (left_rows, right_rows, dropped_rows) = matching_rows(&left_keys, &right_keys);

    let left_taken = take_rows(left, &UInt32Array::from(left_rows))?;
    let right_taken = take_rows(right, &UInt32Array::from(right_rows))?;

    let mut columns = named_columns(&left_taken);
    for (name, array) in named_columns(&right_taken) {
        if name == right_on {
            continue;
        }
        if columns.iter().any(|(existing, _)| *existing == name) {
            return Err(TableError::DuplicateColumn(name));
        }
        columns.push((name, array));
    }

    if dropped_rows > 0 {
        tracing::warn!(
            key = left_on,
            dropped_rows,
            "rows without a matching key dropped by inner join"
        );
    }

    Ok(JoinOutcome {
        table: build_batch(columns)?,
        dropped_rows,
    })
}

/// Turns a dictionary file into a two-column table `[key_name, value_name]`.
pub fn key_value_table(
    map: &KeyValueColumns,
    key_name: &str,
    value_name: &str,
) -> TableResult<RecordBatch> {
    build_batch(vec![
        (key_name.to_string(), map.keys.clone()),
        (value_name.to_string(), map.values.clone()),
    ])
}

/// Attaches the row numbers of a dictionary file to `base`.
///
/// `base[join_key]` is matched against the dictionary keys and the matching
/// values are appended as `value_name`.
pub fn join_row_numbers(
    base: &RecordBatch,
    key_map: &KeyValueColumns,
    join_key: &str,
    value_name: &str,
) -> TableResult<JoinOutcome> {
    let right = key_value_table(key_map, join_key, value_name)?;
    inner_join(base, &right, join_key, join_key)
}
