//! Per-coverage cause-of-loss lists.
//!
//! Coverages store how many causes of loss each row owns. The causes
//! themselves live in one flat file shared by every coverage, so row `i`
//! owns the slice `[end(i-1), end(i))` where `end` is the running sum of the
//! counts. Each slice is joined with `+`.

use std::{collections::HashMap, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, AsArray, StringArray},
    compute::cast,
    datatypes::Int64Type,
    record_batch::RecordBatch,
};
use arrow_schema::DataType;
use exposure_bin_format::KeyValueColumns;

use crate::{
    error::{TableError, TableResult},
    util::{append_column, column, key_strings},
};

pub const CAUSE_OF_LOSS_SEPARATOR: &str = "+";

/// The flat cause-of-loss stream, names and ids position-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CauseOfLossEntries {
    pub names: Vec<String>,
    pub ids: Vec<String>,
}

impl CauseOfLossEntries {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Resolves the flat id column through the name-to-id map, keeping the
    /// order of `ids`. Ids absent from the map are dropped.
    pub fn resolve(ids: &ArrayRef, name_to_id: &KeyValueColumns) -> TableResult<Self> {
        let names = key_strings(&name_to_id.keys)?;
        let map_ids = key_strings(&name_to_id.values)?;
        let lookup: HashMap<&str, &str> = map_ids
            .iter()
            .zip(names.iter())
            .filter_map(|(id, name)| Some((id.as_deref()?, name.as_deref()?)))
            .collect();

        let mut entries = Self::default();
        let mut unknown = 0usize;
        for id in key_strings(ids)? {
            match id.as_deref().and_then(|id| lookup.get(id).map(|name| (id, *name))) {
                Some((id, name)) => {
                    entries.names.push(name.to_string());
                    entries.ids.push(id.to_string());
                }
                None => unknown += 1,
            }
        }
        if unknown > 0 {
            tracing::warn!(unknown, "cause of loss ids missing from the id map were dropped");
        }
        Ok(entries)
    }
}

/// Reads a count column as non-negative run lengths. Nulls count as zero.
pub fn run_lengths(counts: &ArrayRef) -> TableResult<Vec<usize>> {
    let counts = match counts.data_type() {
        DataType::Int64 => counts.clone(),
        _ => cast(counts, &DataType::Int64)?,
    };
    counts
        .as_primitive::<Int64Type>()
        .iter()
        .enumerate()
        .map(|(row, count)| match count {
            None => Ok(0),
            Some(value) if value < 0 => Err(TableError::InvalidRunLength { row, value }),
            Some(value) => Ok(value as usize),
        })
        .collect()
}

/// Joins consecutive slices of `items` sized by `lengths`.
///
/// The lengths must cover `items` exactly.
pub fn combine_runs(lengths: &[usize], items: &[String]) -> TableResult<Vec<String>> {
    let expected: usize = lengths.iter().sum();
    if expected != items.len() {
        return Err(TableError::RunLengthMismatch {
            expected,
            actual: items.len(),
        });
    }

    let mut start = 0;
    Ok(lengths
        .iter()
        .map(|len| {
            let end = start + len;
            let combined = items[start..end].join(CAUSE_OF_LOSS_SEPARATOR);
            start = end;
            combined
        })
        .collect())
}

/// Appends the combined names and ids to `coverage`.
///
/// `count_column` names the per-row count column. The new columns are
/// `names_column` and `ids_column`.
pub fn derive_combined_cause_of_loss(
    coverage: &RecordBatch,
    entries: &CauseOfLossEntries,
    count_column: &str,
    names_column: &str,
    ids_column: &str,
) -> TableResult<RecordBatch> {
    let lengths = run_lengths(column(coverage, count_column)?)?;
    let names = combine_runs(&lengths, &entries.names)?;
    let ids = combine_runs(&lengths, &entries.ids)?;

    let table = append_column(
        coverage,
        names_column,
        Arc::new(StringArray::from(names)) as ArrayRef,
    )?;
    append_column(&table, ids_column, Arc::new(StringArray::from(ids)) as ArrayRef)
}

#[cfg(test)]
mod tests {
    use arrow::array::{Int64Array, UInt32Array};

    use super::*;
    use crate::util::build_batch;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn combines_runs_including_empty_ones() {
        let combined = combine_runs(&[2, 0, 3], &owned(&["A", "B", "C", "D", "E"])).unwrap();
        assert_eq!(combined, vec!["A+B", "", "C+D+E"]);
    }

    #[test]
    fn mismatched_sum_is_an_error() {
        let err = combine_runs(&[2, 2], &owned(&["A", "B", "C"])).unwrap_err();
        assert!(matches!(
            err,
            TableError::RunLengthMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn negative_counts_are_rejected() {
        let counts: ArrayRef = Arc::new(Int64Array::from(vec![1, -1]));
        assert!(matches!(
            run_lengths(&counts).unwrap_err(),
            TableError::InvalidRunLength { row: 1, value: -1 }
        ));
    }

    #[test]
    fn resolves_ids_in_flat_order() {
        let ids: ArrayRef = Arc::new(UInt32Array::from(vec![3, 1, 9, 3]));
        let name_to_id = KeyValueColumns {
            keys: Arc::new(StringArray::from(vec!["WS", "EQ"])),
            values: Arc::new(Int64Array::from(vec![1, 3])),
        };
        let entries = CauseOfLossEntries::resolve(&ids, &name_to_id).unwrap();
        assert_eq!(entries.names, owned(&["EQ", "WS", "EQ"]));
        assert_eq!(entries.ids, owned(&["3", "1", "3"]));
    }

    #[test]
    fn appends_combined_columns() {
        let coverage = build_batch(vec![(
            "Cause Of Loss Count".to_string(),
            Arc::new(UInt32Array::from(vec![2, 0, 3])) as ArrayRef,
        )])
        .unwrap();
        let entries = CauseOfLossEntries {
            names: owned(&["A", "B", "C", "D", "E"]),
            ids: owned(&["1", "2", "3", "4", "5"]),
        };

        let table = derive_combined_cause_of_loss(
            &coverage,
            &entries,
            "Cause Of Loss Count",
            "Cause Of Loss",
            "Cause Of Loss Ids",
        )
        .unwrap();

        let names = table.column_by_name("Cause Of Loss").unwrap().as_string::<i32>();
        assert_eq!(names.value(0), "A+B");
        assert_eq!(names.value(1), "");
        assert_eq!(names.value(2), "C+D+E");
        let ids = table.column_by_name("Cause Of Loss Ids").unwrap().as_string::<i32>();
        assert_eq!(ids.value(2), "3+4+5");
    }
}
