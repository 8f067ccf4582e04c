use std::{collections::HashSet, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, AsArray, UInt32Array},
    compute::{cast, take},
    record_batch::{RecordBatch, RecordBatchOptions},
};
use arrow_schema::{DataType, Field, Schema};

use crate::error::{TableError, TableResult};

/// Builds a table from named columns. Every field is nullable and every
/// column must share one length. A table without columns has zero rows.
pub fn build_batch(columns: Vec<(String, ArrayRef)>) -> TableResult<RecordBatch> {
    let num_rows = columns.first().map(|(_, array)| array.len()).unwrap_or(0);
    let mut seen = HashSet::new();
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());

    for (name, array) in columns {
        if !seen.insert(name.clone()) {
            return Err(TableError::DuplicateColumn(name));
        }
        if array.len() != num_rows {
            return Err(TableError::ColumnLengthMismatch {
                column: name,
                expected: num_rows,
                found: array.len(),
            });
        }
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }

    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(
        Arc::new(Schema::new(fields)),
        arrays,
        &options,
    )?)
}

/// Splits a table back into its named columns.
pub fn named_columns(batch: &RecordBatch) -> Vec<(String, ArrayRef)> {
    batch
        .schema()
        .fields()
        .iter()
        .zip(batch.columns())
        .map(|(field, array)| (field.name().clone(), array.clone()))
        .collect()
}

pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> TableResult<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| TableError::MissingColumn(name.to_string()))
}

pub fn append_column(
    batch: &RecordBatch,
    name: &str,
    array: ArrayRef,
) -> TableResult<RecordBatch> {
    let mut columns = named_columns(batch);
    if batch.num_columns() > 0 && array.len() != batch.num_rows() {
        return Err(TableError::ColumnLengthMismatch {
            column: name.to_string(),
            expected: batch.num_rows(),
            found: array.len(),
        });
    }
    columns.push((name.to_string(), array));
    build_batch(columns)
}

/// Drops `name` if present.
pub fn remove_column(batch: &RecordBatch, name: &str) -> TableResult<RecordBatch> {
    let columns = named_columns(batch)
        .into_iter()
        .filter(|(column, _)| column != name)
        .collect::<Vec<_>>();
    if columns.is_empty() {
        return Ok(RecordBatch::new_empty(Arc::new(Schema::empty())));
    }
    build_batch(columns)
}

pub fn select(batch: &RecordBatch, names: &[&str]) -> TableResult<RecordBatch> {
    let columns = names
        .iter()
        .map(|name| Ok((name.to_string(), column(batch, name)?.clone())))
        .collect::<TableResult<Vec<_>>>()?;
    build_batch(columns)
}

/// Reorders the columns alphabetically.
pub fn sort_columns(batch: &RecordBatch) -> TableResult<RecordBatch> {
    let mut columns = named_columns(batch);
    columns.sort_by(|(a, _), (b, _)| a.cmp(b));
    build_batch(columns)
}

/// Gathers the rows at `indices` from every column.
pub fn take_rows(batch: &RecordBatch, indices: &UInt32Array) -> TableResult<RecordBatch> {
    let columns = named_columns(batch)
        .into_iter()
        .map(|(name, array)| Ok((name, take(array.as_ref(), indices, None)?)))
        .collect::<TableResult<Vec<_>>>()?;
    if columns.is_empty() {
        return Ok(batch.clone());
    }
    build_batch(columns)
}

/// Renders a key column as text so keys of different widths or signedness
/// compare equal when they hold the same number.
pub fn key_strings(array: &ArrayRef) -> TableResult<Vec<Option<String>>> {
    let text = match array.data_type() {
        DataType::Utf8 => array.clone(),
        _ => cast(array, &DataType::Utf8)?,
    };
    Ok(text
        .as_string::<i32>()
        .iter()
        .map(|value| value.map(str::to_string))
        .collect())
}
