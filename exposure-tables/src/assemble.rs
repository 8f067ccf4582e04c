//! Column files of one entity combined into a table.
//!
//! Snapshots are often incomplete, so a column whose file does not exist is
//! left out of the table instead of failing the whole entity. Any other
//! failure (a present file that cannot be decoded) is returned.

use std::path::{Path, PathBuf};

use arrow::{array::ArrayRef, record_batch::RecordBatch};
use exposure_bin_format::{BinFile, BinFileError, ColumnType, Layout};
use indexmap::IndexMap;

use crate::{error::TableResult, util::build_batch};

/// Column name to `(path, requested type)`, in output column order.
pub type PlainColumnFiles = IndexMap<String, (PathBuf, Option<ColumnType>)>;

/// Column name to path of an enum-coded file, in output column order.
pub type EnumColumnFiles = IndexMap<String, PathBuf>;

/// Opens `path`, returning `None` when the file is absent.
pub(crate) fn open_optional(path: &Path) -> TableResult<Option<BinFile>> {
    match BinFile::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(BinFileError::NotFound(path)) => {
            tracing::debug!(path = %path.display(), "column file absent, skipping");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Decodes every present plain column file through the two-stage reader.
///
/// `read_header` states which layout the producer is expected to have used.
/// Both layouts are accepted either way, a mismatch is only logged.
pub fn assemble(files: &PlainColumnFiles, read_header: bool) -> TableResult<RecordBatch> {
    let mut columns: Vec<(String, ArrayRef)> = Vec::with_capacity(files.len());
    for (name, (path, convert_to)) in files {
        let Some(file) = open_optional(path)? else {
            continue;
        };
        let decoded = file.read_array(*convert_to)?;
        let headered = matches!(decoded.layout, Layout::Headered(_));
        if headered != read_header {
            tracing::debug!(
                column = %name,
                path = %path.display(),
                headered,
                "column file layout differs from the entity layout"
            );
        }
        columns.push((name.clone(), decoded.value));
    }

    let batch = build_batch(columns)?;
    tracing::debug!(
        requested = files.len(),
        columns = batch.num_columns(),
        rows = batch.num_rows(),
        "assembled table"
    );
    Ok(batch)
}

/// Decodes every present enum column file, resolving indices through the
/// embedded dictionaries.
pub fn assemble_enum_table(files: &EnumColumnFiles) -> TableResult<RecordBatch> {
    let mut columns: Vec<(String, ArrayRef)> = Vec::with_capacity(files.len());
    for (name, path) in files {
        let Some(file) = open_optional(path)? else {
            continue;
        };
        let decoded = file.read_enum()?;
        if !decoded.value.is_resolved() {
            tracing::warn!(column = %name, "enum column has no dictionary, keeping raw values");
        }
        columns.push((name.clone(), decoded.value.values));
    }
    build_batch(columns)
}
