//! Coverage layer numbers derived from section names.
//!
//! Older exports only carry the coverage section name. The layer number is the
//! section name when it is a non-zero integer and missing otherwise; it is
//! written next to the other coverage columns as a headerless file.

use anyhow::Context;
use arrow::array::{Array, AsArray};
use exposure_bin_format::{writer::write_index_array, BinFile, BinFileError, ColumnType};

use crate::layout::{Snapshot, COVERAGE_LAYER_NUMBER_FILE, COVERAGE_SECTION_NAME_FILE};

/// `""`, `"0"` and anything that is not an integer map to `None`.
pub fn section_name_to_layer_number(section_name: &str) -> Option<i32> {
    match section_name {
        "" | "0" => None,
        name => name.trim().parse::<i32>().ok(),
    }
}

/// Writes the derived layer number column for `snapshot`.
///
/// Returns `Ok(false)` when the snapshot has no section name file. The
/// snapshot's done marker is removed after a rewrite so the export is
/// treated as modified.
pub fn rewrite_layer_numbers(snapshot: &Snapshot) -> anyhow::Result<bool> {
    let section_path = snapshot.path(COVERAGE_SECTION_NAME_FILE);
    let file = match BinFile::open(&section_path) {
        Ok(file) => file,
        Err(BinFileError::NotFound(_)) => {
            tracing::info!(
                snapshot = %snapshot.key(),
                "no section name file, nothing to rewrite"
            );
            return Ok(false);
        }
        Err(e) => return Err(e).context("Failed to open section name file"),
    };

    let sections = file
        .read_array(Some(ColumnType::Utf8))
        .with_context(|| format!("Failed to decode {}", section_path.display()))?
        .value;
    let layer_numbers: Vec<Option<i32>> = sections
        .as_string::<i32>()
        .iter()
        .map(|name| name.and_then(section_name_to_layer_number))
        .collect();

    let layer_path = snapshot.path(COVERAGE_LAYER_NUMBER_FILE);
    write_index_array(&layer_path, &layer_numbers)
        .with_context(|| format!("Failed to write {}", layer_path.display()))?;

    let marker = snapshot.done_marker();
    if marker.exists() {
        std::fs::remove_file(&marker)
            .with_context(|| format!("Failed to remove {}", marker.display()))?;
    }

    tracing::info!(
        snapshot = %snapshot.key(),
        rows = sections.len(),
        missing = layer_numbers.iter().filter(|v| v.is_none()).count(),
        "rewrote coverage layer numbers"
    );
    Ok(true)
}
