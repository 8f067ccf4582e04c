use std::path::PathBuf;

use arrow_schema::{ArrowError, DataType};
use exposure_bin_format::BinFileError;

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Bin file error: {0}")]
    BinFile(#[from] BinFileError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Run lengths sum to {expected} but {actual} flat entries are available")]
    RunLengthMismatch { expected: usize, actual: usize },
    #[error("Invalid run length {value} at row {row}")]
    InvalidRunLength { row: usize, value: i64 },
    #[error("Column {0} does not exist in the table")]
    MissingColumn(String),
    #[error("Column {0} appears more than once")]
    DuplicateColumn(String),
    #[error("Column {column} has {found} rows but the table has {expected}")]
    ColumnLengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("Column {column} has unsupported type {data_type}")]
    UnsupportedColumnType { column: String, data_type: DataType },
    #[error("Failed to read entity layout {0}: {1}")]
    LayoutReadError(PathBuf, std::io::Error),
    #[error("Failed to parse entity layout: {0}")]
    LayoutParseError(#[from] serde_json::Error),
    #[error("Invalid file pattern: {0}")]
    PatternError(#[from] glob::PatternError),
}

pub type TableResult<T> = std::result::Result<T, TableError>;
