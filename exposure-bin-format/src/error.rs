use std::path::PathBuf;

use arrow_schema::ArrowError;

use crate::value::ColumnType;

#[derive(Debug, thiserror::Error)]
pub enum BinFileError {
    #[error("Bin file does not exist: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read bin file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write bin file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
    #[error("Conversion error: {0}")]
    Conversion(#[from] ConversionError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode MessagePack: {0}")]
    Encode(#[from] rmp::encode::ValueWriteError),
    #[error("Failed to build arrow array: {0}")]
    Arrow(#[from] ArrowError),
    #[error("Failed to decode {path}: {inner}")]
    InFile {
        path: PathBuf,
        inner: Box<BinFileError>,
    },
}

impl BinFileError {
    /// True when the failure came from the byte layout rather than the values.
    /// Only layout failures trigger the headerless fallback.
    pub fn is_format(&self) -> bool {
        match self {
            BinFileError::Format(_) => true,
            BinFileError::InFile { inner, .. } => inner.is_format(),
            _ => false,
        }
    }

    pub(crate) fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            BinFileError::InFile { .. } | BinFileError::NotFound(_) => self,
            inner => BinFileError::InFile {
                path: path.into(),
                inner: Box::new(inner),
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("Header too short: expected {expected} bytes, found {found}")]
    HeaderTooShort { expected: usize, found: usize },
    #[error("Invalid header field {field}: {value}")]
    InvalidHeaderField { field: &'static str, value: i64 },
    #[error("Header size {header_size} exceeds the {file_len} byte file")]
    HeaderOutOfBounds { header_size: i64, file_len: usize },
    #[error("Dictionary region of {len} bytes exceeds the {available} bytes available")]
    DictionaryOutOfBounds { len: usize, available: usize },
    #[error("Dictionary region of {len} bytes is not a multiple of element size {elem_size}")]
    RaggedDictionary { len: usize, elem_size: usize },
    #[error("Dictionary entry {index} is not valid UTF-8")]
    InvalidUtf8 { index: usize },
    #[error("Dictionary entry {0:?} does not fit a block of {1} bytes")]
    DictionaryEntryTooLong(String, usize),
    #[error("Failed to read from stream: {0}")]
    Io(std::io::Error),
    #[error("Failed to decode MessagePack value: {0}")]
    MsgPack(#[from] rmpv::decode::Error),
    #[error("Unexpected trailing bytes after MessagePack value")]
    TrailingBytes,
    #[error("Expected a MessagePack {expected}, found {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },
    #[error("Unsupported element {kind} at position {index}")]
    UnsupportedElement { index: usize, kind: &'static str },
    #[error("Payload holds {found} elements but the header declares {expected}")]
    ElementCountMismatch { expected: usize, found: usize },
    #[error("Neither the headered nor the headerless layout could be decoded. headered: {headered}; headerless: {headerless}")]
    NoLayout {
        headered: Box<BinFileError>,
        headerless: Box<BinFileError>,
    },
}

#[derive(Debug, thiserror::Error)]
#[error("Cannot convert element {index} ({value}) to {target:?}: {reason}")]
pub struct ConversionError {
    pub index: usize,
    pub value: String,
    pub target: ColumnType,
    pub reason: &'static str,
}
