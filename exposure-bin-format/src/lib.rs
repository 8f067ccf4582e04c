//! Reader for exposure bin files.
//!
//! An exposure snapshot is a directory of `.bin` files, one per column. Each
//! file is either headered or headerless:
//!
//! ```text
//! headered:   [header: 4 x i64 native order][dictionary region][MessagePack payload]
//!              header_size num_elements elem_size version
//! headerless: [MessagePack value]
//! ```
//!
//! The dictionary region is present for enum-coded columns. Version 2 packs
//! it as fixed-width blocks, version 3 as a MessagePack array of strings.
//! Payloads are a single MessagePack array (plain or index column) or map
//! (dictionary files associating ids with row numbers).
//!
//! [`file::BinFile`] implements the read contract shared by every column:
//! try the headered layout, fall back to decoding the whole file as one
//! MessagePack value. [`writer`] produces the headerless files consumed by
//! that fallback.

pub mod column;
pub mod dictionary;
pub mod error;
pub mod file;
pub mod header;
pub mod layout;
pub mod value;
pub mod writer;

pub use column::{EnumColumn, KeyValueColumns};
pub use error::{BinFileError, ConversionError, FormatError};
pub use file::{BinFile, Decoded, Layout};
pub use header::Header;
pub use value::ColumnType;

pub type BinFileResult<T> = std::result::Result<T, error::BinFileError>;
