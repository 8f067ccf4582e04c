//! Payload decoding. A payload is exactly one MessagePack value occupying the
//! rest of the stream: a plain array, an array of dictionary indices, or a
//! key/value map.

use std::{io::Read, sync::Arc};

use arrow::array::{ArrayRef, StringArray};
use rmpv::Value;

use crate::{
    dictionary::{decode_v2, decode_v3, is_sentinel, resolve},
    error::FormatError,
    header::Header,
    layout::{DICTIONARY_V2, DICTIONARY_V3},
    value::{to_array, value_kind, ColumnType},
    BinFileResult,
};

/// Reads one MessagePack value and requires the stream to end right after it.
pub fn read_value_exact<R: Read>(reader: &mut R) -> Result<Value, FormatError> {
    let value = rmpv::decode::read_value(reader)?;
    let mut next = [0u8; 1];
    loop {
        match reader.read(&mut next) {
            Ok(0) => return Ok(value),
            Ok(_) => return Err(FormatError::TrailingBytes),
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(FormatError::Io(e)),
        }
    }
}

pub(crate) fn expect_array(value: Value) -> Result<Vec<Value>, FormatError> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(FormatError::UnexpectedValue {
            expected: "array",
            found: value_kind(&other),
        }),
    }
}

pub(crate) fn expect_map(value: Value) -> Result<Vec<(Value, Value)>, FormatError> {
    match value {
        Value::Map(entries) => Ok(entries),
        other => Err(FormatError::UnexpectedValue {
            expected: "map",
            found: value_kind(&other),
        }),
    }
}

/// Decodes the rest of `reader` as a plain column.
pub fn read_plain_array<R: Read>(
    reader: &mut R,
    convert_to: Option<ColumnType>,
) -> BinFileResult<ArrayRef> {
    let items = expect_array(read_value_exact(reader)?)?;
    to_array(&items, convert_to)
}

/// A decoded enum column plus counts of the lenient fallbacks applied to it.
#[derive(Debug, Clone)]
pub struct EnumColumn {
    /// Resolved strings, or the raw payload when no dictionary applied.
    pub values: ArrayRef,
    /// Dictionary length, `None` when indices were returned unresolved.
    pub dictionary_len: Option<usize>,
    /// Sentinel or nil indices mapped to `""`.
    pub sentinels: usize,
    /// Indices past the end of the dictionary mapped to `""`.
    pub out_of_range: usize,
}

impl EnumColumn {
    pub fn is_resolved(&self) -> bool {
        self.dictionary_len.is_some()
    }

    pub fn unresolved(&self) -> usize {
        self.sentinels + self.out_of_range
    }

    fn raw(items: &[Value]) -> BinFileResult<Self> {
        Ok(Self {
            values: to_array(items, None)?,
            dictionary_len: None,
            sentinels: 0,
            out_of_range: 0,
        })
    }
}

fn resolve_indices(items: &[Value], dictionary: &[String]) -> Result<EnumColumn, FormatError> {
    let mut sentinels = 0;
    let mut out_of_range = 0;
    let mut resolved = Vec::with_capacity(items.len());

    for item in items {
        let text = match item {
            Value::Nil => {
                sentinels += 1;
                ""
            }
            Value::Integer(i) => match i.as_u64() {
                Some(index) if is_sentinel(index) => {
                    sentinels += 1;
                    ""
                }
                Some(index) if (index as usize) < dictionary.len() => resolve(index, dictionary),
                _ => {
                    out_of_range += 1;
                    ""
                }
            },
            other => {
                return Err(FormatError::UnexpectedValue {
                    expected: "integer index",
                    found: value_kind(other),
                })
            }
        };
        resolved.push(text);
    }

    if out_of_range > 0 {
        tracing::warn!(
            out_of_range,
            dictionary_len = dictionary.len(),
            "enum indices past the dictionary resolved to empty strings"
        );
    }

    Ok(EnumColumn {
        values: Arc::new(StringArray::from_iter_values(resolved)),
        dictionary_len: Some(dictionary.len()),
        sentinels,
        out_of_range,
    })
}

/// Decodes an enum column whose header has already been consumed from `reader`.
///
/// Unrecognized versions skip resolution and hand back the raw payload.
pub fn read_enum_array<R: Read>(reader: &mut R, header: &Header) -> BinFileResult<EnumColumn> {
    let dictionary = match header.version {
        DICTIONARY_V2 => Some(decode_v2(reader, header.header_size, header.elem_size)?),
        DICTIONARY_V3 => decode_v3(reader, header.header_size)?,
        version => {
            tracing::debug!(version, "no dictionary for header version, keeping raw indices");
            None
        }
    };

    let items = expect_array(read_value_exact(reader)?)?;
    match dictionary {
        Some(dictionary) => Ok(resolve_indices(&items, &dictionary)?),
        None => EnumColumn::raw(&items),
    }
}

/// Decodes the rest of `reader` as an enum column that carries no header.
pub fn read_headerless_enum_array<R: Read>(reader: &mut R) -> BinFileResult<EnumColumn> {
    let items = expect_array(read_value_exact(reader)?)?;
    EnumColumn::raw(&items)
}

/// The two parallel columns of a dictionary file.
#[derive(Debug, Clone)]
pub struct KeyValueColumns {
    pub keys: ArrayRef,
    pub values: ArrayRef,
}

impl KeyValueColumns {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Splits one MessagePack map into keys and values, in encountered order.
pub fn read_key_value_map<R: Read>(
    reader: &mut R,
    key_type: Option<ColumnType>,
    value_type: Option<ColumnType>,
) -> BinFileResult<KeyValueColumns> {
    let entries = expect_map(read_value_exact(reader)?)?;
    let (keys, values): (Vec<Value>, Vec<Value>) = entries.into_iter().unzip();
    Ok(KeyValueColumns {
        keys: to_array(&keys, key_type)?,
        values: to_array(&values, value_type)?,
    })
}
