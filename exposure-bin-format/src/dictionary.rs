//! Enum dictionaries embedded between the header and the payload.
//!
//! Version 2 stores `(header_size - 32) / elem_size` blocks of `elem_size`
//! bytes. The producer writes each block as a length byte followed by the
//! string and padding, which is ignored. Blocks whose first byte cannot be a
//! length (too large, or the claimed span holds a NUL) are read as plain
//! NUL-padded strings.
//!
//! Version 3 stores one MessagePack array of strings. Every entry carries a
//! single leading character that is discarded on decode.

use std::io::{Cursor, Read};

use rmpv::Value;

use crate::{
    column::read_value_exact,
    error::FormatError,
    layout::{SENTINEL_INDEX, STANDARD_HEADER_SIZE},
    value::value_kind,
    BinFileResult,
};

fn read_region<R: Read>(reader: &mut R, len: usize) -> Result<Vec<u8>, FormatError> {
    let mut region = Vec::with_capacity(len);
    reader
        .by_ref()
        .take(len as u64)
        .read_to_end(&mut region)
        .map_err(FormatError::Io)?;
    if region.len() < len {
        return Err(FormatError::DictionaryOutOfBounds {
            len,
            available: region.len(),
        });
    }
    Ok(region)
}

fn decode_block(block: &[u8], index: usize) -> Result<String, FormatError> {
    let claimed = block.first().copied().unwrap_or(0) as usize;
    let is_length_prefixed = claimed < block.len() && !block[1..1 + claimed].contains(&0);

    let bytes = if is_length_prefixed {
        &block[1..1 + claimed]
    } else {
        block
    };

    let text = std::str::from_utf8(bytes).map_err(|_| FormatError::InvalidUtf8 { index })?;
    Ok(text.trim_end_matches('\0').to_string())
}

/// Decodes a version 2 dictionary. Reads exactly `header_size - 32` bytes.
pub fn decode_v2<R: Read>(
    reader: &mut R,
    header_size: i64,
    elem_size: i64,
) -> BinFileResult<Vec<String>> {
    let remaining = (header_size - STANDARD_HEADER_SIZE as i64).max(0) as usize;
    if remaining == 0 {
        return Ok(Vec::new());
    }
    if elem_size <= 0 {
        return Err(FormatError::InvalidHeaderField {
            field: "elem_size",
            value: elem_size,
        }
        .into());
    }
    let elem_size = elem_size as usize;
    if remaining % elem_size != 0 {
        return Err(FormatError::RaggedDictionary {
            len: remaining,
            elem_size,
        }
        .into());
    }

    let region = read_region(reader, remaining)?;
    let entries = region
        .chunks_exact(elem_size)
        .enumerate()
        .map(|(index, block)| decode_block(block, index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

/// Decodes a version 3 dictionary, `None` when `header_size <= 0`.
pub fn decode_v3<R: Read>(reader: &mut R, header_size: i64) -> BinFileResult<Option<Vec<String>>> {
    if header_size <= 0 {
        return Ok(None);
    }

    let region = read_region(reader, header_size as usize)?;
    let value = read_value_exact(&mut Cursor::new(region.as_slice()))?;
    let Value::Array(items) = value else {
        return Err(FormatError::UnexpectedValue {
            expected: "array",
            found: value_kind(&value),
        }
        .into());
    };

    let entries = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let text = match item {
                Value::String(s) => s.as_str().ok_or(FormatError::InvalidUtf8 { index })?,
                Value::Binary(b) => {
                    std::str::from_utf8(b).map_err(|_| FormatError::InvalidUtf8 { index })?
                }
                other => {
                    return Err(FormatError::UnexpectedValue {
                        expected: "string",
                        found: value_kind(other),
                    })
                }
            };
            Ok(strip_prefix_char(text).to_string())
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(entries))
}

fn strip_prefix_char(text: &str) -> &str {
    let mut chars = text.chars();
    chars.next();
    chars.as_str()
}

/// Index `i` maps to `dictionary[i]`, anything out of range (the sentinel
/// included) maps to `""`.
pub fn resolve(index: u64, dictionary: &[String]) -> &str {
    usize::try_from(index)
        .ok()
        .and_then(|i| dictionary.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

pub fn is_sentinel(index: u64) -> bool {
    index == SENTINEL_INDEX
}

/// Encodes `entries` as version 2 blocks of `elem_size` bytes.
pub fn encode_v2(entries: &[&str], elem_size: usize) -> Result<Vec<u8>, FormatError> {
    let max_len = elem_size.saturating_sub(1).min(u8::MAX as usize);
    let mut out = Vec::with_capacity(entries.len() * elem_size);
    for entry in entries {
        let bytes = entry.as_bytes();
        if bytes.len() > max_len || bytes.contains(&0) {
            return Err(FormatError::DictionaryEntryTooLong(
                entry.to_string(),
                elem_size,
            ));
        }
        out.push(bytes.len() as u8);
        out.extend_from_slice(bytes);
        out.resize(out.len() + elem_size - 1 - bytes.len(), 0);
    }
    Ok(out)
}

/// Encodes `entries` as a version 3 dictionary, each entry prefixed with `prefix`.
pub fn encode_v3(entries: &[&str], prefix: char) -> crate::BinFileResult<Vec<u8>> {
    let mut out = Vec::new();
    rmp::encode::write_array_len(&mut out, entries.len() as u32)?;
    for entry in entries {
        rmp::encode::write_str(&mut out, &format!("{}{}", prefix, entry))?;
    }
    Ok(out)
}
