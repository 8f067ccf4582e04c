use std::{
    io::Cursor,
    path::{Path, PathBuf},
};

use arrow::array::ArrayRef;

use crate::{
    column::{
        read_enum_array, read_headerless_enum_array, read_key_value_map, read_plain_array,
        EnumColumn, KeyValueColumns,
    },
    error::{BinFileError, FormatError},
    header::Header,
    layout::STANDARD_HEADER_SIZE,
    value::ColumnType,
    BinFileResult,
};

/// Which of the two layouts a file was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Headered(Header),
    Headerless,
}

#[derive(Debug, Clone)]
pub struct Decoded<T> {
    pub layout: Layout,
    pub value: T,
}

impl<T> Decoded<T> {
    pub fn header(&self) -> Option<&Header> {
        match &self.layout {
            Layout::Headered(header) => Some(header),
            Layout::Headerless => None,
        }
    }
}

fn check_count(header: &Header, found: usize) -> Result<(), FormatError> {
    let expected = header.num_elements as usize;
    if expected != found {
        return Err(FormatError::ElementCountMismatch { expected, found });
    }
    Ok(())
}

/// A bin file loaded into memory.
///
/// Every read first tries the headered layout (32-byte header, optional
/// dictionary, payload) and, if that fails on layout grounds, decodes the
/// whole file again from offset 0 as a single MessagePack value. Value
/// conversion failures are not layout failures and are returned directly.
#[derive(Debug, Clone)]
pub struct BinFile {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl BinFile {
    pub fn open<P: AsRef<Path>>(path: P) -> BinFileResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                BinFileError::NotFound(path.clone())
            } else {
                BinFileError::Read {
                    path: path.clone(),
                    source,
                }
            }
        })?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "opened bin file");
        Ok(Self { path, bytes })
    }

    pub fn from_bytes<P: Into<PathBuf>>(path: P, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn headered<T>(
        &self,
        decode: impl FnOnce(&Header, &mut Cursor<&[u8]>) -> BinFileResult<T>,
    ) -> BinFileResult<Decoded<T>> {
        let header = Header::parse(&self.bytes)?;
        header.validate_against(self.bytes.len())?;

        let mut cursor = Cursor::new(&self.bytes[STANDARD_HEADER_SIZE..]);
        let value = decode(&header, &mut cursor)?;
        Ok(Decoded {
            layout: Layout::Headered(header),
            value,
        })
    }

    fn headerless<T>(
        &self,
        decode: impl FnOnce(&mut Cursor<&[u8]>) -> BinFileResult<T>,
    ) -> BinFileResult<Decoded<T>> {
        let mut cursor = Cursor::new(self.bytes.as_slice());
        let value = decode(&mut cursor)?;
        Ok(Decoded {
            layout: Layout::Headerless,
            value,
        })
    }

    fn two_stage<T>(
        &self,
        headered: impl FnOnce(&Header, &mut Cursor<&[u8]>) -> BinFileResult<T>,
        headerless: impl FnOnce(&mut Cursor<&[u8]>) -> BinFileResult<T>,
    ) -> BinFileResult<Decoded<T>> {
        let result = match self.headered(headered) {
            Ok(decoded) => Ok(decoded),
            Err(headered_err) if headered_err.is_format() => {
                tracing::debug!(
                    path = %self.path.display(),
                    error = %headered_err,
                    "headered layout rejected, decoding from offset 0"
                );
                match self.headerless(headerless) {
                    Ok(decoded) => Ok(decoded),
                    Err(headerless_err) if headerless_err.is_format() => {
                        Err(BinFileError::from(FormatError::NoLayout {
                            headered: Box::new(headered_err),
                            headerless: Box::new(headerless_err),
                        }))
                    }
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        result.map_err(|e| e.in_file(&self.path))
    }

    /// Reads a plain column through the header-first, headerless-fallback contract.
    pub fn read_array(&self, convert_to: Option<ColumnType>) -> BinFileResult<Decoded<ArrayRef>> {
        self.two_stage(
            |header, cursor| {
                cursor.set_position(header.dictionary_len() as u64);
                let array = read_plain_array(cursor, convert_to)?;
                check_count(header, array.len())?;
                Ok(array)
            },
            |cursor| read_plain_array(cursor, convert_to),
        )
    }

    /// Reads an enum column. Headerless files carry no dictionary and come back unresolved.
    pub fn read_enum(&self) -> BinFileResult<Decoded<EnumColumn>> {
        let decoded = self.two_stage(
            |header, cursor| {
                let column = read_enum_array(cursor, header)?;
                check_count(header, column.values.len())?;
                Ok(column)
            },
            |cursor| read_headerless_enum_array(cursor),
        )?;

        if decoded.value.unresolved() > 0 {
            tracing::debug!(
                path = %self.path.display(),
                sentinels = decoded.value.sentinels,
                out_of_range = decoded.value.out_of_range,
                "enum column has unresolved indices"
            );
        }
        Ok(decoded)
    }

    /// Reads a whole-file key/value map (a dictionary file).
    pub fn read_key_value_map(
        &self,
        key_type: Option<ColumnType>,
        value_type: Option<ColumnType>,
    ) -> BinFileResult<Decoded<KeyValueColumns>> {
        self.two_stage(
            |header, cursor| {
                cursor.set_position(header.dictionary_len() as u64);
                let columns = read_key_value_map(cursor, key_type, value_type)?;
                check_count(header, columns.len())?;
                Ok(columns)
            },
            |cursor| read_key_value_map(cursor, key_type, value_type),
        )
    }
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::{Float32Type, Int64Type};
    use rmpv::Value;

    use super::*;
    use crate::dictionary::encode_v3;

    fn pack(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        rmpv::encode::write_value(&mut out, value).unwrap();
        out
    }

    fn headered(header: Header, dictionary: &[u8], payload: &Value) -> Vec<u8> {
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(dictionary);
        bytes.extend(pack(payload));
        bytes
    }

    #[test]
    fn headered_plain_array() {
        let payload = Value::Array(vec![Value::F64(1.5), Value::F64(2.5)]);
        let file = BinFile::from_bytes("m_latitude.bin", headered(Header::new(0, 2, 4, 3), &[], &payload));

        let decoded = file.read_array(Some(ColumnType::Float32)).unwrap();
        assert_eq!(decoded.header().map(|h| h.num_elements), Some(2));
        let floats = decoded.value.as_primitive::<Float32Type>();
        assert_eq!(floats.values().to_vec(), vec![1.5f32, 2.5]);
    }

    #[test]
    fn headerless_small_file_falls_back() {
        let payload = Value::Array(vec![Value::from(5), Value::Nil, Value::from(7)]);
        let file = BinFile::from_bytes("derived.bin", pack(&payload));

        let decoded = file.read_array(None).unwrap();
        assert_eq!(decoded.layout, Layout::Headerless);
        let ints = decoded.value.as_primitive::<Int64Type>();
        assert_eq!(ints.value(0), 5);
        assert!(ints.is_null(1));
        assert_eq!(ints.value(2), 7);
    }

    #[test]
    fn headerless_large_file_falls_back() {
        let payload = Value::Array((0..100).map(Value::from).collect());
        let file = BinFile::from_bytes("big.bin", pack(&payload));

        let decoded = file.read_array(None).unwrap();
        assert_eq!(decoded.layout, Layout::Headerless);
        assert_eq!(decoded.value.len(), 100);
    }

    #[test]
    fn element_count_mismatch_triggers_fallback_and_fails() {
        let payload = Value::Array(vec![Value::from(1)]);
        let file = BinFile::from_bytes("bad.bin", headered(Header::new(0, 5, 4, 3), &[], &payload));

        let err = file.read_array(None).unwrap_err();
        assert!(err.is_format());
        assert!(err.to_string().contains("bad.bin"));
    }

    #[test]
    fn conversion_failure_does_not_fall_back() {
        let payload = Value::Array(vec![Value::from(-1)]);
        let file = BinFile::from_bytes("neg.bin", headered(Header::new(0, 1, 4, 3), &[], &payload));

        let err = file.read_array(Some(ColumnType::UInt32)).unwrap_err();
        assert!(!err.is_format());
        assert!(matches!(
            err,
            BinFileError::InFile { ref inner, .. } if matches!(**inner, BinFileError::Conversion(_))
        ));
    }

    #[test]
    fn enum_file_resolves_v3_dictionary() {
        let dictionary = encode_v3(&["USD", "EUR"], '#').unwrap();
        let payload = Value::Array(vec![Value::from(1), Value::from(0)]);
        let bytes = headered(
            Header::new(dictionary.len() as i64, 2, 4, 3),
            &dictionary,
            &payload,
        );

        let decoded = BinFile::from_bytes("f_valuation_currency_code.bin", bytes)
            .read_enum()
            .unwrap();
        let strings = decoded.value.values.as_string::<i32>();
        assert_eq!(strings.value(0), "EUR");
        assert_eq!(strings.value(1), "USD");
    }

    #[test]
    fn plain_reader_skips_dictionary_region() {
        let dictionary = encode_v3(&["A"], '_').unwrap();
        let payload = Value::Array(vec![Value::from(3)]);
        let bytes = headered(
            Header::new(dictionary.len() as i64, 1, 4, 3),
            &dictionary,
            &payload,
        );
        let decoded = BinFile::from_bytes("x.bin", bytes).read_array(None).unwrap();
        assert_eq!(decoded.value.as_primitive::<Int64Type>().value(0), 3);
    }

    #[test]
    fn dictionary_file_is_headerless_map() {
        let map = Value::Map(vec![
            (Value::from(11), Value::from(0)),
            (Value::from(12), Value::from(1)),
        ]);
        let decoded = BinFile::from_bytes("map.bin", pack(&map))
            .read_key_value_map(None, None)
            .unwrap();
        assert_eq!(decoded.layout, Layout::Headerless);
        assert_eq!(decoded.value.len(), 2);
    }

    #[test]
    fn header_size_past_end_of_file_is_not_headered() {
        let mut bytes = Header::new(40, 0, 4, 7).to_bytes().to_vec();
        bytes.push(0x90);

        let err = BinFile::from_bytes("short.bin", bytes).read_array(None).unwrap_err();
        assert!(err.is_format());
        assert!(err.to_string().contains("Header size 40 exceeds the 33 byte file"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = BinFile::open(dir.path().join("absent.bin")).unwrap_err();
        assert!(matches!(err, BinFileError::NotFound(_)));
    }
}
