//! Write-back of derived columns.
//!
//! Derived columns are written as a bare MessagePack array with no header, so
//! readers pick them up through the headerless fallback of [`crate::file::BinFile`].

use std::path::Path;

use crate::{error::BinFileError, BinFileResult};

/// Encodes `values` as one MessagePack array, `None` as nil.
pub fn encode_index_array(values: &[Option<i32>]) -> BinFileResult<Vec<u8>> {
    let mut out = Vec::with_capacity(values.len() * 5 + 5);
    rmp::encode::write_array_len(&mut out, values.len() as u32)?;
    for value in values {
        match value {
            Some(v) => {
                rmp::encode::write_sint(&mut out, *v as i64)?;
            }
            None => rmp::encode::write_nil(&mut out)?,
        }
    }
    Ok(out)
}

/// Replaces the file at `path` with the headerless encoding of `values`.
pub fn write_index_array<P: AsRef<Path>>(path: P, values: &[Option<i32>]) -> BinFileResult<()> {
    let path = path.as_ref();
    let bytes = encode_index_array(values)?;
    std::fs::write(path, &bytes).map_err(|source| BinFileError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        elements = values.len(),
        "wrote derived index column"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use arrow::array::{Array, AsArray};
    use arrow::datatypes::Int64Type;

    use super::*;
    use crate::file::{BinFile, Layout};

    #[test]
    fn encodes_nil_for_missing_values() {
        let bytes = encode_index_array(&[Some(5), None, Some(7)]).unwrap();
        assert_eq!(bytes, vec![0x93, 0x05, 0xc0, 0x07]);
    }

    #[test]
    fn written_file_reads_back_through_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_f_coverage_layer_number.bin");
        write_index_array(&path, &[Some(5), None, Some(7)]).unwrap();

        let decoded = BinFile::open(&path).unwrap().read_array(None).unwrap();
        assert_eq!(decoded.layout, Layout::Headerless);
        let ints = decoded.value.as_primitive::<Int64Type>();
        assert_eq!(ints.len(), 3);
        assert_eq!(ints.value(0), 5);
        assert!(ints.is_null(1));
        assert_eq!(ints.value(2), 7);
    }

    #[test]
    fn header_shaped_prefix_still_reads_headerless() {
        // Leading bytes parse as an unknown-version header with zero elements
        // followed by an empty array.
        let mut values = vec![Some(1); 5];
        values.extend([Some(0); 8]);
        values.extend([Some(1); 14]);
        values.push(Some(-28528));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data_f_coverage_layer_number.bin");
        write_index_array(&path, &values).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 33);
        assert_eq!(&bytes[30..], &[0xd1, 0x90, 0x90]);

        let decoded = BinFile::open(&path).unwrap().read_array(None).unwrap();
        assert_eq!(decoded.layout, Layout::Headerless);
        let ints = decoded.value.as_primitive::<Int64Type>();
        assert_eq!(ints.len(), 28);
        assert_eq!(ints.value(0), 1);
        assert_eq!(ints.value(5), 0);
        assert_eq!(ints.value(27), -28528);
    }

    #[test]
    fn large_negative_values_survive() {
        let values: Vec<Option<i32>> = (0..64).map(|i| Some(i32::MIN + i)).collect();
        let bytes = encode_index_array(&values).unwrap();
        let decoded = BinFile::from_bytes("neg.bin", bytes).read_array(None).unwrap();
        assert_eq!(decoded.value.as_primitive::<Int64Type>().value(3), (i32::MIN + 3) as i64);
    }
}
