//! The fixed 32-byte standard header.

use std::io::Read;

use crate::{
    error::FormatError,
    layout::{DICTIONARY_V2, DICTIONARY_V3, MAX_ELEM_SIZE, STANDARD_HEADER_SIZE},
    BinFileResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Dictionary size. For v2 this counts the header itself, for v3 only the dictionary bytes.
    pub header_size: i64,
    pub num_elements: i64,
    pub elem_size: i64,
    /// Kept verbatim, unknown versions are not an error.
    pub version: i64,
}

impl Header {
    pub fn new(header_size: i64, num_elements: i64, elem_size: i64, version: i64) -> Self {
        Self {
            header_size,
            num_elements,
            elem_size,
            version,
        }
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < STANDARD_HEADER_SIZE {
            return Err(FormatError::HeaderTooShort {
                expected: STANDARD_HEADER_SIZE,
                found: bytes.len(),
            });
        }

        let field = |i: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            i64::from_ne_bytes(raw)
        };

        Ok(Self {
            header_size: field(0),
            num_elements: field(1),
            elem_size: field(2),
            version: field(3),
        })
    }

    /// Reads exactly [`STANDARD_HEADER_SIZE`] bytes from `reader`.
    pub fn read_from<R: Read>(reader: &mut R) -> BinFileResult<Self> {
        let mut raw = Vec::with_capacity(STANDARD_HEADER_SIZE);
        reader
            .by_ref()
            .take(STANDARD_HEADER_SIZE as u64)
            .read_to_end(&mut raw)
            .map_err(FormatError::Io)?;
        Ok(Self::parse(&raw)?)
    }

    pub fn to_bytes(&self) -> [u8; STANDARD_HEADER_SIZE] {
        let mut out = [0u8; STANDARD_HEADER_SIZE];
        for (i, value) in [
            self.header_size,
            self.num_elements,
            self.elem_size,
            self.version,
        ]
        .into_iter()
        .enumerate()
        {
            out[i * 8..(i + 1) * 8].copy_from_slice(&value.to_ne_bytes());
        }
        out
    }

    /// Checks the fields a strict headered decode depends on.
    pub fn validate(&self) -> Result<(), FormatError> {
        for (field, value) in [
            ("header_size", self.header_size),
            ("num_elements", self.num_elements),
            ("elem_size", self.elem_size),
        ] {
            if value < 0 {
                return Err(FormatError::InvalidHeaderField { field, value });
            }
        }
        if self.version == DICTIONARY_V2 && self.dictionary_len() > 0 && self.elem_size == 0 {
            return Err(FormatError::InvalidHeaderField {
                field: "elem_size",
                value: self.elem_size,
            });
        }
        if self.version != DICTIONARY_V2 && self.elem_size > MAX_ELEM_SIZE {
            return Err(FormatError::InvalidHeaderField {
                field: "elem_size",
                value: self.elem_size,
            });
        }
        Ok(())
    }

    /// Checks the header against the length of the file it was read from.
    ///
    /// `header_size` never exceeds the file for any version, the dictionary
    /// fits behind the header, and every declared element needs at least one
    /// payload byte.
    pub fn validate_against(&self, file_len: usize) -> Result<(), FormatError> {
        self.validate()?;

        if self.header_size as u64 > file_len as u64 {
            return Err(FormatError::HeaderOutOfBounds {
                header_size: self.header_size,
                file_len,
            });
        }

        let available = file_len.saturating_sub(STANDARD_HEADER_SIZE);
        let dictionary_len = self.dictionary_len();
        if dictionary_len > available {
            return Err(FormatError::DictionaryOutOfBounds {
                len: dictionary_len,
                available,
            });
        }

        let payload_len = available - dictionary_len;
        if self.num_elements as u64 > payload_len as u64 {
            return Err(FormatError::InvalidHeaderField {
                field: "num_elements",
                value: self.num_elements,
            });
        }
        Ok(())
    }

    /// Number of dictionary bytes between the header and the payload.
    pub fn dictionary_len(&self) -> usize {
        match self.version {
            DICTIONARY_V2 => (self.header_size - STANDARD_HEADER_SIZE as i64).max(0) as usize,
            DICTIONARY_V3 => self.header_size.max(0) as usize,
            _ => 0,
        }
    }

    pub fn has_dictionary_version(&self) -> bool {
        matches!(self.version, DICTIONARY_V2 | DICTIONARY_V3)
    }
}
