//! Shared on-disk layout constants.
//!
//! Every headered bin file starts with [`STANDARD_HEADER_SIZE`] bytes holding
//! four native-order `i64` values, optionally followed by an enum dictionary
//! region and always followed by a single MessagePack payload value.

/// Size in bytes of the fixed header.
pub const STANDARD_HEADER_SIZE: usize = 32;

/// Enum index meaning "no value". Always resolves to an empty string.
pub const SENTINEL_INDEX: u64 = u32::MAX as u64;

/// Header version whose dictionary is a run of fixed-width, length-prefixed blocks.
pub const DICTIONARY_V2: i64 = 2;

/// Header version whose dictionary is a MessagePack array of prefixed strings.
pub const DICTIONARY_V3: i64 = 3;

/// Widest scalar a payload element can have. Only v2 reuses `elem_size` for
/// its dictionary block width, so only v2 may exceed it.
pub const MAX_ELEM_SIZE: i64 = 8;
