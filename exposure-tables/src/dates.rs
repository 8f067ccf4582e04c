//! Packed calendar dates.
//!
//! Date columns hold `year << 16 | month << 8 | day` in one unsigned integer.

use arrow::{
    array::{ArrayRef, AsArray, Date32Array},
    compute::cast,
    datatypes::Int64Type,
};
use arrow_schema::DataType;
use chrono::NaiveDate;

use crate::error::TableResult;

pub fn unpack_date(packed: u32) -> Option<NaiveDate> {
    let year = (packed >> 16) as i32;
    let month = (packed >> 8) & 0xFF;
    let day = packed & 0xFF;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn pack_date(date: NaiveDate) -> Option<u32> {
    use chrono::Datelike;

    let year = u32::try_from(date.year()).ok().filter(|y| *y <= u16::MAX as u32)?;
    Some(year << 16 | date.month() << 8 | date.day())
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    date.signed_duration_since(epoch).num_days() as i32
}

/// Converts a packed date column to `Date32`. Nulls and values that are not
/// a valid date become null.
pub fn unpack_date_column(packed: &ArrayRef) -> TableResult<Date32Array> {
    let values = cast(packed, &DataType::Int64)?;
    let mut invalid = 0usize;
    let dates: Date32Array = values
        .as_primitive::<Int64Type>()
        .iter()
        .map(|value| {
            let value = value?;
            let date = u32::try_from(value).ok().and_then(unpack_date);
            if date.is_none() {
                invalid += 1;
            }
            date.map(days_since_epoch)
        })
        .collect();

    if invalid > 0 {
        tracing::debug!(invalid, "packed dates that are not calendar dates set to null");
    }
    Ok(dates)
}
