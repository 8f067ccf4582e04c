//! Mapping of decoded MessagePack elements onto typed arrow arrays.

use std::{str::FromStr, sync::Arc};

use arrow::array::{
    ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, NullArray,
    StringArray, UInt32Array, UInt64Array,
};
use arrow_schema::DataType;
use rmpv::Value;

use crate::{
    error::{ConversionError, FormatError},
    BinFileResult,
};

/// Element type a caller can request for a plain column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int32,
    Int64,
    UInt32,
    UInt64,
    #[serde(alias = "float")]
    Float32,
    #[serde(alias = "double")]
    Float64,
    #[serde(alias = "str", alias = "string")]
    Utf8,
    #[serde(alias = "bool")]
    Boolean,
}

impl ColumnType {
    pub fn data_type(&self) -> DataType {
        match self {
            ColumnType::Int32 => DataType::Int32,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::UInt32 => DataType::UInt32,
            ColumnType::UInt64 => DataType::UInt64,
            ColumnType::Float32 => DataType::Float32,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Boolean => DataType::Boolean,
        }
    }
}

impl FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int32" => Ok(ColumnType::Int32),
            "int64" => Ok(ColumnType::Int64),
            "uint32" => Ok(ColumnType::UInt32),
            "uint64" => Ok(ColumnType::UInt64),
            "float32" | "float" => Ok(ColumnType::Float32),
            "float64" | "double" => Ok(ColumnType::Float64),
            "utf8" | "str" | "string" => Ok(ColumnType::Utf8),
            "boolean" | "bool" => Ok(ColumnType::Boolean),
            other => Err(format!("Unknown column type: {}", other)),
        }
    }
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Nil => "nil",
        Value::Boolean(_) => "boolean",
        Value::Integer(_) => "integer",
        Value::F32(_) => "float32",
        Value::F64(_) => "float64",
        Value::String(_) => "string",
        Value::Binary(_) => "binary",
        Value::Array(_) => "array",
        Value::Map(_) => "map",
        Value::Ext(_, _) => "ext",
    }
}

/// Builds an arrow array from decoded elements, coercing to `convert_to` when given.
pub fn to_array(values: &[Value], convert_to: Option<ColumnType>) -> BinFileResult<ArrayRef> {
    match convert_to {
        Some(target) => Ok(convert_values(values, target)?),
        None => match infer_column_type(values)? {
            Some(target) => Ok(convert_values(values, target)?),
            None => Ok(Arc::new(NullArray::new(values.len()))),
        },
    }
}

/// Picks the narrowest common type for a column, `None` when every element is nil.
///
/// Integers become `Int64` unless one exceeds `i64::MAX` (`UInt64`); any float,
/// or a mix of such large values with negatives, promotes to `Float64`; any
/// string turns the whole column into text.
pub fn infer_column_type(values: &[Value]) -> Result<Option<ColumnType>, FormatError> {
    let mut ints = false;
    let mut floats = false;
    let mut strings = false;
    let mut bools = false;
    let mut negative = false;
    let mut beyond_i64 = false;

    for (index, value) in values.iter().enumerate() {
        match value {
            Value::Nil => {}
            Value::Boolean(_) => bools = true,
            Value::Integer(i) => {
                ints = true;
                match i.as_i64() {
                    Some(v) if v < 0 => negative = true,
                    Some(_) => {}
                    None => beyond_i64 = true,
                }
            }
            Value::F32(_) | Value::F64(_) => floats = true,
            Value::String(_) => strings = true,
            other => {
                return Err(FormatError::UnsupportedElement {
                    index,
                    kind: value_kind(other),
                })
            }
        }
    }

    let column_type = if strings {
        Some(ColumnType::Utf8)
    } else if floats || (beyond_i64 && negative) {
        Some(ColumnType::Float64)
    } else if ints && beyond_i64 {
        Some(ColumnType::UInt64)
    } else if ints {
        Some(ColumnType::Int64)
    } else if bools {
        Some(ColumnType::Boolean)
    } else {
        None
    };
    Ok(column_type)
}

fn conversion_error(
    index: usize,
    value: &Value,
    target: ColumnType,
    reason: &'static str,
) -> ConversionError {
    ConversionError {
        index,
        value: value.to_string(),
        target,
        reason,
    }
}

fn integral(
    value: &Value,
    index: usize,
    target: ColumnType,
) -> Result<Option<i128>, ConversionError> {
    let float_to_integral = |f: f64| {
        if !f.is_finite() {
            Err(conversion_error(index, value, target, "not a finite number"))
        } else if f.fract() != 0.0 {
            Err(conversion_error(index, value, target, "has a fractional part"))
        } else {
            Ok(Some(f as i128))
        }
    };

    match value {
        Value::Nil => Ok(None),
        Value::Boolean(b) => Ok(Some(*b as i128)),
        Value::Integer(i) => i
            .as_i64()
            .map(i128::from)
            .or_else(|| i.as_u64().map(i128::from))
            .map(Some)
            .ok_or_else(|| conversion_error(index, value, target, "unrepresentable integer")),
        Value::F32(f) => float_to_integral(*f as f64),
        Value::F64(f) => float_to_integral(*f),
        Value::String(s) => s
            .as_str()
            .and_then(|s| s.trim().parse::<i128>().ok())
            .map(Some)
            .ok_or_else(|| conversion_error(index, value, target, "not an integer")),
        _ => Err(conversion_error(index, value, target, "unsupported element")),
    }
}

fn floating(
    value: &Value,
    index: usize,
    target: ColumnType,
) -> Result<Option<f64>, ConversionError> {
    match value {
        Value::Nil => Ok(None),
        Value::Boolean(b) => Ok(Some(if *b { 1.0 } else { 0.0 })),
        Value::Integer(i) => i
            .as_i64()
            .map(|v| v as f64)
            .or_else(|| i.as_u64().map(|v| v as f64))
            .map(Some)
            .ok_or_else(|| conversion_error(index, value, target, "unrepresentable integer")),
        Value::F32(f) => Ok(Some(*f as f64)),
        Value::F64(f) => Ok(Some(*f)),
        Value::String(s) => s
            .as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .map(Some)
            .ok_or_else(|| conversion_error(index, value, target, "not a number")),
        _ => Err(conversion_error(index, value, target, "unsupported element")),
    }
}

fn text(value: &Value, index: usize) -> Result<Option<String>, ConversionError> {
    let target = ColumnType::Utf8;
    match value {
        Value::Nil => Ok(None),
        Value::String(s) => s
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| conversion_error(index, value, target, "invalid UTF-8")),
        Value::Binary(b) => std::str::from_utf8(b)
            .map(|s| Some(s.to_string()))
            .map_err(|_| conversion_error(index, value, target, "invalid UTF-8")),
        Value::Boolean(b) => Ok(Some(b.to_string())),
        Value::Integer(i) => Ok(i
            .as_i64()
            .map(|v| v.to_string())
            .or_else(|| i.as_u64().map(|v| v.to_string()))),
        Value::F32(f) => Ok(Some(f.to_string())),
        Value::F64(f) => Ok(Some(f.to_string())),
        _ => Err(conversion_error(index, value, target, "unsupported element")),
    }
}

fn boolean(value: &Value, index: usize) -> Result<Option<bool>, ConversionError> {
    let target = ColumnType::Boolean;
    match value {
        Value::Nil => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        Value::Integer(i) => match i.as_u64() {
            Some(0) => Ok(Some(false)),
            Some(1) => Ok(Some(true)),
            _ => Err(conversion_error(index, value, target, "not 0 or 1")),
        },
        Value::String(s) => match s.as_str().map(|s| s.trim().to_lowercase()).as_deref() {
            Some("true") => Ok(Some(true)),
            Some("false") => Ok(Some(false)),
            _ => Err(conversion_error(index, value, target, "not a boolean")),
        },
        _ => Err(conversion_error(index, value, target, "unsupported element")),
    }
}

macro_rules! integral_array {
    ($values:expr, $target:expr, $native:ty, $array:ty) => {{
        let mut out: Vec<Option<$native>> = Vec::with_capacity($values.len());
        for (index, value) in $values.iter().enumerate() {
            let item = match integral(value, index, $target)? {
                Some(v) => Some(
                    <$native>::try_from(v)
                        .map_err(|_| conversion_error(index, value, $target, "out of range"))?,
                ),
                None => None,
            };
            out.push(item);
        }
        Arc::new(<$array>::from(out)) as ArrayRef
    }};
}

/// Coerces every element to `target`. Nil elements become nulls.
pub fn convert_values(values: &[Value], target: ColumnType) -> Result<ArrayRef, ConversionError> {
    let array = match target {
        ColumnType::Int32 => integral_array!(values, target, i32, Int32Array),
        ColumnType::Int64 => integral_array!(values, target, i64, Int64Array),
        ColumnType::UInt32 => integral_array!(values, target, u32, UInt32Array),
        ColumnType::UInt64 => integral_array!(values, target, u64, UInt64Array),
        ColumnType::Float32 => {
            let mut out = Vec::with_capacity(values.len());
            for (index, value) in values.iter().enumerate() {
                let item = match floating(value, index, target)? {
                    Some(v) if v.is_finite() && v.abs() > f32::MAX as f64 => {
                        return Err(conversion_error(index, value, target, "out of range"))
                    }
                    Some(v) => Some(v as f32),
                    None => None,
                };
                out.push(item);
            }
            Arc::new(Float32Array::from(out)) as ArrayRef
        }
        ColumnType::Float64 => {
            let out = values
                .iter()
                .enumerate()
                .map(|(index, value)| floating(value, index, target))
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(Float64Array::from(out)) as ArrayRef
        }
        ColumnType::Utf8 => {
            let out = values
                .iter()
                .enumerate()
                .map(|(index, value)| text(value, index))
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(StringArray::from(out)) as ArrayRef
        }
        ColumnType::Boolean => {
            let out = values
                .iter()
                .enumerate()
                .map(|(index, value)| boolean(value, index))
                .collect::<Result<Vec<_>, _>>()?;
            Arc::new(BooleanArray::from(out)) as ArrayRef
        }
    };
    Ok(array)
}
