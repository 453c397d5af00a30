//! Voxel data types for resampled output.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// Storage type of voxel values.
///
/// Tensors always hold floats; the data type records what the values
/// represent and drives the rounding applied when resampling into an
/// integer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    #[default]
    Float32,
    Float64,
}

impl DataType {
    /// True for the integer types.
    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Float32 | Self::Float64)
    }

    /// Convert a sampled value to this type: integers are rounded half away
    /// from zero and saturated, floats pass through.
    pub fn cast(self, value: f64) -> f64 {
        let (lo, hi) = match self {
            Self::Int8 => (i8::MIN as f64, i8::MAX as f64),
            Self::Uint8 => (u8::MIN as f64, u8::MAX as f64),
            Self::Int16 => (i16::MIN as f64, i16::MAX as f64),
            Self::Uint16 => (u16::MIN as f64, u16::MAX as f64),
            Self::Int32 => (i32::MIN as f64, i32::MAX as f64),
            Self::Uint32 => (u32::MIN as f64, u32::MAX as f64),
            Self::Int64 => (i64::MIN as f64, i64::MAX as f64),
            Self::Uint64 => (u64::MIN as f64, u64::MAX as f64),
            Self::Float32 => return value as f32 as f64,
            Self::Float64 => return value,
        };
        if value.is_nan() {
            return 0.0;
        }
        value.round().clamp(lo, hi)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int8" | "i8" => Ok(Self::Int8),
            "uint8" | "u8" => Ok(Self::Uint8),
            "int16" | "i16" => Ok(Self::Int16),
            "uint16" | "u16" => Ok(Self::Uint16),
            "int32" | "i32" => Ok(Self::Int32),
            "uint32" | "u32" => Ok(Self::Uint32),
            "int64" | "i64" => Ok(Self::Int64),
            "uint64" | "u64" => Ok(Self::Uint64),
            "float32" | "f32" => Ok(Self::Float32),
            "float64" | "f64" => Ok(Self::Float64),
            other => Err(TransformError::InvalidDataType(other.to_string())),
        }
    }
}
