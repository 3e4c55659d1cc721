use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Element type of a tensor.
///
/// Variants correspond to values of the `TensorProto.DataType` enum in the
/// ONNX format. The `UNDEFINED` value (0) has no variant. An unknown element
/// type is represented as `Option::<DataType>::None`.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum DataType {
    Float,
    UInt8,
    Int8,
    UInt16,
    Int16,
    Int32,
    Int64,
    String,
    Bool,
    Float16,
    Double,
    UInt32,
    UInt64,
    Complex64,
    Complex128,
}

impl DataType {
    /// All element types, in order of their ONNX codes.
    pub const ALL: [DataType; 15] = [
        DataType::Float,
        DataType::UInt8,
        DataType::Int8,
        DataType::UInt16,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::String,
        DataType::Bool,
        DataType::Float16,
        DataType::Double,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Complex64,
        DataType::Complex128,
    ];

    /// Floating point types.
    pub const FLOAT_TYPES: [DataType; 3] = [DataType::Float16, DataType::Float, DataType::Double];

    /// All integer and floating point types.
    pub const ALL_NUMERIC: [DataType; 11] = [
        DataType::UInt8,
        DataType::UInt16,
        DataType::UInt32,
        DataType::UInt64,
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float16,
        DataType::Float,
        DataType::Double,
    ];

    /// Numeric types of 32 bits or wider, plus float16.
    pub const HIGH_PRECISION_NUMERIC: [DataType; 7] = [
        DataType::UInt32,
        DataType::UInt64,
        DataType::Int32,
        DataType::Int64,
        DataType::Float16,
        DataType::Float,
        DataType::Double,
    ];

    /// Return the `TensorProto.DataType` code for this type.
    pub fn code(self) -> i32 {
        match self {
            DataType::Float => 1,
            DataType::UInt8 => 2,
            DataType::Int8 => 3,
            DataType::UInt16 => 4,
            DataType::Int16 => 5,
            DataType::Int32 => 6,
            DataType::Int64 => 7,
            DataType::String => 8,
            DataType::Bool => 9,
            DataType::Float16 => 10,
            DataType::Double => 11,
            DataType::UInt32 => 12,
            DataType::UInt64 => 13,
            DataType::Complex64 => 14,
            DataType::Complex128 => 15,
        }
    }

    /// Convert a `TensorProto.DataType` code to a type.
    ///
    /// Returns `None` for `UNDEFINED` (0) and codes outside the known range.
    pub fn from_code(code: i64) -> Option<DataType> {
        DataType::ALL.into_iter().find(|dt| i64::from(dt.code()) == code)
    }

    /// Return the name used for this type in `tensor(<name>)` type strings.
    pub fn name(self) -> &'static str {
        match self {
            DataType::Float => "float",
            DataType::UInt8 => "uint8",
            DataType::Int8 => "int8",
            DataType::UInt16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Float16 => "float16",
            DataType::Double => "double",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Complex64 => "complex64",
            DataType::Complex128 => "complex128",
        }
    }

    /// Parse a type string of the form `tensor(<name>)`, eg. `tensor(int64)`.
    pub fn from_type_str(type_str: &str) -> Option<DataType> {
        let name = type_str.strip_prefix("tensor(")?.strip_suffix(')')?;
        name.parse().ok()
    }

    /// Return the `tensor(<name>)` type string for this type.
    pub fn type_str(self) -> String {
        format!("tensor({})", self.name())
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when parsing an unrecognized type name.
#[derive(Clone, Debug, PartialEq)]
pub struct UnknownDataType(pub String);

impl fmt::Display for UnknownDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown data type \"{}\"", self.0)
    }
}

impl std::error::Error for UnknownDataType {}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|dt| dt.name() == s)
            .ok_or_else(|| UnknownDataType(s.to_string()))
    }
}
