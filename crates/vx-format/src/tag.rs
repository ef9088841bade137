//! Value types and the tag byte layout.
//!
//! A tag byte packs three fields:
//! - bits 0-2: value type (`INT8` .. `CONTAINER`, or the `END` sentinel)
//! - bit 3 / bit 4: `INDEXED` / `NAMED` flags
//! - bits 5-7: array size class (0 = scalar, 1..=4 = 1/2/4/8-byte length)

use std::fmt;

use crate::container::Container;
use crate::error::FormatError;

pub const TYPE_INT8: u8 = 0;
pub const TYPE_INT16: u8 = 1;
pub const TYPE_INT32: u8 = 2;
pub const TYPE_INT64: u8 = 3;
pub const TYPE_FLOAT: u8 = 4;
pub const TYPE_DOUBLE: u8 = 5;
pub const TYPE_CONTAINER: u8 = 6;
/// Longest item name the one-byte length prefix can describe.
pub const MAX_NAME_LEN: usize = u8::MAX as usize;
/// Terminates a container. Always written as a bare byte with no flags.
pub const TAG_END: u8 = 7;
pub const TYPE_MASK: u8 = 0x07;

pub const FLAG_INDEXED: u8 = 1 << 3;
pub const FLAG_NAMED: u8 = 1 << 4;

pub const SIZE_SHIFT: u8 = 5;
pub const SIZE_MASK: u8 = 0x07 << SIZE_SHIFT;
pub const SIZE_NONE: u8 = 0;
pub const SIZE_U8: u8 = 1;
pub const SIZE_U16: u8 = 2;
pub const SIZE_U32: u8 = 3;
pub const SIZE_U64: u8 = 4;

/// Smallest size class able to hold an array of `len` elements.
///
/// Empty arrays still get a 1-byte length so they decode as arrays.
pub fn size_class_for(len: u64) -> u8 {
    if len <= u8::MAX as u64 {
        SIZE_U8
    } else if len <= u16::MAX as u64 {
        SIZE_U16
    } else if len <= u32::MAX as u64 {
        SIZE_U32
    } else {
        SIZE_U64
    }
}

/// Number of length bytes for a size class. `None` for an invalid class.
pub fn size_class_bytes(class: u8) -> Option<usize> {
    match class {
        SIZE_NONE => Some(0),
        SIZE_U8 => Some(1),
        SIZE_U16 => Some(2),
        SIZE_U32 => Some(4),
        SIZE_U64 => Some(8),
        _ => None,
    }
}

/// Width in bytes of one element of a scalar type.
pub fn element_width(type_id: u8) -> usize {
    match type_id {
        TYPE_INT8 => 1,
        TYPE_INT16 => 2,
        TYPE_INT32 | TYPE_FLOAT => 4,
        TYPE_INT64 | TYPE_DOUBLE => 8,
        _ => 0,
    }
}

/// Payload of a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Int8Array(Vec<i8>),
    Int16Array(Vec<i16>),
    Int32Array(Vec<i32>),
    Int64Array(Vec<i64>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    Container(Container),
}

impl Value {
    /// Strings are stored as `INT8` arrays of their UTF-8 bytes.
    pub fn string(s: &str) -> Self {
        Value::Int8Array(s.bytes().map(|b| b as i8).collect())
    }

    /// The 3-bit type id written into the tag byte.
    pub fn type_id(&self) -> u8 {
        match self {
            Value::Int8(_) | Value::Int8Array(_) => TYPE_INT8,
            Value::Int16(_) | Value::Int16Array(_) => TYPE_INT16,
            Value::Int32(_) | Value::Int32Array(_) => TYPE_INT32,
            Value::Int64(_) | Value::Int64Array(_) => TYPE_INT64,
            Value::Float(_) | Value::FloatArray(_) => TYPE_FLOAT,
            Value::Double(_) | Value::DoubleArray(_) => TYPE_DOUBLE,
            Value::Container(_) => TYPE_CONTAINER,
        }
    }

    /// Element count for array values, `None` for scalars and containers.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Value::Int8Array(v) => Some(v.len()),
            Value::Int16Array(v) => Some(v.len()),
            Value::Int32Array(v) => Some(v.len()),
            Value::Int64Array(v) => Some(v.len()),
            Value::FloatArray(v) => Some(v.len()),
            Value::DoubleArray(v) => Some(v.len()),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Value::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            Value::Int16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i8_array(&self) -> Option<&[i8]> {
        match self {
            Value::Int8Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i16_array(&self) -> Option<&[i16]> {
        match self {
            Value::Int16Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i32_array(&self) -> Option<&[i32]> {
        match self {
            Value::Int32Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64_array(&self) -> Option<&[i64]> {
        match self {
            Value::Int64Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_array(&self) -> Option<&[f32]> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32_array_mut(&mut self) -> Option<&mut Vec<f32>> {
        match self {
            Value::FloatArray(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64_array(&self) -> Option<&[f64]> {
        match self {
            Value::DoubleArray(v) => Some(v),
            _ => None,
        }
    }

    /// Decode an `INT8` array as a UTF-8 string.
    pub fn as_string(&self) -> Option<String> {
        let bytes: Vec<u8> = self.as_i8_array()?.iter().map(|&b| b as u8).collect();
        String::from_utf8(bytes).ok()
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Value::Container(c) => Some(c),
            _ => None,
        }
    }
}

impl From<Container> for Value {
    fn from(c: Container) -> Self {
        Value::Container(c)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int8(v) => write!(f, "INT8 {v}"),
            Value::Int16(v) => write!(f, "INT16 {v}"),
            Value::Int32(v) => write!(f, "INT32 {v}"),
            Value::Int64(v) => write!(f, "INT64 {v}"),
            Value::Float(v) => write!(f, "FLOAT {v}"),
            Value::Double(v) => write!(f, "DOUBLE {v}"),
            Value::Int8Array(v) => write!(f, "INT8[{}]", v.len()),
            Value::Int16Array(v) => write!(f, "INT16[{}]", v.len()),
            Value::Int32Array(v) => write!(f, "INT32[{}]", v.len()),
            Value::Int64Array(v) => write!(f, "INT64[{}]", v.len()),
            Value::FloatArray(v) => write!(f, "FLOAT[{}]", v.len()),
            Value::DoubleArray(v) => write!(f, "DOUBLE[{}]", v.len()),
            Value::Container(c) => write!(f, "CONTAINER ({} items)", c.len()),
        }
    }
}

/// One entry of a container: an optional name, an optional numeric index,
/// and a value.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    name: Option<String>,
    index: Option<u64>,
    pub value: Value,
}

impl DataItem {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            index: None,
            value: value.into(),
        }
    }

    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Result<Self, FormatError> {
        Self::new(value).with_name(name)
    }

    pub fn indexed(index: u64, value: impl Into<Value>) -> Self {
        Self::new(value).with_index(index)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Result<Self, FormatError> {
        self.set_name(name)?;
        Ok(self)
    }

    pub fn with_index(mut self, index: u64) -> Self {
        self.index = Some(index);
        self
    }

    /// An empty name is the same as no name. A name over [`MAX_NAME_LEN`]
    /// bytes is rejected and the item keeps its old name.
    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), FormatError> {
        let name = name.into();
        if name.len() > MAX_NAME_LEN {
            return Err(FormatError::NameTooLong(name.len()));
        }
        self.name = if name.is_empty() { None } else { Some(name) };
        Ok(())
    }

    pub fn set_index(&mut self, index: u64) {
        self.index = Some(index);
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn index(&self) -> Option<u64> {
        self.index
    }

    pub fn tag_byte(&self) -> u8 {
        let mut tag = self.value.type_id();
        if self.name.is_some() {
            tag |= FLAG_NAMED;
        }
        if self.index.is_some() {
            tag |= FLAG_INDEXED;
        }
        if let Some(len) = self.value.array_len() {
            tag |= size_class_for(len as u64) << SIZE_SHIFT;
        }
        tag
    }
}
