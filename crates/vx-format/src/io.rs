//! Depth-first pack/unpack engine.

use bytes::{Buf, BufMut};

use crate::container::Container;
use crate::error::FormatError;
use crate::tag::*;

/// Maximum nesting depth to prevent stack overflow.
pub const MAX_DEPTH: usize = 512;

// -----------------------------------------------------------------------
// Reading
// -----------------------------------------------------------------------

pub(crate) fn read_container(buf: &mut impl Buf, depth: usize) -> Result<Container, FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::NestingTooDeep { limit: MAX_DEPTH });
    }
    let mut container = Container::new();
    loop {
        ensure_remaining(buf, 1)?;
        let tag = buf.get_u8();
        if tag == TAG_END {
            return Ok(container);
        }
        container.push(read_item(buf, tag, depth)?);
    }
}

fn read_item(buf: &mut impl Buf, tag: u8, depth: usize) -> Result<DataItem, FormatError> {
    let type_id = tag & TYPE_MASK;
    if type_id == TAG_END {
        return Err(FormatError::UnknownTagType(tag));
    }
    let size_class = (tag & SIZE_MASK) >> SIZE_SHIFT;
    let len_bytes = size_class_bytes(size_class).ok_or(FormatError::InvalidSizeClass(tag))?;

    let name = if tag & FLAG_NAMED != 0 {
        ensure_remaining(buf, 1)?;
        let len = buf.get_u8() as usize;
        ensure_remaining(buf, len)?;
        let data = buf.copy_to_bytes(len);
        Some(String::from_utf8(data.to_vec()).map_err(|_| FormatError::InvalidUtf8)?)
    } else {
        None
    };

    let index = if tag & FLAG_INDEXED != 0 {
        ensure_remaining(buf, 8)?;
        Some(buf.get_u64_le())
    } else {
        None
    };

    let value = if type_id == TYPE_CONTAINER {
        if len_bytes != 0 {
            return Err(FormatError::ContainerWithArray);
        }
        Value::Container(read_container(buf, depth + 1)?)
    } else if len_bytes == 0 {
        read_scalar(buf, type_id)?
    } else {
        let count = read_len(buf, len_bytes)?;
        read_array(buf, type_id, count)?
    };

    let mut item = DataItem::new(value);
    if let Some(name) = name {
        item.set_name(name)?;
    }
    if let Some(index) = index {
        item.set_index(index);
    }
    Ok(item)
}

fn read_scalar(buf: &mut impl Buf, type_id: u8) -> Result<Value, FormatError> {
    ensure_remaining(buf, element_width(type_id))?;
    Ok(match type_id {
        TYPE_INT8 => Value::Int8(buf.get_i8()),
        TYPE_INT16 => Value::Int16(buf.get_i16_le()),
        TYPE_INT32 => Value::Int32(buf.get_i32_le()),
        TYPE_INT64 => Value::Int64(buf.get_i64_le()),
        TYPE_FLOAT => Value::Float(buf.get_f32_le()),
        TYPE_DOUBLE => Value::Double(buf.get_f64_le()),
        other => return Err(FormatError::UnknownTagType(other)),
    })
}

fn read_len(buf: &mut impl Buf, len_bytes: usize) -> Result<usize, FormatError> {
    ensure_remaining(buf, len_bytes)?;
    let len = buf.get_uint_le(len_bytes);
    // A length that does not fit in memory cannot be satisfied by the stream.
    usize::try_from(len).map_err(|_| FormatError::UnexpectedEof)
}

fn read_array(buf: &mut impl Buf, type_id: u8, count: usize) -> Result<Value, FormatError> {
    let byte_len = count
        .checked_mul(element_width(type_id))
        .ok_or(FormatError::UnexpectedEof)?;
    ensure_remaining(buf, byte_len)?;
    Ok(match type_id {
        TYPE_INT8 => Value::Int8Array((0..count).map(|_| buf.get_i8()).collect()),
        TYPE_INT16 => Value::Int16Array((0..count).map(|_| buf.get_i16_le()).collect()),
        TYPE_INT32 => Value::Int32Array((0..count).map(|_| buf.get_i32_le()).collect()),
        TYPE_INT64 => Value::Int64Array((0..count).map(|_| buf.get_i64_le()).collect()),
        TYPE_FLOAT => Value::FloatArray((0..count).map(|_| buf.get_f32_le()).collect()),
        TYPE_DOUBLE => Value::DoubleArray((0..count).map(|_| buf.get_f64_le()).collect()),
        other => return Err(FormatError::UnknownTagType(other)),
    })
}

fn ensure_remaining(buf: &impl Buf, needed: usize) -> Result<(), FormatError> {
    if buf.remaining() < needed {
        Err(FormatError::UnexpectedEof)
    } else {
        Ok(())
    }
}

// -----------------------------------------------------------------------
// Writing
// -----------------------------------------------------------------------

/// Writes nothing unless the whole tree fits inside [`MAX_DEPTH`].
pub(crate) fn write_container(buf: &mut impl BufMut, container: &Container) -> Result<(), FormatError> {
    check_depth(container, 0)?;
    write_body(buf, container)
}

fn check_depth(container: &Container, depth: usize) -> Result<(), FormatError> {
    if depth > MAX_DEPTH {
        return Err(FormatError::NestingTooDeep { limit: MAX_DEPTH });
    }
    for item in container {
        if let Value::Container(inner) = &item.value {
            check_depth(inner, depth + 1)?;
        }
    }
    Ok(())
}

fn write_body(buf: &mut impl BufMut, container: &Container) -> Result<(), FormatError> {
    for item in container {
        write_item(buf, item)?;
    }
    buf.put_u8(TAG_END);
    Ok(())
}

fn write_item(buf: &mut impl BufMut, item: &DataItem) -> Result<(), FormatError> {
    buf.put_u8(item.tag_byte());

    if let Some(name) = item.name() {
        if name.len() > MAX_NAME_LEN {
            return Err(FormatError::NameTooLong(name.len()));
        }
        buf.put_u8(name.len() as u8);
        buf.put_slice(name.as_bytes());
    }

    if let Some(index) = item.index() {
        buf.put_u64_le(index);
    }

    if let Some(len) = item.value.array_len() {
        let class = size_class_for(len as u64);
        // size_class_for only yields valid classes
        let len_bytes = size_class_bytes(class).unwrap_or(8);
        buf.put_uint_le(len as u64, len_bytes);
    }

    match &item.value {
        Value::Int8(v) => buf.put_i8(*v),
        Value::Int16(v) => buf.put_i16_le(*v),
        Value::Int32(v) => buf.put_i32_le(*v),
        Value::Int64(v) => buf.put_i64_le(*v),
        Value::Float(v) => buf.put_f32_le(*v),
        Value::Double(v) => buf.put_f64_le(*v),
        Value::Int8Array(arr) => arr.iter().for_each(|&v| buf.put_i8(v)),
        Value::Int16Array(arr) => arr.iter().for_each(|&v| buf.put_i16_le(v)),
        Value::Int32Array(arr) => arr.iter().for_each(|&v| buf.put_i32_le(v)),
        Value::Int64Array(arr) => arr.iter().for_each(|&v| buf.put_i64_le(v)),
        Value::FloatArray(arr) => arr.iter().for_each(|&v| buf.put_f32_le(v)),
        Value::DoubleArray(arr) => arr.iter().for_each(|&v| buf.put_f64_le(v)),
        Value::Container(inner) => write_body(buf, inner)?,
    }
    Ok(())
}
