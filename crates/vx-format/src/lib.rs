//! Self-describing tagged binary container format.
//!
//! A packed stream is a tree of [`Container`]s. Every item starts with a tag
//! byte (see [`tag`]), optionally followed by a name and a 64-bit index, and
//! then its payload: a fixed-width scalar, a length-prefixed array, or a
//! nested container terminated by the `END` tag. All multi-byte fields are
//! little-endian.

pub mod container;
pub mod error;
mod io;
pub mod tag;

pub use container::Container;
pub use error::FormatError;
pub use io::MAX_DEPTH;
pub use tag::{DataItem, Value, MAX_NAME_LEN};

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Write a container (and everything nested in it) into a buffer.
pub fn write_container(buf: &mut impl BufMut, container: &Container) -> Result<(), FormatError> {
    io::write_container(buf, container)
}

/// Read one container from a buffer, stopping after its `END` tag.
///
/// Bytes after the terminator are left in `buf`.
pub fn read_container(buf: &mut impl Buf) -> Result<Container, FormatError> {
    io::read_container(buf, 0)
}

/// Pack a root container into a fresh byte buffer.
pub fn pack(container: &Container) -> Result<Bytes, FormatError> {
    let mut buf = BytesMut::new();
    io::write_container(&mut buf, container)?;
    Ok(buf.freeze())
}

/// Unpack a root container that must span the whole input.
pub fn unpack(data: &[u8]) -> Result<Container, FormatError> {
    let mut buf = data;
    let container = io::read_container(&mut buf, 0)?;
    if buf.has_remaining() {
        return Err(FormatError::TrailingBytes(buf.remaining()));
    }
    Ok(container)
}
