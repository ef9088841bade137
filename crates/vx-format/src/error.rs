//! Container format error types.

use thiserror::Error;

/// Grammar violations found while packing or unpacking a container.
///
/// Every variant means the byte stream (or the tree being written) does not
/// follow the format; none of them says anything about what the payload
/// means to its reader.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("unexpected end of data")]
    UnexpectedEof,

    #[error("unknown value type in tag byte 0x{0:02X}")]
    UnknownTagType(u8),

    #[error("invalid array size class in tag byte 0x{0:02X}")]
    InvalidSizeClass(u8),

    #[error("container value carries an array size class")]
    ContainerWithArray,

    #[error("item name is {0} bytes, limit is 255")]
    NameTooLong(usize),

    #[error("invalid UTF-8 in item name")]
    InvalidUtf8,

    #[error("nesting too deep (limit: {limit})")]
    NestingTooDeep { limit: usize },

    #[error("{0} trailing bytes after root container")]
    TrailingBytes(usize),
}
