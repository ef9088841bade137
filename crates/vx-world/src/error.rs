//! World error types.

use thiserror::Error;
use vx_format::FormatError;

use crate::pos::ChunkPos;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted bytes do not follow the container grammar.
    #[error("corrupt data in {chunk}: {source}")]
    Corrupt {
        chunk: ChunkPos,
        #[source]
        source: FormatError,
    },

    /// The in-memory chunk cannot be written in the container format.
    #[error("cannot encode {chunk}: {source}")]
    Encode {
        chunk: ChunkPos,
        #[source]
        source: FormatError,
    },

    /// Well-formed file whose contents do not match the expected layout.
    #[error("unexpected layout in {chunk}: {reason}")]
    Schema { chunk: ChunkPos, reason: String },

    #[error("unknown block type: {0}")]
    UnknownBlockType(String),

    #[error("invalid rotation {0} (must be < 24)")]
    InvalidRotation(u8),

    #[error("position ({x}, {y}, {z}) is outside the packable range")]
    OutOfRange { x: i32, y: i32, z: i32 },

    #[error("{0} has no free block ids left")]
    TooManyBlockTypes(ChunkPos),

    #[error("config error: {0}")]
    Config(String),
}

impl WorldError {
    pub(crate) fn schema(chunk: ChunkPos, reason: impl Into<String>) -> Self {
        WorldError::Schema {
            chunk,
            reason: reason.into(),
        }
    }
}
