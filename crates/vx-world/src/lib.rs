//! Voxel world storage: chunks, block types, persistence, residency and
//! deferred block updates.

pub mod block_registry;
pub mod chunk;
pub mod config;
pub mod error;
pub mod generator;
pub mod pos;
pub mod queue;
pub mod storage;
pub mod workers;
pub mod world;

pub use block_registry::{BlockBehavior, BlockRegistry, BlockType, BlockTypeHandle, MeshId, AIR};
pub use chunk::{BlockCtx, BlockView, Chunk};
pub use config::{FlatLayer, WorldConfig};
pub use error::WorldError;
pub use pos::{BlockPos, ChunkPos, Face, SlotIndex, CHUNK_EDGE, CHUNK_VOLUME};
pub use queue::{QueueKind, UpdateQueues};
pub use storage::ChunkStore;
pub use workers::WorldWorkers;
pub use world::{ChunkRef, Entity, World};
