//! Chunk generators for positions with no persisted file.
//!
//! Generated content is deterministic, so generated chunks start clean and
//! are only written once something edits them.

use std::collections::BTreeMap;

use crate::chunk::Chunk;
use crate::config::{FlatLayer, WorldConfig};
use crate::error::WorldError;
use crate::pos::{SlotIndex, CHUNK_EDGE};

pub trait ChunkGenerator: Send + Sync {
    /// Fill a freshly created all-air chunk.
    fn generate(&self, chunk: &mut Chunk) -> Result<(), WorldError>;
}

/// Leaves every chunk empty.
#[derive(Debug, Default)]
pub struct EmptyGenerator;

impl ChunkGenerator for EmptyGenerator {
    fn generate(&self, _chunk: &mut Chunk) -> Result<(), WorldError> {
        Ok(())
    }
}

/// One block name per world Y layer, uniform across X and Z.
#[derive(Debug, Default)]
pub struct FlatGenerator {
    layers: BTreeMap<i32, String>,
}

impl FlatGenerator {
    /// Later layers with the same Y replace earlier ones.
    pub fn new(layers: &[FlatLayer]) -> Self {
        Self {
            layers: layers
                .iter()
                .map(|l| (l.y, l.block.clone()))
                .collect(),
        }
    }

    pub fn block_at_y(&self, y: i32) -> Option<&str> {
        self.layers.get(&y).map(String::as_str)
    }
}

impl ChunkGenerator for FlatGenerator {
    fn generate(&self, chunk: &mut Chunk) -> Result<(), WorldError> {
        let base_y = chunk.pos().origin().y;
        for (&y, block) in self.layers.range(base_y..base_y + CHUNK_EDGE) {
            for x in 0..CHUNK_EDGE {
                for z in 0..CHUNK_EDGE {
                    chunk.place_generated(SlotIndex::from_local(x, y - base_y, z), block)?;
                }
            }
        }
        Ok(())
    }
}

/// Build the generator named in the config.
pub fn from_config(config: &WorldConfig) -> Result<Box<dyn ChunkGenerator>, WorldError> {
    match config.generator.as_str() {
        "empty" => Ok(Box::new(EmptyGenerator)),
        "flat" => Ok(Box::new(FlatGenerator::new(&config.flat_layers))),
        other => Err(WorldError::Config(format!("unknown generator {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_registry::{BlockRegistry, BlockType};
    use crate::pos::{BlockPos, ChunkPos};
    use std::sync::Arc;

    fn layers() -> Vec<FlatLayer> {
        [(0, "bedrock"), (1, "dirt"), (2, "dirt"), (3, "grass"), (16, "stone")]
            .into_iter()
            .map(|(y, block)| FlatLayer {
                y,
                block: block.into(),
            })
            .collect()
    }

    fn registry() -> Arc<BlockRegistry> {
        let mut reg = BlockRegistry::new();
        for name in ["bedrock", "dirt", "grass", "stone"] {
            reg.register(BlockType::new(name)).unwrap();
        }
        Arc::new(reg)
    }

    #[test]
    fn flat_chunk_layer_layout() {
        let generator = FlatGenerator::new(&layers());
        let mut chunk = Chunk::new(ChunkPos::new(5, 0, -3), registry());
        generator.generate(&mut chunk).unwrap();

        let name = |y| chunk.block_name(BlockPos::new(80, y, -48)).to_string();
        assert_eq!(name(0), "bedrock");
        assert_eq!(name(1), "dirt");
        assert_eq!(name(2), "dirt");
        assert_eq!(name(3), "grass");
        assert_eq!(name(4), "air");
        assert_eq!(name(15), "air");
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn uniform_across_xz() {
        let generator = FlatGenerator::new(&layers());
        let mut chunk = Chunk::new(ChunkPos::new(0, 0, 0), registry());
        generator.generate(&mut chunk).unwrap();
        for x in 0..CHUNK_EDGE {
            for z in 0..CHUNK_EDGE {
                assert_eq!(chunk.block_name(SlotIndex::from_local(x, 0, z)), "bedrock");
                assert_eq!(chunk.block_name(SlotIndex::from_local(x, 3, z)), "grass");
            }
        }
    }

    #[test]
    fn layers_only_land_in_their_chunk() {
        let generator = FlatGenerator::new(&layers());
        let mut upper = Chunk::new(ChunkPos::new(0, 1, 0), registry());
        generator.generate(&mut upper).unwrap();
        assert_eq!(upper.block_name(BlockPos::new(0, 16, 0)), "stone");
        assert_eq!(upper.block_name(BlockPos::new(0, 17, 0)), "air");

        let mut below = Chunk::new(ChunkPos::new(0, -1, 0), registry());
        generator.generate(&mut below).unwrap();
        assert_eq!(below.interned_names().count(), 0);
    }

    #[test]
    fn from_config_selects_generator() {
        let mut config = WorldConfig::default();
        assert!(from_config(&config).is_ok());
        config.generator = "flat".into();
        assert!(from_config(&config).is_ok());
        config.generator = "caves".into();
        assert!(matches!(from_config(&config), Err(WorldError::Config(_))));
    }
}
