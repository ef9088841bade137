//! Block-type registry mapping names to live behavior.
//!
//! Chunks persist block names, never registry handles, so the registry can be
//! rebuilt in any order at startup. `"air"` is implicit: it is never
//! registered and resolves to no type.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::chunk::BlockCtx;
use crate::error::WorldError;
use crate::pos::Face;

/// Name of the empty block.
pub const AIR: &str = "air";

pub use vx_format::MAX_NAME_LEN;

/// Opaque handle to a mesh owned by the render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

pub type LifecycleHook = Arc<dyn Fn(&mut BlockCtx<'_>) + Send + Sync>;
pub type TickHook = Arc<dyn Fn(&mut BlockCtx<'_>, Duration) + Send + Sync>;
/// Returns `true` when the interaction was consumed.
pub type InteractHook = Arc<dyn Fn(&mut BlockCtx<'_>, Face) -> bool + Send + Sync>;

/// Callbacks fired by the chunk that owns a block. All of them are optional.
#[derive(Clone, Default)]
pub struct BlockBehavior {
    pub on_place: Option<LifecycleHook>,
    pub on_break: Option<LifecycleHook>,
    pub on_update: Option<LifecycleHook>,
    pub on_tick: Option<TickHook>,
    pub on_hit: Option<InteractHook>,
    pub on_use: Option<InteractHook>,
}

impl BlockBehavior {
    pub fn on_place(mut self, f: impl Fn(&mut BlockCtx<'_>) + Send + Sync + 'static) -> Self {
        self.on_place = Some(Arc::new(f));
        self
    }

    pub fn on_break(mut self, f: impl Fn(&mut BlockCtx<'_>) + Send + Sync + 'static) -> Self {
        self.on_break = Some(Arc::new(f));
        self
    }

    pub fn on_update(mut self, f: impl Fn(&mut BlockCtx<'_>) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(f));
        self
    }

    pub fn on_tick(
        mut self,
        f: impl Fn(&mut BlockCtx<'_>, Duration) + Send + Sync + 'static,
    ) -> Self {
        self.on_tick = Some(Arc::new(f));
        self
    }

    pub fn on_hit(
        mut self,
        f: impl Fn(&mut BlockCtx<'_>, Face) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_hit = Some(Arc::new(f));
        self
    }

    pub fn on_use(
        mut self,
        f: impl Fn(&mut BlockCtx<'_>, Face) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.on_use = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for BlockBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockBehavior")
            .field("on_place", &self.on_place.is_some())
            .field("on_break", &self.on_break.is_some())
            .field("on_update", &self.on_update.is_some())
            .field("on_tick", &self.on_tick.is_some())
            .field("on_hit", &self.on_hit.is_some())
            .field("on_use", &self.on_use.is_some())
            .finish()
    }
}

/// A registered block type.
#[derive(Debug, Clone)]
pub struct BlockType {
    pub name: String,
    /// Mesh used for slots that have no mesh of their own.
    pub default_mesh: Option<MeshId>,
    pub behavior: BlockBehavior,
}

impl BlockType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_mesh: None,
            behavior: BlockBehavior::default(),
        }
    }

    pub fn with_mesh(mut self, mesh: MeshId) -> Self {
        self.default_mesh = Some(mesh);
        self
    }

    pub fn with_behavior(mut self, behavior: BlockBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

pub type BlockTypeHandle = Arc<BlockType>;

/// Registry of block types keyed by name.
#[derive(Debug, Default)]
pub struct BlockRegistry {
    types: HashMap<String, BlockTypeHandle>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type, replacing any earlier type with the same name.
    pub fn register(&mut self, block: BlockType) -> Result<BlockTypeHandle, WorldError> {
        if block.name.is_empty() || block.name == AIR {
            return Err(WorldError::Config(format!(
                "block name {:?} is reserved",
                block.name
            )));
        }
        if block.name.len() > MAX_NAME_LEN {
            return Err(WorldError::Config(format!(
                "block name is {} bytes, limit is {MAX_NAME_LEN}",
                block.name.len()
            )));
        }
        let handle = Arc::new(block);
        self.types.insert(handle.name.clone(), handle.clone());
        Ok(handle)
    }

    /// Look up a type by name. Always `None` for air.
    pub fn resolve(&self, name: &str) -> Option<BlockTypeHandle> {
        self.types.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_resolve() {
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("stone").with_mesh(MeshId(3)))
            .unwrap();
        let stone = reg.resolve("stone").unwrap();
        assert_eq!(stone.name, "stone");
        assert_eq!(stone.default_mesh, Some(MeshId(3)));
        assert!(reg.resolve("dirt").is_none());
        assert!(reg.resolve(AIR).is_none());
    }

    #[test]
    fn air_and_empty_names_are_reserved() {
        let mut reg = BlockRegistry::new();
        assert!(matches!(
            reg.register(BlockType::new(AIR)),
            Err(WorldError::Config(_))
        ));
        assert!(reg.register(BlockType::new("")).is_err());
        assert!(reg.register(BlockType::new("x".repeat(256))).is_err());
        assert!(reg.is_empty());
    }

    #[test]
    fn reregistering_replaces() {
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("dirt")).unwrap();
        reg.register(BlockType::new("dirt").with_mesh(MeshId(1)))
            .unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.resolve("dirt").unwrap().default_mesh, Some(MeshId(1)));
    }

    #[test]
    fn names_sorted() {
        let mut reg = BlockRegistry::new();
        for name in ["water", "dirt", "stone"] {
            reg.register(BlockType::new(name)).unwrap();
        }
        assert_eq!(reg.names(), vec!["dirt", "stone", "water"]);
    }

    #[test]
    fn behavior_debug_shows_installed_hooks() {
        let behavior = BlockBehavior::default().on_update(|_| {});
        let dbg = format!("{behavior:?}");
        assert!(dbg.contains("on_update: true"));
        assert!(dbg.contains("on_place: false"));
    }
}
