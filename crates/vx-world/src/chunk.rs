//! One cube of blocks: storage arrays, interning table and persistence.
//!
//! Block ids are chunk-local. Id 0 is always air and never appears in the
//! persisted `ids` table; every other id maps to a block name. On load the
//! names are resolved against the live [`BlockRegistry`], so registration
//! order never changes what a saved chunk contains.
//!
//! Persisted layout (one root container):
//! - `version`: INT32, currently 1. Absent in legacy files.
//! - `ids`: container of `name -> INT16 id`.
//! - `blocks`: INT16 array, one id per slot.
//! - `rotation`: INT8 array, one rotation (0..24) per slot.
//! - `data`: container of per-slot containers, each indexed by slot.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;
use vx_format::{Container, DataItem, FormatError, Value};

use crate::block_registry::{BlockRegistry, BlockTypeHandle, MeshId, TickHook, AIR, MAX_NAME_LEN};
use crate::error::WorldError;
use crate::pos::{BlockPos, ChunkPos, Face, SlotIndex, CHUNK_VOLUME};
use crate::storage::ChunkStore;

/// Version written into the root container.
pub const FORMAT_VERSION: i32 = 1;

/// Number of distinct cube rotations.
pub const ROTATION_COUNT: u8 = 24;

const AIR_ID: u16 = 0;

struct PaletteEntry {
    name: Arc<str>,
    /// `None` for air and for names the registry no longer knows.
    block_type: Option<BlockTypeHandle>,
}

/// Snapshot of one non-air block.
///
/// Holds no reference into the chunk, so it stays valid after the chunk lock
/// is released, but it does not follow later changes.
#[derive(Debug, Clone)]
pub struct BlockView {
    pub chunk: ChunkPos,
    pub slot: SlotIndex,
    pub pos: BlockPos,
    pub name: Arc<str>,
    pub block_type: Option<BlockTypeHandle>,
    pub rotation: u8,
}

impl BlockView {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// False for blocks read from disk whose type is no longer registered.
    pub fn is_registered(&self) -> bool {
        self.block_type.is_some()
    }
}

#[derive(Clone, Copy)]
enum Lifecycle {
    Place,
    Break,
    Update,
}

pub struct Chunk {
    pos: ChunkPos,
    registry: Arc<BlockRegistry>,
    blocks: Box<[u16]>,
    rotation: Box<[u8]>,
    faces: Box<[u8]>,
    data: HashMap<SlotIndex, Container>,
    meshes: HashMap<SlotIndex, MeshId>,
    palette: Vec<PaletteEntry>,
    ids: HashMap<Arc<str>, u16>,
    visual_dirty: BTreeSet<SlotIndex>,
    repaint_all: bool,
    dirty: bool,
    last_save: Instant,
    follow_ups: Vec<BlockPos>,
    retired: bool,
}

impl Chunk {
    /// An all-air chunk that is not dirty.
    pub fn new(pos: ChunkPos, registry: Arc<BlockRegistry>) -> Self {
        Self {
            pos,
            registry,
            blocks: vec![AIR_ID; CHUNK_VOLUME].into_boxed_slice(),
            rotation: vec![0; CHUNK_VOLUME].into_boxed_slice(),
            faces: vec![0; CHUNK_VOLUME].into_boxed_slice(),
            data: HashMap::new(),
            meshes: HashMap::new(),
            palette: vec![PaletteEntry {
                name: Arc::from(AIR),
                block_type: None,
            }],
            ids: HashMap::new(),
            visual_dirty: BTreeSet::new(),
            repaint_all: false,
            dirty: false,
            last_save: Instant::now(),
            follow_ups: Vec::new(),
            retired: false,
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    // ─── Interning ──────────────────────────────────────────────────────────

    fn intern(
        &mut self,
        name: &str,
        block_type: Option<BlockTypeHandle>,
    ) -> Result<u16, WorldError> {
        if name == AIR {
            return Ok(AIR_ID);
        }
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        if name.len() > MAX_NAME_LEN {
            return Err(WorldError::UnknownBlockType(name.into()));
        }
        if self.palette.len() > u16::MAX as usize {
            return Err(WorldError::TooManyBlockTypes(self.pos));
        }
        let id = self.palette.len() as u16;
        let name: Arc<str> = Arc::from(name);
        self.palette.push(PaletteEntry {
            name: name.clone(),
            block_type,
        });
        self.ids.insert(name, id);
        Ok(id)
    }

    /// Names in the interning table, in id order, air excluded.
    pub fn interned_names(&self) -> impl Iterator<Item = &str> {
        self.palette.iter().skip(1).map(|e| &*e.name)
    }

    fn entry(&self, slot: SlotIndex) -> &PaletteEntry {
        &self.palette[self.blocks[slot.index()] as usize]
    }

    fn block_type_at(&self, slot: SlotIndex) -> Option<BlockTypeHandle> {
        self.entry(slot).block_type.clone()
    }

    // ─── Block access ───────────────────────────────────────────────────────

    /// `None` for air.
    pub fn get_block(&self, at: impl Into<SlotIndex>) -> Option<BlockView> {
        let slot = at.into();
        let i = slot.index();
        if self.blocks[i] == AIR_ID {
            return None;
        }
        let entry = self.entry(slot);
        Some(BlockView {
            chunk: self.pos,
            slot,
            pos: self.pos.block_at(slot),
            name: entry.name.clone(),
            block_type: entry.block_type.clone(),
            rotation: self.rotation[i],
        })
    }

    /// Name of the block in a slot, `"air"` included.
    pub fn block_name(&self, at: impl Into<SlotIndex>) -> &str {
        &self.entry(at.into()).name
    }

    pub fn is_air(&self, at: impl Into<SlotIndex>) -> bool {
        self.blocks[at.into().index()] == AIR_ID
    }

    /// Replace the block in a slot.
    ///
    /// Fires the old block's break hook, drops the slot's data container and
    /// mesh, then fires the new block's place hook (skipped for air).
    pub fn set_block(
        &mut self,
        at: impl Into<SlotIndex>,
        name: &str,
        rotation: u8,
    ) -> Result<(), WorldError> {
        let slot = at.into();
        if rotation >= ROTATION_COUNT {
            return Err(WorldError::InvalidRotation(rotation));
        }
        let id = if name == AIR {
            AIR_ID
        } else {
            let block_type = self
                .registry
                .resolve(name)
                .ok_or_else(|| WorldError::UnknownBlockType(name.to_string()))?;
            self.intern(name, Some(block_type))?
        };

        let i = slot.index();
        if self.blocks[i] != AIR_ID {
            self.fire(slot, Lifecycle::Break);
        }
        self.blocks[i] = id;
        self.rotation[i] = rotation;
        self.data.remove(&slot);
        self.meshes.remove(&slot);
        if id != AIR_ID {
            self.fire(slot, Lifecycle::Place);
        }
        self.dirty = true;
        self.visual_dirty.insert(slot);
        Ok(())
    }

    /// Write a block without hooks and without dirtying the chunk.
    ///
    /// Used by generators. Names the registry does not know are stored as
    /// inert blocks.
    pub fn place_generated(
        &mut self,
        at: impl Into<SlotIndex>,
        name: &str,
    ) -> Result<(), WorldError> {
        let slot = at.into();
        let block_type = self.registry.resolve(name);
        let id = self.intern(name, block_type)?;
        self.blocks[slot.index()] = id;
        self.rotation[slot.index()] = 0;
        Ok(())
    }

    /// Fire the update hook. Returns whether a hook ran.
    pub fn update_block(&mut self, at: impl Into<SlotIndex>) -> bool {
        self.fire(at.into(), Lifecycle::Update)
    }

    fn fire(&mut self, slot: SlotIndex, which: Lifecycle) -> bool {
        let Some(block_type) = self.block_type_at(slot) else {
            return false;
        };
        let behavior = &block_type.behavior;
        let hook = match which {
            Lifecycle::Place => &behavior.on_place,
            Lifecycle::Break => &behavior.on_break,
            Lifecycle::Update => &behavior.on_update,
        };
        match hook {
            Some(hook) => {
                hook(&mut BlockCtx { chunk: self, slot });
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the hit hook consumed the hit.
    pub fn hit_block(&mut self, at: impl Into<SlotIndex>, face: Face) -> bool {
        let slot = at.into();
        let Some(block_type) = self.block_type_at(slot) else {
            return false;
        };
        match &block_type.behavior.on_hit {
            Some(hook) => hook(&mut BlockCtx { chunk: self, slot }, face),
            None => false,
        }
    }

    /// Returns `true` if the use hook consumed the interaction.
    pub fn use_block(&mut self, at: impl Into<SlotIndex>, face: Face) -> bool {
        let slot = at.into();
        let Some(block_type) = self.block_type_at(slot) else {
            return false;
        };
        match &block_type.behavior.on_use {
            Some(hook) => hook(&mut BlockCtx { chunk: self, slot }, face),
            None => false,
        }
    }

    /// Fire the tick hook of every block that has one.
    pub fn tick_all_blocks(&mut self, elapsed: Duration) {
        let hooks: Vec<Option<TickHook>> = self
            .palette
            .iter()
            .map(|e| e.block_type.as_ref().and_then(|t| t.behavior.on_tick.clone()))
            .collect();
        if hooks.iter().all(Option::is_none) {
            return;
        }
        for slot in SlotIndex::all() {
            if let Some(hook) = &hooks[self.blocks[slot.index()] as usize] {
                hook(&mut BlockCtx { chunk: self, slot }, elapsed);
            }
        }
    }

    // ─── Per-slot state ─────────────────────────────────────────────────────

    pub fn rotation(&self, at: impl Into<SlotIndex>) -> u8 {
        self.rotation[at.into().index()]
    }

    pub fn set_rotation(&mut self, at: impl Into<SlotIndex>, rotation: u8) -> Result<(), WorldError> {
        if rotation >= ROTATION_COUNT {
            return Err(WorldError::InvalidRotation(rotation));
        }
        let slot = at.into();
        self.rotation[slot.index()] = rotation;
        self.dirty = true;
        self.visual_dirty.insert(slot);
        Ok(())
    }

    pub fn data_container(&self, at: impl Into<SlotIndex>) -> Option<&Container> {
        self.data.get(&at.into())
    }

    /// Mutable access to a slot's data container, creating an empty one when
    /// `create` is set. Call [`Chunk::mark_data_modified`] after changing it.
    pub fn data_container_mut(
        &mut self,
        at: impl Into<SlotIndex>,
        create: bool,
    ) -> Option<&mut Container> {
        let slot = at.into();
        if create {
            Some(self.data.entry(slot).or_default())
        } else {
            self.data.get_mut(&slot)
        }
    }

    pub fn mark_data_modified(&mut self, at: impl Into<SlotIndex>) {
        self.dirty = true;
        self.visual_dirty.insert(at.into());
    }

    /// The slot's own mesh, falling back to the block type's default.
    pub fn mesh(&self, at: impl Into<SlotIndex>) -> Option<MeshId> {
        let slot = at.into();
        self.meshes.get(&slot).copied().or_else(|| {
            self.entry(slot)
                .block_type
                .as_ref()
                .and_then(|t| t.default_mesh)
        })
    }

    /// Meshes are derived state and are not persisted.
    pub fn set_mesh(&mut self, at: impl Into<SlotIndex>, mesh: Option<MeshId>) {
        let slot = at.into();
        match mesh {
            Some(mesh) => self.meshes.insert(slot, mesh),
            None => self.meshes.remove(&slot),
        };
    }

    /// Bit mask of visible faces (see [`Face::mask`]).
    pub fn faces(&self, at: impl Into<SlotIndex>) -> u8 {
        self.faces[at.into().index()]
    }

    pub fn set_faces(&mut self, at: impl Into<SlotIndex>, mask: u8) {
        self.faces[at.into().index()] = mask & Face::ALL_MASK;
    }

    // ─── Visual updates and follow-ups ──────────────────────────────────────

    pub fn repaint_block(&mut self, at: impl Into<SlotIndex>) {
        self.visual_dirty.insert(at.into());
    }

    pub fn repaint_all_blocks(&mut self) {
        self.repaint_all = true;
    }

    pub fn has_visual_updates(&self) -> bool {
        self.repaint_all || !self.visual_dirty.is_empty()
    }

    /// Drain the slots whose appearance changed since the last call.
    pub fn take_visual_updates(&mut self) -> Vec<SlotIndex> {
        if std::mem::take(&mut self.repaint_all) {
            self.visual_dirty.clear();
            return SlotIndex::all().collect();
        }
        std::mem::take(&mut self.visual_dirty).into_iter().collect()
    }

    /// Drain positions that hooks asked to have updated.
    pub fn take_follow_ups(&mut self) -> Vec<BlockPos> {
        std::mem::take(&mut self.follow_ups)
    }

    // ─── Dirty tracking and persistence ─────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set once the world has saved and dropped this chunk. Edits made
    /// through a handle to a retired chunk are never persisted.
    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn last_save(&self) -> Instant {
        self.last_save
    }

    pub(crate) fn set_last_save(&mut self, at: Instant) {
        self.last_save = at;
    }

    /// Serialize into the persisted root container.
    pub fn to_container(&self) -> Result<Container, FormatError> {
        let mut root = Container::new();
        root.set_named("version", Value::Int32(FORMAT_VERSION))?;

        let ids = self
            .palette
            .iter()
            .enumerate()
            .skip(1)
            .map(|(id, e)| DataItem::named(&*e.name, Value::Int16(id as u16 as i16)))
            .collect::<Result<Container, _>>()?;
        root.set_named("ids", ids)?;

        root.set_named(
            "blocks",
            Value::Int16Array(self.blocks.iter().map(|&b| b as i16).collect()),
        )?;
        root.set_named(
            "rotation",
            Value::Int8Array(self.rotation.iter().map(|&r| r as i8).collect()),
        )?;

        let mut slots: Vec<&SlotIndex> = self.data.keys().collect();
        slots.sort_unstable();
        let data: Container = slots
            .into_iter()
            .map(|slot| DataItem::indexed(slot.index() as u64, self.data[slot].clone()))
            .collect();
        root.set_named("data", data)?;
        Ok(root)
    }

    /// Rebuild a chunk from its persisted root container.
    ///
    /// Ids are re-interned by name, so the in-memory ids may differ from the
    /// persisted ones. The result is clean.
    pub fn from_container(
        pos: ChunkPos,
        registry: Arc<BlockRegistry>,
        root: &Container,
    ) -> Result<Self, WorldError> {
        let schema = |reason: String| WorldError::schema(pos, reason);
        let mut chunk = Chunk::new(pos, registry);

        match root.named_value("version") {
            None => {}
            Some(Value::Int32(v)) if *v <= FORMAT_VERSION => {}
            Some(Value::Int32(v)) => return Err(schema(format!("unsupported version {v}"))),
            Some(other) => return Err(schema(format!("version is {other}, expected INT32"))),
        }

        let ids = root
            .named_value("ids")
            .and_then(Value::as_container)
            .ok_or_else(|| schema("missing ids table".into()))?;
        let mut remap: HashMap<u16, u16> = HashMap::new();
        for item in ids {
            let name = item
                .name()
                .ok_or_else(|| schema("unnamed entry in ids table".into()))?;
            let old = item
                .value
                .as_i16()
                .ok_or_else(|| schema(format!("id of {name:?} is not INT16")))?
                as u16;
            if old == AIR_ID {
                // Older writers list air explicitly.
                if name == AIR {
                    continue;
                }
                return Err(schema(format!("{name:?} uses the reserved air id")));
            }
            let block_type = chunk.registry.resolve(name);
            let new = chunk.intern(name, block_type)?;
            if remap.insert(old, new).is_some() {
                return Err(schema(format!("id {old} is assigned twice")));
            }
        }

        let blocks = root
            .named_value("blocks")
            .and_then(Value::as_i16_array)
            .ok_or_else(|| schema("missing blocks array".into()))?;
        if blocks.len() != CHUNK_VOLUME {
            return Err(schema(format!(
                "blocks has {} entries, expected {CHUNK_VOLUME}",
                blocks.len()
            )));
        }
        for (i, &raw) in blocks.iter().enumerate() {
            let old = raw as u16;
            chunk.blocks[i] = if old == AIR_ID {
                AIR_ID
            } else {
                *remap
                    .get(&old)
                    .ok_or_else(|| schema(format!("block id {old} has no interned name")))?
            };
        }

        let rotation = root
            .named_value("rotation")
            .and_then(Value::as_i8_array)
            .ok_or_else(|| schema("missing rotation array".into()))?;
        if rotation.len() != CHUNK_VOLUME {
            return Err(schema(format!(
                "rotation has {} entries, expected {CHUNK_VOLUME}",
                rotation.len()
            )));
        }
        for (i, &raw) in rotation.iter().enumerate() {
            let r = raw as u8;
            if r >= ROTATION_COUNT {
                return Err(schema(format!("rotation {r} out of range")));
            }
            chunk.rotation[i] = r;
        }

        if let Some(value) = root.named_value("data") {
            let data = value
                .as_container()
                .ok_or_else(|| schema("data is not a container".into()))?;
            for item in data {
                let slot = item
                    .index()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(SlotIndex::new)
                    .ok_or_else(|| schema("data entry without a valid slot index".into()))?;
                let container = item
                    .value
                    .as_container()
                    .ok_or_else(|| schema(format!("data entry {} is not a container", slot.index())))?;
                chunk.data.insert(slot, container.clone());
            }
        }

        Ok(chunk)
    }

    /// Persist the chunk if it is dirty. Returns whether anything was written.
    ///
    /// The dirty flag is only cleared once the write succeeded.
    pub fn save(&mut self, store: &ChunkStore) -> Result<bool, WorldError> {
        if !self.dirty {
            return Ok(false);
        }
        let bytes = self
            .to_container()
            .and_then(|root| vx_format::pack(&root))
            .map_err(|source| WorldError::Encode {
                chunk: self.pos,
                source,
            })?;
        store.write(self.pos, &bytes)?;
        self.dirty = false;
        self.last_save = Instant::now();
        debug!("saved {} ({} bytes)", self.pos, bytes.len());
        Ok(true)
    }

    /// Replace this chunk's contents with the persisted file.
    ///
    /// Returns `Ok(false)` when no file exists; the chunk is left untouched
    /// and the caller generates fresh content instead.
    pub fn load(&mut self, store: &ChunkStore) -> Result<bool, WorldError> {
        let Some(bytes) = store.read(self.pos)? else {
            return Ok(false);
        };
        let root = vx_format::unpack(&bytes).map_err(|source| WorldError::Corrupt {
            chunk: self.pos,
            source,
        })?;
        *self = Chunk::from_container(self.pos, self.registry.clone(), &root)?;
        debug!("loaded {} ({} bytes)", self.pos, bytes.len());
        Ok(true)
    }
}

impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("dirty", &self.dirty)
            .field("palette", &self.palette.len())
            .field("data", &self.data.len())
            .finish()
    }
}

// ─── Hook context ───────────────────────────────────────────────────────────

/// The chunk and slot a behavior hook is running for.
///
/// The chunk is locked for the duration of the hook, so hooks only touch
/// their own chunk directly. Work on other positions goes through
/// [`BlockCtx::request_update`] and is queued once the chunk is released.
pub struct BlockCtx<'a> {
    chunk: &'a mut Chunk,
    slot: SlotIndex,
}

impl BlockCtx<'_> {
    pub fn slot(&self) -> SlotIndex {
        self.slot
    }

    pub fn pos(&self) -> BlockPos {
        self.chunk.pos.block_at(self.slot)
    }

    pub fn chunk(&self) -> &Chunk {
        &*self.chunk
    }

    pub fn name(&self) -> &str {
        self.chunk.block_name(self.slot)
    }

    pub fn rotation(&self) -> u8 {
        self.chunk.rotation(self.slot)
    }

    pub fn set_rotation(&mut self, rotation: u8) -> Result<(), WorldError> {
        self.chunk.set_rotation(self.slot, rotation)
    }

    pub fn data(&self) -> Option<&Container> {
        self.chunk.data_container(self.slot)
    }

    /// Mutable data container; marks the chunk dirty when one is returned.
    pub fn data_mut(&mut self, create: bool) -> Option<&mut Container> {
        if create || self.chunk.data.contains_key(&self.slot) {
            self.chunk.mark_data_modified(self.slot);
        }
        self.chunk.data_container_mut(self.slot, create)
    }

    pub fn mesh(&self) -> Option<MeshId> {
        self.chunk.mesh(self.slot)
    }

    pub fn set_mesh(&mut self, mesh: Option<MeshId>) {
        self.chunk.set_mesh(self.slot, mesh);
    }

    pub fn faces(&self) -> u8 {
        self.chunk.faces(self.slot)
    }

    pub fn set_faces(&mut self, mask: u8) {
        self.chunk.set_faces(self.slot, mask);
    }

    pub fn request_visual_update(&mut self) {
        self.chunk.repaint_block(self.slot);
    }

    /// Queue a deferred update of any world position.
    pub fn request_update(&mut self, pos: BlockPos) {
        self.chunk.follow_ups.push(pos);
    }

    pub fn request_surrounding_update(&mut self) {
        let around = self.pos().surrounding();
        self.chunk.follow_ups.extend_from_slice(&around);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_registry::{BlockBehavior, BlockType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn registry() -> Arc<BlockRegistry> {
        let mut reg = BlockRegistry::new();
        for name in ["stone", "dirt", "ore"] {
            reg.register(BlockType::new(name)).unwrap();
        }
        Arc::new(reg)
    }

    fn temp_store() -> ChunkStore {
        let dir = std::env::temp_dir().join(format!("vx_chunk_test_{}", rand::random::<u64>()));
        ChunkStore::open(dir).unwrap()
    }

    fn origin() -> ChunkPos {
        ChunkPos::new(0, 0, 0)
    }

    #[test]
    fn set_then_read() {
        let mut chunk = Chunk::new(origin(), registry());
        chunk.set_block(BlockPos::new(0, 0, 0), "stone", 0).unwrap();
        let view = chunk.get_block(BlockPos::new(0, 0, 0)).unwrap();
        assert_eq!(view.name(), "stone");
        assert_eq!(view.rotation, 0);
        assert!(view.is_registered());
        assert!(chunk.get_block(BlockPos::new(1, 0, 0)).is_none());
        assert!(chunk.is_dirty());
    }

    #[test]
    fn air_clears_data_container() {
        let mut chunk = Chunk::new(origin(), registry());
        let at = BlockPos::new(5, 5, 5);
        chunk.set_block(at, "dirt", 0).unwrap();
        chunk
            .data_container_mut(at, true)
            .unwrap()
            .set_named("h", Value::Int8(1))
            .unwrap();
        chunk.set_mesh(at, Some(MeshId(9)));
        chunk.set_block(at, AIR, 0).unwrap();
        assert!(chunk.data_container(at).is_none());
        assert!(chunk.data_container_mut(at, false).is_none());
        assert_eq!(chunk.mesh(at), None);
        assert!(chunk.is_air(at));
    }

    #[test]
    fn interning_reuses_ids() {
        let mut chunk = Chunk::new(origin(), registry());
        for x in 0..16 {
            chunk.set_block(BlockPos::new(x, 0, 0), "stone", 0).unwrap();
        }
        chunk.set_block(BlockPos::new(0, 1, 0), "dirt", 0).unwrap();
        assert_eq!(chunk.interned_names().collect::<Vec<_>>(), vec!["stone", "dirt"]);
    }

    #[test]
    fn rejects_bad_input() {
        let mut chunk = Chunk::new(origin(), registry());
        assert!(matches!(
            chunk.set_block(SlotIndex::from_local(0, 0, 0), "stone", 24),
            Err(WorldError::InvalidRotation(24))
        ));
        assert!(matches!(
            chunk.set_block(SlotIndex::from_local(0, 0, 0), "glass", 0),
            Err(WorldError::UnknownBlockType(name)) if name == "glass"
        ));
        assert!(!chunk.is_dirty());
    }

    #[test]
    fn lifecycle_hooks_fire_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = BlockRegistry::new();
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
        reg.register(
            BlockType::new("lamp").with_behavior(
                BlockBehavior::default()
                    .on_place(move |ctx| l1.lock().unwrap().push(format!("place {}", ctx.name())))
                    .on_break(move |ctx| {
                        // Data is still readable while breaking.
                        let has_data = ctx.data().is_some();
                        l2.lock().unwrap().push(format!("break {has_data}"));
                    })
                    .on_update(move |_| l3.lock().unwrap().push("update".into())),
            ),
        )
        .unwrap();
        let mut chunk = Chunk::new(origin(), Arc::new(reg));
        let at = SlotIndex::from_local(1, 2, 3);

        chunk.set_block(at, "lamp", 0).unwrap();
        chunk.data_container_mut(at, true).unwrap();
        assert!(chunk.update_block(at));
        chunk.set_block(at, AIR, 0).unwrap();
        assert!(!chunk.update_block(at));

        assert_eq!(
            *log.lock().unwrap(),
            vec!["place lamp", "update", "break true"]
        );
    }

    #[test]
    fn hooks_can_request_follow_ups() {
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("sand").with_behavior(
            BlockBehavior::default().on_update(|ctx| {
                let below = ctx.pos().offset(0, -1, 0);
                ctx.request_update(below);
                ctx.request_visual_update();
            }),
        ))
        .unwrap();
        let mut chunk = Chunk::new(ChunkPos::new(1, 0, 0), Arc::new(reg));
        let at = BlockPos::new(17, 4, 0);
        chunk.set_block(at, "sand", 0).unwrap();
        chunk.take_visual_updates();

        chunk.update_block(at);
        assert_eq!(chunk.take_follow_ups(), vec![BlockPos::new(17, 3, 0)]);
        assert!(chunk.take_follow_ups().is_empty());
        assert_eq!(chunk.take_visual_updates(), vec![at.slot()]);
    }

    #[test]
    fn tick_hooks_run_for_every_matching_slot() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("grass").with_behavior(
            BlockBehavior::default().on_tick(move |_, elapsed| {
                assert_eq!(elapsed, Duration::from_millis(50));
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ))
        .unwrap();
        reg.register(BlockType::new("stone")).unwrap();
        let mut chunk = Chunk::new(origin(), Arc::new(reg));
        for x in 0..3 {
            chunk.set_block(SlotIndex::from_local(x, 0, 0), "grass", 0).unwrap();
        }
        chunk.set_block(SlotIndex::from_local(0, 1, 0), "stone", 0).unwrap();
        chunk.tick_all_blocks(Duration::from_millis(50));
        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn hit_and_use_report_consumption() {
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("door").with_behavior(
            BlockBehavior::default()
                .on_use(|ctx, _| {
                    let next = (ctx.rotation() + 1) % ROTATION_COUNT;
                    ctx.set_rotation(next).is_ok()
                })
                .on_hit(|_, face| face == Face::Up),
        ))
        .unwrap();
        let mut chunk = Chunk::new(origin(), Arc::new(reg));
        let at = SlotIndex::from_local(0, 0, 0);
        assert!(!chunk.use_block(at, Face::Up));
        chunk.set_block(at, "door", 23).unwrap();
        assert!(chunk.use_block(at, Face::North));
        assert_eq!(chunk.rotation(at), 0);
        assert!(chunk.hit_block(at, Face::Up));
        assert!(!chunk.hit_block(at, Face::Down));
    }

    #[test]
    fn repaint_all_yields_every_slot_once() {
        let mut chunk = Chunk::new(origin(), registry());
        chunk.repaint_block(SlotIndex::from_local(1, 1, 1));
        chunk.repaint_all_blocks();
        assert!(chunk.has_visual_updates());
        assert_eq!(chunk.take_visual_updates().len(), CHUNK_VOLUME);
        assert!(!chunk.has_visual_updates());
        assert!(chunk.take_visual_updates().is_empty());
    }

    #[test]
    fn mesh_falls_back_to_type_default() {
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("glass").with_mesh(MeshId(4)))
            .unwrap();
        let mut chunk = Chunk::new(origin(), Arc::new(reg));
        let at = SlotIndex::from_local(2, 0, 0);
        chunk.set_block(at, "glass", 0).unwrap();
        assert_eq!(chunk.mesh(at), Some(MeshId(4)));
        chunk.set_mesh(at, Some(MeshId(7)));
        assert_eq!(chunk.mesh(at), Some(MeshId(7)));
        chunk.set_mesh(at, None);
        assert_eq!(chunk.mesh(at), Some(MeshId(4)));
        chunk.set_faces(at, 0xFF);
        assert_eq!(chunk.faces(at), Face::ALL_MASK);
    }

    #[test]
    fn generated_blocks_are_clean_and_silent() {
        let placed = Arc::new(AtomicUsize::new(0));
        let counter = placed.clone();
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("stone").with_behavior(
            BlockBehavior::default().on_place(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        ))
        .unwrap();
        let mut chunk = Chunk::new(origin(), Arc::new(reg));
        chunk.place_generated(SlotIndex::from_local(0, 0, 0), "stone").unwrap();
        chunk.place_generated(SlotIndex::from_local(1, 0, 0), "bedrock").unwrap();
        assert!(!chunk.is_dirty());
        assert_eq!(placed.load(Ordering::SeqCst), 0);
        assert!(!chunk.get_block(SlotIndex::from_local(1, 0, 0)).unwrap().is_registered());
    }

    #[test]
    fn save_clears_dirty_and_load_restores() {
        let store = temp_store();
        let pos = ChunkPos::new(-1, 2, 3);
        let mut chunk = Chunk::new(pos, registry());
        assert!(!chunk.save(&store).unwrap());

        let a = pos.block_at(SlotIndex::from_local(0, 0, 0));
        let b = pos.block_at(SlotIndex::from_local(15, 15, 15));
        chunk.set_block(a, "dirt", 5).unwrap();
        chunk.set_block(b, "stone", 23).unwrap();
        chunk
            .data_container_mut(b, true)
            .unwrap()
            .set_named("heights", Value::FloatArray(vec![0.5; 9]))
            .unwrap();
        assert!(chunk.save(&store).unwrap());
        assert!(!chunk.is_dirty());

        let mut loaded = Chunk::new(pos, registry());
        assert!(loaded.load(&store).unwrap());
        assert!(!loaded.is_dirty());
        assert_eq!(loaded.get_block(a).unwrap().name(), "dirt");
        assert_eq!(loaded.rotation(a), 5);
        assert_eq!(loaded.get_block(b).unwrap().name(), "stone");
        assert_eq!(loaded.rotation(b), 23);
        assert_eq!(
            loaded.data_container(b).unwrap().named_value("heights"),
            Some(&Value::FloatArray(vec![0.5; 9]))
        );
        assert_eq!(loaded.to_container().unwrap(), chunk.to_container().unwrap());
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn load_missing_file_returns_false() {
        let store = temp_store();
        let mut chunk = Chunk::new(origin(), registry());
        assert!(!chunk.load(&store).unwrap());
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn unregistered_names_survive_a_save() {
        let store = temp_store();
        let at = SlotIndex::from_local(3, 3, 3);
        let mut chunk = Chunk::new(origin(), registry());
        chunk.set_block(at, "ore", 0).unwrap();
        chunk.save(&store).unwrap();

        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("stone")).unwrap();
        let mut reloaded = Chunk::new(origin(), Arc::new(reg));
        assert!(reloaded.load(&store).unwrap());
        let view = reloaded.get_block(at).unwrap();
        assert_eq!(view.name(), "ore");
        assert!(!view.is_registered());
        assert!(!reloaded.update_block(at));

        reloaded
            .set_block(SlotIndex::from_local(0, 0, 0), "stone", 0)
            .unwrap();
        reloaded.save(&store).unwrap();
        let mut again = Chunk::new(origin(), registry());
        again.load(&store).unwrap();
        assert_eq!(again.get_block(at).unwrap().name(), "ore");
        assert!(again.get_block(at).unwrap().is_registered());
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn ids_are_resolved_by_name() {
        let mut root = Chunk::new(origin(), registry()).to_container().unwrap();
        let mut ids = Container::new();
        ids.set_named("stone", Value::Int16(7)).unwrap();
        root.set_named("ids", ids).unwrap();
        let mut blocks = vec![0i16; CHUNK_VOLUME];
        blocks[0] = 7;
        root.set_named("blocks", Value::Int16Array(blocks)).unwrap();

        let chunk = Chunk::from_container(origin(), registry(), &root).unwrap();
        assert_eq!(chunk.get_block(SlotIndex::from_local(0, 0, 0)).unwrap().name(), "stone");
        assert_eq!(chunk.interned_names().collect::<Vec<_>>(), vec!["stone"]);
    }

    #[test]
    fn corrupt_file_is_surfaced() {
        let store = temp_store();
        let mut chunk = Chunk::new(origin(), registry());
        chunk.set_block(SlotIndex::from_local(0, 0, 0), "stone", 0).unwrap();
        chunk.save(&store).unwrap();
        let bytes = store.read(origin()).unwrap().unwrap();
        store.write(origin(), &bytes[..bytes.len() / 2]).unwrap();

        let mut reloaded = Chunk::new(origin(), registry());
        assert!(matches!(
            reloaded.load(&store),
            Err(WorldError::Corrupt { .. })
        ));
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn schema_errors_are_distinct() {
        let good = Chunk::new(origin(), registry()).to_container().unwrap();

        let mut short = good.clone();
        short.set_named("blocks", Value::Int16Array(vec![0; 10])).unwrap();
        assert!(matches!(
            Chunk::from_container(origin(), registry(), &short),
            Err(WorldError::Schema { .. })
        ));

        let mut future = good.clone();
        future.set_named("version", Value::Int32(FORMAT_VERSION + 1)).unwrap();
        assert!(matches!(
            Chunk::from_container(origin(), registry(), &future),
            Err(WorldError::Schema { .. })
        ));

        let mut dangling = good.clone();
        let mut blocks = vec![0i16; CHUNK_VOLUME];
        blocks[9] = 3;
        dangling.set_named("blocks", Value::Int16Array(blocks)).unwrap();
        assert!(matches!(
            Chunk::from_container(origin(), registry(), &dangling),
            Err(WorldError::Schema { .. })
        ));

        let mut stolen_air_id = good.clone();
        let mut ids = Container::new();
        ids.set_named("stone", Value::Int16(0)).unwrap();
        stolen_air_id.set_named("ids", ids).unwrap();
        assert!(matches!(
            Chunk::from_container(origin(), registry(), &stolen_air_id),
            Err(WorldError::Schema { .. })
        ));

        let mut bad_rotation = good;
        bad_rotation.set_named("rotation", Value::Int8Array(vec![30; CHUNK_VOLUME])).unwrap();
        assert!(matches!(
            Chunk::from_container(origin(), registry(), &bad_rotation),
            Err(WorldError::Schema { .. })
        ));
    }

    #[test]
    fn legacy_layout_without_version_loads() {
        let good = Chunk::new(origin(), registry()).to_container().unwrap();
        let legacy: Container = good
            .iter()
            .filter(|item| item.name() != Some("version"))
            .cloned()
            .collect();
        assert!(Chunk::from_container(origin(), registry(), &legacy).is_ok());
    }

    #[test]
    fn legacy_layout_with_explicit_air_entry_loads() {
        let mut ids = Container::new();
        ids.set_named(AIR, Value::Int16(0)).unwrap();
        ids.set_named("stone", Value::Int16(1)).unwrap();
        let mut blocks = vec![0i16; CHUNK_VOLUME];
        blocks[0] = 1;
        let mut legacy = Container::new();
        legacy.set_named("ids", ids).unwrap();
        legacy.set_named("blocks", Value::Int16Array(blocks)).unwrap();
        legacy
            .set_named("rotation", Value::Int8Array(vec![0; CHUNK_VOLUME]))
            .unwrap();

        let chunk = Chunk::from_container(origin(), registry(), &legacy).unwrap();
        assert_eq!(chunk.get_block(SlotIndex::from_local(0, 0, 0)).unwrap().name(), "stone");
        assert!(chunk.get_block(SlotIndex::from_local(1, 0, 0)).is_none());
        assert_eq!(chunk.interned_names().collect::<Vec<_>>(), vec!["stone"]);
    }

    #[test]
    fn long_data_names_are_rejected_before_save() {
        let store = temp_store();
        let at = SlotIndex::from_local(1, 1, 1);
        let mut chunk = Chunk::new(origin(), registry());
        chunk.set_block(at, "dirt", 0).unwrap();
        let data = chunk.data_container_mut(at, true).unwrap();
        assert_eq!(
            data.set_named(&"h".repeat(300), Value::Int8(1)),
            Err(FormatError::NameTooLong(300))
        );
        assert!(chunk.save(&store).unwrap());
        assert!(!chunk.is_dirty());
        std::fs::remove_dir_all(store.dir()).ok();
    }

    #[test]
    fn unpersistable_block_name_is_refused() {
        let mut chunk = Chunk::new(origin(), registry());
        let at = SlotIndex::from_local(0, 0, 0);
        let long = "b".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            chunk.place_generated(at, &long),
            Err(WorldError::UnknownBlockType(_))
        ));
        assert!(chunk.get_block(at).is_none());
        assert!(chunk.to_container().is_ok());
    }

    #[test]
    fn unencodable_data_is_an_encode_error() {
        let store = temp_store();
        let at = SlotIndex::from_local(1, 1, 1);
        let mut chunk = Chunk::new(origin(), registry());
        chunk.set_block(at, "dirt", 0).unwrap();
        let mut deep = Container::new();
        for _ in 0..vx_format::MAX_DEPTH {
            let mut outer = Container::new();
            outer.push_value(deep);
            deep = outer;
        }
        chunk.data_container_mut(at, true).unwrap().push_value(deep);

        assert!(matches!(
            chunk.save(&store),
            Err(WorldError::Encode { .. })
        ));
        assert!(chunk.is_dirty());
        assert!(store.read(origin()).unwrap().is_none());
        std::fs::remove_dir_all(store.dir()).ok();
    }
}
