//! The world: concurrent chunk storage, eviction and block-level operations.
//!
//! One lock guards the chunk map, the unload queue and a two-entry cache of
//! recently resolved chunks. Each chunk sits behind its own lock. Locks are
//! always taken in the order storage, then chunk, then update queues; hooks
//! run with only their chunk locked and never reach back into the world.
//!
//! An evicted chunk moves to the unload queue and stays there for the grace
//! period. Asking for it again in that window puts the very same chunk back
//! in the map. Once the grace period is over it is saved and dropped.

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use vx_format::Container;

use crate::block_registry::{BlockRegistry, AIR};
use crate::chunk::{BlockView, Chunk};
use crate::config::WorldConfig;
use crate::error::WorldError;
use crate::generator::{self, ChunkGenerator};
use crate::pos::{BlockPos, ChunkPos, Face, CHUNK_EDGE};
use crate::queue::{QueueKind, UpdateQueues};
use crate::storage::ChunkStore;

/// Shared handle to a resident chunk.
pub type ChunkRef = Arc<Mutex<Chunk>>;

/// `queue_block` flushes once this many placements are pending.
pub const BLOCK_QUEUE_LIMIT: usize = 128;

/// Something that advances with the tick loop.
pub trait Entity: Send {
    fn game_tick(&mut self, elapsed: Duration);
}

/// Outcome of one [`World::evict_and_load_around`] step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResidencyStep {
    pub loaded: usize,
    pub evicted: usize,
    pub failed: usize,
}

// ─── Storage ────────────────────────────────────────────────────────────────

struct Unloading {
    key: u64,
    chunk: ChunkRef,
    since: Instant,
}

struct CacheSlot {
    key: u64,
    generation: u64,
    chunk: ChunkRef,
}

#[derive(Default)]
struct Storage {
    chunks: HashMap<u64, ChunkRef>,
    unload_queue: VecDeque<Unloading>,
    /// Direct-mapped on the lowest key bit.
    recent: [Option<CacheSlot>; 2],
    /// Bumped whenever a chunk leaves the map; older cache slots are stale.
    generation: u64,
    /// Positions whose last load failed. Skipped by the residency step.
    broken: HashSet<u64>,
}

impl Storage {
    fn cached(&self, key: u64) -> Option<ChunkRef> {
        match &self.recent[(key & 1) as usize] {
            Some(slot) if slot.key == key && slot.generation == self.generation => {
                Some(slot.chunk.clone())
            }
            _ => None,
        }
    }

    fn remember(&mut self, key: u64, chunk: &ChunkRef) {
        self.recent[(key & 1) as usize] = Some(CacheSlot {
            key,
            generation: self.generation,
            chunk: chunk.clone(),
        });
    }

    /// Resident chunk, rescuing it from the unload queue if needed.
    fn find(&mut self, pos: ChunkPos) -> Option<ChunkRef> {
        let key = pos.packed();
        if let Some(chunk) = self.cached(key) {
            return Some(chunk);
        }
        if let Some(chunk) = self.chunks.get(&key).cloned() {
            self.remember(key, &chunk);
            return Some(chunk);
        }
        let i = self.unload_queue.iter().position(|u| u.key == key)?;
        let rescued = self.unload_queue.remove(i)?;
        debug!("rescued {pos} from the unload queue");
        self.chunks.insert(key, rescued.chunk.clone());
        self.remember(key, &rescued.chunk);
        Some(rescued.chunk)
    }

    fn evict(&mut self, key: u64) -> bool {
        let Some(chunk) = self.chunks.remove(&key) else {
            return false;
        };
        self.generation += 1;
        self.unload_queue.push_back(Unloading {
            key,
            chunk,
            since: Instant::now(),
        });
        true
    }

    fn in_unload_queue(&self, key: u64) -> bool {
        self.unload_queue.iter().any(|u| u.key == key)
    }
}

// ─── World ──────────────────────────────────────────────────────────────────

struct QueuedBlock {
    pos: BlockPos,
    name: String,
    rotation: u8,
}

pub struct World {
    config: WorldConfig,
    registry: Arc<BlockRegistry>,
    store: ChunkStore,
    generator: Box<dyn ChunkGenerator>,
    storage: Mutex<Storage>,
    queues: UpdateQueues,
    focus: Mutex<BlockPos>,
    entities: Mutex<Vec<Box<dyn Entity>>>,
    block_queue: Mutex<Vec<QueuedBlock>>,
}

impl World {
    /// Open the world directory named in the config with its configured
    /// generator.
    pub fn open(config: WorldConfig, registry: Arc<BlockRegistry>) -> Result<Self, WorldError> {
        let generator = generator::from_config(&config)?;
        Self::with_generator(config, registry, generator)
    }

    pub fn with_generator(
        config: WorldConfig,
        registry: Arc<BlockRegistry>,
        generator: Box<dyn ChunkGenerator>,
    ) -> Result<Self, WorldError> {
        config.validate()?;
        let store = ChunkStore::open(&config.directory)?;
        info!(
            "opened world at {} ({} block types)",
            store.dir().display(),
            registry.len()
        );
        Ok(Self {
            config,
            registry,
            store,
            generator,
            storage: Mutex::new(Storage::default()),
            queues: UpdateQueues::new(),
            focus: Mutex::new(BlockPos::default()),
            entities: Mutex::new(Vec::new()),
            block_queue: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn queues(&self) -> &UpdateQueues {
        &self.queues
    }

    // ─── Chunk residency ────────────────────────────────────────────────────

    /// Resolve a chunk. With `allow_load` a missing chunk is read from disk
    /// or generated; without it, `Ok(None)` is returned instead.
    pub fn get_chunk(&self, pos: ChunkPos, allow_load: bool) -> Result<Option<ChunkRef>, WorldError> {
        pos.check()?;
        let mut storage = self.storage.lock();
        if let Some(chunk) = storage.find(pos) {
            return Ok(Some(chunk));
        }
        if !allow_load {
            return Ok(None);
        }
        self.load_locked(&mut storage, pos).map(Some)
    }

    /// Resolve a chunk, loading or generating it if needed.
    pub fn chunk(&self, pos: ChunkPos) -> Result<ChunkRef, WorldError> {
        pos.check()?;
        let mut storage = self.storage.lock();
        match storage.find(pos) {
            Some(chunk) => Ok(chunk),
            None => self.load_locked(&mut storage, pos),
        }
    }

    /// Resolve several chunks under a single lock acquisition.
    pub fn get_chunks(
        &self,
        positions: &[ChunkPos],
        allow_load: bool,
    ) -> Result<Vec<Option<ChunkRef>>, WorldError> {
        for &pos in positions {
            pos.check()?;
        }
        let mut storage = self.storage.lock();
        positions
            .iter()
            .map(|&pos| match storage.find(pos) {
                Some(chunk) => Ok(Some(chunk)),
                None if allow_load => self.load_locked(&mut storage, pos).map(Some),
                None => Ok(None),
            })
            .collect()
    }

    // Disk reads happen with the storage lock held, so every other chunk
    // lookup waits for them. Loads are rare next to lookups.
    fn load_locked(&self, storage: &mut Storage, pos: ChunkPos) -> Result<ChunkRef, WorldError> {
        let key = pos.packed();
        let mut chunk = Chunk::new(pos, self.registry.clone());
        if chunk.load(&self.store)? {
            debug!("loaded {pos} from disk");
        } else {
            self.generator.generate(&mut chunk)?;
            debug!("generated {pos}");
        }
        chunk.repaint_all_blocks();

        let chunk = Arc::new(Mutex::new(chunk));
        storage.chunks.insert(key, chunk.clone());
        storage.broken.remove(&key);
        storage.remember(key, &chunk);

        // Faces of resident neighbours that touch the new chunk may need new
        // geometry now.
        for face in Face::ALL {
            let neighbor = pos.neighbor(face);
            if neighbor.is_packable() && storage.chunks.contains_key(&neighbor.packed()) {
                self.queues
                    .enqueue_repaint(boundary_layer(neighbor, face.opposite()));
            }
        }
        Ok(chunk)
    }

    /// Move a resident chunk to the unload queue. Returns `false` if it was
    /// not resident.
    pub fn evict(&self, pos: ChunkPos) -> bool {
        let evicted = pos.is_packable() && self.storage.lock().evict(pos.packed());
        if evicted {
            debug!("evicted {pos}");
        }
        evicted
    }

    /// One bounded step towards the resident window around `center`: evict
    /// the farthest chunks outside it, then load the nearest missing ones.
    pub fn evict_and_load_around(&self, center: ChunkPos) -> ResidencyStep {
        let cfg = &self.config;
        let r = cfg.load_radius;
        let in_window = |p: ChunkPos| {
            (p.x - center.x).abs() <= r
                && (p.z - center.z).abs() <= r
                && (cfg.min_chunk_y..cfg.max_chunk_y).contains(&p.y)
        };

        let (mut missing, mut extra) = {
            let storage = self.storage.lock();
            let mut missing = Vec::new();
            for y in cfg.min_chunk_y..cfg.max_chunk_y {
                for z in center.z - r..=center.z + r {
                    for x in center.x - r..=center.x + r {
                        let p = ChunkPos::new(x, y, z);
                        if !p.is_packable() {
                            continue;
                        }
                        let key = p.packed();
                        if !storage.chunks.contains_key(&key) && !storage.broken.contains(&key) {
                            missing.push(p);
                        }
                    }
                }
            }
            let extra: Vec<ChunkPos> = storage
                .chunks
                .keys()
                .map(|&k| ChunkPos::from_packed(k))
                .filter(|&p| !in_window(p))
                .collect();
            (missing, extra)
        };
        missing.sort_by_key(|p| p.distance_sq(center));
        extra.sort_by_key(|p| Reverse(p.distance_sq(center)));

        let mut step = ResidencyStep::default();
        {
            let mut storage = self.storage.lock();
            for p in extra.into_iter().take(cfg.evictions_per_step) {
                if storage.evict(p.packed()) {
                    debug!("evicted {p}");
                    step.evicted += 1;
                }
            }
        }
        for p in missing.into_iter().take(cfg.loads_per_step) {
            match self.chunk(p) {
                Ok(_) => step.loaded += 1,
                Err(e) => {
                    error!("failed to load {p}: {e}");
                    self.storage.lock().broken.insert(p.packed());
                    step.failed += 1;
                }
            }
        }
        step
    }

    /// The dirty resident chunk saved longest ago, if it has been dirty for
    /// at least the configured minimum age.
    pub fn next_save_chunk(&self) -> Option<ChunkRef> {
        let storage = self.storage.lock();
        let mut oldest: Option<(Instant, ChunkRef)> = None;
        for chunk in storage.chunks.values() {
            // Busy chunks are picked up on a later pass.
            let Some(guard) = chunk.try_lock() else {
                continue;
            };
            if !guard.is_dirty() {
                continue;
            }
            let last = guard.last_save();
            if oldest.as_ref().map_or(true, |(t, _)| last < *t) {
                oldest = Some((last, chunk.clone()));
            }
        }
        let (last, chunk) = oldest?;
        if last.elapsed() < self.config.min_dirty_age() {
            return None;
        }
        Some(chunk)
    }

    /// Save the chunk chosen by [`World::next_save_chunk`]. Returns whether a
    /// chunk was written.
    ///
    /// A failed write keeps the chunk dirty and pushes its next attempt back
    /// by the minimum dirty age.
    pub fn save_next_chunk(&self) -> Result<bool, WorldError> {
        let Some(chunk) = self.next_save_chunk() else {
            return Ok(false);
        };
        let mut chunk = chunk.lock();
        match chunk.save(&self.store) {
            Ok(written) => Ok(written),
            Err(e) => {
                chunk.set_last_save(Instant::now());
                Err(e)
            }
        }
    }

    /// Save and drop the oldest unloading chunk once its grace period is
    /// over. Returns whether a chunk was freed.
    ///
    /// The write happens without the storage lock. The chunk stays queued
    /// meanwhile, so a rescue during the save gets this same chunk back. It
    /// is only dropped if it is still queued and still clean afterwards, and
    /// is retired first so late writers look it up again. If saving fails
    /// the chunk goes to the back of the queue with a fresh grace period.
    pub fn dequeue_unloaded_chunk(&self) -> Result<bool, WorldError> {
        let (key, chunk) = {
            let storage = self.storage.lock();
            let Some(front) = storage.unload_queue.front() else {
                return Ok(false);
            };
            if front.since.elapsed() < self.config.grace_period() {
                return Ok(false);
            }
            (front.key, front.chunk.clone())
        };

        let result = chunk.lock().save(&self.store);

        let mut storage = self.storage.lock();
        let Some(i) = storage
            .unload_queue
            .iter()
            .position(|u| Arc::ptr_eq(&u.chunk, &chunk))
        else {
            // Rescued while saving.
            return Ok(false);
        };
        match result {
            Ok(_) => {
                let mut saved = chunk.lock();
                // Edited through an older handle while saving; retried next time.
                if saved.is_dirty() {
                    return Ok(false);
                }
                saved.retire();
                drop(saved);
                storage.unload_queue.remove(i);
                debug!("freed {}", ChunkPos::from_packed(key));
                Ok(true)
            }
            Err(e) => {
                if let Some(mut unloading) = storage.unload_queue.remove(i) {
                    unloading.since = Instant::now();
                    storage.unload_queue.push_back(unloading);
                }
                Err(e)
            }
        }
    }

    /// Save every dirty chunk, resident or unloading. Keeps going after a
    /// failure and reports the first error.
    pub fn save_all(&self) -> Result<usize, WorldError> {
        let chunks: Vec<ChunkRef> = {
            let storage = self.storage.lock();
            storage
                .chunks
                .values()
                .cloned()
                .chain(storage.unload_queue.iter().map(|u| u.chunk.clone()))
                .collect()
        };
        let mut saved = 0;
        let mut first_err = None;
        for chunk in chunks {
            let mut chunk = chunk.lock();
            match chunk.save(&self.store) {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!("failed to save {}: {e}", chunk.pos());
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => {
                info!("saved {saved} chunks");
                Ok(saved)
            }
        }
    }

    pub fn is_loaded(&self, pos: ChunkPos) -> bool {
        pos.is_packable() && self.storage.lock().chunks.contains_key(&pos.packed())
    }

    pub fn in_unload_queue(&self, pos: ChunkPos) -> bool {
        pos.is_packable() && self.storage.lock().in_unload_queue(pos.packed())
    }

    pub fn unload_queue_len(&self) -> usize {
        self.storage.lock().unload_queue.len()
    }

    pub fn resident_count(&self) -> usize {
        self.storage.lock().chunks.len()
    }

    pub fn loaded_positions(&self) -> Vec<ChunkPos> {
        let storage = self.storage.lock();
        storage.chunks.keys().map(|&k| ChunkPos::from_packed(k)).collect()
    }

    /// Every chunk with a file on disk.
    pub fn known_chunks(&self) -> Result<Vec<ChunkPos>, WorldError> {
        self.store.list()
    }

    pub fn focus(&self) -> BlockPos {
        *self.focus.lock()
    }

    /// Centre of the resident window.
    pub fn set_focus(&self, pos: BlockPos) {
        *self.focus.lock() = pos;
    }

    // ─── Blocks ─────────────────────────────────────────────────────────────

    fn chunk_for(&self, pos: BlockPos) -> Result<ChunkRef, WorldError> {
        self.chunk(pos.check()?.chunk_pos())
    }

    /// Run `f` on the locked chunk holding `pos`, loading it if needed. A
    /// chunk retired between lookup and lock is looked up again.
    fn with_chunk<R>(
        &self,
        pos: BlockPos,
        f: impl FnOnce(&mut Chunk) -> R,
    ) -> Result<R, WorldError> {
        loop {
            let chunk = self.chunk_for(pos)?;
            let mut chunk = chunk.lock();
            if !chunk.is_retired() {
                return Ok(f(&mut *chunk));
            }
        }
    }

    /// Like [`World::with_chunk`], but `Ok(None)` when the chunk is not
    /// resident and `allow_load` is off.
    fn with_chunk_at<R>(
        &self,
        pos: ChunkPos,
        allow_load: bool,
        f: impl FnOnce(&mut Chunk) -> R,
    ) -> Result<Option<R>, WorldError> {
        loop {
            let Some(chunk) = self.get_chunk(pos, allow_load)? else {
                return Ok(None);
            };
            let mut chunk = chunk.lock();
            if !chunk.is_retired() {
                return Ok(Some(f(&mut *chunk)));
            }
        }
    }

    /// `None` for air.
    pub fn get_block(&self, pos: BlockPos) -> Result<Option<BlockView>, WorldError> {
        let chunk = self.chunk_for(pos)?;
        let block = chunk.lock().get_block(pos);
        Ok(block)
    }

    /// Like [`World::get_block`] but never loads; a position in a chunk that
    /// is not resident reads as `None`.
    pub fn get_block_if_loaded(&self, pos: BlockPos) -> Result<Option<BlockView>, WorldError> {
        let Some(chunk) = self.get_chunk(pos.check()?.chunk_pos(), false)? else {
            return Ok(None);
        };
        let block = chunk.lock().get_block(pos);
        Ok(block)
    }

    /// Resolve many blocks, taking the storage lock once.
    pub fn get_blocks(&self, positions: &[BlockPos]) -> Result<Vec<Option<BlockView>>, WorldError> {
        let chunk_positions = positions
            .iter()
            .map(|p| p.check().map(BlockPos::chunk_pos))
            .collect::<Result<Vec<_>, _>>()?;
        let chunks = self.get_chunks(&chunk_positions, true)?;
        Ok(positions
            .iter()
            .zip(chunks)
            .map(|(&pos, chunk)| chunk.and_then(|c| c.lock().get_block(pos)))
            .collect())
    }

    pub fn neighbor_block(&self, pos: BlockPos, face: Face) -> Result<Option<BlockView>, WorldError> {
        self.get_block(pos.neighbor(face))
    }

    /// Face neighbours in [`Face::ALL`] order.
    pub fn neighbor_blocks(&self, pos: BlockPos) -> Result<Vec<Option<BlockView>>, WorldError> {
        self.get_blocks(&pos.neighbors())
    }

    /// The 26 surrounding blocks; with `include_self` the block itself sits
    /// in the middle, at index 13.
    pub fn surrounding_blocks(
        &self,
        pos: BlockPos,
        include_self: bool,
    ) -> Result<Vec<Option<BlockView>>, WorldError> {
        self.get_blocks(&surrounding(pos, include_self))
    }

    /// Place a block and queue its 26 neighbours for a deferred update.
    ///
    /// No neighbour hook runs before this returns.
    pub fn set_block(&self, pos: BlockPos, name: &str, rotation: u8) -> Result<(), WorldError> {
        let follow_ups = self.with_chunk(pos, |chunk| {
            chunk.set_block(pos, name, rotation)?;
            Ok::<_, WorldError>(chunk.take_follow_ups())
        })??;
        let around = pos.surrounding();
        self.queues.enqueue_update(around, true);
        self.queues
            .enqueue_repaint(std::iter::once(pos).chain(around));
        if !follow_ups.is_empty() {
            self.queues.enqueue_update(follow_ups, true);
        }
        Ok(())
    }

    pub fn break_block(&self, pos: BlockPos) -> Result<(), WorldError> {
        self.set_block(pos, AIR, 0)
    }

    /// Buffer a placement; the buffer is flushed once it reaches
    /// [`BLOCK_QUEUE_LIMIT`] entries.
    pub fn queue_block(&self, pos: BlockPos, name: &str, rotation: u8) -> usize {
        let full = {
            let mut queue = self.block_queue.lock();
            queue.push(QueuedBlock {
                pos,
                name: name.to_string(),
                rotation,
            });
            queue.len() >= BLOCK_QUEUE_LIMIT
        };
        if full {
            self.flush_block_queue()
        } else {
            0
        }
    }

    /// Place every buffered block. Returns how many were placed; failures are
    /// logged and skipped.
    pub fn flush_block_queue(&self) -> usize {
        let pending = std::mem::take(&mut *self.block_queue.lock());
        let mut placed = 0;
        for block in pending {
            match self.set_block(block.pos, &block.name, block.rotation) {
                Ok(()) => placed += 1,
                Err(e) => warn!("queued placement of {} at {} failed: {e}", block.name, block.pos),
            }
        }
        placed
    }

    /// Hit a block: breaks it unless its hit hook consumes the hit. Returns
    /// whether the block was broken.
    pub fn hit_action(&self, pos: BlockPos, face: Face) -> Result<bool, WorldError> {
        let (present, consumed, follow_ups) = self.with_chunk(pos, |chunk| {
            let present = !chunk.is_air(pos);
            let consumed = present && chunk.hit_block(pos, face);
            (present, consumed, chunk.take_follow_ups())
        })?;
        self.queues.enqueue_update(follow_ups, true);
        if !present || consumed {
            return Ok(false);
        }
        self.break_block(pos)?;
        Ok(true)
    }

    /// Use a block: unless its use hook consumes the interaction, `placement`
    /// is set on the neighbour behind `face`, replacing whatever is there.
    /// An empty `placement` places nothing. Returns whether anything
    /// happened.
    pub fn use_action(
        &self,
        pos: BlockPos,
        face: Face,
        placement: &str,
        rotation: u8,
    ) -> Result<bool, WorldError> {
        let (consumed, follow_ups) = self.with_chunk(pos, |chunk| {
            let consumed = !chunk.is_air(pos) && chunk.use_block(pos, face);
            (consumed, chunk.take_follow_ups())
        })?;
        self.queues.enqueue_update(follow_ups, true);
        if consumed {
            return Ok(true);
        }
        if placement.is_empty() {
            return Ok(false);
        }
        self.set_block(pos.neighbor(face), placement, rotation)?;
        Ok(true)
    }

    /// Run `f` on a block's data container, creating it when `create` is
    /// set. The chunk is marked dirty whenever `f` runs.
    pub fn with_data_container<R>(
        &self,
        pos: BlockPos,
        create: bool,
        f: impl FnOnce(&mut Container) -> R,
    ) -> Result<Option<R>, WorldError> {
        self.with_chunk(pos, |chunk| {
            let container = chunk.data_container_mut(pos, create)?;
            let result = f(container);
            chunk.mark_data_modified(pos);
            Some(result)
        })
    }

    /// Copy of a block's data container.
    pub fn data_container(&self, pos: BlockPos) -> Result<Option<Container>, WorldError> {
        let chunk = self.chunk_for(pos)?;
        let container = chunk.lock().data_container(pos).cloned();
        Ok(container)
    }

    // ─── Deferred work ──────────────────────────────────────────────────────

    pub fn update_block(&self, pos: BlockPos, allow_load: bool) {
        self.queues.enqueue_update([pos], allow_load);
    }

    pub fn update_blocks(&self, positions: impl IntoIterator<Item = BlockPos>, allow_load: bool) {
        self.queues.enqueue_update(positions, allow_load);
    }

    pub fn update_surrounding(&self, pos: BlockPos, include_self: bool, allow_load: bool) {
        self.queues
            .enqueue_update(surrounding(pos, include_self), allow_load);
    }

    pub fn repaint_block(&self, pos: BlockPos) {
        self.queues.enqueue_repaint([pos]);
    }

    pub fn repaint_blocks(&self, positions: impl IntoIterator<Item = BlockPos>) {
        self.queues.enqueue_repaint(positions);
    }

    pub fn repaint_surrounding(&self, pos: BlockPos, include_self: bool) {
        self.queues.enqueue_repaint(surrounding(pos, include_self));
    }

    /// Process up to `budget` positions from each queue. Positions are only
    /// removed after they were processed. Returns how many were processed.
    pub fn flush_updates(&self, budget: usize) -> usize {
        let mut processed = 0;
        let mut follow_ups = Vec::new();
        for kind in QueueKind::ALL {
            let batch = self.queues.snapshot(kind, budget);
            if batch.is_empty() {
                continue;
            }
            for pending in &batch {
                let pos = pending.pos;
                if !pos.is_packable() {
                    continue;
                }
                let done = self.with_chunk_at(pos.chunk_pos(), kind.allows_load(), |chunk| {
                    match kind {
                        QueueKind::Repaint => chunk.repaint_block(pos),
                        QueueKind::Update | QueueKind::UpdateNoLoad => {
                            chunk.update_block(pos);
                            follow_ups.extend(chunk.take_follow_ups());
                        }
                    }
                });
                match done {
                    Ok(Some(())) => processed += 1,
                    Ok(None) => {}
                    Err(e) => warn!("dropping queued update at {pos}: {e}"),
                }
            }
            self.queues.complete(kind, &batch);
        }
        if !follow_ups.is_empty() {
            self.queues.enqueue_update(follow_ups, true);
        }
        processed
    }

    // ─── Ticking ────────────────────────────────────────────────────────────

    pub fn add_entity(&self, entity: Box<dyn Entity>) {
        self.entities.lock().push(entity);
    }

    pub fn entity_count(&self) -> usize {
        self.entities.lock().len()
    }

    /// Tick every resident chunk, then every entity.
    pub fn tick_everything(&self, elapsed: Duration) {
        let chunks: Vec<ChunkRef> = self.storage.lock().chunks.values().cloned().collect();
        let mut follow_ups = Vec::new();
        for chunk in chunks {
            let mut chunk = chunk.lock();
            if chunk.is_retired() {
                continue;
            }
            chunk.tick_all_blocks(elapsed);
            follow_ups.extend(chunk.take_follow_ups());
        }
        if !follow_ups.is_empty() {
            self.queues.enqueue_update(follow_ups, true);
        }
        for entity in self.entities.lock().iter_mut() {
            entity.game_tick(elapsed);
        }
    }
}

/// The blocks of `chunk` on its `face` side.
fn boundary_layer(chunk: ChunkPos, face: Face) -> impl Iterator<Item = BlockPos> {
    let origin = chunk.origin();
    let last = CHUNK_EDGE - 1;
    (0..CHUNK_EDGE).flat_map(move |a| {
        (0..CHUNK_EDGE).map(move |b| {
            let (x, y, z) = match face {
                Face::Down => (a, 0, b),
                Face::Up => (a, last, b),
                Face::North => (a, b, 0),
                Face::South => (a, b, last),
                Face::West => (0, a, b),
                Face::East => (last, a, b),
            };
            origin.offset(x, y, z)
        })
    })
}

fn surrounding(pos: BlockPos, include_self: bool) -> Vec<BlockPos> {
    let mut out = pos.surrounding().to_vec();
    if include_self {
        out.insert(13, pos);
    }
    out
}
