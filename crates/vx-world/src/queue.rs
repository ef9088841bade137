//! Deduplicated pending-work sets.
//!
//! Each set maps a position to the sequence number of its most recent
//! enqueue. A flush takes a snapshot, processes it, then removes only the
//! entries whose sequence number is unchanged; a position enqueued again
//! while the flush was running stays queued for the next one.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::pos::BlockPos;

/// Which set a position belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// Update, loading the owning chunk if needed.
    Update,
    /// Update only if the owning chunk is already resident.
    UpdateNoLoad,
    /// Mark visually dirty; never loads.
    Repaint,
}

impl QueueKind {
    pub const ALL: [QueueKind; 3] = [QueueKind::Update, QueueKind::UpdateNoLoad, QueueKind::Repaint];

    pub fn allows_load(self) -> bool {
        matches!(self, QueueKind::Update)
    }
}

/// A position taken from a set together with the sequence number it had.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending {
    pub pos: BlockPos,
    seq: u64,
}

#[derive(Default)]
struct QueueState {
    next_seq: u64,
    update: HashMap<BlockPos, u64>,
    update_no_load: HashMap<BlockPos, u64>,
    repaint: HashMap<BlockPos, u64>,
}

impl QueueState {
    fn set(&mut self, kind: QueueKind) -> &mut HashMap<BlockPos, u64> {
        match kind {
            QueueKind::Update => &mut self.update,
            QueueKind::UpdateNoLoad => &mut self.update_no_load,
            QueueKind::Repaint => &mut self.repaint,
        }
    }
}

/// The three pending-work sets behind one lock.
#[derive(Default)]
pub struct UpdateQueues {
    state: Mutex<QueueState>,
}

impl UpdateQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, kind: QueueKind, positions: impl IntoIterator<Item = BlockPos>) {
        let mut state = self.state.lock();
        for pos in positions {
            state.next_seq += 1;
            let seq = state.next_seq;
            state.set(kind).insert(pos, seq);
        }
    }

    pub fn enqueue_update(&self, positions: impl IntoIterator<Item = BlockPos>, allow_load: bool) {
        let kind = if allow_load {
            QueueKind::Update
        } else {
            QueueKind::UpdateNoLoad
        };
        self.enqueue(kind, positions);
    }

    pub fn enqueue_repaint(&self, positions: impl IntoIterator<Item = BlockPos>) {
        self.enqueue(QueueKind::Repaint, positions);
    }

    /// Copy up to `budget` entries of a set without removing them.
    pub fn snapshot(&self, kind: QueueKind, budget: usize) -> Vec<Pending> {
        let mut state = self.state.lock();
        state
            .set(kind)
            .iter()
            .take(budget)
            .map(|(&pos, &seq)| Pending { pos, seq })
            .collect()
    }

    /// Remove processed entries that were not enqueued again meanwhile.
    pub fn complete(&self, kind: QueueKind, done: &[Pending]) {
        let mut state = self.state.lock();
        let set = state.set(kind);
        for p in done {
            if set.get(&p.pos) == Some(&p.seq) {
                set.remove(&p.pos);
            }
        }
    }

    pub fn len(&self, kind: QueueKind) -> usize {
        self.state.lock().set(kind).len()
    }

    pub fn contains(&self, kind: QueueKind, pos: BlockPos) -> bool {
        self.state.lock().set(kind).contains_key(&pos)
    }

    pub fn is_empty(&self) -> bool {
        let mut state = self.state.lock();
        QueueKind::ALL.iter().all(|&k| state.set(k).is_empty())
    }
}
