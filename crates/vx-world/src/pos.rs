//! Block and chunk coordinates, slot indices and 64-bit packing.
//!
//! Block keys pack X and Z into 26 bits each and Y into 12 bits
//! (`x | z << 26 | y << 52`). Chunk keys use the same layout shifted down by
//! [`CHUNK_SHIFT`]: 22/22/8 bits. Both are two's complement per field and
//! sign-extended again when unpacked.

use std::fmt;
use std::str::FromStr;

use crate::error::WorldError;

/// log2 of the chunk edge length.
pub const CHUNK_SHIFT: u32 = 4;
/// Blocks per chunk edge.
pub const CHUNK_EDGE: i32 = 1 << CHUNK_SHIFT;
/// Blocks per chunk.
pub const CHUNK_VOLUME: usize = 1 << (3 * CHUNK_SHIFT);

const CHUNK_MASK: i32 = CHUNK_EDGE - 1;

const XZ_BITS: u32 = 26;
const Y_BITS: u32 = 12;

// ─── Bit-field helpers ──────────────────────────────────────────────────────

fn field_fits(v: i32, bits: u32) -> bool {
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << (bits - 1)) - 1;
    (min..=max).contains(&(v as i64))
}

fn put_field(v: i32, bits: u32) -> u64 {
    (v as i64 as u64) & ((1u64 << bits) - 1)
}

fn take_field(key: u64, shift: u32, bits: u32) -> i32 {
    // Move the field to the top, then arithmetic-shift back down to sign-extend.
    let top = (key << (64 - shift - bits)) as i64;
    (top >> (64 - bits)) as i32
}

fn pack_fields(x: i32, y: i32, z: i32, xz_bits: u32, y_bits: u32) -> u64 {
    put_field(x, xz_bits) | put_field(z, xz_bits) << xz_bits | put_field(y, y_bits) << (2 * xz_bits)
}

fn unpack_fields(key: u64, xz_bits: u32, y_bits: u32) -> (i32, i32, i32) {
    (
        take_field(key, 0, xz_bits),
        take_field(key, 2 * xz_bits, y_bits),
        take_field(key, xz_bits, xz_bits),
    )
}

// ─── Face ───────────────────────────────────────────────────────────────────

/// One of the six faces of a block. `opposite()` flips the lowest bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Face {
    Down = 0,
    Up = 1,
    /// -Z
    North = 2,
    /// +Z
    South = 3,
    /// -X
    West = 4,
    /// +X
    East = 5,
}

impl Face {
    pub const ALL: [Face; 6] = [
        Face::Down,
        Face::Up,
        Face::North,
        Face::South,
        Face::West,
        Face::East,
    ];

    /// Mask with every face bit set.
    pub const ALL_MASK: u8 = 0b11_1111;

    pub fn opposite(self) -> Face {
        Face::ALL[(self as usize) ^ 1]
    }

    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Face::Down => (0, -1, 0),
            Face::Up => (0, 1, 0),
            Face::North => (0, 0, -1),
            Face::South => (0, 0, 1),
            Face::West => (-1, 0, 0),
            Face::East => (1, 0, 0),
        }
    }

    pub fn mask(self) -> u8 {
        1 << self as u8
    }
}

// ─── SlotIndex ──────────────────────────────────────────────────────────────

/// Index of one block inside a chunk's flat arrays: `x | z << 4 | y << 8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(u16);

impl SlotIndex {
    /// Local coordinates are masked to the chunk edge.
    pub fn from_local(x: i32, y: i32, z: i32) -> Self {
        let x = (x & CHUNK_MASK) as u16;
        let y = (y & CHUNK_MASK) as u16;
        let z = (z & CHUNK_MASK) as u16;
        SlotIndex(x | z << CHUNK_SHIFT | y << (2 * CHUNK_SHIFT))
    }

    /// `None` if `index` is not below [`CHUNK_VOLUME`].
    pub fn new(index: usize) -> Option<Self> {
        (index < CHUNK_VOLUME).then_some(SlotIndex(index as u16))
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn local(self) -> (i32, i32, i32) {
        let v = self.0 as i32;
        (
            v & CHUNK_MASK,
            (v >> (2 * CHUNK_SHIFT)) & CHUNK_MASK,
            (v >> CHUNK_SHIFT) & CHUNK_MASK,
        )
    }

    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..CHUNK_VOLUME as u16).map(SlotIndex)
    }
}

// ─── BlockPos ───────────────────────────────────────────────────────────────

/// World position of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }

    /// Floor division by the chunk edge, correct for negative coordinates.
    pub fn chunk_pos(self) -> ChunkPos {
        ChunkPos::new(
            self.x >> CHUNK_SHIFT,
            self.y >> CHUNK_SHIFT,
            self.z >> CHUNK_SHIFT,
        )
    }

    pub fn slot(self) -> SlotIndex {
        SlotIndex::from_local(self.x, self.y, self.z)
    }

    pub fn is_packable(self) -> bool {
        field_fits(self.x, XZ_BITS) && field_fits(self.z, XZ_BITS) && field_fits(self.y, Y_BITS)
    }

    /// Pack into a 64-bit key. Outside the packable range fields would wrap,
    /// so callers at the boundary use [`BlockPos::checked_packed`].
    pub fn packed(self) -> u64 {
        debug_assert!(self.is_packable(), "{self} is not packable");
        pack_fields(self.x, self.y, self.z, XZ_BITS, Y_BITS)
    }

    pub fn checked_packed(self) -> Result<u64, WorldError> {
        self.check()?;
        Ok(pack_fields(self.x, self.y, self.z, XZ_BITS, Y_BITS))
    }

    /// Reject positions outside the packable range.
    pub fn check(self) -> Result<Self, WorldError> {
        if self.is_packable() {
            Ok(self)
        } else {
            Err(WorldError::OutOfRange {
                x: self.x,
                y: self.y,
                z: self.z,
            })
        }
    }

    pub fn from_packed(key: u64) -> Self {
        let (x, y, z) = unpack_fields(key, XZ_BITS, Y_BITS);
        Self::new(x, y, z)
    }

    pub fn neighbor(self, face: Face) -> Self {
        let (dx, dy, dz) = face.offset();
        self.offset(dx, dy, dz)
    }

    /// Face neighbours in [`Face::ALL`] order.
    pub fn neighbors(self) -> [BlockPos; 6] {
        Face::ALL.map(|f| self.neighbor(f))
    }

    /// The 26 positions around this one, ordered by y, then z, then x, each
    /// from -1 to +1, with the centre skipped.
    pub fn surrounding(self) -> [BlockPos; 26] {
        let mut out = [self; 26];
        let mut i = 0;
        for dy in -1..=1 {
            for dz in -1..=1 {
                for dx in -1..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    out[i] = self.offset(dx, dy, dz);
                    i += 1;
                }
            }
        }
        out
    }
}

impl From<BlockPos> for SlotIndex {
    fn from(pos: BlockPos) -> Self {
        pos.slot()
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

// ─── ChunkPos ───────────────────────────────────────────────────────────────

/// Position of a chunk, in chunk units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChunkPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The block with the lowest coordinates in this chunk.
    pub fn origin(self) -> BlockPos {
        BlockPos::new(
            self.x << CHUNK_SHIFT,
            self.y << CHUNK_SHIFT,
            self.z << CHUNK_SHIFT,
        )
    }

    pub fn block_at(self, slot: SlotIndex) -> BlockPos {
        let (x, y, z) = slot.local();
        self.origin().offset(x, y, z)
    }

    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }

    pub fn neighbor(self, face: Face) -> Self {
        let (dx, dy, dz) = face.offset();
        self.offset(dx, dy, dz)
    }

    pub fn is_packable(self) -> bool {
        field_fits(self.x, XZ_BITS - CHUNK_SHIFT)
            && field_fits(self.z, XZ_BITS - CHUNK_SHIFT)
            && field_fits(self.y, Y_BITS - CHUNK_SHIFT)
    }

    /// Reject chunks outside the packable range. The error carries the
    /// chunk's origin block.
    pub fn check(self) -> Result<Self, WorldError> {
        if self.is_packable() {
            Ok(self)
        } else {
            let origin = self.origin();
            Err(WorldError::OutOfRange {
                x: origin.x,
                y: origin.y,
                z: origin.z,
            })
        }
    }

    pub fn packed(self) -> u64 {
        debug_assert!(self.is_packable(), "{self} is not packable");
        pack_fields(
            self.x,
            self.y,
            self.z,
            XZ_BITS - CHUNK_SHIFT,
            Y_BITS - CHUNK_SHIFT,
        )
    }

    pub fn from_packed(key: u64) -> Self {
        let (x, y, z) = unpack_fields(key, XZ_BITS - CHUNK_SHIFT, Y_BITS - CHUNK_SHIFT);
        Self::new(x, y, z)
    }

    pub fn distance_sq(self, other: ChunkPos) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dy = (self.y - other.y) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dy * dy + dz * dz
    }
}

/// Canonical file name form, `chunk(X,Y,Z)`.
impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chunk({},{},{})", self.x, self.y, self.z)
    }
}

impl FromStr for ChunkPos {
    type Err = WorldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || WorldError::Config(format!("not a chunk name: {s}"));
        let inner = s
            .strip_prefix("chunk(")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(bad)?;
        let mut parts = inner.split(',').map(|p| p.trim().parse::<i32>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Ok(ChunkPos::new(x, y, z)),
            _ => Err(bad()),
        }
    }
}
