//! Coordinate systems for the voxel world.
//!
//! Three spaces are in play:
//! - world block coordinates ([`WorldPos`]), unbounded in all axes,
//! - chunk column coordinates ([`ChunkCoord`]), one per (X, Z) column of segments,
//! - segment coordinates ([`SegmentKey`] plus a local offset in `[0, SEGMENT_SIZE)`).

use crate::constants::{SEGMENT_BITS, SEGMENT_MASK, SEGMENT_SIZE};
use bytemuck::{Pod, Zeroable};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Horizontal position of a chunk column in chunk units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Offset this coordinate by whole chunks
    #[inline]
    pub const fn offset(self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }

    /// The four lateral neighbours (-X, +X, -Z, +Z)
    pub const fn neighbors(self) -> [Self; 4] {
        [
            self.offset(-1, 0),
            self.offset(1, 0),
            self.offset(0, -1),
            self.offset(0, 1),
        ]
    }

    /// Chunk column containing a point given in block units.
    #[inline]
    pub fn containing(point: Vec3) -> Self {
        WorldPos::from(point).chunk_coord()
    }

    /// World block coordinates of this column's minimum corner at `y`.
    #[inline]
    pub const fn min_block(self, y: i32) -> WorldPos {
        WorldPos::new(self.x << SEGMENT_BITS, y, self.z << SEGMENT_BITS)
    }

    /// Squared euclidean distance to another column, in chunks.
    #[inline]
    pub const fn distance_sq(self, other: Self) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Address of one segment: a chunk column plus the vertical segment index.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub chunk: ChunkCoord,
    pub index: usize,
}

impl SegmentKey {
    #[inline]
    pub const fn new(chunk: ChunkCoord, index: usize) -> Self {
        Self { chunk, index }
    }

    /// World block coordinates of the segment's minimum corner.
    #[inline]
    pub const fn origin(self) -> WorldPos {
        self.chunk.min_block((self.index as i32) << SEGMENT_BITS)
    }
}

/// World position in block coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl WorldPos {
    /// Create a new world position
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Get the chunk column containing this position
    #[inline]
    pub const fn chunk_coord(self) -> ChunkCoord {
        // Arithmetic shift floors towards negative infinity, so -1 lands in chunk -1.
        ChunkCoord::new(self.x >> SEGMENT_BITS, self.z >> SEGMENT_BITS)
    }

    /// Position relative to the owning chunk column.
    ///
    /// X and Z are in `[0, SEGMENT_SIZE)`; Y is passed through unchanged.
    #[inline]
    pub const fn chunk_local(self) -> IVec3 {
        IVec3::new(self.x & SEGMENT_MASK, self.y, self.z & SEGMENT_MASK)
    }

    /// Split into chunk column and chunk-relative position
    #[inline]
    pub const fn split(self) -> (ChunkCoord, IVec3) {
        (self.chunk_coord(), self.chunk_local())
    }

    /// Create from chunk column and chunk-relative position
    #[inline]
    pub const fn from_chunk_local(chunk: ChunkCoord, local: IVec3) -> Self {
        Self::new(
            (chunk.x << SEGMENT_BITS) + local.x,
            local.y,
            (chunk.z << SEGMENT_BITS) + local.z,
        )
    }

    /// Index of the segment containing this position's Y, if Y is non-negative.
    #[inline]
    pub const fn segment_index(self) -> Option<usize> {
        if self.y < 0 {
            None
        } else {
            Some((self.y >> SEGMENT_BITS) as usize)
        }
    }

    /// Offset by a block delta
    #[inline]
    pub const fn offset(self, delta: IVec3) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.z + delta.z)
    }

    /// Convert to glam IVec3
    #[inline]
    pub const fn to_ivec3(self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }

    /// Convert to floating point Vec3
    #[inline]
    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }
}

impl From<IVec3> for WorldPos {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<Vec3> for WorldPos {
    fn from(v: Vec3) -> Self {
        Self::new(v.x.floor() as i32, v.y.floor() as i32, v.z.floor() as i32)
    }
}

/// Length of a chunk column edge in blocks, as a float.
pub const SEGMENT_EXTENT: f32 = SEGMENT_SIZE as f32;
