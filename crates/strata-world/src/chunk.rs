//! Chunk columns: a sparse vertical stack of segments at one (X, Z) coordinate.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use glam::{IVec3, Vec3};
use parking_lot::RwLock;
use strata_core::constants::{SEGMENT_BITS, SEGMENT_MASK, SEGMENT_SIZE};
use strata_core::coords::SEGMENT_EXTENT;
use strata_core::math::Aabb;
use strata_core::{Block, ChunkCoord, SegmentKey};
use strata_voxel::ChunkSegment;

/// State of a chunk in the streaming pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChunkState {
    /// Registered, no blocks yet.
    #[default]
    Spawned = 0,
    /// Generation is running.
    Loading = 1,
    /// Blocks populated.
    Loaded = 2,
    /// Marked for eviction, still readable.
    QueuedForUnload = 3,
    /// Being removed from the registry.
    Unloading = 4,
    /// Removed; any remaining handle is stale.
    Destroyed = 5,
}

impl ChunkState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Spawned,
            1 => Self::Loading,
            2 => Self::Loaded,
            3 => Self::QueuedForUnload,
            4 => Self::Unloading,
            _ => Self::Destroyed,
        }
    }
}

/// World-space bounds of a chunk column of `height` blocks.
pub fn column_bounds(coord: ChunkCoord, block_scale: f32, height: f32) -> Aabb {
    let min = coord.min_block(0).to_vec3() * block_scale;
    let size = Vec3::new(SEGMENT_EXTENT, height, SEGMENT_EXTENT) * block_scale;
    Aabb::new(min, min + size)
}

/// A vertical column of segments.
///
/// Segment `i` covers chunk-relative Y in `[i * S, i * S + S)`. The segment array
/// only grows on edits; slots never written stay `None` and read as air.
pub struct Chunk {
    coord: ChunkCoord,
    state: AtomicU8,
    segments: RwLock<Vec<Option<Arc<ChunkSegment>>>>,
}

impl Chunk {
    /// Create an empty chunk in the [`ChunkState::Spawned`] state.
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            state: AtomicU8::new(ChunkState::Spawned as u8),
            segments: RwLock::new(Vec::new()),
        }
    }

    #[inline]
    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn state(&self) -> ChunkState {
        ChunkState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move from `from` to `to` if the chunk is currently in `from`.
    pub fn transition(&self, from: ChunkState, to: ChunkState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn set_state(&self, state: ChunkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Length of the segment array, including empty slots.
    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Segment at vertical index `index`, or `None` if out of range or never written.
    pub fn segment(&self, index: usize) -> Option<Arc<ChunkSegment>> {
        self.segments.read().get(index).cloned().flatten()
    }

    /// Segment containing chunk-relative `y`.
    pub fn segment_at_y(&self, y: i32) -> Option<Arc<ChunkSegment>> {
        if y < 0 {
            return None;
        }
        self.segment((y >> SEGMENT_BITS) as usize)
    }

    /// All allocated segments, bottom to top.
    pub fn segments(&self) -> Vec<Arc<ChunkSegment>> {
        self.segments.read().iter().flatten().cloned().collect()
    }

    /// Block at a chunk-relative position; air outside the column or in unallocated segments.
    pub fn get_block(&self, local: IVec3) -> Option<Block> {
        let (index, x, y, z) = split_local(local)?;
        self.segment(index)
            .and_then(|segment| segment.get_block(x, y, z))
    }

    /// Store a block at a chunk-relative position.
    ///
    /// Grows the segment array as needed. Returns the index of the segment that
    /// changed, or `None` if nothing changed.
    pub fn set_block(&self, local: IVec3, block: Option<Block>) -> Option<usize> {
        let (index, x, y, z) = split_local(local)?;

        {
            let segments = self.segments.read();
            if let Some(Some(segment)) = segments.get(index) {
                return segment.set_block(x, y, z, block).then_some(index);
            }
            if block.is_none() {
                return None;
            }
        }

        let mut segments = self.segments.write();
        if segments.len() <= index {
            segments.resize(index + 1, None);
        }
        let key = SegmentKey::new(self.coord, index);
        let segment = segments[index].get_or_insert_with(|| Arc::new(ChunkSegment::new(key)));
        segment.set_block(x, y, z, block).then_some(index)
    }

    /// Drop segments that no longer hold any block, returning their keys.
    ///
    /// The array keeps its length; released slots become `None`.
    pub fn release_empty_segments(&self) -> Vec<SegmentKey> {
        let mut segments = self.segments.write();
        let mut released = Vec::new();
        for slot in segments.iter_mut() {
            if slot.as_ref().is_some_and(|segment| segment.is_empty()) {
                if let Some(segment) = slot.take() {
                    released.push(segment.key());
                }
            }
        }
        released
    }

    /// Total non-air blocks across all segments.
    pub fn block_count(&self) -> usize {
        self.segments
            .read()
            .iter()
            .flatten()
            .map(|segment| segment.block_count())
            .sum()
    }

    /// World-space bounds, at least `height_hint` blocks tall.
    pub fn bounds(&self, block_scale: f32, height_hint: i32) -> Aabb {
        let built = (self.segment_count() * SEGMENT_SIZE) as i32;
        column_bounds(self.coord, block_scale, built.max(height_hint) as f32)
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("coord", &self.coord)
            .field("state", &self.state())
            .field("segments", &self.segment_count())
            .finish()
    }
}

/// Split a chunk-relative position into (segment index, segment-local x, y, z).
#[inline]
fn split_local(local: IVec3) -> Option<(usize, i32, i32, i32)> {
    let range = 0..SEGMENT_SIZE as i32;
    if local.y < 0 || !range.contains(&local.x) || !range.contains(&local.z) {
        return None;
    }
    Some((
        (local.y >> SEGMENT_BITS) as usize,
        local.x,
        local.y & SEGMENT_MASK,
        local.z,
    ))
}
