//! Work items consumed by the worker pools.
//!
//! Items address their chunk either directly (an `Arc` handle that is only valid
//! while it is still the registered instance) or by coordinate, re-resolved
//! against the registry when the item runs. Both forms resolve to nothing once
//! the chunk is gone, and the item is then dropped without error.

use std::fmt;
use std::sync::Arc;

use strata_core::{ChunkCoord, SegmentKey};
use strata_voxel::ChunkSegment;

use crate::chunk::Chunk;
use crate::registry::ChunkRegistry;

/// Chunk addressed by a work item.
#[derive(Clone)]
pub enum ChunkTarget {
    Direct(Arc<Chunk>),
    Position(ChunkCoord),
}

impl ChunkTarget {
    pub fn coord(&self) -> ChunkCoord {
        match self {
            Self::Direct(chunk) => chunk.coord(),
            Self::Position(coord) => *coord,
        }
    }

    /// The registered chunk this target refers to, if it still exists.
    pub fn resolve(&self, registry: &ChunkRegistry) -> Option<Arc<Chunk>> {
        match self {
            Self::Direct(chunk) => registry
                .get(chunk.coord())
                .filter(|current| Arc::ptr_eq(current, chunk)),
            Self::Position(coord) => registry.get(*coord),
        }
    }

    /// Whether running `self` also does the work `other` asks for.
    ///
    /// A position covers anything at its coordinate; a direct handle only covers
    /// the same chunk instance.
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Position(coord), _) => *coord == other.coord(),
            (Self::Direct(a), Self::Direct(b)) => Arc::ptr_eq(a, b),
            (Self::Direct(_), Self::Position(_)) => false,
        }
    }
}

impl From<ChunkCoord> for ChunkTarget {
    fn from(coord: ChunkCoord) -> Self {
        Self::Position(coord)
    }
}

impl From<Arc<Chunk>> for ChunkTarget {
    fn from(chunk: Arc<Chunk>) -> Self {
        Self::Direct(chunk)
    }
}

/// Segment addressed by a work item.
#[derive(Clone)]
pub enum SegmentTarget {
    Direct {
        chunk: Arc<Chunk>,
        segment: Arc<ChunkSegment>,
    },
    Position(SegmentKey),
}

impl SegmentTarget {
    pub fn key(&self) -> SegmentKey {
        match self {
            Self::Direct { segment, .. } => segment.key(),
            Self::Position(key) => *key,
        }
    }

    /// The registered chunk and its current segment, if both still exist.
    pub fn resolve(&self, registry: &ChunkRegistry) -> Option<(Arc<Chunk>, Arc<ChunkSegment>)> {
        match self {
            Self::Direct { chunk, segment } => {
                let current = ChunkTarget::Direct(Arc::clone(chunk)).resolve(registry)?;
                current
                    .segment(segment.index())
                    .filter(|live| Arc::ptr_eq(live, segment))
                    .map(|live| (current, live))
            }
            Self::Position(key) => {
                let chunk = registry.get(key.chunk)?;
                let segment = chunk.segment(key.index)?;
                Some((chunk, segment))
            }
        }
    }

    /// Whether running `self` also does the work `other` asks for.
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Position(key), _) => *key == other.key(),
            (
                Self::Direct { chunk, segment },
                Self::Direct {
                    chunk: other_chunk,
                    segment: other_segment,
                },
            ) => Arc::ptr_eq(chunk, other_chunk) && Arc::ptr_eq(segment, other_segment),
            (Self::Direct { .. }, Self::Position(_)) => false,
        }
    }
}

impl From<SegmentKey> for SegmentTarget {
    fn from(key: SegmentKey) -> Self {
        Self::Position(key)
    }
}

/// Deduplication key for remesh work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemeshKey {
    Chunk(ChunkCoord),
    Segment(SegmentKey),
}

/// One unit of background work.
#[derive(Clone)]
pub enum WorkItem {
    GenerateChunk(ChunkTarget),
    RemeshChunk(ChunkTarget),
    RemeshSegment(SegmentTarget),
    UnloadChunk(ChunkTarget),
}

impl WorkItem {
    /// Chunk column this item touches.
    pub fn coord(&self) -> ChunkCoord {
        match self {
            Self::GenerateChunk(target) | Self::RemeshChunk(target) | Self::UnloadChunk(target) => {
                target.coord()
            }
            Self::RemeshSegment(target) => target.key().chunk,
        }
    }

    /// Deduplication key, for remesh items only.
    pub fn remesh_key(&self) -> Option<RemeshKey> {
        match self {
            Self::RemeshChunk(target) => Some(RemeshKey::Chunk(target.coord())),
            Self::RemeshSegment(target) => Some(RemeshKey::Segment(target.key())),
            Self::GenerateChunk(_) | Self::UnloadChunk(_) => None,
        }
    }

    /// Whether running `self` also does the work `other` asks for.
    pub fn covers(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::GenerateChunk(a), Self::GenerateChunk(b))
            | (Self::RemeshChunk(a), Self::RemeshChunk(b))
            | (Self::UnloadChunk(a), Self::UnloadChunk(b)) => a.covers(b),
            (Self::RemeshSegment(a), Self::RemeshSegment(b)) => a.covers(b),
            _ => false,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            Self::GenerateChunk(_) => "generate",
            Self::RemeshChunk(_) => "remesh-chunk",
            Self::RemeshSegment(_) => "remesh-segment",
            Self::UnloadChunk(_) => "unload",
        }
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemeshSegment(target) => {
                let key = target.key();
                write!(f, "{} {} #{}", self.kind(), key.chunk, key.index)
            }
            _ => write!(f, "{} {}", self.kind(), self.coord()),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// How a work item finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The target no longer exists or is in the wrong state.
    Dropped,
}
