//! Mesh delivery to the render side.

use std::sync::Arc;

use hashbrown::HashSet;
use strata_core::{ChunkCoord, SegmentKey};
use strata_voxel::SegmentMesh;

/// Something the renderer should apply.
#[derive(Clone, Debug)]
pub enum RenderUpdate {
    /// Newest mesh for a segment. An empty mesh means "hide this segment".
    Mesh {
        key: SegmentKey,
        mesh: Arc<SegmentMesh>,
    },
    /// The chunk was unloaded; free everything drawn for it.
    Released { coord: ChunkCoord },
}

/// Pending notifications, drained once per tick.
#[derive(Default)]
pub(crate) struct RenderOutbox {
    /// Segments whose latest-mesh slot was filled since the last drain.
    pub ready: HashSet<SegmentKey>,
    /// Empty meshes standing in for released segments.
    pub released_segments: Vec<Arc<SegmentMesh>>,
    pub released_chunks: Vec<ChunkCoord>,
}

impl RenderOutbox {
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty() && self.released_segments.is_empty() && self.released_chunks.is_empty()
    }
}
