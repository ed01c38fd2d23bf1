//! World facade: block access, edits and chunk spawning.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{IVec3, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strata_core::constants::SEGMENT_SIZE;
use strata_core::{Block, ChunkCoord, Error, Result, SegmentKey, WorldPos};
use strata_voxel::{ChunkSegment, SegmentMesh, SegmentGeometry};
use tracing::{debug, trace, warn};

use crate::chunk::Chunk;
use crate::handoff::{RenderOutbox, RenderUpdate};
use crate::queue::WorkQueues;
use crate::raycast::{raycast, RayHit};
use crate::registry::ChunkRegistry;
use crate::work::{ChunkTarget, WorkItem};

const LAST: i32 = SEGMENT_SIZE as i32 - 1;

/// World-wide settings fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// World units per block edge.
    pub block_scale: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self { block_scale: 10.0 }
    }
}

impl WorldConfig {
    #[must_use]
    pub fn with_block_scale(mut self, block_scale: f32) -> Self {
        self.block_scale = block_scale;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.block_scale.is_finite() || self.block_scale <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "block_scale must be positive, got {}",
                self.block_scale
            )));
        }
        Ok(())
    }
}

/// Which remesh work an edit schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    /// Remesh the edited segment.
    pub remesh_self: bool,
    /// Remesh segments whose boundary faces touch the edited cell.
    pub remesh_neighbors: bool,
}

impl EditOptions {
    /// Interactive edits: remesh everything the edit can affect.
    pub const INTERACTIVE: Self = Self {
        remesh_self: true,
        remesh_neighbors: true,
    };
    /// Bulk writes that are meshed later as a whole.
    pub const SILENT: Self = Self {
        remesh_self: false,
        remesh_neighbors: false,
    };
}

impl Default for EditOptions {
    fn default() -> Self {
        Self::INTERACTIVE
    }
}

/// The voxel world: chunk registry, work queues and render outbox.
///
/// Shared between the driver thread and every worker through an `Arc`.
pub struct World {
    config: WorldConfig,
    registry: ChunkRegistry,
    queues: WorkQueues,
    outbox: Mutex<RenderOutbox>,
    meshes_built: AtomicU64,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            registry: ChunkRegistry::new(),
            queues: WorkQueues::new(),
            outbox: Mutex::new(RenderOutbox::default()),
            meshes_built: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn registry(&self) -> &ChunkRegistry {
        &self.registry
    }

    pub fn queues(&self) -> &WorkQueues {
        &self.queues
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<Arc<Chunk>> {
        self.registry.get(coord)
    }

    pub fn segment(&self, key: SegmentKey) -> Option<Arc<ChunkSegment>> {
        self.registry.get(key.chunk)?.segment(key.index)
    }

    /// Block at a world position. Unloaded chunks and negative Y read as air.
    pub fn get_block(&self, pos: WorldPos) -> Option<Block> {
        let (coord, local) = pos.split();
        self.registry.get(coord)?.get_block(local)
    }

    /// Strict lookup that tells "air" apart from "nothing there to read".
    pub fn try_get_block(&self, pos: WorldPos) -> Result<Option<Block>> {
        if pos.y < 0 {
            return Err(Error::OutOfBounds(format!("y = {} is below the world", pos.y)));
        }
        let (coord, local) = pos.split();
        let chunk = self.registry.get(coord).ok_or(Error::ChunkNotLoaded(coord))?;
        Ok(chunk.get_block(local))
    }

    /// Interactive edit; see [`World::set_block_with`].
    pub fn set_block(&self, pos: WorldPos, block: Option<Block>) -> bool {
        self.set_block_with(pos, block, EditOptions::INTERACTIVE)
    }

    /// Store `block` (or air) at `pos` and schedule the remeshing `options` ask for.
    ///
    /// A no-op returning `false` when the chunk is not registered, Y is negative,
    /// or the cell already holds `block`.
    pub fn set_block_with(&self, pos: WorldPos, block: Option<Block>, options: EditOptions) -> bool {
        let (coord, local) = pos.split();
        let Some(chunk) = self.registry.get(coord) else {
            trace!(chunk = %coord, "Ignoring edit in unloaded chunk");
            return false;
        };
        let Some(index) = chunk.set_block(local, block) else {
            return false;
        };

        if options.remesh_self {
            self.request_remesh_segment(SegmentKey::new(coord, index));
        }
        if options.remesh_neighbors {
            self.fan_out_edit(coord, index, local);
        }
        true
    }

    /// Remesh the segments across any boundary the edited cell touches.
    fn fan_out_edit(&self, coord: ChunkCoord, index: usize, local: IVec3) {
        let local_y = local.y & LAST;
        let lateral = |dx: i32, dz: i32| {
            let neighbor = coord.offset(dx, dz);
            if self.registry.contains(neighbor) {
                self.request_remesh_segment(SegmentKey::new(neighbor, index));
            }
        };

        match local.x {
            0 => lateral(-1, 0),
            LAST => lateral(1, 0),
            _ => {}
        }
        match local.z {
            0 => lateral(0, -1),
            LAST => lateral(0, 1),
            _ => {}
        }

        if local_y == 0 && index > 0 {
            self.request_remesh_segment(SegmentKey::new(coord, index - 1));
        } else if local_y == LAST {
            self.request_remesh_segment(SegmentKey::new(coord, index + 1));
        }
    }

    pub fn place_block(&self, pos: WorldPos, block: Block) -> bool {
        self.set_block(pos, Some(block))
    }

    pub fn remove_block(&self, pos: WorldPos) -> bool {
        self.set_block(pos, None)
    }

    /// Register a new, empty chunk at `coord`.
    pub fn try_spawn_chunk(&self, coord: ChunkCoord) -> Result<Arc<Chunk>> {
        let chunk = Arc::new(Chunk::new(coord));
        self.registry
            .insert(Arc::clone(&chunk))
            .map_err(|_| Error::RegistrationConflict(coord))?;
        debug!(chunk = %coord, "Spawned chunk");
        Ok(chunk)
    }

    /// Register a chunk at `coord`, or return the one already there.
    pub fn spawn_chunk(&self, coord: ChunkCoord) -> Arc<Chunk> {
        loop {
            match self.try_spawn_chunk(coord) {
                Ok(chunk) => return chunk,
                Err(err) => {
                    // The holder may have been unloaded in between; retry then.
                    if let Some(existing) = self.registry.get(coord) {
                        warn!(chunk = %coord, error = %err, "Chunk already registered");
                        return existing;
                    }
                }
            }
        }
    }

    /// First solid block between two points given in block units.
    pub fn raycast(&self, start: Vec3, end: Vec3) -> Option<RayHit> {
        raycast(start, end, |pos| self.get_block(pos))
    }

    /// Ray cast with endpoints in world units.
    pub fn raycast_world(&self, start: Vec3, end: Vec3) -> Option<RayHit> {
        let scale = self.config.block_scale;
        self.raycast(start / scale, end / scale)
    }

    /// Convert a world-unit position into block units.
    pub fn to_block_space(&self, point: Vec3) -> Vec3 {
        point / self.config.block_scale
    }

    pub fn request_remesh_segment(&self, key: SegmentKey) -> bool {
        self.queues.remesh.push(WorkItem::RemeshSegment(key.into()))
    }

    pub fn request_remesh_chunk(&self, target: impl Into<ChunkTarget>) -> bool {
        self.queues.remesh.push(WorkItem::RemeshChunk(target.into()))
    }

    /// Remesh whichever of the four lateral neighbours are registered.
    pub(crate) fn request_remesh_neighbors(&self, coord: ChunkCoord) {
        for neighbor in coord.neighbors() {
            if self.registry.contains(neighbor) {
                self.request_remesh_chunk(neighbor);
            }
        }
    }

    pub(crate) fn mesh_published(&self, key: SegmentKey) {
        self.meshes_built.fetch_add(1, Ordering::Relaxed);
        self.outbox.lock().ready.insert(key);
    }

    pub(crate) fn segments_released(&self, keys: &[SegmentKey]) {
        if keys.is_empty() {
            return;
        }
        let mut outbox = self.outbox.lock();
        for key in keys {
            outbox.ready.remove(key);
            outbox.released_segments.push(Arc::new(SegmentMesh::new(
                *key,
                0,
                SegmentGeometry::default(),
            )));
        }
    }

    pub(crate) fn chunk_released(&self, coord: ChunkCoord) {
        self.outbox.lock().released_chunks.push(coord);
    }

    /// Total meshes published since the world was created.
    pub fn meshes_built(&self) -> u64 {
        self.meshes_built.load(Ordering::Relaxed)
    }

    /// Everything the renderer should apply since the last drain.
    ///
    /// Chunk releases come first, then emptied segments, then fresh meshes.
    pub fn drain_render_updates(&self) -> Vec<RenderUpdate> {
        let pending = {
            let mut outbox = self.outbox.lock();
            if outbox.is_empty() {
                return Vec::new();
            }
            outbox.take()
        };

        let mut updates = Vec::with_capacity(
            pending.released_chunks.len() + pending.released_segments.len() + pending.ready.len(),
        );
        updates.extend(
            pending
                .released_chunks
                .into_iter()
                .map(|coord| RenderUpdate::Released { coord }),
        );
        updates.extend(
            pending
                .released_segments
                .into_iter()
                .map(|mesh| RenderUpdate::Mesh { key: mesh.key, mesh }),
        );
        updates.extend(pending.ready.into_iter().filter_map(|key| {
            let mesh = self.segment(key)?.take_latest_mesh()?;
            Some(RenderUpdate::Mesh { key, mesh })
        }));
        updates
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}
