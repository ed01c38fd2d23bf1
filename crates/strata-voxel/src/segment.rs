//! Dense 16³ block storage for one vertical slice of a chunk column.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::IVec3;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use strata_core::constants::{SEGMENT_SIZE, SEGMENT_VOLUME};
use strata_core::{Block, SegmentKey};
use tracing::trace;

use crate::greedy::greedy_mesh;
use crate::mesh::SegmentMesh;
use crate::volume::PaddedVolume;

const SIZE: i32 = SEGMENT_SIZE as i32;

#[inline]
fn cell_index(x: i32, y: i32, z: i32) -> Option<usize> {
    let range = 0..SIZE;
    if range.contains(&x) && range.contains(&y) && range.contains(&z) {
        Some(x as usize + y as usize * SEGMENT_SIZE + z as usize * SEGMENT_SIZE * SEGMENT_SIZE)
    } else {
        None
    }
}

/// Inclusive min/max corner of the cells written since the segment was last empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OccupiedBounds {
    pub min: IVec3,
    pub max: IVec3,
}

impl OccupiedBounds {
    fn point(p: IVec3) -> Self {
        Self { min: p, max: p }
    }

    fn include(&mut self, p: IVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }
}

struct SegmentCells {
    blocks: Box<[Option<Block>]>,
    count: usize,
    bounds: Option<OccupiedBounds>,
}

#[derive(Default)]
struct MeshSlot {
    latest: Option<Arc<SegmentMesh>>,
    published: Option<u64>,
}

/// One S×S×S slice of a chunk column.
///
/// Block data sits behind a reader/writer lock so neighbouring segments can be
/// sampled while meshing. Every effective edit bumps the edit version.
///
/// Each snapshot draws a fresh stamp from a per-segment sequence before any cell
/// is copied, so a later snapshot never reflects older data than an earlier one,
/// halo included. Meshes carry their snapshot stamp and only the newest is kept.
pub struct ChunkSegment {
    key: SegmentKey,
    cells: RwLock<SegmentCells>,
    edit_version: AtomicU64,
    snapshot_seq: AtomicU64,
    mesh: Mutex<MeshSlot>,
}

impl ChunkSegment {
    /// Create an all-air segment.
    pub fn new(key: SegmentKey) -> Self {
        Self {
            key,
            cells: RwLock::new(SegmentCells {
                blocks: vec![None; SEGMENT_VOLUME].into_boxed_slice(),
                count: 0,
                bounds: None,
            }),
            edit_version: AtomicU64::new(0),
            snapshot_seq: AtomicU64::new(0),
            mesh: Mutex::new(MeshSlot::default()),
        }
    }

    #[inline]
    pub fn key(&self) -> SegmentKey {
        self.key
    }

    /// Vertical index within the owning chunk.
    #[inline]
    pub fn index(&self) -> usize {
        self.key.index
    }

    /// Block at a segment-local position. Outside `[0, S)` reads as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        cell_index(x, y, z).and_then(|i| self.cells.read().blocks[i])
    }

    /// Store a block (or air) at a segment-local position.
    ///
    /// Returns `true` when the cell actually changed. Out-of-range writes are ignored.
    pub fn set_block(&self, x: i32, y: i32, z: i32, block: Option<Block>) -> bool {
        let Some(i) = cell_index(x, y, z) else {
            trace!(segment = ?self.key, x, y, z, "Ignoring out-of-range segment write");
            return false;
        };

        let mut cells = self.cells.write();
        let previous = std::mem::replace(&mut cells.blocks[i], block);
        if previous == block {
            return false;
        }

        match (previous.is_some(), block.is_some()) {
            (false, true) => cells.count += 1,
            (true, false) => cells.count -= 1,
            _ => {}
        }

        if cells.count == 0 {
            cells.bounds = None;
        } else if block.is_some() {
            let p = IVec3::new(x, y, z);
            match cells.bounds.as_mut() {
                Some(bounds) => bounds.include(p),
                None => cells.bounds = Some(OccupiedBounds::point(p)),
            }
        }

        self.edit_version.fetch_add(1, Ordering::AcqRel);
        true
    }

    /// Whether no cell holds a block.
    pub fn is_empty(&self) -> bool {
        self.cells.read().count == 0
    }

    /// Number of non-air cells.
    pub fn block_count(&self) -> usize {
        self.cells.read().count
    }

    pub fn occupied_bounds(&self) -> Option<OccupiedBounds> {
        self.cells.read().bounds
    }

    /// Number of effective edits applied so far.
    pub fn edit_version(&self) -> u64 {
        self.edit_version.load(Ordering::Acquire)
    }

    /// Hold the read lock for bulk sampling.
    pub fn read(&self) -> SegmentView<'_> {
        SegmentView {
            cells: self.cells.read(),
        }
    }

    /// Copy the interior into `volume`, returning the snapshot's stamp.
    ///
    /// Halo cells of `volume` are left untouched. Callers fill the halo after this
    /// returns so neighbour reads are at least as fresh as the stamp.
    pub fn snapshot_into(&self, volume: &mut PaddedVolume) -> u64 {
        let view = self.read();
        let version = self.snapshot_seq.fetch_add(1, Ordering::AcqRel) + 1;
        for z in 0..SIZE {
            for y in 0..SIZE {
                for x in 0..SIZE {
                    volume.set(x, y, z, view.get(x, y, z));
                }
            }
        }
        version
    }

    /// Run the greedy mesher over `volume` and publish the result.
    ///
    /// Returns the mesh if it became the latest one; a build from a snapshot no
    /// newer than the published mesh's is discarded.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn build_mesh(&self, volume: &PaddedVolume, version: u64) -> Option<Arc<SegmentMesh>> {
        let geometry = greedy_mesh(volume);
        let mesh = Arc::new(SegmentMesh::new(self.key, version, geometry));
        self.publish(Arc::clone(&mesh)).then_some(mesh)
    }

    /// Store `mesh` in the handoff slot unless one from the same or a later snapshot
    /// was already published.
    pub fn publish(&self, mesh: Arc<SegmentMesh>) -> bool {
        let mut slot = self.mesh.lock();
        if slot.published.is_some_and(|current| mesh.version <= current) {
            trace!(
                segment = ?self.key,
                stale = mesh.version,
                current = ?slot.published,
                "Discarding superseded mesh"
            );
            return false;
        }
        slot.published = Some(mesh.version);
        slot.latest = Some(mesh);
        true
    }

    /// Take the mesh waiting in the handoff slot, if any.
    pub fn take_latest_mesh(&self) -> Option<Arc<SegmentMesh>> {
        self.mesh.lock().latest.take()
    }

    /// Snapshot stamp of the newest mesh ever published.
    pub fn published_version(&self) -> Option<u64> {
        self.mesh.lock().published
    }
}

impl std::fmt::Debug for ChunkSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkSegment")
            .field("key", &self.key)
            .field("blocks", &self.block_count())
            .field("edit_version", &self.edit_version())
            .finish_non_exhaustive()
    }
}

/// Read-locked view of a segment's cells.
pub struct SegmentView<'a> {
    cells: RwLockReadGuard<'a, SegmentCells>,
}

impl SegmentView<'_> {
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        cell_index(x, y, z).and_then(|i| self.cells.blocks[i])
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::ChunkCoord;

    fn segment() -> ChunkSegment {
        ChunkSegment::new(SegmentKey::new(ChunkCoord::new(0, 0), 0))
    }

    fn mesh_now(segment: &ChunkSegment) -> Arc<SegmentMesh> {
        let mut volume = PaddedVolume::new();
        let version = segment.snapshot_into(&mut volume);
        segment
            .build_mesh(&volume, version)
            .expect("fresh build should publish")
    }

    #[test]
    fn new_segment_is_empty() {
        let segment = segment();
        assert!(segment.is_empty());
        assert_eq!(segment.block_count(), 0);
        assert_eq!(segment.occupied_bounds(), None);
        assert_eq!(segment.get_block(0, 0, 0), None);
    }

    #[test]
    fn set_and_get_block() {
        let segment = segment();
        assert!(segment.set_block(1, 2, 3, Some(Block::STONE)));
        assert_eq!(segment.get_block(1, 2, 3), Some(Block::STONE));
        assert_eq!(segment.block_count(), 1);
        assert!(!segment.is_empty());
    }

    #[test]
    fn out_of_range_is_air_and_ignored() {
        let segment = segment();
        assert!(!segment.set_block(16, 0, 0, Some(Block::STONE)));
        assert!(!segment.set_block(0, -1, 0, Some(Block::STONE)));
        assert_eq!(segment.get_block(-1, 0, 0), None);
        assert_eq!(segment.get_block(0, 0, 16), None);
        assert!(segment.is_empty());
        assert_eq!(segment.edit_version(), 0);
    }

    #[test]
    fn occupancy_tracks_replacements() {
        let segment = segment();
        segment.set_block(0, 0, 0, Some(Block::STONE));
        segment.set_block(0, 0, 0, Some(Block::DIRT));
        assert_eq!(segment.block_count(), 1);

        assert!(!segment.set_block(0, 0, 0, Some(Block::DIRT)));
        assert_eq!(segment.edit_version(), 2);

        segment.set_block(0, 0, 0, None);
        assert!(segment.is_empty());
    }

    #[test]
    fn occupied_bounds_grow_and_reset() {
        let segment = segment();
        segment.set_block(2, 3, 4, Some(Block::SAND));
        segment.set_block(10, 1, 7, Some(Block::SAND));
        assert_eq!(
            segment.occupied_bounds(),
            Some(OccupiedBounds {
                min: IVec3::new(2, 1, 4),
                max: IVec3::new(10, 3, 7),
            })
        );

        segment.set_block(2, 3, 4, None);
        segment.set_block(10, 1, 7, None);
        assert_eq!(segment.occupied_bounds(), None);
    }

    #[test]
    fn empty_segment_meshes_to_nothing() {
        let mesh = mesh_now(&segment());
        assert!(mesh.is_empty());
        assert_eq!(mesh.geometry.quad_count(), 0);
    }

    #[test]
    fn set_then_clear_restores_mesh() {
        let segment = segment();
        segment.set_block(4, 4, 4, Some(Block::STONE));
        segment.set_block(5, 4, 4, Some(Block::STONE));
        let before = mesh_now(&segment);

        segment.set_block(8, 8, 8, Some(Block::GLASS));
        let during = mesh_now(&segment);
        assert_ne!(during.geometry, before.geometry);

        segment.set_block(8, 8, 8, None);
        let after = mesh_now(&segment);
        assert_eq!(after.geometry, before.geometry);
        assert!(after.version > before.version);
    }

    #[test]
    fn stale_build_is_discarded() {
        let segment = segment();
        segment.set_block(0, 0, 0, Some(Block::STONE));
        let mut stale = PaddedVolume::new();
        let stale_version = segment.snapshot_into(&mut stale);

        segment.set_block(1, 0, 0, Some(Block::STONE));
        let fresh = mesh_now(&segment);

        assert!(segment.build_mesh(&stale, stale_version).is_none());
        let latest = segment.take_latest_mesh().expect("fresh mesh is waiting");
        assert!(Arc::ptr_eq(&latest, &fresh));
        assert_eq!(segment.published_version(), Some(fresh.version));
    }

    #[test]
    fn rebuild_publishes_newer_stamp() {
        let segment = segment();
        let first = mesh_now(&segment);
        let second = mesh_now(&segment);
        assert!(second.version > first.version);
        assert_eq!(segment.edit_version(), 0);

        let latest = segment.take_latest_mesh().expect("mesh is waiting");
        assert!(Arc::ptr_eq(&latest, &second));
        assert!(segment.take_latest_mesh().is_none());
    }

    #[test]
    fn older_snapshot_loses_even_without_own_edits() {
        let segment = segment();
        segment.set_block(15, 0, 0, Some(Block::STONE));

        let mut before = PaddedVolume::new();
        let before_stamp = segment.snapshot_into(&mut before);
        let mut after = PaddedVolume::new();
        let after_stamp = segment.snapshot_into(&mut after);
        // Only the halo differs: a neighbour covered the +X face in between.
        after.set(16, 0, 0, Some(Block::STONE));

        let fresh = segment.build_mesh(&after, after_stamp).expect("newest snapshot publishes");
        assert_eq!(fresh.geometry.opaque.quad_count(), 5);
        assert!(segment.build_mesh(&before, before_stamp).is_none());
        assert!(segment.build_mesh(&after, after_stamp).is_none());

        let latest = segment.take_latest_mesh().expect("fresh mesh is waiting");
        assert_eq!(latest.geometry.opaque.quad_count(), 5);
    }

    #[test]
    fn view_reads_under_one_lock() {
        let segment = segment();
        segment.set_block(15, 15, 15, Some(Block::LEAVES));
        let view = segment.read();
        assert_eq!(view.get(15, 15, 15), Some(Block::LEAVES));
        assert!(!view.is_empty());
        assert_eq!(view.get(16, 15, 15), None);
    }
}
