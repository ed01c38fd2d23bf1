//! Face resolution across segment and chunk boundaries.
//!
//! Meshing runs on a [`PaddedVolume`]: the segment's own cells plus a one-cell
//! halo copied from the segment above/below in the same chunk and from the same
//! segment index in the four lateral neighbour chunks. Anything missing reads as air.

use std::sync::Arc;

use strata_core::constants::SEGMENT_SIZE;
use strata_voxel::{ChunkSegment, PaddedVolume, SegmentMesh};

use crate::chunk::Chunk;
use crate::registry::ChunkRegistry;

const SIZE: i32 = SEGMENT_SIZE as i32;
const LAST: i32 = SIZE - 1;

/// Fill `volume` with `segment` and its halo, returning the snapshot stamp.
#[cfg_attr(
    feature = "profiling-tracy",
    tracing::instrument(level = "trace", skip_all)
)]
pub fn snapshot_segment(
    registry: &ChunkRegistry,
    chunk: &Chunk,
    segment: &ChunkSegment,
    volume: &mut PaddedVolume,
) -> u64 {
    volume.clear();
    let version = segment.snapshot_into(volume);
    let index = segment.index();

    if let Some(below) = index.checked_sub(1).and_then(|i| chunk.segment(i)) {
        copy_slab(&below, volume, |a, b| (a, LAST, b), |a, b| (a, -1, b));
    }
    if let Some(above) = chunk.segment(index + 1) {
        copy_slab(&above, volume, |a, b| (a, 0, b), |a, b| (a, SIZE, b));
    }

    let [west, east, south, north] = chunk.coord().neighbors();
    let lateral = |coord| registry.get(coord).and_then(|c| c.segment(index));

    if let Some(seg) = lateral(west) {
        copy_slab(&seg, volume, |a, b| (LAST, a, b), |a, b| (-1, a, b));
    }
    if let Some(seg) = lateral(east) {
        copy_slab(&seg, volume, |a, b| (0, a, b), |a, b| (SIZE, a, b));
    }
    if let Some(seg) = lateral(south) {
        copy_slab(&seg, volume, |a, b| (a, b, LAST), |a, b| (a, b, -1));
    }
    if let Some(seg) = lateral(north) {
        copy_slab(&seg, volume, |a, b| (a, b, 0), |a, b| (a, b, SIZE));
    }

    version
}

/// Copy one S×S face of `source` into a halo slab of `volume`.
fn copy_slab(
    source: &ChunkSegment,
    volume: &mut PaddedVolume,
    from: impl Fn(i32, i32) -> (i32, i32, i32),
    to: impl Fn(i32, i32) -> (i32, i32, i32),
) {
    let view = source.read();
    if view.is_empty() {
        return;
    }
    for b in 0..SIZE {
        for a in 0..SIZE {
            let (sx, sy, sz) = from(a, b);
            let (dx, dy, dz) = to(a, b);
            volume.set(dx, dy, dz, view.get(sx, sy, sz));
        }
    }
}

/// Snapshot and mesh one segment, publishing the result to its handoff slot.
///
/// Returns the mesh if it became the segment's latest.
pub fn remesh_segment(
    registry: &ChunkRegistry,
    chunk: &Chunk,
    segment: &ChunkSegment,
) -> Option<Arc<SegmentMesh>> {
    let mut volume = PaddedVolume::new();
    let version = snapshot_segment(registry, chunk, segment, &mut volume);
    segment.build_mesh(&volume, version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec3;
    use strata_core::{Block, ChunkCoord};

    fn registered(registry: &ChunkRegistry, x: i32, z: i32) -> Arc<Chunk> {
        let chunk = Arc::new(Chunk::new(ChunkCoord::new(x, z)));
        registry.insert(Arc::clone(&chunk)).expect("vacant coordinate");
        chunk
    }

    #[test]
    fn halo_reads_vertical_neighbours() {
        let registry = ChunkRegistry::new();
        let chunk = registered(&registry, 0, 0);
        chunk.set_block(IVec3::new(2, 15, 3), Some(Block::STONE));
        chunk.set_block(IVec3::new(2, 16, 3), Some(Block::DIRT));
        chunk.set_block(IVec3::new(4, 32, 5), Some(Block::GRASS));

        let middle = chunk.segment(1).expect("segment 1");
        let mut volume = PaddedVolume::new();
        snapshot_segment(&registry, &chunk, &middle, &mut volume);

        assert_eq!(volume.get(2, 0, 3), Some(Block::DIRT));
        assert_eq!(volume.get(2, -1, 3), Some(Block::STONE));
        assert_eq!(volume.get(4, 16, 5), Some(Block::GRASS));
    }

    #[test]
    fn halo_reads_lateral_neighbours() {
        let registry = ChunkRegistry::new();
        let chunk = registered(&registry, 0, 0);
        let west = registered(&registry, -1, 0);
        let north = registered(&registry, 0, 1);
        chunk.set_block(IVec3::new(0, 0, 0), Some(Block::STONE));
        west.set_block(IVec3::new(15, 0, 0), Some(Block::SAND));
        west.set_block(IVec3::new(14, 0, 0), Some(Block::LOG));
        north.set_block(IVec3::new(7, 1, 0), Some(Block::GLASS));

        let segment = chunk.segment(0).expect("segment 0");
        let mut volume = PaddedVolume::new();
        snapshot_segment(&registry, &chunk, &segment, &mut volume);

        assert_eq!(volume.get(-1, 0, 0), Some(Block::SAND));
        assert_eq!(volume.get(7, 1, 16), Some(Block::GLASS));
        assert_eq!(volume.get(16, 0, 0), None);
    }

    #[test]
    fn neighbour_hides_boundary_face() {
        let registry = ChunkRegistry::new();
        let chunk = registered(&registry, 0, 0);
        let east = registered(&registry, 1, 0);
        chunk.set_block(IVec3::new(15, 0, 0), Some(Block::STONE));

        let segment = chunk.segment(0).expect("segment 0");
        let alone = remesh_segment(&registry, &chunk, &segment).expect("published");
        assert_eq!(alone.geometry.opaque.quad_count(), 6);

        east.set_block(IVec3::new(0, 0, 0), Some(Block::STONE));
        let covered = remesh_segment(&registry, &chunk, &segment).expect("published");
        assert_eq!(covered.geometry.opaque.quad_count(), 5);
    }

    #[test]
    fn snapshot_taken_before_neighbour_edit_cannot_publish_after() {
        let registry = ChunkRegistry::new();
        let chunk = registered(&registry, 0, 0);
        let east = registered(&registry, 1, 0);
        chunk.set_block(IVec3::new(15, 0, 0), Some(Block::STONE));
        let segment = chunk.segment(0).expect("segment 0");

        let mut early = PaddedVolume::new();
        let early_stamp = snapshot_segment(&registry, &chunk, &segment, &mut early);
        east.set_block(IVec3::new(0, 0, 0), Some(Block::STONE));
        let covered = remesh_segment(&registry, &chunk, &segment).expect("published");
        assert_eq!(covered.geometry.opaque.quad_count(), 5);

        assert!(segment.build_mesh(&early, early_stamp).is_none());
        let latest = segment.take_latest_mesh().expect("mesh is waiting");
        assert!(Arc::ptr_eq(&latest, &covered));
    }

    #[test]
    fn stale_halo_is_cleared_between_snapshots() {
        let registry = ChunkRegistry::new();
        let chunk = registered(&registry, 0, 0);
        let west = registered(&registry, -1, 0);
        chunk.set_block(IVec3::new(0, 0, 0), Some(Block::STONE));
        west.set_block(IVec3::new(15, 0, 0), Some(Block::STONE));

        let segment = chunk.segment(0).expect("segment 0");
        let mut volume = PaddedVolume::new();
        snapshot_segment(&registry, &chunk, &segment, &mut volume);
        assert!(volume.get(-1, 0, 0).is_some());

        registry.remove(west.coord());
        snapshot_segment(&registry, &chunk, &segment, &mut volume);
        assert_eq!(volume.get(-1, 0, 0), None);
    }
}
