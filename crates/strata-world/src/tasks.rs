//! Execution of individual work items.

use std::sync::Arc;

use glam::IVec3;
use strata_core::constants::SEGMENT_SIZE;
use strata_core::Result;
use tracing::{debug, trace, warn};

use crate::chunk::{Chunk, ChunkState};
use crate::generation::{sample_columns, TerrainSource};
use crate::meshing::remesh_segment;
use crate::queue::Duty;
use crate::work::{ChunkTarget, SegmentTarget, TaskOutcome, WorkItem};
use crate::world::World;

/// Run one work item to completion on the calling thread.
pub fn execute(world: &World, terrain: &dyn TerrainSource, item: WorkItem) -> Result<TaskOutcome> {
    match item {
        WorkItem::GenerateChunk(target) => generate(world, terrain, &target),
        WorkItem::RemeshChunk(target) => Ok(remesh_chunk(world, &target)),
        WorkItem::RemeshSegment(target) => Ok(remesh_one_segment(world, &target)),
        WorkItem::UnloadChunk(target) => Ok(unload(world, &target)),
    }
}

/// Drain every queue on the calling thread until all are empty.
///
/// Returns the number of items executed. Useful without worker pools, in tests
/// and for deterministic single-threaded runs.
pub fn run_pending(world: &World, terrain: &dyn TerrainSource) -> Result<usize> {
    let mut executed = 0;
    loop {
        let mut progressed = false;
        for duty in Duty::ALL {
            while let Some(item) = world.queues().pop(duty) {
                execute(world, terrain, item)?;
                executed += 1;
                progressed = true;
            }
        }
        if !progressed {
            return Ok(executed);
        }
    }
}

fn dropped(item: &str, target: &ChunkTarget, reason: &str) -> TaskOutcome {
    trace!(task = item, chunk = %target.coord(), reason, "Dropping stale work");
    TaskOutcome::Dropped
}

/// Hands a chunk stuck in `Loading` to the unload queue unless disarmed.
///
/// Generation that errors or unwinds leaves partially written columns behind.
/// Unloading frees the coordinate so the streaming controller can spawn it again.
struct LoadingGuard<'a> {
    world: &'a World,
    chunk: &'a Arc<Chunk>,
    armed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn new(world: &'a World, chunk: &'a Arc<Chunk>) -> Self {
        Self {
            world,
            chunk,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.chunk.transition(ChunkState::Loading, ChunkState::QueuedForUnload) {
            warn!(chunk = %self.chunk.coord(), "Generation did not finish, queueing chunk for unload");
            self.world
                .queues()
                .unload
                .push(WorkItem::UnloadChunk(Arc::clone(self.chunk).into()));
        }
    }
}

#[cfg_attr(
    feature = "profiling-tracy",
    tracing::instrument(level = "trace", skip_all)
)]
fn generate(world: &World, terrain: &dyn TerrainSource, target: &ChunkTarget) -> Result<TaskOutcome> {
    let Some(chunk) = target.resolve(world.registry()) else {
        return Ok(dropped("generate", target, "not registered"));
    };
    if !chunk.transition(ChunkState::Spawned, ChunkState::Loading) {
        return Ok(dropped("generate", target, "not awaiting generation"));
    }
    let guard = LoadingGuard::new(world, &chunk);

    let columns = sample_columns(terrain, chunk.coord());
    let mut blocks = 0usize;
    for (i, column) in columns.iter().enumerate() {
        let x = (i % SEGMENT_SIZE) as i32;
        let z = (i / SEGMENT_SIZE) as i32;
        for (y, block) in column.cells() {
            if chunk.set_block(IVec3::new(x, y, z), Some(block)).is_some() {
                blocks += 1;
            }
        }
    }

    chunk.transition(ChunkState::Loading, ChunkState::Loaded);
    guard.disarm();
    debug!(chunk = %chunk.coord(), blocks, "Generated chunk");

    world.request_remesh_chunk(Arc::clone(&chunk));
    world.request_remesh_neighbors(chunk.coord());
    Ok(TaskOutcome::Completed)
}

fn remesh_chunk(world: &World, target: &ChunkTarget) -> TaskOutcome {
    let Some(chunk) = target.resolve(world.registry()) else {
        return dropped("remesh-chunk", target, "not registered");
    };
    if chunk.state() != ChunkState::Loaded {
        return dropped("remesh-chunk", target, "not loaded");
    }

    world.segments_released(&chunk.release_empty_segments());
    for segment in chunk.segments() {
        if remesh_segment(world.registry(), &chunk, &segment).is_some() {
            world.mesh_published(segment.key());
        }
    }
    TaskOutcome::Completed
}

fn remesh_one_segment(world: &World, target: &SegmentTarget) -> TaskOutcome {
    let Some((chunk, segment)) = target.resolve(world.registry()) else {
        trace!(segment = ?target.key(), "Dropping remesh of missing segment");
        return TaskOutcome::Dropped;
    };
    if chunk.state() != ChunkState::Loaded {
        trace!(segment = ?target.key(), state = ?chunk.state(), "Dropping remesh of unloaded chunk");
        return TaskOutcome::Dropped;
    }

    if segment.is_empty() {
        release_segment(world, &chunk);
        return TaskOutcome::Completed;
    }
    if remesh_segment(world.registry(), &chunk, &segment).is_some() {
        world.mesh_published(segment.key());
    }
    TaskOutcome::Completed
}

fn release_segment(world: &World, chunk: &Chunk) {
    world.segments_released(&chunk.release_empty_segments());
}

fn unload(world: &World, target: &ChunkTarget) -> TaskOutcome {
    let Some(chunk) = target.resolve(world.registry()) else {
        return dropped("unload", target, "not registered");
    };
    if !chunk.transition(ChunkState::QueuedForUnload, ChunkState::Unloading) {
        return dropped("unload", target, "not queued for unload");
    }

    let coord = chunk.coord();
    world.registry().remove_if_same(&chunk);
    chunk.set_state(ChunkState::Destroyed);
    world.chunk_released(coord);
    debug!(chunk = %coord, "Unloaded chunk");

    world.request_remesh_neighbors(coord);
    TaskOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::AssertUnwindSafe;

    use crate::generation::{Column, FlatTerrain};
    use crate::handoff::RenderUpdate;
    use crate::world::WorldConfig;
    use strata_core::{Block, ChunkCoord, SegmentKey, WorldPos};

    fn flat() -> FlatTerrain {
        FlatTerrain::new(4, Block::STONE)
    }

    fn generated(world: &World, coords: &[(i32, i32)]) {
        for &(x, z) in coords {
            let chunk = world.spawn_chunk(ChunkCoord::new(x, z));
            world.queues().load.push(WorkItem::GenerateChunk(chunk.into()));
        }
        run_pending(world, &flat()).expect("tasks succeed");
    }

    #[test]
    fn generate_populates_and_meshes() {
        let world = World::new(WorldConfig::default());
        generated(&world, &[(0, 0)]);

        let chunk = world.chunk(ChunkCoord::new(0, 0)).expect("registered");
        assert_eq!(chunk.state(), ChunkState::Loaded);
        assert_eq!(chunk.block_count(), 16 * 16 * 4);

        let updates = world.drain_render_updates();
        assert_eq!(updates.len(), 1);
        let RenderUpdate::Mesh { key, mesh } = &updates[0] else {
            panic!("expected a mesh update");
        };
        assert_eq!(*key, SegmentKey::new(ChunkCoord::new(0, 0), 0));
        assert_eq!(mesh.geometry.opaque.quad_count(), 6);
        assert_eq!(world.meshes_built(), 1);
    }

    #[test]
    fn generate_twice_is_dropped() {
        let world = World::new(WorldConfig::default());
        let chunk = world.spawn_chunk(ChunkCoord::new(0, 0));
        let item = WorkItem::GenerateChunk(Arc::clone(&chunk).into());
        assert_eq!(execute(&world, &flat(), item.clone()).ok(), Some(TaskOutcome::Completed));
        assert_eq!(execute(&world, &flat(), item).ok(), Some(TaskOutcome::Dropped));
    }

    #[test]
    fn neighbour_generation_hides_shared_faces() {
        let world = World::new(WorldConfig::default());
        generated(&world, &[(0, 0), (1, 0)]);
        world.drain_render_updates();

        let segment = world
            .segment(SegmentKey::new(ChunkCoord::new(0, 0), 0))
            .expect("segment exists");
        let chunk = world.chunk(ChunkCoord::new(0, 0)).expect("registered");
        let mesh = remesh_segment(world.registry(), &chunk, &segment).expect("published");
        // Top, bottom, -X, -Z, +Z; the +X side is covered by the neighbour.
        assert_eq!(mesh.geometry.opaque.quad_count(), 5);
    }

    struct FailingTerrain;

    impl TerrainSource for FailingTerrain {
        fn column(&self, world_x: i32, _world_z: i32) -> Column {
            assert!(world_x < 8, "terrain source failed");
            Column::new().with_band(2, Some(Block::DIRT))
        }
    }

    #[test]
    fn failed_generation_queues_unload() {
        let world = World::new(WorldConfig::default());
        let coord = ChunkCoord::new(0, 0);
        let chunk = world.spawn_chunk(coord);
        let item = WorkItem::GenerateChunk(Arc::clone(&chunk).into());

        let result =
            std::panic::catch_unwind(AssertUnwindSafe(|| execute(&world, &FailingTerrain, item)));
        assert!(result.is_err());
        assert_eq!(chunk.state(), ChunkState::QueuedForUnload);
        assert_eq!(world.queues().unload.len(), 1);

        run_pending(&world, &flat()).expect("unload succeeds");
        assert_eq!(chunk.state(), ChunkState::Destroyed);
        assert!(world.chunk(coord).is_none());
        assert_eq!(world.meshes_built(), 0);

        let retry = world.spawn_chunk(coord);
        world.queues().load.push(WorkItem::GenerateChunk(Arc::clone(&retry).into()));
        run_pending(&world, &flat()).expect("tasks succeed");
        assert_eq!(retry.state(), ChunkState::Loaded);
    }

    #[test]
    fn remesh_after_unload_is_a_no_op() {
        let world = World::new(WorldConfig::default());
        generated(&world, &[(0, 0)]);
        world.drain_render_updates();

        let coord = ChunkCoord::new(0, 0);
        let chunk = world.chunk(coord).expect("registered");
        assert!(chunk.transition(ChunkState::Loaded, ChunkState::QueuedForUnload));
        let outcome = execute(&world, &flat(), WorkItem::UnloadChunk(coord.into())).expect("unload");
        assert_eq!(outcome, TaskOutcome::Completed);
        assert_eq!(chunk.state(), ChunkState::Destroyed);
        assert!(world.chunk(coord).is_none());

        let built = world.meshes_built();
        let outcome = execute(&world, &flat(), WorkItem::RemeshSegment(SegmentKey::new(coord, 0).into()))
            .expect("stale remesh");
        assert_eq!(outcome, TaskOutcome::Dropped);
        let outcome = execute(&world, &flat(), WorkItem::RemeshChunk(coord.into())).expect("stale remesh");
        assert_eq!(outcome, TaskOutcome::Dropped);
        assert_eq!(world.meshes_built(), built);

        let updates = world.drain_render_updates();
        assert!(matches!(updates.as_slice(), [RenderUpdate::Released { coord: c }] if *c == coord));
    }

    #[test]
    fn emptied_segment_is_released_with_empty_mesh() {
        let world = World::new(WorldConfig::default());
        world.spawn_chunk(ChunkCoord::new(0, 0));
        let chunk = world.chunk(ChunkCoord::new(0, 0)).expect("registered");
        chunk.transition(ChunkState::Spawned, ChunkState::Loaded);

        world.place_block(WorldPos::new(3, 40, 3), Block::GLASS);
        run_pending(&world, &flat()).expect("tasks succeed");
        world.drain_render_updates();

        world.remove_block(WorldPos::new(3, 40, 3));
        run_pending(&world, &flat()).expect("tasks succeed");

        assert!(chunk.segment(2).is_none());
        let updates = world.drain_render_updates();
        let released: Vec<_> = updates
            .iter()
            .filter_map(|u| match u {
                RenderUpdate::Mesh { key, mesh } if mesh.is_empty() => Some(*key),
                _ => None,
            })
            .collect();
        assert_eq!(released, vec![SegmentKey::new(ChunkCoord::new(0, 0), 2)]);
    }
}
