//! Registry and block access under concurrent use.

use std::sync::Arc;
use std::thread;

use glam::IVec3;
use strata_core::{Block, ChunkCoord, SegmentKey, WorldPos};
use strata_voxel::PaddedVolume;
use strata_world::meshing::snapshot_segment;
use strata_world::{
    execute, run_pending, ChunkState, FlatTerrain, RenderUpdate, TaskOutcome, WorkItem, World,
    WorldConfig,
};

fn delivered_mesh_quads(updates: &[RenderUpdate], wanted: SegmentKey) -> Option<usize> {
    updates.iter().find_map(|update| match update {
        RenderUpdate::Mesh { key, mesh } if *key == wanted => Some(mesh.opaque().quad_count()),
        _ => None,
    })
}

#[test]
fn concurrent_spawns_register_each_coordinate_once() {
    let world = Arc::new(World::new(WorldConfig::default()));
    let coords: Vec<ChunkCoord> = (-4..4)
        .flat_map(|x| (-4..4).map(move |z| ChunkCoord::new(x, z)))
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let world = Arc::clone(&world);
            let coords = coords.clone();
            thread::spawn(move || {
                coords
                    .iter()
                    .filter(|&&coord| world.try_spawn_chunk(coord).is_ok())
                    .count()
            })
        })
        .collect();

    let won: usize = handles
        .into_iter()
        .map(|handle| handle.join().expect("spawner thread"))
        .sum();

    assert_eq!(won, coords.len());
    assert_eq!(world.registry().len(), coords.len());
    for coord in coords {
        assert_eq!(world.chunk(coord).map(|chunk| chunk.coord()), Some(coord));
    }
}

#[test]
fn concurrent_edits_on_disjoint_chunks() {
    let world = Arc::new(World::new(WorldConfig::default()));
    for x in 0..4 {
        world.spawn_chunk(ChunkCoord::new(x, 0));
    }

    let handles: Vec<_> = (0..4)
        .map(|x| {
            let world = Arc::clone(&world);
            thread::spawn(move || {
                let base = x * 16;
                for y in 0..40 {
                    for z in 1..15 {
                        world.place_block(WorldPos::new(base + 1 + (y % 14), y, z), Block::DIRT);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("editor thread");
    }

    for x in 0..4 {
        let chunk = world.chunk(ChunkCoord::new(x, 0)).expect("registered");
        assert_eq!(chunk.segment_count(), 3);
        assert_eq!(chunk.block_count(), 40 * 14);
        assert_eq!(chunk.get_block(IVec3::new(1, 0, 1)), Some(Block::DIRT));
        assert_eq!(chunk.get_block(IVec3::new(14, 39, 14)), None);
    }
}

#[test]
fn readers_see_whole_chunks_during_unload() {
    let world = Arc::new(World::new(WorldConfig::default()));
    let terrain = FlatTerrain::new(8, Block::STONE);
    let coord = ChunkCoord::new(2, -3);
    let chunk = world.spawn_chunk(coord);
    execute(&world, &terrain, WorkItem::GenerateChunk(Arc::clone(&chunk).into()))
        .expect("generation succeeds");
    assert!(chunk.transition(ChunkState::Loaded, ChunkState::QueuedForUnload));

    let inside = WorldPos::from_chunk_local(coord, IVec3::new(5, 7, 5));
    let reader = {
        let world = Arc::clone(&world);
        thread::spawn(move || {
            for _ in 0..10_000 {
                // Either the full chunk or nothing, never a partial column.
                match world.chunk(coord) {
                    Some(chunk) => assert_eq!(chunk.block_count(), 16 * 16 * 8),
                    None => assert_eq!(world.get_block(inside), None),
                }
            }
        })
    };

    let outcome = execute(&world, &terrain, WorkItem::UnloadChunk(coord.into())).expect("unload");
    reader.join().expect("reader thread");

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(chunk.state(), ChunkState::Destroyed);
    assert!(world.chunk(coord).is_none());
}

#[test]
fn stale_generate_for_replaced_chunk_is_dropped() {
    let world = World::new(WorldConfig::default());
    let terrain = FlatTerrain::new(2, Block::SAND);
    let coord = ChunkCoord::new(0, 0);

    let original = world.spawn_chunk(coord);
    world.registry().remove(coord);
    let replacement = world.spawn_chunk(coord);
    assert!(!Arc::ptr_eq(&original, &replacement));

    let outcome = execute(&world, &terrain, WorkItem::GenerateChunk(original.into()))
        .expect("stale generate");
    assert_eq!(outcome, TaskOutcome::Dropped);
    assert_eq!(replacement.state(), ChunkState::Spawned);
    assert_eq!(replacement.block_count(), 0);
}

#[test]
fn respawned_chunk_is_meshed_while_old_remesh_is_pending() {
    let world = World::new(WorldConfig::default());
    let terrain = FlatTerrain::new(2, Block::DIRT);
    let coord = ChunkCoord::new(3, 3);

    let original = world.spawn_chunk(coord);
    execute(&world, &terrain, WorkItem::GenerateChunk(Arc::clone(&original).into()))
        .expect("generation succeeds");
    assert_eq!(world.queues().remesh.len(), 1);

    // Unload before the queued remesh of the original gets to run.
    assert!(original.transition(ChunkState::Loaded, ChunkState::QueuedForUnload));
    execute(&world, &terrain, WorkItem::UnloadChunk(coord.into())).expect("unload");
    let replacement = world.spawn_chunk(coord);
    execute(&world, &terrain, WorkItem::GenerateChunk(Arc::clone(&replacement).into()))
        .expect("generation succeeds");
    assert_eq!(world.queues().remesh.len(), 1);

    run_pending(&world, &terrain).expect("tasks succeed");

    assert_eq!(replacement.state(), ChunkState::Loaded);
    let segment = replacement.segment(0).expect("generated segment");
    assert!(segment.published_version().is_some());
    let updates = world.drain_render_updates();
    assert_eq!(delivered_mesh_quads(&updates, SegmentKey::new(coord, 0)), Some(6));
}

#[test]
fn snapshot_older_than_neighbour_edit_never_replaces_newer_mesh() {
    let world = World::new(WorldConfig::default());
    let terrain = FlatTerrain::new(0, Block::STONE);
    let coord = ChunkCoord::new(0, 0);
    for x in 0..2 {
        let chunk = world.spawn_chunk(ChunkCoord::new(x, 0));
        assert!(chunk.transition(ChunkState::Spawned, ChunkState::Loaded));
    }

    assert!(world.place_block(WorldPos::new(15, 0, 0), Block::STONE));
    run_pending(&world, &terrain).expect("tasks succeed");
    world.drain_render_updates();

    let chunk = world.chunk(coord).expect("registered");
    let key = SegmentKey::new(coord, 0);
    let segment = world.segment(key).expect("segment exists");
    let mut early = PaddedVolume::new();
    let early_stamp = snapshot_segment(world.registry(), &chunk, &segment, &mut early);

    // Covers the +X face; the edit queues a remesh of the western segment.
    assert!(world.place_block(WorldPos::new(16, 0, 0), Block::STONE));
    run_pending(&world, &terrain).expect("tasks succeed");
    let updates = world.drain_render_updates();
    assert_eq!(delivered_mesh_quads(&updates, key), Some(5));

    // The build from before the edit finishes last and must lose.
    assert!(segment.build_mesh(&early, early_stamp).is_none());
    assert!(segment.take_latest_mesh().is_none());
    assert!(delivered_mesh_quads(&world.drain_render_updates(), key).is_none());
}
