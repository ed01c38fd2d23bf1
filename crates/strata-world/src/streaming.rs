//! Chunk streaming based on viewer position.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use strata_core::math::Frustum;
use strata_core::{ChunkCoord, Error, Result};
use tracing::{debug, trace};

use crate::chunk::ChunkState;
use crate::queue::LoadOrdering;
use crate::work::WorkItem;
use crate::world::World;

/// Configuration for chunk streaming behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Horizontal load radius in chunks.
    pub load_radius: i32,
    /// Extra chunks beyond the load radius before a chunk is evicted.
    pub unload_hysteresis: i32,
    /// Column height in blocks assumed when testing chunks against the frustum.
    pub column_height_hint: i32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            load_radius: 15,
            unload_hysteresis: 2,
            column_height_hint: 128,
        }
    }
}

impl StreamingConfig {
    #[must_use]
    pub fn with_load_radius(mut self, load_radius: i32) -> Self {
        self.load_radius = load_radius;
        self
    }

    #[must_use]
    pub fn with_unload_hysteresis(mut self, unload_hysteresis: i32) -> Self {
        self.unload_hysteresis = unload_hysteresis;
        self
    }

    #[must_use]
    pub fn with_column_height_hint(mut self, column_height_hint: i32) -> Self {
        self.column_height_hint = column_height_hint;
        self
    }

    /// Radius past which loaded chunks are evicted.
    pub fn unload_radius(&self) -> i32 {
        self.load_radius + self.unload_hysteresis
    }

    pub fn validate(&self) -> Result<()> {
        if self.load_radius < 0 {
            return Err(Error::InvalidConfig(format!(
                "load_radius must not be negative, got {}",
                self.load_radius
            )));
        }
        if self.unload_hysteresis < 0 {
            return Err(Error::InvalidConfig(format!(
                "unload_hysteresis must not be negative, got {}",
                self.unload_hysteresis
            )));
        }
        if self.column_height_hint <= 0 {
            return Err(Error::InvalidConfig(format!(
                "column_height_hint must be positive, got {}",
                self.column_height_hint
            )));
        }
        Ok(())
    }
}

/// Where the viewer is and what it sees, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewer {
    pub position: Vec3,
    pub view_projection: Option<Mat4>,
}

impl Viewer {
    /// A viewer without a camera; load order is by distance only.
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            view_projection: None,
        }
    }

    #[must_use]
    pub fn with_view_projection(mut self, view_projection: Mat4) -> Self {
        self.view_projection = Some(view_projection);
        self
    }

    fn frustum(&self) -> Option<Frustum> {
        self.view_projection.map(Frustum::from_view_projection)
    }
}

/// What one streaming tick scheduled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamingTick {
    /// The chunk the viewer stands in.
    pub center: ChunkCoord,
    /// Chunks registered and queued for generation.
    pub spawned: usize,
    /// Chunks marked for eviction and queued for unload.
    pub queued_unload: usize,
}

/// Keeps the registered chunk set centred on the viewer.
pub struct StreamingController {
    config: StreamingConfig,
    /// Chunk offsets inside the load radius, nearest first.
    disk: Vec<(i32, i32)>,
    last_center: Option<ChunkCoord>,
}

impl StreamingController {
    pub fn new(config: StreamingConfig) -> Self {
        let disk = load_disk(config.load_radius);
        Self {
            config,
            disk,
            last_center: None,
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    /// Chunk the viewer stood in on the previous tick.
    pub fn last_center(&self) -> Option<ChunkCoord> {
        self.last_center
    }

    /// Chunk containing a world-unit position.
    pub fn viewer_chunk(world: &World, position: Vec3) -> ChunkCoord {
        ChunkCoord::containing(world.to_block_space(position))
    }

    /// Spawn missing chunks around the viewer and evict distant ones.
    ///
    /// Never blocks on workers; all actual loading happens through the queues.
    #[cfg_attr(
        feature = "profiling-tracy",
        tracing::instrument(level = "trace", skip_all)
    )]
    pub fn tick(&mut self, world: &World, viewer: &Viewer) -> StreamingTick {
        let center = Self::viewer_chunk(world, viewer.position);
        if self.last_center != Some(center) {
            debug!(center = %center, "Viewer entered chunk");
            self.last_center = Some(center);
        }

        world.queues().load.set_ordering(LoadOrdering {
            position: viewer.position,
            frustum: viewer.frustum(),
            block_scale: world.config().block_scale,
            height_hint: self.config.column_height_hint as f32,
        });

        let spawned = self.spawn_missing(world, center);
        let queued_unload = self.evict_distant(world, center);

        if spawned > 0 || queued_unload > 0 {
            trace!(center = %center, spawned, queued_unload, "Streaming tick");
        }

        StreamingTick {
            center,
            spawned,
            queued_unload,
        }
    }

    fn spawn_missing(&self, world: &World, center: ChunkCoord) -> usize {
        let mut spawned = 0;
        for &(dx, dz) in &self.disk {
            let coord = center.offset(dx, dz);
            if world.registry().contains(coord) {
                continue;
            }
            // Lost races with another spawner are fine; that spawner queues the work.
            if let Ok(chunk) = world.try_spawn_chunk(coord) {
                world.queues().load.push(WorkItem::GenerateChunk(chunk.into()));
                spawned += 1;
            }
        }
        spawned
    }

    fn evict_distant(&self, world: &World, center: ChunkCoord) -> usize {
        let limit = i64::from(self.config.unload_radius()).pow(2);
        let mut queued = 0;
        for chunk in world.registry().snapshot() {
            if chunk.coord().distance_sq(center) <= limit {
                continue;
            }
            // Loading and unloading chunks are skipped; a later tick catches them.
            let marked = chunk.transition(ChunkState::Loaded, ChunkState::QueuedForUnload)
                || chunk.transition(ChunkState::Spawned, ChunkState::QueuedForUnload);
            if marked {
                world.queues().unload.push(WorkItem::UnloadChunk(chunk.into()));
                queued += 1;
            }
        }
        queued
    }
}

/// Offsets with `dx² + dz² <= radius²`, sorted nearest first.
fn load_disk(radius: i32) -> Vec<(i32, i32)> {
    let limit = i64::from(radius).pow(2);
    let mut disk: Vec<(i32, i32)> = (-radius..=radius)
        .flat_map(|dz| (-radius..=radius).map(move |dx| (dx, dz)))
        .filter(|&(dx, dz)| i64::from(dx).pow(2) + i64::from(dz).pow(2) <= limit)
        .collect();
    disk.sort_by_key(|&(dx, dz)| i64::from(dx).pow(2) + i64::from(dz).pow(2));
    disk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::FlatTerrain;
    use crate::queue::Duty;
    use crate::tasks::run_pending;
    use crate::world::WorldConfig;
    use strata_core::Block;

    fn streamer(radius: i32, hysteresis: i32) -> StreamingController {
        StreamingController::new(
            StreamingConfig::default()
                .with_load_radius(radius)
                .with_unload_hysteresis(hysteresis),
        )
    }

    #[test]
    fn disk_is_circular_and_nearest_first() {
        assert_eq!(load_disk(0), vec![(0, 0)]);
        assert_eq!(load_disk(1).len(), 5);
        assert_eq!(load_disk(2).len(), 13);

        let disk = load_disk(3);
        assert_eq!(disk[0], (0, 0));
        assert!(!disk.contains(&(3, 3)));
        assert!(disk.contains(&(3, 0)));
    }

    #[test]
    fn viewer_chunk_conversion() {
        let world = World::new(WorldConfig::default());
        // 16 blocks of 10 units per chunk.
        let chunk = StreamingController::viewer_chunk(&world, Vec3::new(150.0, 900.0, 159.0));
        assert_eq!(chunk, ChunkCoord::new(0, 0));

        let chunk = StreamingController::viewer_chunk(&world, Vec3::new(165.0, 0.0, 0.0));
        assert_eq!(chunk, ChunkCoord::new(1, 0));

        let chunk = StreamingController::viewer_chunk(&world, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(chunk, ChunkCoord::new(-1, -1));
    }

    #[test]
    fn streamer_spawns_disk() {
        let world = World::new(WorldConfig::default());
        let mut streamer = streamer(2, 1);

        let tick = streamer.tick(&world, &Viewer::at(Vec3::new(80.0, 500.0, 80.0)));
        assert_eq!(tick.center, ChunkCoord::new(0, 0));
        assert_eq!(tick.spawned, 13);
        assert_eq!(world.registry().len(), 13);
        assert_eq!(world.queues().len(Duty::Generate), 13);

        // Nothing new while the viewer stays put.
        let again = streamer.tick(&world, &Viewer::at(Vec3::new(85.0, 500.0, 80.0)));
        assert_eq!(again.spawned, 0);
        assert_eq!(world.queues().len(Duty::Generate), 13);
    }

    #[test]
    fn hysteresis_keeps_nearby_chunks() {
        let world = World::new(WorldConfig::default());
        let mut streamer = streamer(2, 2);
        let terrain = FlatTerrain::new(2, Block::STONE);

        streamer.tick(&world, &Viewer::at(Vec3::ZERO));
        run_pending(&world, &terrain).expect("tasks succeed");

        // One chunk over: the trailing edge is at distance 3, inside radius + hysteresis.
        let tick = streamer.tick(&world, &Viewer::at(Vec3::new(160.0, 0.0, 0.0)));
        assert_eq!(tick.queued_unload, 0);
        assert!(tick.spawned > 0);
    }

    #[test]
    fn streamer_unloads_distant_chunks() {
        let world = World::new(WorldConfig::default());
        let mut streamer = streamer(1, 1);
        let terrain = FlatTerrain::new(2, Block::STONE);

        streamer.tick(&world, &Viewer::at(Vec3::ZERO));
        run_pending(&world, &terrain).expect("tasks succeed");
        assert_eq!(world.registry().chunks_in_state(ChunkState::Loaded).len(), 5);

        let far = Viewer::at(Vec3::new(5000.0, 0.0, 5000.0));
        let tick = streamer.tick(&world, &far);
        assert_eq!(tick.queued_unload, 5);
        assert_eq!(world.queues().len(Duty::Unload), 5);

        // Already queued chunks are not queued twice.
        let again = streamer.tick(&world, &far);
        assert_eq!(again.queued_unload, 0);

        run_pending(&world, &terrain).expect("tasks succeed");
        assert!(world.chunk(ChunkCoord::new(0, 0)).is_none());
        assert_eq!(world.registry().len(), 5);
    }

    #[test]
    fn pending_spawn_is_cancelled_by_eviction() {
        let world = World::new(WorldConfig::default());
        let mut streamer = streamer(0, 0);
        let terrain = FlatTerrain::new(2, Block::STONE);

        streamer.tick(&world, &Viewer::at(Vec3::ZERO));
        let origin = world.chunk(ChunkCoord::new(0, 0)).expect("spawned");
        assert_eq!(origin.state(), ChunkState::Spawned);

        streamer.tick(&world, &Viewer::at(Vec3::new(1000.0, 0.0, 0.0)));
        assert_eq!(origin.state(), ChunkState::QueuedForUnload);

        run_pending(&world, &terrain).expect("tasks succeed");
        assert_eq!(origin.state(), ChunkState::Destroyed);
        assert!(world.chunk(ChunkCoord::new(0, 0)).is_none());
        assert_eq!(origin.block_count(), 0);
    }

    #[test]
    fn config_validation() {
        assert!(StreamingConfig::default().validate().is_ok());
        assert!(StreamingConfig::default().with_load_radius(-1).validate().is_err());
        assert!(StreamingConfig::default().with_unload_hysteresis(-1).validate().is_err());
        assert!(StreamingConfig::default().with_column_height_hint(0).validate().is_err());
        assert_eq!(StreamingConfig::default().unload_radius(), 17);
    }
}
