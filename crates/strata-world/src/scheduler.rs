//! Explicit owner of the world, streaming controller and worker pools.
//!
//! An external driver calls [`Scheduler::tick`] once per simulation step and
//! [`Scheduler::drain_render_updates`] whenever it is ready to upload meshes.
//! Neither call blocks on background work.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_core::Result;
use tracing::info;

use crate::chunk::ChunkState;
use crate::generation::TerrainSource;
use crate::handoff::RenderUpdate;
use crate::queue::Duty;
use crate::streaming::{StreamingConfig, StreamingController, StreamingTick, Viewer};
use crate::workers::{WorkerConfig, WorkerPool};
use crate::world::{World, WorldConfig};

/// Everything fixed at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub world: WorldConfig,
    pub streaming: StreamingConfig,
    pub workers: WorkerConfig,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        self.world.validate()?;
        self.streaming.validate()?;
        self.workers.validate()
    }
}

/// Snapshot of queue depths and throughput.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub loaded_chunks: usize,
    pub pending_generate: usize,
    pub pending_remesh: usize,
    pub pending_unload: usize,
    /// Cumulative since the world was created.
    pub meshes_built: u64,
}

pub struct Scheduler {
    world: Arc<World>,
    streaming: StreamingController,
    pools: Vec<WorkerPool>,
}

impl Scheduler {
    /// Validate `config` and start one worker pool per duty.
    pub fn new(config: SchedulerConfig, terrain: Arc<dyn TerrainSource>) -> Result<Self> {
        config.validate()?;
        let world = Arc::new(World::new(config.world));

        let mut pools = Vec::with_capacity(Duty::ALL.len());
        for duty in Duty::ALL {
            // Pools already running are stopped by their Drop on early return.
            pools.push(WorkerPool::spawn(
                duty,
                &config.workers,
                Arc::clone(&world),
                Arc::clone(&terrain),
            )?);
        }

        info!(
            load_radius = config.streaming.load_radius,
            unload_hysteresis = config.streaming.unload_hysteresis,
            block_scale = config.world.block_scale,
            "Scheduler started"
        );

        Ok(Self {
            world,
            streaming: StreamingController::new(config.streaming),
            pools,
        })
    }

    /// Shared world, for edits and ray casts from the driver thread.
    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Run one streaming pass for the current viewer.
    pub fn tick(&mut self, viewer: &Viewer) -> StreamingTick {
        self.streaming.tick(&self.world, viewer)
    }

    pub fn drain_render_updates(&self) -> Vec<RenderUpdate> {
        self.world.drain_render_updates()
    }

    pub fn stats(&self) -> SchedulerStats {
        let queues = self.world.queues();
        SchedulerStats {
            loaded_chunks: self.world.registry().chunks_in_state(ChunkState::Loaded).len(),
            pending_generate: queues.len(Duty::Generate),
            pending_remesh: queues.len(Duty::Remesh),
            pending_unload: queues.len(Duty::Unload),
            meshes_built: self.world.meshes_built(),
        }
    }

    /// Stop every worker pool. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.pools.is_empty() {
            return;
        }
        for pool in &mut self.pools {
            pool.shutdown();
        }
        self.pools.clear();
        info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
