//! Streaming, editable voxel terrain for the Strata engine.
//!
//! Chunks live in a shared [`ChunkRegistry`]; background worker pools generate,
//! remesh and unload them while a [`StreamingController`] keeps the loaded set
//! centred on the viewer. [`Scheduler`] wires it all together.

pub mod chunk;
pub mod generation;
pub mod handoff;
pub mod meshing;
pub mod queue;
pub mod raycast;
pub mod registry;
pub mod scheduler;
pub mod streaming;
pub mod tasks;
pub mod work;
pub mod workers;
pub mod world;

pub use chunk::{Chunk, ChunkState};
pub use generation::{Column, FlatTerrain, NoiseTerrain, TerrainConfig, TerrainSource};
pub use handoff::RenderUpdate;
pub use queue::{Duty, LoadOrdering, WorkQueues};
pub use raycast::{raycast, RayHit};
pub use registry::ChunkRegistry;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};
pub use streaming::{StreamingConfig, StreamingController, StreamingTick, Viewer};
pub use tasks::{execute, run_pending};
pub use work::{ChunkTarget, RemeshKey, SegmentTarget, TaskOutcome, WorkItem};
pub use workers::{WorkerConfig, WorkerPool};
pub use world::{EditOptions, World, WorldConfig};

/// World seed for procedural generation.
pub type WorldSeed = u64;
