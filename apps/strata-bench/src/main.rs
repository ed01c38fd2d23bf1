//! Strata headless streaming driver
//!
//! Flies a viewer across procedurally generated terrain, ticking the scheduler
//! once per simulation step and draining mesh updates the way a renderer would.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -p strata-bench -- [OPTIONS]
//! ```
//!
//! ## Options
//!
//! - `--radius <N>`: Chunk load radius (default: 8)
//! - `--hysteresis <N>`: Extra chunks kept before eviction (default: 2)
//! - `--seed <N>`: World generation seed (default: 42)
//! - `--steps <N>`: Simulation steps to run (default: 600)
//! - `--speed <F>`: Viewer speed in blocks per step (default: 2.0)
//! - `-h, --help`: Print help message
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use glam::{IVec3, Mat4, Vec3};
use strata_core::{ChunkCoord, WorldPos};
use strata_world::{
    NoiseTerrain, RenderUpdate, Scheduler, SchedulerConfig, StreamingConfig, TerrainSource, Viewer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Simulation steps per second.
const STEP_RATE: u32 = 60;
/// Steps between stats reports.
const REPORT_EVERY: u32 = 60;
/// Viewer altitude in blocks.
const FLIGHT_HEIGHT: f32 = 110.0;

#[derive(Debug, Clone, Copy)]
struct BenchArgs {
    radius: i32,
    hysteresis: i32,
    seed: u64,
    steps: u32,
    speed: f32,
}

impl Default for BenchArgs {
    fn default() -> Self {
        Self {
            radius: 8,
            hysteresis: 2,
            seed: 42,
            steps: 600,
            speed: 2.0,
        }
    }
}

impl BenchArgs {
    /// Parse options from the command line, ignoring anything unrecognised.
    fn from_args() -> Self {
        let mut params = Self::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            let value = args.get(i + 1);
            let consumed = match args[i].as_str() {
                "--radius" => parse_into(value, &mut params.radius),
                "--hysteresis" => parse_into(value, &mut params.hysteresis),
                "--seed" => parse_into(value, &mut params.seed),
                "--steps" => parse_into(value, &mut params.steps),
                "--speed" => parse_into(value, &mut params.speed),
                other => {
                    warn!(arg = other, "Ignoring unknown argument");
                    false
                }
            };
            i += if consumed { 2 } else { 1 };
        }

        params
    }
}

fn parse_into<T: std::str::FromStr>(value: Option<&String>, slot: &mut T) -> bool {
    match value.map(|v| v.parse()) {
        Some(Ok(parsed)) => {
            *slot = parsed;
            true
        }
        _ => false,
    }
}

/// Tallies what a renderer would have uploaded and freed.
#[derive(Debug, Default)]
struct RenderTally {
    meshes: u64,
    hidden: u64,
    released: u64,
    quads: u64,
}

impl RenderTally {
    fn apply(&mut self, updates: Vec<RenderUpdate>) {
        for update in updates {
            match update {
                RenderUpdate::Mesh { mesh, .. } if mesh.is_empty() => self.hidden += 1,
                RenderUpdate::Mesh { mesh, .. } => {
                    self.meshes += 1;
                    self.quads += mesh.geometry.quad_count() as u64;
                }
                RenderUpdate::Released { .. } => self.released += 1,
            }
        }
    }
}

/// Viewer position and camera for a given step, in world units.
fn viewer_at(step: u32, args: &BenchArgs, block_scale: f32) -> Viewer {
    let t = step as f32 * args.speed;
    // Straight line with a slow sideways drift.
    let blocks = Vec3::new(t, FLIGHT_HEIGHT, (t * 0.01).sin() * 64.0);
    let ahead = blocks + Vec3::new(16.0, -8.0, 0.0);

    let position = blocks * block_scale;
    let view = Mat4::look_at_rh(position, ahead * block_scale, Vec3::Y);
    let projection = Mat4::perspective_rh(70f32.to_radians(), 16.0 / 9.0, 1.0, 100_000.0);
    Viewer::at(position).with_view_projection(projection * view)
}

fn main() -> anyhow::Result<()> {
    if std::env::args().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = BenchArgs::from_args();
    info!(?args, "Strata streaming benchmark");

    let config = SchedulerConfig {
        streaming: StreamingConfig::default()
            .with_load_radius(args.radius)
            .with_unload_hysteresis(args.hysteresis),
        ..SchedulerConfig::default()
    };
    let block_scale = config.world.block_scale;
    let terrain: Arc<dyn TerrainSource> = Arc::new(NoiseTerrain::with_seed(args.seed));
    let mut scheduler = Scheduler::new(config, terrain)?;

    let step_time = Duration::from_secs(1) / STEP_RATE;
    let started = Instant::now();
    let mut tally = RenderTally::default();
    let mut spawned = 0usize;
    let mut evicted = 0usize;

    for step in 0..args.steps {
        let frame_start = Instant::now();

        let tick = scheduler.tick(&viewer_at(step, &args, block_scale));
        spawned += tick.spawned;
        evicted += tick.queued_unload;
        tally.apply(scheduler.drain_render_updates());

        if step % REPORT_EVERY == 0 {
            let stats = scheduler.stats();
            info!(
                step,
                center = %tick.center,
                loaded = stats.loaded_chunks,
                generate = stats.pending_generate,
                remesh = stats.pending_remesh,
                unload = stats.pending_unload,
                meshes_built = stats.meshes_built,
                "Streaming"
            );
        }

        if let Some(rest) = step_time.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    let elapsed = started.elapsed();
    let stats = scheduler.stats();
    tally.apply(scheduler.drain_render_updates());

    // Look straight down from the final viewer position.
    let end = viewer_at(args.steps, &args, block_scale).position;
    let ground = scheduler
        .world()
        .raycast_world(end, Vec3::new(end.x, 0.0, end.z))
        .map(|hit| hit.position);
    let below = ChunkCoord::containing(end / block_scale);
    let surface = scheduler
        .world()
        .try_get_block(WorldPos::from(end / block_scale).offset(IVec3::NEG_Y));

    scheduler.shutdown();

    info!(
        elapsed = ?elapsed,
        spawned,
        evicted,
        meshes_built = stats.meshes_built,
        meshes_uploaded = tally.meshes,
        segments_hidden = tally.hidden,
        chunks_released = tally.released,
        quads = tally.quads,
        meshes_per_sec = stats.meshes_built as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        "Finished"
    );
    match ground {
        Some(pos) => info!(chunk = %below, ground = ?pos, "Ground under viewer"),
        None => info!(chunk = %below, "No ground under viewer yet"),
    }
    if let Err(err) = surface {
        warn!(error = %err, "Could not read the viewer's column");
    }

    Ok(())
}

fn print_help() {
    eprintln!(
        "Strata headless streaming driver

USAGE:
    cargo run --release -p strata-bench -- [OPTIONS]

OPTIONS:
    --radius <N>        Chunk load radius (default: 8)
    --hysteresis <N>    Extra chunks kept before eviction (default: 2)
    --seed <N>          World generation seed (default: 42)
    --steps <N>         Simulation steps to run (default: 600)
    --speed <F>         Viewer speed in blocks per step (default: 2.0)
    -h, --help          Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Set log level (e.g., info, debug, trace)"
    );
}
