//! Procedural terrain generation.
//!
//! Terrain is described column by column: a [`TerrainSource`] maps a world (X, Z)
//! to a bottom-up list of bands, and the generate task writes those bands into the
//! chunk's segments.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strata_core::constants::SEGMENT_SIZE;
use strata_core::{Block, ChunkCoord};

use crate::WorldSeed;

/// One vertical column of terrain as bottom-up bands.
///
/// Band `i` fills world Y from the previous band's top (or 0) up to, but not
/// including, its own `top`. A `None` block leaves that band as air.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Column {
    bands: Vec<(i32, Option<Block>)>,
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a band reaching up to `top` (exclusive).
    ///
    /// Bands that would not rise above the current top are ignored.
    pub fn push(&mut self, top: i32, block: Option<Block>) {
        if top > self.height() {
            self.bands.push((top, block));
        }
    }

    /// Builder form of [`Column::push`].
    #[must_use]
    pub fn with_band(mut self, top: i32, block: Option<Block>) -> Self {
        self.push(top, block);
        self
    }

    pub fn bands(&self) -> &[(i32, Option<Block>)] {
        &self.bands
    }

    /// Top of the highest band.
    pub fn height(&self) -> i32 {
        self.bands.last().map_or(0, |(top, _)| *top)
    }

    /// Block at world Y, `None` for air or above the column.
    pub fn block_at(&self, y: i32) -> Option<Block> {
        if y < 0 {
            return None;
        }
        self.bands
            .iter()
            .find(|(top, _)| y < *top)
            .and_then(|(_, block)| *block)
    }

    /// Iterate `(y, block)` for every solid cell, bottom up.
    pub fn cells(&self) -> impl Iterator<Item = (i32, Block)> + '_ {
        let bottoms = std::iter::once(0).chain(self.bands.iter().map(|(top, _)| *top));
        self.bands
            .iter()
            .zip(bottoms)
            .filter_map(|(&(top, block), bottom)| block.map(|b| (bottom..top, b)))
            .flat_map(|(range, block)| range.map(move |y| (y, block)))
    }
}

/// External terrain collaborator: a pure function of world column coordinates.
pub trait TerrainSource: Send + Sync {
    /// Describe the column at world block coordinates (`world_x`, `world_z`).
    fn column(&self, world_x: i32, world_z: i32) -> Column;
}

/// Sample all S×S columns of a chunk in parallel.
///
/// Columns are returned in `x + z * S` order.
#[cfg_attr(
    feature = "profiling-tracy",
    tracing::instrument(level = "trace", skip_all)
)]
pub fn sample_columns(terrain: &dyn TerrainSource, coord: ChunkCoord) -> Vec<Column> {
    let base = coord.min_block(0);
    (0..SEGMENT_SIZE * SEGMENT_SIZE)
        .into_par_iter()
        .map(|i| {
            let lx = (i % SEGMENT_SIZE) as i32;
            let lz = (i / SEGMENT_SIZE) as i32;
            terrain.column(base.x + lx, base.z + lz)
        })
        .collect()
}

/// Terrain generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainConfig {
    /// Seed for noise generation.
    pub seed: WorldSeed,
    /// Water fills every column up to this Y.
    pub sea_level: i32,
    /// Lowest possible surface Y.
    pub base_height: i32,
    /// Horizontal scale of terrain features.
    pub terrain_scale: f64,
    /// Maximum terrain height variation.
    pub terrain_height: f64,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Depth of dirt layer below surface.
    pub dirt_depth: i32,
    /// Surfaces at or above this Y are capped with snow instead of grass.
    pub snow_line: i32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            sea_level: 30,
            base_height: 16,
            terrain_scale: 100.0,
            terrain_height: 64.0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            dirt_depth: 4,
            snow_line: 72,
        }
    }
}

/// Procedural terrain using fractal noise for the surface height.
pub struct NoiseTerrain {
    config: TerrainConfig,
    height_noise: Fbm<Perlin>,
}

impl NoiseTerrain {
    /// Create a new terrain generator with the given configuration.
    pub fn new(config: TerrainConfig) -> Self {
        let height_noise = Fbm::<Perlin>::new(config.seed as u32)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        Self {
            config,
            height_noise,
        }
    }

    /// Create a terrain generator with default configuration.
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self::new(TerrainConfig {
            seed,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Y of the topmost solid block at world XZ coordinates.
    pub fn height_at(&self, world_x: i32, world_z: i32) -> i32 {
        let nx = f64::from(world_x) / self.config.terrain_scale;
        let nz = f64::from(world_z) / self.config.terrain_scale;

        // Noise returns [-1, 1], map to [0, terrain_height] above the base
        let noise_value = self.height_noise.get([nx, nz]).clamp(-1.0, 1.0);
        ((noise_value + 1.0) * 0.5 * self.config.terrain_height) as i32 + self.config.base_height
    }
}

impl TerrainSource for NoiseTerrain {
    fn column(&self, world_x: i32, world_z: i32) -> Column {
        let surface = self.height_at(world_x, world_z);
        let cap = if surface >= self.config.snow_line {
            Block::SNOW
        } else if surface <= self.config.sea_level {
            Block::SAND
        } else {
            Block::GRASS
        };

        Column::new()
            .with_band(surface - self.config.dirt_depth, Some(Block::STONE))
            .with_band(surface, Some(Block::DIRT))
            .with_band(surface + 1, Some(cap))
            .with_band(self.config.sea_level + 1, Some(Block::WATER))
    }
}

/// Flat terrain of a single block type, `height` blocks tall.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub height: i32,
    pub block: Block,
}

impl FlatTerrain {
    pub const fn new(height: i32, block: Block) -> Self {
        Self { height, block }
    }
}

impl TerrainSource for FlatTerrain {
    fn column(&self, _world_x: i32, _world_z: i32) -> Column {
        Column::new().with_band(self.height, Some(self.block))
    }
}
