//! Core types, coordinates and math for the Strata voxel terrain.
//!
//! This crate provides the foundational types used throughout the workspace:
//! - Block descriptors and colors
//! - Coordinate systems (world, chunk column, segment)
//! - Bounding volumes and frustum tests
//! - The shared error type

pub mod coords;
pub mod error;
pub mod math;
pub mod types;

pub use coords::{ChunkCoord, SegmentKey, WorldPos};
pub use error::{Error, Result};
pub use types::{Block, BlockId, Face, Rgba8};

/// Engine-wide constants
pub mod constants {
    /// Edge length of a chunk segment in blocks
    pub const SEGMENT_SIZE: usize = 16;
    /// Bits needed to address a block within a segment (4 bits for 0-15)
    pub const SEGMENT_BITS: u32 = 4;
    /// Mask extracting the segment-local part of a block coordinate
    pub const SEGMENT_MASK: i32 = (SEGMENT_SIZE as i32) - 1;
    /// Total cells in a segment (16^3)
    pub const SEGMENT_VOLUME: usize = SEGMENT_SIZE * SEGMENT_SIZE * SEGMENT_SIZE;

    const _: () = assert!(1 << SEGMENT_BITS == SEGMENT_SIZE);
}
