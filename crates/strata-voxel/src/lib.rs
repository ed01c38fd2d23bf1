//! Segment voxel storage and greedy meshing for the Strata voxel terrain.
//!
//! A [`ChunkSegment`] is a dense `SEGMENT_SIZE`³ block of optional blocks. Meshing works on a
//! [`PaddedVolume`] snapshot (the segment plus a one-voxel halo borrowed from its neighbours)
//! so the mesher never touches locks or the world registry.

pub mod greedy;
pub mod mesh;
pub mod segment;
pub mod volume;

pub use greedy::greedy_mesh;
pub use mesh::{MeshBuffers, SegmentGeometry, SegmentMesh};
pub use segment::{ChunkSegment, OccupiedBounds, SegmentView};
pub use volume::PaddedVolume;
