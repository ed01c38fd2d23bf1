//! Mesh buffers produced by the greedy mesher.

use glam::Vec3;
use strata_core::{Rgba8, SegmentKey};

/// One vertex/normal/color/index buffer set.
///
/// Every quad contributes 4 vertices, 4 normals, 4 colors and 6 indices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshBuffers {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u32>,
}

impl MeshBuffers {
    /// Whether there is nothing to draw.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of quads in the buffer.
    #[inline]
    pub fn quad_count(&self) -> usize {
        self.positions.len() / 4
    }

    /// Append one quad. `corners` are in emission order, `indices` are relative to the first corner.
    pub(crate) fn push_quad(
        &mut self,
        corners: [Vec3; 4],
        indices: [u32; 6],
        normal: Vec3,
        color: Rgba8,
    ) {
        let base = self.positions.len() as u32;
        self.positions.extend(corners.map(|corner| corner.to_array()));
        self.normals.extend([normal.to_array(); 4]);
        self.colors.extend([color.to_array(); 4]);
        self.indices.extend(indices.map(|i| base + i));
    }

    /// Corner positions of each quad, in emission order.
    pub fn quads(&self) -> impl Iterator<Item = [Vec3; 4]> + '_ {
        self.positions
            .chunks_exact(4)
            .map(|quad| [0, 1, 2, 3].map(|i| Vec3::from_array(quad[i])))
    }

    /// Raw position bytes for GPU upload.
    pub fn position_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.positions)
    }

    /// Raw normal bytes for GPU upload.
    pub fn normal_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.normals)
    }

    /// Raw color bytes for GPU upload.
    pub fn color_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.colors)
    }

    /// Raw index bytes for GPU upload.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// Opaque and transparent geometry of one segment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SegmentGeometry {
    pub opaque: MeshBuffers,
    pub transparent: MeshBuffers,
}

impl SegmentGeometry {
    /// Whether both buckets are empty.
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    /// Total quads across both buckets.
    pub fn quad_count(&self) -> usize {
        self.opaque.quad_count() + self.transparent.quad_count()
    }
}

/// A completed mesh build for one segment.
///
/// Vertices are segment-local in block units. The render side places the mesh at
/// `origin() * block_scale` and scales it by `block_scale`.
#[derive(Clone, Debug)]
pub struct SegmentMesh {
    pub key: SegmentKey,
    /// Stamp of the segment snapshot this mesh was built from.
    pub version: u64,
    pub geometry: SegmentGeometry,
}

impl SegmentMesh {
    pub fn new(key: SegmentKey, version: u64, geometry: SegmentGeometry) -> Self {
        Self {
            key,
            version,
            geometry,
        }
    }

    /// Segment minimum corner in world block coordinates.
    pub fn origin(&self) -> Vec3 {
        self.key.origin().to_vec3()
    }

    pub fn opaque(&self) -> &MeshBuffers {
        &self.geometry.opaque
    }

    pub fn transparent(&self) -> &MeshBuffers {
        &self.geometry.transparent
    }

    /// Nothing to draw in either bucket.
    pub fn is_empty(&self) -> bool {
        self.geometry.is_empty()
    }
}
