//! Greedy meshing.
//!
//! For each axis and direction the mesher sweeps planes through the segment, builds a
//! `SEGMENT_SIZE`² mask of exposed faces, then merges equal mask cells into maximal
//! rectangles. Two faces merge only when their owning blocks are equal by value.

use glam::Vec3;
use strata_core::constants::SEGMENT_SIZE;
use strata_core::Block;

use crate::mesh::{MeshBuffers, SegmentGeometry};
use crate::volume::PaddedVolume;

const SIZE: i32 = SEGMENT_SIZE as i32;

/// Triangle order for faces pointing along the positive axis.
const FRONT_INDICES: [u32; 6] = [2, 0, 1, 1, 3, 2];
/// Triangle order for faces pointing along the negative axis.
const BACK_INDICES: [u32; 6] = [2, 3, 1, 1, 0, 2];

/// Mesh a segment snapshot into opaque and transparent buckets.
///
/// An all-air volume yields empty buffers in both buckets.
#[cfg_attr(
    feature = "profiling-tracy",
    tracing::instrument(level = "trace", skip_all)
)]
pub fn greedy_mesh(volume: &PaddedVolume) -> SegmentGeometry {
    let mut geometry = SegmentGeometry::default();
    let mut mask: Vec<Option<Block>> = vec![None; SEGMENT_SIZE * SEGMENT_SIZE];

    for back in [true, false] {
        for d in 0..3 {
            let u = (d + 1) % 3;
            let v = (d + 2) % 3;
            let mut x = [0i32; 3];
            let mut q = [0i32; 3];
            q[d] = 1;

            x[d] = -1;
            while x[d] < SIZE {
                let plane = x[d];
                let mut n = 0;
                for xv in 0..SIZE {
                    x[v] = xv;
                    for xu in 0..SIZE {
                        x[u] = xu;
                        let near = volume.get(x[0], x[1], x[2]);
                        let far = volume.get(x[0] + q[0], x[1] + q[1], x[2] + q[2]);
                        mask[n] = face_owner(near, far, back, plane);
                        n += 1;
                    }
                }

                x[d] += 1;
                merge_mask(&mut mask, |i, j, w, h, block| {
                    x[u] = i;
                    x[v] = j;
                    let mut du = [0i32; 3];
                    let mut dv = [0i32; 3];
                    du[u] = w;
                    dv[v] = h;

                    let bucket = if block.transparent {
                        &mut geometry.transparent
                    } else {
                        &mut geometry.opaque
                    };
                    emit_quad(bucket, x, du, dv, block, back);
                });
            }
        }
    }

    geometry
}

/// Which block, if any, owns the face between `near` and `far` on this pass.
///
/// Faces between two blocks of equal opacity are hidden. Faces owned by a halo
/// cell belong to the neighbouring segment and are skipped here.
#[inline]
fn face_owner(near: Option<Block>, far: Option<Block>, back: bool, plane: i32) -> Option<Block> {
    match (near, far) {
        (Some(a), Some(b)) if a.transparent == b.transparent => None,
        _ if back => far.filter(|_| plane + 1 < SIZE),
        _ => near.filter(|_| plane >= 0),
    }
}

/// Merge equal, non-empty mask cells into rectangles, calling `emit(i, j, w, h, block)`
/// for each and clearing the consumed cells.
fn merge_mask(mask: &mut [Option<Block>], mut emit: impl FnMut(i32, i32, i32, i32, Block)) {
    let size = SEGMENT_SIZE;
    let mut n = 0;
    for j in 0..size {
        let mut i = 0;
        while i < size {
            let Some(block) = mask[n] else {
                i += 1;
                n += 1;
                continue;
            };

            let mut w = 1;
            while i + w < size && mask[n + w] == Some(block) {
                w += 1;
            }

            let mut h = 1;
            'rows: while j + h < size {
                for k in 0..w {
                    if mask[n + k + h * size] != Some(block) {
                        break 'rows;
                    }
                }
                h += 1;
            }

            emit(i as i32, j as i32, w as i32, h as i32, block);

            for l in 0..h {
                mask[n + l * size..n + l * size + w].fill(None);
            }

            i += w;
            n += w;
        }
    }
}

fn emit_quad(
    buffers: &mut MeshBuffers,
    origin: [i32; 3],
    du: [i32; 3],
    dv: [i32; 3],
    block: Block,
    back: bool,
) {
    let at = |a: [i32; 3]| Vec3::new(a[0] as f32, a[1] as f32, a[2] as f32);
    let origin = at(origin);
    let du = at(du);
    let dv = at(dv);

    let bottom_left = origin;
    let top_left = origin + du;
    let top_right = origin + du + dv;
    let bottom_right = origin + dv;

    let mut normal = (top_right - top_left)
        .cross(bottom_right - top_left)
        .normalize();
    if back {
        normal = -normal;
    }

    let indices = if back { BACK_INDICES } else { FRONT_INDICES };
    buffers.push_quad(
        [top_left, top_right, bottom_left, bottom_right],
        indices,
        normal,
        block.color,
    );
}
