//! Voxel grid traversal (Amanatides & Woo DDA).

use glam::{IVec3, Vec3};
use strata_core::{Block, WorldPos};

/// First solid cell found by a ray.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RayHit {
    /// Cell that was hit, in block coordinates.
    pub position: WorldPos,
    pub block: Block,
    /// Outward normal of the face the ray entered through.
    ///
    /// Zero when the ray starts inside the hit cell.
    pub face_normal: IVec3,
}

impl RayHit {
    /// Cell on the struck face's side, where a placed block would go.
    pub fn adjacent(&self) -> WorldPos {
        self.position.offset(self.face_normal)
    }
}

/// Walk the cells between `start` and `end` (block units) and return the first one
/// for which `sample` yields a block.
pub fn raycast(
    start: Vec3,
    end: Vec3,
    mut sample: impl FnMut(WorldPos) -> Option<Block>,
) -> Option<RayHit> {
    let dir = end - start;
    let mut cell = WorldPos::from(start).to_ivec3();
    let end_cell = WorldPos::from(end).to_ivec3();

    let step = IVec3::new(axis_step(dir.x), axis_step(dir.y), axis_step(dir.z));
    let t_delta = Vec3::new(axis_delta(dir.x), axis_delta(dir.y), axis_delta(dir.z));
    let mut t_max = Vec3::new(
        axis_boundary(start.x, cell.x, dir.x),
        axis_boundary(start.y, cell.y, dir.y),
        axis_boundary(start.z, cell.z, dir.z),
    );

    let mut face_normal = IVec3::ZERO;
    let max_steps = (end_cell - cell).abs().element_sum();

    for _ in 0..=max_steps {
        let position = WorldPos::from(cell);
        if let Some(block) = sample(position) {
            return Some(RayHit {
                position,
                block,
                face_normal,
            });
        }
        if cell == end_cell {
            break;
        }

        let axis = if t_max.x < t_max.y {
            if t_max.x < t_max.z { 0 } else { 2 }
        } else if t_max.y < t_max.z {
            1
        } else {
            2
        };
        if t_max[axis] > 1.0 {
            break;
        }

        cell[axis] += step[axis];
        t_max[axis] += t_delta[axis];
        face_normal = IVec3::ZERO;
        face_normal[axis] = -step[axis];
    }

    None
}

#[inline]
fn axis_step(d: f32) -> i32 {
    if d > 0.0 {
        1
    } else if d < 0.0 {
        -1
    } else {
        0
    }
}

/// Parametric distance between successive boundaries on one axis.
#[inline]
fn axis_delta(d: f32) -> f32 {
    if d == 0.0 {
        f32::INFINITY
    } else {
        1.0 / d.abs()
    }
}

/// Parametric distance to the first boundary crossed on one axis.
#[inline]
fn axis_boundary(origin: f32, cell: i32, d: f32) -> f32 {
    if d > 0.0 {
        ((cell + 1) as f32 - origin) / d
    } else if d < 0.0 {
        (origin - cell as f32) / -d
    } else {
        f32::INFINITY
    }
}
