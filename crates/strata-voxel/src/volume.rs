//! Segment snapshot with a one-voxel halo.

use strata_core::constants::SEGMENT_SIZE;
use strata_core::Block;

/// Edge length of a padded volume (segment plus one cell on each side).
pub const PADDED_SIZE: usize = SEGMENT_SIZE + 2;

const PADDED_VOLUME: usize = PADDED_SIZE * PADDED_SIZE * PADDED_SIZE;

/// Dense copy of a segment and the neighbouring cells its faces can touch.
///
/// Coordinates are segment-local and valid in `-1..=SEGMENT_SIZE` on every axis.
/// Anything outside that range reads as air.
#[derive(Clone)]
pub struct PaddedVolume {
    cells: Box<[Option<Block>]>,
}

impl PaddedVolume {
    /// An all-air volume.
    pub fn new() -> Self {
        Self {
            cells: vec![None; PADDED_VOLUME].into_boxed_slice(),
        }
    }

    /// Build a volume by sampling every cell that meshing can observe.
    ///
    /// Only the interior and the six face slabs are sampled; halo edges and corners
    /// are never read by the mesher and stay air.
    pub fn from_fn(mut sample: impl FnMut(i32, i32, i32) -> Option<Block>) -> Self {
        let mut volume = Self::new();
        let max = SEGMENT_SIZE as i32;
        for z in -1..=max {
            for y in -1..=max {
                for x in -1..=max {
                    let outside = [x, y, z].iter().filter(|c| **c < 0 || **c >= max).count();
                    if outside <= 1 {
                        volume.set(x, y, z, sample(x, y, z));
                    }
                }
            }
        }
        volume
    }

    #[inline]
    fn index(x: i32, y: i32, z: i32) -> Option<usize> {
        let range = -1..=SEGMENT_SIZE as i32;
        if range.contains(&x) && range.contains(&y) && range.contains(&z) {
            let (x, y, z) = ((x + 1) as usize, (y + 1) as usize, (z + 1) as usize);
            Some(x + y * PADDED_SIZE + z * PADDED_SIZE * PADDED_SIZE)
        } else {
            None
        }
    }

    /// Block at a segment-local coordinate, `None` for air or outside the halo.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<Block> {
        Self::index(x, y, z).and_then(|i| self.cells[i])
    }

    /// Store a block; writes outside the halo are ignored.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, z: i32, block: Option<Block>) {
        if let Some(i) = Self::index(x, y, z) {
            self.cells[i] = block;
        }
    }

    /// Reset every cell to air.
    pub fn clear(&mut self) {
        self.cells.fill(None);
    }

    /// Whether the interior (excluding the halo) holds no blocks.
    pub fn interior_is_empty(&self) -> bool {
        let max = SEGMENT_SIZE as i32;
        (0..max).all(|z| (0..max).all(|y| (0..max).all(|x| self.get(x, y, z).is_none())))
    }
}

impl Default for PaddedVolume {
    fn default() -> Self {
        Self::new()
    }
}
