//! Core voxel types.
//!
//! Air is never a [`Block`]: cells hold `Option<Block>` and `None` is air.

use bytemuck::{Pod, Zeroable};
use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Identifier for a block type.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Stone block
    pub const STONE: Self = Self(1);
    /// Dirt block
    pub const DIRT: Self = Self(2);
    /// Grass block
    pub const GRASS: Self = Self(3);
    /// Snow block
    pub const SNOW: Self = Self(4);
    /// Sand block
    pub const SAND: Self = Self(5);
    /// Water block
    pub const WATER: Self = Self(6);
    /// Tree log block
    pub const LOG: Self = Self(7);
    /// Tree leaves block
    pub const LEAVES: Self = Self(8);
    /// Glass block
    pub const GLASS: Self = Self(9);
}

/// 8-bit RGBA color.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(C)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);

    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color from RGB
    #[inline]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    #[inline]
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Immutable voxel descriptor.
///
/// Two blocks are equal iff id, transparency and color all match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    /// The block type
    pub id: BlockId,
    /// Whether neighbouring faces show through this block
    pub transparent: bool,
    /// Vertex color used by the mesher
    pub color: Rgba8,
}

impl Block {
    /// Create an opaque block
    #[inline]
    pub const fn opaque(id: BlockId, color: Rgba8) -> Self {
        Self {
            id,
            transparent: false,
            color,
        }
    }

    /// Create a transparent block
    #[inline]
    pub const fn transparent(id: BlockId, color: Rgba8) -> Self {
        Self {
            id,
            transparent: true,
            color,
        }
    }

    /// Same block with a different color.
    #[inline]
    #[must_use]
    pub const fn with_color(self, color: Rgba8) -> Self {
        Self { color, ..self }
    }

    /// Default stone block
    pub const STONE: Self = Self::opaque(BlockId::STONE, Rgba8::rgb(128, 128, 128));
    /// Default dirt block
    pub const DIRT: Self = Self::opaque(BlockId::DIRT, Rgba8::rgb(139, 90, 43));
    /// Default grass block
    pub const GRASS: Self = Self::opaque(BlockId::GRASS, Rgba8::rgb(86, 125, 70));
    /// Default snow block
    pub const SNOW: Self = Self::opaque(BlockId::SNOW, Rgba8::rgb(236, 238, 245));
    /// Default sand block
    pub const SAND: Self = Self::opaque(BlockId::SAND, Rgba8::rgb(215, 199, 133));
    /// Default water block
    pub const WATER: Self = Self::transparent(BlockId::WATER, Rgba8::new(58, 103, 178, 160));
    /// Default log block
    pub const LOG: Self = Self::opaque(BlockId::LOG, Rgba8::rgb(94, 68, 42));
    /// Default leaves block
    pub const LEAVES: Self = Self::opaque(BlockId::LEAVES, Rgba8::rgb(62, 114, 52));
    /// Default glass block
    pub const GLASS: Self = Self::transparent(BlockId::GLASS, Rgba8::new(220, 235, 240, 90));
}

/// One of the six axis-aligned face orientations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Face {
    /// -Z
    South,
    /// +Z
    North,
    /// +X
    East,
    /// -X
    West,
    /// +Y
    Top,
    /// -Y
    Bottom,
}

impl Face {
    pub const ALL: [Self; 6] = [
        Self::South,
        Self::North,
        Self::East,
        Self::West,
        Self::Top,
        Self::Bottom,
    ];

    /// Outward unit normal
    pub const fn normal(self) -> IVec3 {
        match self {
            Self::South => IVec3::new(0, 0, -1),
            Self::North => IVec3::new(0, 0, 1),
            Self::East => IVec3::new(1, 0, 0),
            Self::West => IVec3::new(-1, 0, 0),
            Self::Top => IVec3::new(0, 1, 0),
            Self::Bottom => IVec3::new(0, -1, 0),
        }
    }

    /// Face whose outward normal equals `normal`, if it is axis-aligned and unit.
    pub fn from_normal(normal: IVec3) -> Option<Self> {
        Self::ALL.into_iter().find(|face| face.normal() == normal)
    }
}
