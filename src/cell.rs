//! Leaf-level occupancy record stored in the octree.

/// The kind of matter a voxel is made of.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellType {
    #[default]
    Empty,
    Solid,
    Mirror,
}

/// Material / texture tag used by the shading layer.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Texture {
    #[default]
    Grass,
    Red,
    White,
}

/// The payload of a single voxel. Only leaves carry a `Cell` in the build tree.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct Cell {
    pub kind: CellType,
    pub texture: Texture,
}

impl Cell {
    #[inline(always)]
    pub const fn new(kind: CellType, texture: Texture) -> Self {
        Self { kind, texture }
    }

    /// Shorthand for a solid cell with the given texture.
    #[inline(always)]
    pub const fn solid(texture: Texture) -> Self {
        Self::new(CellType::Solid, texture)
    }
}
