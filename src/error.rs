use thiserror::Error;

/// Errors reported by the fallible octree constructors and builders.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OctreeError {
    #[error("octree depth {depth} is outside of 1..={max}")]
    InvalidDepth { depth: u32, max: u32 },

    #[error("cell ({x}, {y}, {z}) is outside of an octree with side {side}")]
    CoordinateOutOfRange { x: u32, y: u32, z: u32, side: u32 },
}
