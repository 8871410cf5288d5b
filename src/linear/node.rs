use std::fmt::{self, Formatter};

use bytemuck::{Pod, Zeroable};
use std::fmt::Debug;

/// A compiled octree node. repr(C), Pod, 8 bytes.
///
/// The children of a node always occupy a block of 8 consecutive slots starting at
/// `index + child_offset`, one per octant, whether or not the octant is occupied.
/// Octant bits: bit0 = x, bit1 = y, bit2 = z (1 = upper half).
#[derive(Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CompiledNode {
    /// Bit `i` is set if octant `i` is occupied.
    pub child_mask: u8,
    /// Bit `i` is set if octant `i` is a leaf. Always a subset of `child_mask`.
    pub leaf_mask: u8,
    pub _pad: u16,
    /// Distance from this node's slot to the first slot of its child block.
    /// Only meaningful if `child_mask != 0`, in which case it is greater than 0.
    pub child_offset: u32,
}

impl Debug for CompiledNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledNode")
            .field("child_mask", &format!("{:#010b}", &self.child_mask))
            .field("leaf_mask", &format!("{:#010b}", &self.leaf_mask))
            .field("child_offset", &self.child_offset)
            .finish()
    }
}

impl CompiledNode {
    #[inline(always)]
    pub fn has_children(&self) -> bool {
        self.child_mask != 0
    }

    #[inline(always)]
    pub fn has_child(&self, octant: u32) -> bool {
        self.child_mask & (1 << octant) != 0
    }

    #[inline(always)]
    pub fn is_leaf(&self, octant: u32) -> bool {
        self.leaf_mask & (1 << octant) != 0
    }

    /// Slot of the child in `octant`, given this node's own slot.
    /// Wraps on overflow, a corrupt offset then just points outside of the array.
    #[inline(always)]
    pub fn child_index(&self, node_index: u32, octant: u32) -> u32 {
        node_index.wrapping_add(self.child_offset).wrapping_add(octant)
    }
}
