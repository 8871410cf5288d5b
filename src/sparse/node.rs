use crate::cell::Cell;

/// A node in the build tree, can be an inner node or leaf.
/// Each node exclusively owns its children; there are no parent links.
#[derive(Default, Clone, Debug)]
pub struct Node {
    /// Child for each octant. Octant bits: bit0 = x, bit1 = y, bit2 = z (1 = upper half).
    pub children: [Option<Box<Node>>; 8],
    /// Leaves have no children and carry `cell`.
    pub leaf: bool,
    /// Only meaningful if `leaf` is set.
    pub cell: Cell,
}

impl Node {
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.leaf
    }

    #[inline(always)]
    pub fn child(&self, octant: usize) -> Option<&Node> {
        self.children[octant].as_deref()
    }

    #[inline(always)]
    pub fn has_children(&self) -> bool {
        self.children.iter().any(Option::is_some)
    }

    #[inline(always)]
    pub fn child_count(&self) -> u32 {
        self.children.iter().filter(|c| c.is_some()).count() as u32
    }

    /// Turns this node into a leaf holding `cell`. Overwrites any previous cell.
    #[inline(always)]
    pub fn make_leaf(&mut self, cell: Cell) {
        debug_assert!(!self.has_children());
        self.leaf = true;
        self.cell = cell;
    }
}

/// Index of the octant containing the point with the given per-axis bits.
#[inline(always)]
pub fn octant_index(x_bit: u32, y_bit: u32, z_bit: u32) -> usize {
    ((x_bit & 1) | ((y_bit & 1) << 1) | ((z_bit & 1) << 2)) as usize
}
