//! The mutable, pointer based octree used while authoring a scene.

pub mod node;

use glam::{uvec3, UVec3};

use crate::{
    cell::{Cell, CellType, Texture},
    error::OctreeError,
    linear::{compiler::compile, CompiledOctree},
    OctreeParams, MAX_DEPTH,
};

pub use node::{octant_index, Node};

/// A sparse voxel octree addressed by integer coordinates in `0..2^max_depth` on each axis.
/// Nodes are only created where cells are set.
#[derive(Clone, Debug)]
pub struct SparseOctree {
    root: Node,
    max_depth: u32,
    /// Number of nodes below the root.
    node_count: usize,
    leaf_count: usize,
    /// Validate the compiled octree even in release builds.
    pub validate_on_compile: bool,
}

impl SparseOctree {
    /// Creates an empty octree with side `2^max_depth`.
    ///
    /// # Panics
    /// Panics if `max_depth` is not in `1..=MAX_DEPTH`.
    pub fn new(max_depth: u32) -> Self {
        match Self::try_new(max_depth) {
            Ok(octree) => octree,
            Err(e) => panic!("{e}"),
        }
    }

    /// Creates an empty octree with side `2^max_depth`.
    pub fn try_new(max_depth: u32) -> Result<Self, OctreeError> {
        if max_depth == 0 || max_depth > MAX_DEPTH {
            return Err(OctreeError::InvalidDepth {
                depth: max_depth,
                max: MAX_DEPTH,
            });
        }
        Ok(Self {
            root: Node::default(),
            max_depth,
            node_count: 0,
            leaf_count: 0,
            validate_on_compile: false,
        })
    }

    /// Creates an empty octree configured from `params`.
    pub fn from_params(params: &OctreeParams) -> Result<Self, OctreeError> {
        let mut octree = Self::try_new(params.max_depth)?;
        octree.validate_on_compile = params.validate;
        Ok(octree)
    }

    #[inline(always)]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Linear size of the octree, in cells.
    #[inline(always)]
    pub fn side(&self) -> u32 {
        1 << self.max_depth
    }

    #[inline(always)]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of nodes below the root, including leaves.
    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of distinct cells that have been set.
    #[inline(always)]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    #[inline(always)]
    fn in_range(&self, x: u32, y: u32, z: u32) -> bool {
        let side = self.side();
        x < side && y < side && z < side
    }

    /// Sets the cell at `(x, y, z)`, creating the nodes on the way down as needed.
    /// Setting the same coordinate again overwrites the cell.
    ///
    /// Coordinates outside of `0..side()` wrap around (each is taken modulo `side()`).
    /// Use [`SparseOctree::try_set_cell`] to reject them instead.
    pub fn set_cell(&mut self, kind: CellType, texture: Texture, x: u32, y: u32, z: u32) {
        if !self.in_range(x, y, z) {
            log::debug!(
                "set_cell ({x}, {y}, {z}) is outside of side {}, wrapping",
                self.side()
            );
        }
        let mask = self.side() - 1;
        self.insert(Cell::new(kind, texture), x & mask, y & mask, z & mask);
    }

    /// Sets the cell at `(x, y, z)`, or returns an error if the coordinate is out of range.
    pub fn try_set_cell(
        &mut self,
        kind: CellType,
        texture: Texture,
        x: u32,
        y: u32,
        z: u32,
    ) -> Result<(), OctreeError> {
        if !self.in_range(x, y, z) {
            return Err(OctreeError::CoordinateOutOfRange {
                x,
                y,
                z,
                side: self.side(),
            });
        }
        self.insert(Cell::new(kind, texture), x, y, z);
        Ok(())
    }

    fn insert(&mut self, cell: Cell, x: u32, y: u32, z: u32) {
        let mut node = &mut self.root;
        // Walk from the coarsest level down, picking the octant from the coordinate bit at each level.
        for level in (0..self.max_depth).rev() {
            let octant = octant_index(x >> level, y >> level, z >> level);
            if node.children[octant].is_none() {
                self.node_count += 1;
            }
            node = &mut **node.children[octant].get_or_insert_with(Box::default);
        }
        if !node.is_leaf() {
            self.leaf_count += 1;
        }
        node.make_leaf(cell);
    }

    /// Returns the cell at `(x, y, z)` if one has been set.
    pub fn get_cell(&self, x: u32, y: u32, z: u32) -> Option<Cell> {
        if !self.in_range(x, y, z) {
            return None;
        }
        let mut node = &self.root;
        for level in (0..self.max_depth).rev() {
            node = node.child(octant_index(x >> level, y >> level, z >> level))?;
        }
        node.is_leaf().then_some(node.cell)
    }

    /// Collects every set cell with its coordinate, in depth first octant order.
    pub fn leaves(&self) -> Vec<(UVec3, Cell)> {
        let mut leaves = Vec::with_capacity(self.leaf_count);
        collect_leaves(&self.root, UVec3::ZERO, self.side(), &mut leaves);
        leaves
    }

    /// Flatten into the pointer free representation used for traversal.
    pub fn compile(&self) -> CompiledOctree {
        compile(self)
    }
}

fn collect_leaves(node: &Node, min: UVec3, size: u32, leaves: &mut Vec<(UVec3, Cell)>) {
    if node.is_leaf() {
        leaves.push((min, node.cell));
        return;
    }
    let half = size / 2;
    for (octant, child) in node.children.iter().enumerate() {
        if let Some(child) = child {
            let o = octant as u32;
            let child_min = min + uvec3(o & 1, (o >> 1) & 1, (o >> 2) & 1) * half;
            collect_leaves(child, child_min, half, leaves);
        }
    }
}
