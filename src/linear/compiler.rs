//! Flattens a [`SparseOctree`] into a [`CompiledOctree`].

use std::time::{Duration, Instant};

use crate::{
    cell::Cell,
    linear::{CompiledNode, CompiledOctree},
    scope,
    sparse::{Node, SparseOctree},
    timeit,
};

/// Statistics gathered while compiling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CompileStats {
    /// Total number of slots in the node array, including unoccupied octants of child blocks.
    pub slot_count: usize,
    /// Number of occupied internal nodes, including the root.
    pub inner_count: usize,
    pub leaf_count: usize,
    /// Largest `child_offset` written. Bounds the offset width a packed layout would need.
    pub max_child_offset: u32,
    /// Depth of the deepest leaf. The root is at depth 0.
    pub max_depth: u32,
    pub build_time: Duration,
}

/// Depth first, block reserving compiler.
/// A node's 8 child slots are appended before any of its children is visited, so every
/// `child_offset` is known when the node is written and never needs fixing up afterwards.
pub struct OctreeCompiler<'a> {
    pub octree: &'a SparseOctree,
    pub nodes: Vec<CompiledNode>,
    pub cells: Vec<Cell>,
    pub stats: CompileStats,
}

impl<'a> OctreeCompiler<'a> {
    /// Initialize the compiler with a placeholder root at slot 0.
    pub fn new(octree: &'a SparseOctree) -> Self {
        // Each internal node, the root included, reserves 8 slots.
        let capacity = 1 + 8 * (1 + octree.node_count() - octree.leaf_count());

        let mut nodes = Vec::with_capacity(capacity);
        nodes.push(CompiledNode::default());
        let mut cells = Vec::with_capacity(capacity);
        cells.push(Cell::default());

        Self {
            octree,
            nodes,
            cells,
            stats: CompileStats::default(),
        }
    }

    /// Compile the whole build tree.
    pub fn compile(mut self) -> CompiledOctree {
        scope!("compile");
        let start_time = Instant::now();

        timeit!["compile nodes",
        let root_cell = self.compile_node(self.octree.root(), 0, 0);
        ];
        self.cells[0] = root_cell.unwrap_or_default();

        self.stats.slot_count = self.nodes.len();
        self.stats.build_time = start_time.elapsed();

        log::debug!(
            "compiled octree: {} slots, {} inner, {} leaves, max offset {}, depth {} in {:?}",
            self.stats.slot_count,
            self.stats.inner_count,
            self.stats.leaf_count,
            self.stats.max_child_offset,
            self.stats.max_depth,
            self.stats.build_time
        );

        CompiledOctree {
            nodes: self.nodes,
            cells: self.cells,
            max_depth: self.octree.max_depth(),
            stats: self.stats,
        }
    }

    /// Writes the child block of `node`, which lives at `node_index`, and recurses into its internal
    /// children. Returns the first leaf cell found below `node` in octant order.
    fn compile_node(&mut self, node: &Node, node_index: usize, depth: u32) -> Option<Cell> {
        self.stats.inner_count += 1;
        if !node.has_children() {
            return None;
        }

        let block_start = self.nodes.len();
        assert!(block_start + 8 <= u32::MAX as usize);
        self.nodes.resize(block_start + 8, CompiledNode::default());
        self.cells.resize(block_start + 8, Cell::default());

        let child_offset = (block_start - node_index) as u32;
        self.stats.max_child_offset = self.stats.max_child_offset.max(child_offset);
        self.nodes[node_index].child_offset = child_offset;

        let mut representative = None;
        for (octant, child) in node.children.iter().enumerate() {
            let Some(child) = child else {
                continue;
            };
            let child_index = block_start + octant;
            self.nodes[node_index].child_mask |= 1 << octant;

            let cell = if child.is_leaf() {
                self.nodes[node_index].leaf_mask |= 1 << octant;
                self.stats.leaf_count += 1;
                self.stats.max_depth = self.stats.max_depth.max(depth + 1);
                Some(child.cell)
            } else {
                self.compile_node(child, child_index, depth + 1)
            };

            if let Some(cell) = cell {
                self.cells[child_index] = cell;
                representative = representative.or(Some(cell));
            }
        }

        representative
    }
}

/// Compile `octree` into its pointer free form.
///
/// In debug builds, or if the octree has `validate_on_compile` set, the result is validated.
pub fn compile(octree: &SparseOctree) -> CompiledOctree {
    let compiled = OctreeCompiler::new(octree).compile();

    #[cfg(debug_assertions)]
    {
        compiled.validate();
    }
    #[cfg(not(debug_assertions))]
    {
        if octree.validate_on_compile {
            compiled.validate();
        }
    }

    compiled
}
