//! A flat, pointer free octree for traversal. See [`compiler`] for how it is produced.

pub mod compiler;
pub mod node;
pub mod traverse;

use std::{
    collections::{HashMap, HashSet},
    fmt,
};

use glam::Vec3A;

use crate::{aabb::Aabb, cell::Cell};

pub use compiler::{compile, CompileStats};
pub use node::CompiledNode;

/// A compiled octree. Immutable once built, so it can be shared freely between threads.
///
/// Slot 0 is the root. Every node with children owns a block of 8 slots at
/// `index + child_offset`, in octant order.
#[derive(Clone, Debug, Default)]
pub struct CompiledOctree {
    pub nodes: Vec<CompiledNode>,
    /// One cell per slot. Leaf slots hold the leaf's cell, inner slots the first leaf cell found
    /// below them, unoccupied slots `Cell::default()`.
    pub cells: Vec<Cell>,
    /// Depth of the leaves. The octree spans `[0, 2^max_depth)^3`.
    pub max_depth: u32,
    pub stats: CompileStats,
}

impl CompiledOctree {
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
    pub fn stats(&self) -> &CompileStats {
        &self.stats
    }

    /// World space bounds of the whole volume.
    pub fn bounds(&self) -> Aabb {
        Aabb::new(Vec3A::ZERO, Vec3A::splat(self.side() as f32))
    }

    /// The node array as raw bytes, ready to be uploaded to a GPU buffer.
    pub fn node_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.nodes)
    }

    /// Checks the structure of the node array. Panics if it is malformed.
    pub fn validate(&self) -> LinearValidationResult {
        crate::scope!("validate");
        assert!(!self.nodes.is_empty());
        assert_eq!(self.nodes.len(), self.cells.len());

        let mut result = LinearValidationResult {
            slot_count: self.nodes.len(),
            ..Default::default()
        };
        result.discovered_slots.insert(0);
        self.validate_impl(0, 0, &mut result);

        // Every slot is either the root or part of exactly one child block.
        assert_eq!(result.discovered_slots.len(), self.nodes.len());
        assert!(result.max_depth <= self.max_depth);

        result
    }

    fn validate_impl(&self, node_index: u32, depth: u32, result: &mut LinearValidationResult) {
        let node = &self.nodes[node_index as usize];
        result.node_count += 1;
        *result.nodes_at_depth.entry(depth).or_default() += 1;

        assert_eq!(node.leaf_mask & !node.child_mask, 0);
        assert!(node.leaf_mask.count_ones() <= node.child_mask.count_ones());

        if !node.has_children() {
            // Only an empty root has no children.
            assert_eq!(node_index, 0);
            return;
        }

        assert!(node.child_offset > 0);
        let block_start = node_index as usize + node.child_offset as usize;
        assert!(block_start + 8 <= self.nodes.len());
        for octant in 0..8 {
            // Blocks never overlap.
            assert!(result.discovered_slots.insert((block_start + octant) as u32));
        }

        let child_depth = depth + 1;
        result.max_depth = result.max_depth.max(child_depth);
        assert!(child_depth <= self.max_depth);

        for octant in 0..8u32 {
            if !node.has_child(octant) {
                continue;
            }
            let child_index = node.child_index(node_index, octant);
            if node.is_leaf(octant) {
                assert_eq!(child_depth, self.max_depth);
                result.leaf_count += 1;
                *result.leaves_at_depth.entry(child_depth).or_default() += 1;
            } else {
                assert!(child_depth < self.max_depth);
                self.validate_impl(child_index, child_depth, result);
            }
        }
    }

    /// Prints the tree to stdout, one line per occupied slot.
    pub fn print_tree(&self) {
        print!("{}", self.tree_string());
    }

    /// The tree as printed by [`CompiledOctree::print_tree`].
    pub fn tree_string(&self) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            out.push_str("root\n");
            self.tree_string_rec(0, "  ", &mut out);
        }
        out
    }

    fn tree_string_rec(&self, node_index: u32, indent: &str, out: &mut String) {
        let node = &self.nodes[node_index as usize];
        for octant in 0..8u32 {
            if !node.has_child(octant) {
                continue;
            }
            let child_index = node.child_index(node_index, octant);
            let (x, y, z) = (octant & 1, (octant >> 1) & 1, octant >> 2);
            if node.is_leaf(octant) {
                let cell = self.cells[child_index as usize];
                out.push_str(&format!(
                    "{indent}{octant} ({x}, {y}, {z}) leaf {:?} {:?}\n",
                    cell.kind, cell.texture
                ));
            } else {
                out.push_str(&format!("{indent}{octant} ({x}, {y}, {z}) slot {child_index}\n"));
                self.tree_string_rec(child_index, &format!("{indent}  "), out);
            }
        }
    }
}

/// Result of CompiledOctree validation. Contains various octree stats.
#[derive(Default)]
pub struct LinearValidationResult {
    /// Slots reached from the root, the root included.
    pub discovered_slots: HashSet<u32>,
    /// Total number of slots in the node array.
    pub slot_count: usize,
    /// Number of occupied inner nodes, the root included.
    pub node_count: usize,
    pub leaf_count: usize,
    pub max_depth: u32,
    /// Quantity of inner nodes found at each depth.
    pub nodes_at_depth: HashMap<u32, u32>,
    /// Quantity of leaves found at each depth.
    pub leaves_at_depth: HashMap<u32, u32>,
}

impl fmt::Display for LinearValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Octree slot occupancy: {:.3}",
            (self.node_count.saturating_sub(1) + self.leaf_count) as f64
                / (self.slot_count.max(2) - 1) as f64
        )?;

        writeln!(
            f,
            "\
slot_count: {}
node_count: {}
leaf_count: {}",
            self.slot_count, self.node_count, self.leaf_count
        )?;

        writeln!(f, "Node & Leaf counts for each depth")?;
        for i in 0..=self.max_depth {
            writeln!(
                f,
                "{:<3} {:<10} {:<10}",
                i,
                self.nodes_at_depth.get(&i).unwrap_or(&0),
                self.leaves_at_depth.get(&i).unwrap_or(&0)
            )?;
        }

        Ok(())
    }
}
