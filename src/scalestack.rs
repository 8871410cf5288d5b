//! Fixed capacity traversal stack, indexed by octree scale rather than by push order.

/// A parent voxel saved while traversal descends below it.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct StackEntry {
    /// Index of the parent node in the compiled node array.
    pub parent: u32,
    /// The active span's `t_max` when the parent was left.
    pub t_max: f32,
}

/// A stack data structure implemented on the stack with fixed capacity.
///
/// Unlike a regular stack, entries are addressed by scale: descending from scale `s` writes
/// slot `s`, and popping to a common ancestor at scale `s` reads slot `s` directly, skipping any
/// entries in between. Stale entries below the current scale are simply overwritten by later
/// descents, so the stack never needs to be cleared and never allocates.
#[derive(Clone, Copy)]
pub struct ScaleStack<const STACK_SIZE: usize> {
    data: [StackEntry; STACK_SIZE],
}

impl<const STACK_SIZE: usize> Default for ScaleStack<STACK_SIZE> {
    fn default() -> Self {
        Self {
            data: [StackEntry::default(); STACK_SIZE],
        }
    }
}

impl<const STACK_SIZE: usize> ScaleStack<STACK_SIZE> {
    /// Saves `parent` and `t_max` for `scale`, replacing whatever was stored there.
    ///
    /// # Panics
    /// Panics if `scale` is not below `STACK_SIZE`.
    #[inline(always)]
    pub fn write(&mut self, scale: usize, parent: u32, t_max: f32) {
        self.data[scale] = StackEntry { parent, t_max };
    }

    /// Returns the entry last written for `scale`.
    ///
    /// # Panics
    /// Panics if `scale` is not below `STACK_SIZE`.
    #[inline(always)]
    pub fn read(&self, scale: usize) -> StackEntry {
        self.data[scale]
    }
}
