#![allow(clippy::needless_range_loop)]

//! # Sparse Voxel Octree Construction and Ray Traversal Library
//!
//! - A pointer based [`SparseOctree`](sparse::SparseOctree) for authoring scenes one cell at a time.
//! - A depth first compiler to a flat, pointer free array of 8 byte nodes, where the children of a node
//!   occupy 8 consecutive slots found by a relative offset. The array can be uploaded to a GPU as is.
//! - Iterative, allocation free CPU traversal in the style of
//!   [Efficient Sparse Voxel Octrees](https://research.nvidia.com/publication/2010-02_efficient-sparse-voxel-octrees)
//!   with optional level of detail cut-off.
//!
//! LSVO optionally uses [rayon](https://github.com/rayon-rs/rayon) to cast batches of rays in parallel.
//! A [`CompiledOctree`](linear::CompiledOctree) is read-only, so it can also be shared between threads directly.
//!
//! ## Example
//!
//! ```
//! use glam::*;
//! use lsvo::{
//!     cell::{CellType, Texture},
//!     sparse::SparseOctree,
//! };
//!
//! // A 16x16x16 volume with a single voxel
//! let mut octree = SparseOctree::new(4);
//! octree.set_cell(CellType::Solid, Texture::Red, 8, 8, 8);
//!
//! // Flatten it for traversal
//! let compiled = octree.compile();
//!
//! // Cast a ray towards the voxel
//! let hit = compiled.cast_ray(vec3a(1.0, 1.0, 1.0), vec3a(1.0, 1.0, 1.0));
//! if let Some(cell) = hit.cell {
//!     println!("Hit {:?} voxel {} at distance {}", cell.kind, hit.voxel, hit.distance);
//! } else {
//!     println!("Miss");
//! }
//! # assert_eq!(hit.voxel, uvec3(8, 8, 8));
//! ```

use std::time::Duration;

pub mod aabb;
pub mod cell;
pub mod error;
pub mod linear;
pub mod ray;
pub mod scalestack;
pub mod sparse;
pub mod test_util;

/// Deepest supported octree. Cells are addressed with `u32` coordinates and traversal needs a few
/// mantissa bits below the leaf size.
pub const MAX_DEPTH: u32 = 20;

/// Apply a function to each component of a type.
#[doc(hidden)]
pub trait PerComponent<C1, C2 = C1, Output = Self> {
    fn per_comp(self, f: impl Fn(C1) -> C2) -> Output;
}

impl<Input, C1, C2, Output> PerComponent<C1, C2, Output> for Input
where
    Input: Into<[C1; 3]>,
    Output: From<[C2; 3]>,
{
    /// Applies a function to each component of the input.
    fn per_comp(self, f: impl Fn(C1) -> C2) -> Output {
        let [x, y, z] = self.into();
        Output::from([f(x), f(y), f(z)])
    }
}

/// A macro to measure and print the execution time of a block of code.
///
/// # Arguments
/// * `$label` - A string label to identify the code block being timed.
/// * `$($code:tt)*` - The code block whose execution time is to be measured.
///
/// # Usage
/// ```rust
/// use lsvo::timeit;
/// timeit!["example",
///     // code to measure
/// ];
/// ```
///
/// # Note
/// The macro doesn't include a scope so variables don't need to be passed out of it.
///
/// This macro only measures time when the `timeit` feature is enabled.
#[macro_export]
#[doc(hidden)]
macro_rules! timeit {
    [$label:expr, $($code:tt)*] => {
        #[cfg(feature = "timeit")]
        let timeit_start = std::time::Instant::now();
        $($code)*
        #[cfg(feature = "timeit")]
        println!("{:>8} {}", format!("{}", $crate::PrettyDuration(timeit_start.elapsed())), $label);
    };
}

/// A wrapper struct for `std::time::Duration` to provide pretty-printing of durations.
#[doc(hidden)]
pub struct PrettyDuration(pub Duration);

impl std::fmt::Display for PrettyDuration {
    /// Seconds and milliseconds are printed with two decimal places, anything shorter in whole microseconds.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let duration = self.0;
        if duration.as_secs() > 0 {
            write!(f, "{:.2}s ", duration.as_secs_f64())
        } else if duration.subsec_millis() > 0 {
            write!(f, "{:.2}ms", duration.as_secs_f64() * 1_000.0)
        } else {
            write!(f, "{}µs", duration.as_micros())
        }
    }
}

/// Add profile scope. Nesting the macro allows us to make the profiling crate optional.
#[doc(hidden)]
#[macro_export]
macro_rules! scope {
    [$label:expr] => {
        #[cfg(feature = "profile")]
        profiling::scope!($label);
    };
}

/// General build parameters for [`SparseOctree`](sparse::SparseOctree).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OctreeParams {
    /// Number of levels below the root. The octree spans `2^max_depth` cells per axis.
    pub max_depth: u32,
    /// Validate the compiled octree in release builds too. Debug builds always validate.
    pub validate: bool,
}

impl OctreeParams {
    /// 16^3 cells.
    pub const fn tiny_build() -> Self {
        OctreeParams {
            max_depth: 4,
            validate: true,
        }
    }
    /// 64^3 cells.
    pub const fn small_build() -> Self {
        OctreeParams {
            max_depth: 6,
            validate: false,
        }
    }
    /// 256^3 cells.
    pub const fn medium_build() -> Self {
        OctreeParams {
            max_depth: 8,
            validate: false,
        }
    }
    /// 4096^3 cells.
    pub const fn large_build() -> Self {
        OctreeParams {
            max_depth: 12,
            validate: false,
        }
    }
}

impl Default for OctreeParams {
    fn default() -> Self {
        Self::medium_build()
    }
}

/// Level of detail cut-off for traversal.
///
/// Traversal stops at the first voxel whose size (in cells) is at most the projected footprint
/// `t * size_coef + size_bias` at the distance `t` it is left at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodParams {
    pub size_coef: f32,
    pub size_bias: f32,
}

impl LodParams {
    /// Always descend to the leaves.
    pub const NONE: Self = Self {
        size_coef: 0.0,
        size_bias: 0.0,
    };

    pub const fn new(size_coef: f32, size_bias: f32) -> Self {
        Self {
            size_coef,
            size_bias,
        }
    }

    /// Stop at voxels smaller than a pixel of a pinhole camera with vertical field of view `fov_y`
    /// (radians) rendering `height` pixels.
    pub fn from_pixel_footprint(fov_y: f32, height: u32) -> Self {
        Self::new(2.0 * (fov_y * 0.5).tan() / height.max(1) as f32, 0.0)
    }
}

impl Default for LodParams {
    fn default() -> Self {
        Self::NONE
    }
}
