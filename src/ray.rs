//! A ray in 3D space and the record of what it hit.

use glam::{UVec3, Vec2, Vec3A};

use crate::cell::Cell;

/// Pushes `x` away from zero so that its magnitude is at least `epsilon`, keeping its sign.
/// `+0.0` becomes `+epsilon` and `-0.0` becomes `-epsilon`.
#[inline(always)]
pub fn clamp_magnitude(x: f32, epsilon: f32) -> f32 {
    if x.abs() < epsilon {
        epsilon.copysign(x)
    } else {
        x
    }
}

/// Computes the inverse of `x` avoiding division by zero.
#[inline(always)]
pub fn safe_inverse(x: f32) -> f32 {
    if x.abs() <= f32::EPSILON {
        x.signum() / f32::EPSILON
    } else {
        1.0 / x
    }
}

/// A struct representing a ray in 3D space.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct Ray {
    /// The starting point of the ray.
    pub origin: Vec3A,
    /// The normalized direction vector of the ray.
    pub direction: Vec3A,
    /// The minimum `t` (distance) value for intersection tests.
    pub tmin: f32,
    /// The maximum `t` (distance) value for intersection tests.
    pub tmax: f32,
}

impl Ray {
    /// Creates a new `Ray` with the given origin, direction, and `t` (distance) range.
    /// The direction does not need to be normalized.
    pub fn new(origin: Vec3A, direction: Vec3A, min: f32, max: f32) -> Self {
        let ray = Ray {
            origin,
            direction: direction.normalize(),
            tmin: min,
            tmax: max,
        };

        debug_assert!(ray.direction.is_finite());
        debug_assert!(origin.is_finite());

        ray
    }

    /// Creates a new infinite `Ray` with the given origin, direction.
    pub fn new_inf(origin: Vec3A, direction: Vec3A) -> Self {
        Self::new(origin, direction, 0.0, f32::INFINITY)
    }

    /// Per component inverse of the direction, finite even for axis aligned rays.
    #[inline(always)]
    pub fn inv_direction(&self) -> Vec3A {
        Vec3A::new(
            safe_inverse(self.direction.x),
            safe_inverse(self.direction.y),
            safe_inverse(self.direction.z),
        )
    }

    /// Point along the ray at distance `t`.
    #[inline(always)]
    pub fn at(&self, t: f32) -> Vec3A {
        self.origin + self.direction * t
    }
}

pub const INVALID_ID: u32 = u32::MAX;

/// The result of casting a ray into a compiled octree.
/// `cell` is `None` when the ray missed everything.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitPoint {
    /// World space hit position.
    pub position: Vec3A,
    /// Axis aligned normal of the face that was entered.
    pub normal: Vec3A,
    /// Coordinate on the entered face, in 0..1 across the hit voxel.
    pub voxel_coord: Vec2,
    /// Distance along the ray.
    pub distance: f32,
    /// Cell of the hit voxel, `None` on a miss. Level of detail hits on inner nodes report the
    /// first leaf cell below them.
    pub cell: Option<Cell>,
    /// Slot of the hit voxel in the compiled node array.
    pub node_index: u32,
    /// Integer coordinate of the hit voxel's minimum corner.
    pub voxel: UVec3,
    /// Side of the hit voxel. 1 for leaves, larger when level of detail stopped early.
    pub voxel_size: u32,
    /// Number of traversal iterations. Diagnostic only.
    pub complexity: u32,
}

impl HitPoint {
    /// Creates a new `HitPoint` instance representing no hit.
    pub fn none() -> Self {
        Self {
            position: Vec3A::ZERO,
            normal: Vec3A::ZERO,
            voxel_coord: Vec2::ZERO,
            distance: f32::INFINITY,
            cell: None,
            node_index: INVALID_ID,
            voxel: UVec3::ZERO,
            voxel_size: 0,
            complexity: 0,
        }
    }

    #[inline(always)]
    pub fn is_hit(&self) -> bool {
        self.cell.is_some()
    }
}

impl Default for HitPoint {
    fn default() -> Self {
        Self::none()
    }
}
