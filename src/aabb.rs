//! An Axis-Aligned Bounding Box (AABB) represented by its minimum and maximum points.

use std::ops::BitAnd;

use glam::{UVec3, Vec3A};

use crate::ray::Ray;

/// An Axis-Aligned Bounding Box (AABB) represented by its minimum and maximum points.
#[derive(Default, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct Aabb {
    pub min: Vec3A,
    pub max: Vec3A,
}

impl Aabb {
    /// Creates a new AABB with the given minimum and maximum points.
    #[inline(always)]
    pub fn new(min: Vec3A, max: Vec3A) -> Self {
        Self { min, max }
    }

    /// The cube covered by the voxel with minimum corner `voxel` and side `size`.
    #[inline(always)]
    pub fn from_voxel(voxel: UVec3, size: u32) -> Self {
        let min = voxel.as_vec3a();
        Self {
            min,
            max: min + size as f32,
        }
    }

    /// Checks if the AABB contains the given point.
    #[inline(always)]
    pub fn contains_point(&self, point: Vec3A) -> bool {
        (point.cmpge(self.min).bitand(point.cmple(self.max))).all()
    }

    /// Checks if this AABB intersects with a ray and returns the distance to the intersection point,
    /// clipped to the ray's `[tmin, tmax]` range.
    /// Returns `f32::INFINITY` if there is no intersection.
    #[inline(always)]
    pub fn intersect_ray(&self, ray: &Ray) -> f32 {
        let inv_direction = ray.inv_direction();
        let t1 = (self.min - ray.origin) * inv_direction;
        let t2 = (self.max - ray.origin) * inv_direction;

        let tmin = t1.min(t2);
        let tmax = t1.max(t2);

        let tmin_n = tmin.max_element().max(ray.tmin);
        let tmax_n = tmax.min_element().min(ray.tmax);

        if tmax_n >= tmin_n {
            tmin_n
        } else {
            f32::INFINITY
        }
    }
}
