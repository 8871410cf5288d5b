//! Ray traversal of a [`CompiledOctree`].
//!
//! Iterative and allocation free, following "Efficient Sparse Voxel Octrees" (Laine & Karras 2010).
//! The octree is placed at `[1, 2)^3`, where every voxel boundary is exactly representable and the
//! mantissa bits of a position encode the octant path down to it. Axes along which the ray moves in
//! the positive direction are mirrored so that traversal always walks towards smaller coordinates;
//! the result is un-mirrored once at the end.
//!
//! The common ancestor lookup on pop reads the position of the highest set bit out of the exponent
//! of an `f32` and rebuilds cube sizes from raw exponent bits. This depends on the IEEE-754 binary32
//! layout: 1 sign bit, 8 exponent bits with a bias of 127, and 23 mantissa bits.

use glam::{UVec3, Vec3A};

use crate::{
    linear::CompiledOctree,
    ray::{clamp_magnitude, HitPoint, Ray},
    scalestack::ScaleStack,
    LodParams, PerComponent,
};

/// Maximum scale, the number of mantissa bits of an `f32`.
pub const S_MAX: u32 = 23;

/// Components of the normalized ray direction with a smaller magnitude are clamped to this, `2^-23`.
/// Over a distance `t` the clamped ray drifts by at most `t * 2^-23`, below the precision of an
/// `f32` position at that distance.
pub const EPSILON: f32 = 1.0 / (1u32 << S_MAX) as f32;

/// One entry per scale, so a traversal can never run out of stack.
pub const TRAVERSAL_STACK_SIZE: usize = S_MAX as usize + 1;

/// Position of the highest set bit of `bits`, read from the exponent of its float conversion.
/// Exact for values below `2^24`. Returns a value above `S_MAX` for 0.
#[inline(always)]
pub fn highest_set_bit(bits: u32) -> u32 {
    ((bits as f32).to_bits() >> 23).wrapping_sub(127)
}

/// Side length in `[1, 2)` space of a cube at `scale`, i.e. `2^(scale - S_MAX)`.
#[inline(always)]
pub fn cube_size(scale: u32) -> f32 {
    debug_assert!(scale <= S_MAX);
    f32::from_bits((scale + 127 - S_MAX) << 23)
}

impl CompiledOctree {
    /// Cast a ray from `origin` in `direction` (does not need to be normalized), without level of detail.
    /// Coordinates are in cells, the octree spans `[0, side)^3`.
    #[inline(always)]
    pub fn cast_ray(&self, origin: Vec3A, direction: Vec3A) -> HitPoint {
        self.traverse(&Ray::new_inf(origin, direction), LodParams::NONE)
    }

    /// Cast a ray, stopping at the first voxel whose size is below the projected footprint
    /// `t * size_coef + size_bias`.
    #[inline(always)]
    pub fn cast_ray_lod(
        &self,
        origin: Vec3A,
        direction: Vec3A,
        size_coef: f32,
        size_bias: f32,
    ) -> HitPoint {
        self.traverse(
            &Ray::new_inf(origin, direction),
            LodParams::new(size_coef, size_bias),
        )
    }

    /// Cast a batch of rays. `hits[i]` receives the result for `rays[i]`.
    /// Uses rayon if the `parallel` feature is enabled.
    pub fn cast_rays(&self, rays: &[Ray], lod: LodParams, hits: &mut [HitPoint]) {
        crate::scope!("cast_rays");
        assert_eq!(rays.len(), hits.len());

        #[cfg(feature = "parallel")]
        {
            use rayon::iter::{
                IndexedParallelIterator, IntoParallelRefIterator, IntoParallelRefMutIterator,
                ParallelIterator,
            };
            hits.par_iter_mut()
                .zip(rays.par_iter())
                .for_each(|(hit, ray)| *hit = self.traverse(ray, lod));
        }
        #[cfg(not(feature = "parallel"))]
        {
            hits.iter_mut()
                .zip(rays.iter())
                .for_each(|(hit, ray)| *hit = self.traverse(ray, lod));
        }
    }

    /// Find the first occupied voxel along `ray` within `[ray.tmin, ray.tmax]`.
    ///
    /// Never panics and never allocates. A miss leaves `cell` as `None`. A structurally broken node
    /// array also results in a miss, since the loop is bounded by the scale range.
    pub fn traverse(&self, ray: &Ray, lod: LodParams) -> HitPoint {
        let mut hit = HitPoint::none();

        let Some(root) = self.nodes.first() else {
            return hit;
        };
        if !root.has_children() {
            return hit;
        }

        let side = self.side() as f32;

        // Map into [1, 2)^3. Dividing the direction by side too keeps t in world units. The clamp
        // happens before the division so that it bends the ray by the same amount at every depth.
        let origin = Vec3A::ONE + ray.origin / side;
        let direction: Vec3A = ray.direction.per_comp(|d: f32| clamp_magnitude(d, EPSILON));
        let direction = direction / side;

        // Plane crossing times are t = p * t_coef - t_bias.
        let t_coef = -1.0 / direction.abs();
        let mut t_bias = t_coef * origin;

        // Mirror every axis with a positive direction: p -> 3 - p.
        let mut octant_mask = 0u32;
        for axis in 0..3 {
            if direction[axis] > 0.0 {
                octant_mask |= 1 << axis;
                t_bias[axis] = 3.0 * t_coef[axis] - t_bias[axis];
            }
        }

        // Active span against the root cube.
        let t_entry = 2.0 * t_coef - t_bias;
        let mut t_min = t_entry.max_element().max(ray.tmin);
        let mut t_max = (t_coef - t_bias).min_element().min(ray.tmax);
        if t_min > t_max || t_min.is_nan() || t_max.is_nan() {
            return hit;
        }

        let mut parent = 0u32;
        let mut idx = 0u32;
        let mut pos = Vec3A::ONE;
        let mut scale = S_MAX - 1;
        let mut scale_exp2 = 0.5f32;
        let target_scale = S_MAX - self.max_depth;

        let t_center = 1.5 * t_coef - t_bias;
        for axis in 0..3 {
            if t_center[axis] > t_min {
                idx ^= 1 << axis;
                pos[axis] = 1.5;
            }
        }

        let mut stack = ScaleStack::<TRAVERSAL_STACK_SIZE>::default();
        stack.write(scale as usize, parent, t_max);
        // Exit time of the last descent. Pushing is skipped when a child exits together with its parent.
        let mut h = t_max;
        let mut last_step_mask = 0u32;
        let mut hit_slot = None;

        while scale < S_MAX {
            hit.complexity += 1;

            let Some(node) = self.nodes.get(parent as usize) else {
                break;
            };

            let t_corner = pos * t_coef - t_bias;
            let tc_max = t_corner.min_element();

            let octant = idx ^ octant_mask;
            if node.has_child(octant) && t_min <= t_max {
                let child_index = node.child_index(parent, octant);

                // The voxel is smaller than the footprint: report it without descending.
                if tc_max * lod.size_coef + lod.size_bias >= scale_exp2 * side {
                    hit_slot = Some(child_index);
                    break;
                }

                // INTERSECT
                let tv_max = t_max.min(tc_max);
                let half = scale_exp2 * 0.5;
                let t_center = half * t_coef + t_corner;

                if t_min <= tv_max {
                    if node.is_leaf(octant) {
                        hit_slot = Some(child_index);
                        break;
                    }

                    // Inner node at leaf scale, the node array is malformed.
                    if scale <= target_scale {
                        break;
                    }

                    // PUSH
                    if tc_max < h {
                        stack.write(scale as usize, parent, t_max);
                    }
                    h = tc_max;

                    parent = child_index;
                    idx = 0;
                    scale -= 1;
                    scale_exp2 = half;

                    for axis in 0..3 {
                        if t_center[axis] > t_min {
                            idx ^= 1 << axis;
                            pos[axis] += scale_exp2;
                        }
                    }

                    t_max = tv_max;
                    continue;
                }
            }

            // ADVANCE
            let mut step_mask = 0u32;
            for axis in 0..3 {
                if t_corner[axis] <= tc_max {
                    step_mask ^= 1 << axis;
                    pos[axis] -= scale_exp2;
                }
            }

            t_min = tc_max;
            idx ^= step_mask;
            last_step_mask = step_mask;

            // The flipped bits disagree with the ray direction: we left the parent.
            if idx & step_mask != 0 {
                // POP
                // The highest bit that differs between the old and new position gives the scale
                // of the common ancestor.
                let mut differing_bits = 0u32;
                for axis in 0..3 {
                    if step_mask & (1 << axis) != 0 {
                        differing_bits |= pos[axis].to_bits() ^ (pos[axis] + scale_exp2).to_bits();
                    }
                }
                scale = highest_set_bit(differing_bits);
                if scale >= S_MAX {
                    // Left the root.
                    break;
                }
                scale_exp2 = cube_size(scale);

                let entry = stack.read(scale as usize);
                parent = entry.parent;
                t_max = entry.t_max;

                // Round the position down to the cube at the restored scale.
                let shifted: UVec3 = pos.per_comp(|p: f32| p.to_bits() >> scale);
                pos = (shifted << scale).per_comp(f32::from_bits);
                idx = (shifted.x & 1) | ((shifted.y & 1) << 1) | ((shifted.z & 1) << 2);

                h = 0.0;
            }
        }

        let Some(slot) = hit_slot else {
            return hit;
        };
        let Some(cell) = self.cells.get(slot as usize).copied() else {
            return hit;
        };

        // Plane times of the hit voxel's entry corner. All of them lie at or before t_min.
        let t_voxel_entry = (pos + scale_exp2) * t_coef - t_bias;

        // Undo the mirroring.
        for axis in 0..3 {
            if octant_mask & (1 << axis) != 0 {
                pos[axis] = 3.0 - scale_exp2 - pos[axis];
            }
        }

        let voxel_size = scale_exp2 * side;
        let voxel_min = (pos - Vec3A::ONE) * side;

        hit.cell = Some(cell);
        hit.node_index = slot;
        hit.distance = t_min;
        hit.position = ray.at(t_min);
        hit.voxel = voxel_min.as_uvec3();
        hit.voxel_size = voxel_size as u32;

        // Never stepped: use the face of the hit voxel through which the ray's line enters it. If the
        // origin is inside the voxel, that face lies behind the origin.
        let axis = if last_step_mask != 0 {
            last_step_mask.trailing_zeros() as usize
        } else {
            let t = t_voxel_entry.max_element();
            (0..3).find(|&axis| t_voxel_entry[axis] == t).unwrap_or(0)
        };
        hit.normal[axis] = -direction[axis].signum();

        let local = ((hit.position - voxel_min) / voxel_size).clamp(Vec3A::ZERO, Vec3A::ONE);
        hit.voxel_coord = match axis {
            0 => glam::vec2(1.0 - local.z, local.y),
            1 => glam::vec2(local.x, local.z),
            _ => glam::vec2(local.x, local.y),
        };

        hit
    }
}
