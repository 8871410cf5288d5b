#[cfg(test)]
mod tests {

    use glam::*;
    use lsvo::{
        aabb::Aabb,
        cell::{Cell, CellType, Texture},
        error::OctreeError,
        linear::CompiledOctree,
        ray::{HitPoint, Ray},
        sparse::SparseOctree,
        test_util::{
            sampling::HashRng,
            scenes::{scatter, scatter_in, sphere, terrain},
        },
        LodParams, OctreeParams, MAX_DEPTH,
    };

    fn random_cell(rng: &mut HashRng) -> Cell {
        let kind = if rng.below(2) == 0 {
            CellType::Solid
        } else {
            CellType::Mirror
        };
        let texture = match rng.below(3) {
            0 => Texture::Grass,
            1 => Texture::Red,
            _ => Texture::White,
        };
        Cell::new(kind, texture)
    }

    /// A ray starting well outside the octree and passing through `target`.
    fn ray_through(target: Vec3A, side: u32, rng: &mut HashRng) -> Ray {
        let direction = rng.next_direction();
        Ray::new_inf(target - direction * (side as f32 * 2.0), direction)
    }

    fn random_point(side: u32, rng: &mut HashRng) -> Vec3A {
        vec3a(rng.next_f32(), rng.next_f32(), rng.next_f32()) * side as f32
    }

    /// A random direction. Every fourth is axis aligned and every fourth has one zero component.
    fn random_direction(i: u32, rng: &mut HashRng) -> Vec3A {
        let mut direction = rng.next_direction();
        match i % 4 {
            0 => {
                let axis = rng.below(3) as usize;
                let sign = direction[axis].signum();
                direction = Vec3A::ZERO;
                direction[axis] = sign;
            }
            1 => {
                let axis = rng.below(3) as usize;
                direction[axis] = 0.0;
                if direction.length_squared() < 1e-6 {
                    direction[(axis + 1) % 3] = 1.0;
                }
            }
            _ => (),
        }
        direction
    }

    /// How far, in cells, traversal may stray from the exact ray. Positions in `[1, 2)` octree space
    /// resolve `2^-23` of the side, so deep octrees lose precision below the cell size.
    fn cell_tolerance(side: u32) -> f32 {
        (side as f32 / (1 << 20) as f32).max(1e-3)
    }

    /// Closest voxel entry over all set cells, by plain ray/box tests, with every box grown (`pad > 0`)
    /// or shrunk (`pad < 0`) by `pad`.
    fn reference_distance(leaves: &[(UVec3, Cell)], ray: &Ray, pad: f32) -> f32 {
        leaves
            .iter()
            .map(|(voxel, _)| {
                let min = voxel.as_vec3a();
                Aabb::new(min - pad, min + 1.0 + pad).intersect_ray(ray)
            })
            .fold(f32::INFINITY, f32::min)
    }

    #[test]
    pub fn concrete_single_voxel_diagonal() {
        let mut octree = SparseOctree::new(4);
        octree.set_cell(CellType::Solid, Texture::Grass, 8, 8, 8);
        let compiled = octree.compile();

        let origin = vec3a(1.0, 1.0, 1.0);
        let hit = compiled.cast_ray(origin, vec3a(8.0, 8.0, 8.0) - origin);
        assert!(hit.is_hit());
        assert_eq!(hit.cell, Some(Cell::solid(Texture::Grass)));
        assert!((hit.distance - 7.0 * 3.0f32.sqrt()).abs() < 1e-3);
        assert_eq!(hit.normal.length(), 1.0);
        assert_eq!(hit.normal.min_element(), -1.0);
        assert_eq!(hit.voxel, uvec3(8, 8, 8));
    }

    #[test]
    pub fn round_trip_single_cells() {
        let mut rng = HashRng::new(0);
        for depth in 1..=MAX_DEPTH {
            for i in 0..24 {
                let mut octree = SparseOctree::new(depth);
                let side = octree.side();
                let voxel = uvec3(rng.below(side), rng.below(side), rng.below(side));
                let cell = random_cell(&mut rng);
                octree.set_cell(cell.kind, cell.texture, voxel.x, voxel.y, voxel.z);
                let compiled = octree.compile();

                // Start outside of small octrees, a few cells away from the voxel in large ones.
                let center = voxel.as_vec3a() + 0.5;
                let direction = random_direction(i, &mut rng);
                let distance = (side as f32 * 2.0).min(16.0);
                let ray = Ray::new_inf(center - direction * distance, direction);

                let hit = compiled.traverse(&ray, LodParams::NONE);
                assert_eq!(hit.cell, Some(cell), "depth {depth} voxel {voxel} ray {ray:?}");
                assert_eq!(hit.voxel, voxel);
                assert_eq!(hit.voxel_size, 1);
                let tolerance = cell_tolerance(side);
                let bounds = Aabb::new(
                    voxel.as_vec3a() - tolerance,
                    voxel.as_vec3a() + 1.0 + tolerance,
                );
                assert!(bounds.contains_point(hit.position));
                assert!(hit.voxel_coord.cmpge(Vec2::ZERO).all());
                assert!(hit.voxel_coord.cmple(Vec2::ONE).all());
            }
        }
    }

    #[test]
    pub fn rays_away_from_cells_miss() {
        let mut rng = HashRng::new(1);
        for _ in 0..32 {
            let mut octree = SparseOctree::new(5);
            let side = octree.side();
            // Only the lower half is occupied.
            for _ in 0..64 {
                let cell = random_cell(&mut rng);
                octree.set_cell(
                    cell.kind,
                    cell.texture,
                    rng.below(side),
                    rng.below(side / 2),
                    rng.below(side),
                );
            }
            let compiled = octree.compile();

            for _ in 0..64 {
                let mut origin = random_point(side, &mut rng);
                origin.y = origin.y * 0.5 + side as f32 * 0.5;
                let mut direction = rng.next_direction();
                direction.y = direction.y.abs().max(1e-3);
                let hit = compiled.cast_ray(origin, direction);
                assert!(!hit.is_hit());
                assert_eq!(hit.cell, None);
            }

            // Entirely outside the octree, pointing away from it.
            let hit = compiled.cast_ray(Vec3A::splat(-1.0), Vec3A::splat(-1.0));
            assert!(!hit.is_hit());
            assert_eq!(hit.complexity, 0);
        }
    }

    #[test]
    pub fn compiled_masks_are_consistent() {
        let mut rng = HashRng::new(2);
        for i in 0..64 {
            let mut octree = SparseOctree::new(1 + i % 8);
            let count = 1 + rng.below(200) as usize;
            scatter(&mut octree, count, &mut rng);
            let compiled = octree.compile();
            for node in &compiled.nodes {
                assert_eq!(node.leaf_mask & !node.child_mask, 0);
                assert!(node.leaf_mask.count_ones() <= node.child_mask.count_ones());
            }
            let result = compiled.validate();
            assert_eq!(result.leaf_count, octree.leaf_count());
            assert_eq!(compiled.stats().leaf_count, octree.leaf_count());
            assert_eq!(compiled.stats().max_depth, octree.max_depth());
        }
    }

    #[test]
    pub fn mirrored_scene_gives_mirrored_hits() {
        let mut rng = HashRng::new(3);
        let mut octree = SparseOctree::new(5);
        let side = octree.side();
        for _ in 0..128 {
            let (x, y, z) = (rng.below(side), rng.below(side), rng.below(side));
            octree.set_cell(CellType::Solid, Texture::Red, x, y, z);
            octree.set_cell(CellType::Solid, Texture::Red, side - 1 - x, y, z);
        }
        let compiled = octree.compile();

        for _ in 0..512 {
            let ray = ray_through(random_point(side, &mut rng), side, &mut rng);
            let mirror = |v: Vec3A| vec3a(-v.x, v.y, v.z);
            let mirrored = Ray::new_inf(
                mirror(ray.origin) + vec3a(side as f32, 0.0, 0.0),
                mirror(ray.direction),
            );

            let hit = compiled.traverse(&ray, LodParams::NONE);
            let mirrored_hit = compiled.traverse(&mirrored, LodParams::NONE);
            assert_eq!(hit.is_hit(), mirrored_hit.is_hit());
            if hit.is_hit() {
                assert!((hit.distance - mirrored_hit.distance).abs() < 1e-3 * hit.distance.max(1.0));
                assert_eq!(hit.voxel.x, side - 1 - mirrored_hit.voxel.x);
                assert_eq!(hit.voxel.yz(), mirrored_hit.voxel.yz());
                assert_eq!(hit.normal, mirror(mirrored_hit.normal));
            }
        }
    }

    #[test]
    pub fn traversal_work_is_bounded() {
        let mut rng = HashRng::new(4);
        for _ in 0..128 {
            let depth = 5 + rng.below(6);
            let mut octree = SparseOctree::new(depth);
            let side = octree.side();
            let count = 1 + rng.below(16);
            scatter(&mut octree, count as usize, &mut rng);
            let compiled = octree.compile();

            for _ in 0..64 {
                let ray = ray_through(random_point(side, &mut rng), side, &mut rng);
                let hit = compiled.traverse(&ray, LodParams::NONE);
                assert!(hit.complexity <= 16 * depth, "{} at depth {depth}", hit.complexity);
                assert!((hit.complexity as usize) <= compiled.nodes.len());
            }
        }

        // Dense heightfields, where rays can run along the surface.
        for depth in [6, 7] {
            let mut octree = SparseOctree::new(depth);
            let side = octree.side();
            terrain(&mut octree, depth, side / 4);
            let compiled = octree.compile();

            for _ in 0..512 {
                let ray = ray_through(random_point(side, &mut rng), side, &mut rng);
                let hit = compiled.traverse(&ray, LodParams::NONE);
                assert!(hit.complexity <= 32 * depth, "{} at depth {depth}", hit.complexity);
            }
        }
    }

    #[test]
    pub fn traversal_matches_reference() {
        let mut rng = HashRng::new(5);
        for depth in 3..=MAX_DEPTH {
            let mut octree = SparseOctree::new(depth);
            let side = octree.side();
            // Large octrees get a cluster of cells somewhere inside them.
            let size = side.min(32);
            let range = side - size + 1;
            let min = uvec3(rng.below(range), rng.below(range), rng.below(range));
            scatter_in(&mut octree, min, size, 64, &mut rng);
            let compiled = octree.compile();
            let leaves = octree.leaves();
            let tolerance = cell_tolerance(side);

            for i in 0..256 {
                let origin = min.as_vec3a() - 8.0 + random_point(size + 16, &mut rng);
                let ray = Ray::new_inf(origin, random_direction(i, &mut rng));
                let hit = compiled.traverse(&ray, LodParams::NONE);

                // Rays passing within `tolerance` of a voxel may go either way.
                let must_hit = reference_distance(&leaves, &ray, -tolerance.min(0.49));
                let may_hit = reference_distance(&leaves, &ray, tolerance);
                if must_hit.is_finite() {
                    assert!(hit.is_hit(), "depth {depth} ray {ray:?}");
                    assert!(
                        hit.distance <= must_hit + 1e-3 * must_hit.max(1.0),
                        "{} > {must_hit} at depth {depth}",
                        hit.distance
                    );
                }
                if hit.is_hit() {
                    assert!(
                        hit.distance >= may_hit - 1e-3 * may_hit.max(1.0),
                        "{} < {may_hit} at depth {depth}",
                        hit.distance
                    );
                    assert_eq!(octree.get_cell(hit.voxel.x, hit.voxel.y, hit.voxel.z), hit.cell);
                } else {
                    assert!(!must_hit.is_finite());
                }
            }
        }
    }

    #[test]
    pub fn lod_hits_are_coarser_and_closer() {
        let mut rng = HashRng::new(6);
        let mut octree = SparseOctree::new(6);
        sphere(&mut octree, Vec3A::splat(32.0), 20.0, Texture::White);
        scatter(&mut octree, 128, &mut rng);
        let compiled = octree.compile();
        let side = octree.side();
        let leaves = octree.leaves();
        let lod = LodParams::new(0.05, 0.0);

        let mut coarse_hits = 0;
        for _ in 0..256 {
            let ray = ray_through(random_point(side, &mut rng), side, &mut rng);
            let full = compiled.traverse(&ray, LodParams::NONE);
            let coarse = compiled.traverse(&ray, lod);
            if full.is_hit() {
                assert!(coarse.is_hit());
                assert!(coarse.distance <= full.distance + 1e-3);
                assert!(coarse.complexity <= full.complexity);
            }
            if coarse.is_hit() {
                assert!(coarse.voxel_size.is_power_of_two());
                assert_eq!(coarse.voxel % coarse.voxel_size, UVec3::ZERO);
                let bounds = Aabb::from_voxel(coarse.voxel, coarse.voxel_size);
                assert!(leaves
                    .iter()
                    .any(|(v, _)| bounds.contains_point(v.as_vec3a() + 0.5)));
                if coarse.voxel_size > 1 {
                    coarse_hits += 1;
                }
            }
        }
        assert!(coarse_hits > 0);
    }

    #[test]
    pub fn try_set_cell_reports_errors() {
        assert_eq!(
            SparseOctree::try_new(0).unwrap_err(),
            OctreeError::InvalidDepth { depth: 0, max: 20 }
        );
        let mut octree = SparseOctree::from_params(&OctreeParams::tiny_build()).unwrap();
        assert_eq!(
            octree.try_set_cell(CellType::Solid, Texture::Red, 0, 16, 0),
            Err(OctreeError::CoordinateOutOfRange {
                x: 0,
                y: 16,
                z: 0,
                side: 16
            })
        );
        assert!(octree.is_empty());
        // The infallible variant wraps.
        octree.set_cell(CellType::Solid, Texture::Red, 0, 16, 0);
        assert_eq!(octree.get_cell(0, 0, 0), Some(Cell::solid(Texture::Red)));
    }

    #[test]
    pub fn concurrent_traversal() {
        let mut octree = SparseOctree::new(6);
        terrain(&mut octree, 7, 8);
        let compiled = octree.compile();
        let side = compiled.side();

        let mut rng = HashRng::new(8);
        let rays: Vec<Ray> = (0..1024)
            .map(|_| ray_through(random_point(side, &mut rng), side, &mut rng))
            .collect();
        let expected: Vec<HitPoint> = rays
            .iter()
            .map(|ray| compiled.traverse(ray, LodParams::NONE))
            .collect();

        let compiled = &compiled;
        std::thread::scope(|s| {
            for chunk in rays.chunks(256).zip(expected.chunks(256)) {
                s.spawn(move || {
                    for (ray, expected) in chunk.0.iter().zip(chunk.1) {
                        assert_eq!(compiled.traverse(ray, LodParams::NONE), *expected);
                    }
                });
            }
        });

        let mut hits = vec![HitPoint::none(); rays.len()];
        compiled.cast_rays(&rays, LodParams::NONE, &mut hits);
        assert_eq!(hits, expected);
    }

    #[test]
    pub fn check_flat_floor_normals() {
        let mut octree = SparseOctree::new(4);
        for x in 0..16 {
            for z in 0..16 {
                octree.set_cell(CellType::Solid, Texture::Grass, x, 0, z);
            }
        }
        let compiled = octree.compile();

        let mut hit_count = 0;
        eval_render(
            |_x: u32, _y: u32, hit: HitPoint| {
                if hit.normal == Vec3A::Y && hit.voxel.y == 0 {
                    hit_count += 1
                }
            },
            &compiled,
            64,
            64,
            60.0f32.to_radians(),
            vec3a(8.0, 12.0, 8.0),
            vec3a(8.0, 0.0, 8.0),
            Vec3A::X,
        );
        assert_eq!(hit_count, 64 * 64)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn eval_render<F>(
        mut eval: F,
        octree: &CompiledOctree,
        width: u32,
        height: u32,
        fov: f32,
        eye: Vec3A,
        look_at: Vec3A,
        up: Vec3A,
    ) where
        F: FnMut(u32, u32, HitPoint),
    {
        let target_size = Vec2::new(width as f32, height as f32);

        // Compute camera projection & view matrices
        let aspect_ratio = target_size.x / target_size.y;
        let proj_inv = Mat4::perspective_infinite_reverse_rh(fov, aspect_ratio, 0.01).inverse();
        let view_inv = Mat4::look_at_rh(eye.into(), look_at.into(), up.into()).inverse();

        for x in 0..width {
            for y in 0..height {
                let frag_coord = uvec2(x, y);
                let mut screen_uv = frag_coord.as_vec2() / target_size;
                screen_uv.y = 1.0 - screen_uv.y;
                let ndc = screen_uv * 2.0 - Vec2::ONE;
                let clip_pos = vec4(ndc.x, ndc.y, 1.0, 1.0);

                let mut vs = proj_inv * clip_pos;
                vs /= vs.w;
                let direction = (Vec3A::from((view_inv * vs).xyz()) - eye).normalize();
                let ray = Ray::new(eye, direction, 0.0, f32::MAX);

                let hit = octree.traverse(&ray, LodParams::NONE);
                if hit.is_hit() {
                    eval(x, y, hit);
                }
            }
        }
    }
}
