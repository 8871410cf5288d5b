use std::time::Instant;

use glam::*;
use image::{ImageBuffer, Rgba};
use lsvo::{
    cell::{CellType, Texture},
    linear::CompiledOctree,
    ray::{HitPoint, Ray},
    sparse::SparseOctree,
    test_util::{sampling::somewhat_boring_display_transform, scenes::terrain},
    LodParams, OctreeParams,
};

const SKY: Vec3A = vec3a(0.45, 0.6, 0.9);

fn albedo(texture: Texture) -> Vec3A {
    match texture {
        Texture::Grass => vec3a(0.25, 0.55, 0.15),
        Texture::Red => vec3a(0.6, 0.2, 0.15),
        Texture::White => vec3a(0.9, 0.9, 0.9),
    }
}

/// Direct light from the sun with a hard shadow, plus a constant sky term.
fn shade(octree: &CompiledOctree, hit: &HitPoint, sun: Vec3A) -> Vec3A {
    let Some(cell) = hit.cell else {
        return SKY;
    };
    let origin = hit.position + hit.normal * 1e-3;
    let lit = !octree.cast_ray(origin, sun).is_hit();
    let ndotl = if lit { hit.normal.dot(sun).max(0.0) } else { 0.0 };
    // Darken the voxel edges a little so individual cells stay readable.
    let edge = (hit.voxel_coord - 0.5).abs().max_element();
    let edge_shade = if edge > 0.45 { 0.8 } else { 1.0 };
    albedo(cell.texture) * (ndotl * 2.5 + SKY * 0.3) * edge_shade
}

fn main() {
    env_logger::init();

    let mut octree = match SparseOctree::from_params(&OctreeParams::small_build()) {
        Ok(octree) => octree,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let start = Instant::now();
    let side = octree.side();
    terrain(&mut octree, 1, side / 6);
    println!(
        "Scene: {} leaves, {} nodes in {:?}",
        octree.leaf_count(),
        octree.node_count(),
        start.elapsed()
    );

    let compiled = octree.compile();
    println!("{}", compiled.validate());
    println!("{:#?}", compiled.stats());

    // Setup render target and camera
    let width = 1280;
    let height = 720;
    let target_size = Vec2::new(width as f32, height as f32);
    let fov = 60.0f32.to_radians();
    let s = side as f32;
    let eye = vec3a(-0.2 * s, 0.8 * s, -0.2 * s);
    let look_at = vec3(0.5 * s, 0.1 * s, 0.5 * s);
    let sun = vec3a(0.4, 1.0, 0.25).normalize();

    // Compute camera projection & view matrices
    let aspect_ratio = target_size.x / target_size.y;
    let proj_inv = Mat4::perspective_infinite_reverse_rh(fov, aspect_ratio, 0.01).inverse();
    let view_inv = Mat4::look_at_rh(eye.into(), look_at, Vec3::Y).inverse();

    let rays = (0..width * height)
        .map(|i| {
            let frag_coord = uvec2(i % width, i / width);
            let mut screen_uv = frag_coord.as_vec2() / target_size;
            screen_uv.y = 1.0 - screen_uv.y;
            let ndc = screen_uv * 2.0 - Vec2::ONE;
            let clip_pos = vec4(ndc.x, ndc.y, 1.0, 1.0);

            let mut vs_pos = proj_inv * clip_pos;
            vs_pos /= vs_pos.w;
            let direction = (Vec3A::from((view_inv * vs_pos).xyz()) - eye).normalize();
            Ray::new(eye, direction, 0.0, f32::MAX)
        })
        .collect::<Vec<_>>();

    // Voxels smaller than a pixel are not worth descending into.
    let lod = LodParams::from_pixel_footprint(fov, height);

    let start = Instant::now();
    let mut hits = vec![HitPoint::none(); rays.len()];
    compiled.cast_rays(&rays, lod, &mut hits);
    let elapsed = start.elapsed();
    let total_steps: u64 = hits.iter().map(|hit| hit.complexity as u64).sum();
    println!(
        "Traced {} primary rays in {:?}, {:.1} steps per ray",
        rays.len(),
        elapsed,
        total_steps as f64 / rays.len() as f64
    );

    let mut img: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::new(width, height);
    let pixels = img.as_mut();
    pixels.chunks_mut(4).enumerate().for_each(|(i, chunk)| {
        let ray = &rays[i];
        let hit = &hits[i];
        let mut color = shade(&compiled, hit, sun);
        if hit.cell.is_some_and(|cell| cell.kind == CellType::Mirror) {
            // One bounce off mirrors, tinted by the mirror's own shading.
            let reflected = ray.direction - 2.0 * ray.direction.dot(hit.normal) * hit.normal;
            let bounce = compiled.traverse(
                &Ray::new_inf(hit.position + hit.normal * 1e-3, reflected),
                lod,
            );
            color = color * 0.2 + shade(&compiled, &bounce, sun) * 0.8;
        }
        let c = (somewhat_boring_display_transform(color) * 255.0).as_uvec3();
        chunk.copy_from_slice(&[c.x as u8, c.y as u8, c.z as u8, 255]);
    });

    if let Err(e) = img.save("lsvo_render.png") {
        eprintln!("Failed to save image: {e}");
    }
}
