//! Scene generators, sampling functions, etc.. for basic testing & examples.

pub mod sampling {
    use std::f32::consts::TAU;

    use glam::*;

    #[inline(always)]
    pub fn uhash(x: u32) -> u32 {
        // from https://nullprogram.com/blog/2018/07/31/
        let mut x = x ^ (x >> 16);
        x = x.overflowing_mul(0x7feb352d).0;
        x = x ^ (x >> 15);
        x = x.overflowing_mul(0x846ca68b).0;
        x = x ^ (x >> 16);
        x
    }

    #[inline(always)]
    pub fn uhash2(a: u32, b: u32) -> u32 {
        uhash((a.overflowing_mul(1597334673).0) ^ (b.overflowing_mul(3812015801).0))
    }

    #[inline(always)]
    pub fn unormf(n: u32) -> f32 {
        n as f32 * (1.0 / 0xffffffffu32 as f32)
    }

    #[inline(always)]
    pub fn hash_noise(coord: UVec2, frame: u32) -> f32 {
        let urnd = uhash2(coord.x, (coord.y << 11) + frame);
        unormf(urnd)
    }

    /// A small deterministic random number generator. Each instance owns its state, so independent
    /// generators (one per thread, one per test) never interfere with each other.
    #[derive(Clone, Copy, Debug)]
    pub struct HashRng {
        seed: u32,
        counter: u32,
    }

    impl HashRng {
        pub fn new(seed: u32) -> Self {
            Self {
                seed: uhash(seed),
                counter: 0,
            }
        }

        #[inline(always)]
        pub fn next_u32(&mut self) -> u32 {
            self.counter = self.counter.wrapping_add(1);
            uhash2(self.seed, self.counter)
        }

        /// Uniform in `0..max`. `max` must not be 0.
        #[inline(always)]
        pub fn below(&mut self, max: u32) -> u32 {
            self.next_u32() % max
        }

        /// Uniform in `[0, 1]`.
        #[inline(always)]
        pub fn next_f32(&mut self) -> f32 {
            unormf(self.next_u32())
        }

        #[inline(always)]
        pub fn next_vec2(&mut self) -> Vec2 {
            vec2(self.next_f32(), self.next_f32())
        }

        /// A random unit vector.
        #[inline(always)]
        pub fn next_direction(&mut self) -> Vec3A {
            uniform_sample_sphere(self.next_vec2())
        }
    }

    #[inline(always)]
    pub fn uniform_sample_sphere(urand: Vec2) -> Vec3A {
        let z = 1.0 - 2.0 * urand.x;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let theta = urand.y * TAU;
        vec3a(r * theta.cos(), r * theta.sin(), z)
    }

    #[inline(always)]
    fn cubic(v0: f32, v1: f32, v2: f32, v3: f32, x: f32) -> f32 {
        let p = (v3 - v2) - (v0 - v1);
        let q = (v0 - v1) - p;
        let r = v2 - v0;
        let s = v1;
        p * x.powi(3) + q * x.powi(2) + r * x + s
    }

    #[inline(always)]
    pub fn bicubic_noise(coord: Vec2, seed: u32) -> f32 {
        let ix = coord.x.floor() as u32;
        let iy = coord.y.floor() as u32;
        let fx = coord.x - ix as f32;
        let fy = coord.y - iy as f32;
        fn cubic_col(ix: u32, iy: u32, j: u32, seed: u32, fx: f32) -> f32 {
            cubic(
                hash_noise(uvec2(ix, iy + j), seed),
                hash_noise(uvec2(ix + 1, iy + j), seed),
                hash_noise(uvec2(ix + 2, iy + j), seed),
                hash_noise(uvec2(ix + 3, iy + j), seed),
                fx,
            )
        }
        cubic(
            cubic_col(ix, iy, 0, seed, fx),
            cubic_col(ix, iy, 1, seed, fx),
            cubic_col(ix, iy, 2, seed, fx),
            cubic_col(ix, iy, 3, seed, fx),
            fy,
        )
    }

    // By Tomasz Stachowiak
    pub fn somewhat_boring_display_transform(col: Vec3A) -> Vec3A {
        fn rgb_to_ycbcr(col: Vec3A) -> Vec3A {
            Mat3A {
                x_axis: vec3a(0.2126, -0.1146, 0.5),
                y_axis: vec3a(0.7152, -0.3854, -0.4542),
                z_axis: vec3a(0.0722, 0.5, -0.0458),
            } * col
        }

        fn tonemap_curve(v: f32) -> f32 {
            1.0 - (-v).exp()
        }

        fn tonemap_curve3(v: Vec3A) -> Vec3A {
            1.0 - (-v).exp()
        }

        fn tonemapping_luminance(col: Vec3A) -> f32 {
            col.dot(vec3a(0.2126, 0.7152, 0.0722))
        }

        let mut col = col;
        let ycbcr = rgb_to_ycbcr(col);

        let bt = tonemap_curve(ycbcr.yz().length() * 2.4);
        let mut desat = (bt - 0.7) * 0.8;
        desat *= desat;

        let desat_col = col.lerp(ycbcr.xxx(), desat);

        let tm_luma = tonemap_curve(ycbcr.x);
        let tm0 = col * tm_luma / tonemapping_luminance(col).max(1e-5);
        let final_mult = 0.97;
        let tm1 = tonemap_curve3(desat_col);

        col = tm0.lerp(tm1, bt * bt);

        col * final_mult
    }
}

pub mod scenes {
    use glam::*;

    use super::sampling::{bicubic_noise, HashRng};
    use crate::{
        cell::{CellType, Texture},
        sparse::SparseOctree,
    };

    /// Fills the octree with a heightfield: every column `(x, z)` is solid from `y = 0` up to a
    /// height given by layered bicubic noise. The top cell of each column is grass, the rest red,
    /// and columns that end below `water_level` are topped with a mirror.
    pub fn terrain(octree: &mut SparseOctree, seed: u32, water_level: u32) {
        crate::scope!("terrain");
        let side = octree.side();
        let max_height = side as f32 * 0.5;
        for x in 0..side {
            for z in 0..side {
                let coord = vec2(x as f32, z as f32) / side as f32;
                let (mut freq, mut amp) = (4.0, 0.6);
                let noise = (0..4)
                    .map(|i| {
                        let n = bicubic_noise(coord * freq, seed + i) * amp;
                        (freq, amp) = (freq * 2.0, amp * 0.5);
                        n
                    })
                    .sum::<f32>();
                let height = ((noise * max_height) as u32).clamp(1, side);
                for y in 0..height {
                    let texture = if y + 1 == height {
                        Texture::Grass
                    } else {
                        Texture::Red
                    };
                    octree.set_cell(CellType::Solid, texture, x, y, z);
                }
                if height < water_level {
                    octree.set_cell(CellType::Mirror, Texture::White, x, water_level - 1, z);
                }
            }
        }
    }

    /// A solid ball of radius `radius` centered on `center`, clipped to the octree.
    pub fn sphere(octree: &mut SparseOctree, center: Vec3A, radius: f32, texture: Texture) {
        let side = octree.side() as i32;
        let min = (center - radius).floor().as_ivec3().max(IVec3::ZERO);
        let max = (center + radius).ceil().as_ivec3().min(IVec3::splat(side - 1));
        for x in min.x..=max.x {
            for y in min.y..=max.y {
                for z in min.z..=max.z {
                    let cell_center = vec3a(x as f32, y as f32, z as f32) + 0.5;
                    if cell_center.distance(center) <= radius {
                        octree.set_cell(CellType::Solid, texture, x as u32, y as u32, z as u32);
                    }
                }
            }
        }
    }

    /// Sets `count` cells at random coordinates. Returns the coordinates in the order they were set.
    pub fn scatter(octree: &mut SparseOctree, count: usize, rng: &mut HashRng) -> Vec<UVec3> {
        let side = octree.side();
        scatter_in(octree, UVec3::ZERO, side, count, rng)
    }

    /// Like [`scatter`], but only within the cube of `size` cells starting at `min`. Keeps scenes in
    /// deep octrees dense enough for rays to find something.
    pub fn scatter_in(
        octree: &mut SparseOctree,
        min: UVec3,
        size: u32,
        count: usize,
        rng: &mut HashRng,
    ) -> Vec<UVec3> {
        (0..count)
            .map(|_| {
                let cell = min + uvec3(rng.below(size), rng.below(size), rng.below(size));
                let texture = match rng.below(3) {
                    0 => Texture::Grass,
                    1 => Texture::Red,
                    _ => Texture::White,
                };
                octree.set_cell(CellType::Solid, texture, cell.x, cell.y, cell.z);
                cell
            })
            .collect()
    }
}
