use glam::*;
use lsvo::{
    cell::{CellType, Texture},
    sparse::SparseOctree,
    OctreeParams,
};

fn main() {
    // Build a tiny scene: a floor and a single mirror voxel floating above it.
    let mut octree = SparseOctree::from_params(&OctreeParams::tiny_build()).unwrap();
    let side = octree.side();
    for x in 0..side {
        for z in 0..side {
            octree.set_cell(CellType::Solid, Texture::Grass, x, 0, z);
        }
    }
    octree.set_cell(CellType::Mirror, Texture::White, 8, 8, 8);

    // Flatten the build tree into the traversal array.
    let compiled = octree.compile();
    println!(
        "{} slots ({} bytes), {} leaves",
        compiled.nodes.len(),
        compiled.node_bytes().len(),
        compiled.stats().leaf_count
    );

    // Cast a ray from a corner of the volume towards the mirror voxel.
    let origin = vec3a(1.0, 1.5, 1.0);
    let hit = compiled.cast_ray(origin, vec3a(8.5, 8.5, 8.5) - origin);
    if let Some(cell) = hit.cell {
        println!(
            "Hit {:?} {:?} voxel {} at distance {}, normal {}",
            cell.kind, cell.texture, hit.voxel, hit.distance, hit.normal
        );
    } else {
        println!("Miss");
    }

    // Looking straight down always finds the floor.
    let hit = compiled.cast_ray(vec3a(3.5, 15.0, 3.5), Vec3A::NEG_Y);
    println!("Floor at voxel {} after {} steps", hit.voxel, hit.complexity);

    // Uncomment to dump the whole tree.
    // compiled.print_tree();
}
