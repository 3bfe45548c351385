//! Octree and kd-tree construction invariants.

use std::collections::HashSet;

use pointlod::{build_kdtree, build_lods, build_octree, PointStore, TileArena, TilingParams};

fn grid_store(nx: usize, ny: usize, nz: usize, spacing: f32) -> PointStore {
    let mut x = Vec::with_capacity(nx * ny * nz);
    let mut y = Vec::with_capacity(nx * ny * nz);
    let mut z = Vec::with_capacity(nx * ny * nz);
    for k in 0..nz {
        for j in 0..ny {
            for i in 0..nx {
                x.push(i as f32 * spacing);
                y.push(j as f32 * spacing);
                z.push(k as f32 * spacing);
            }
        }
    }
    PointStore::from_positions(x, y, z).unwrap()
}

fn assert_exact_partition(tiles: &TileArena, total: usize) {
    let mut seen = HashSet::new();
    let mut count = 0usize;
    for (_, tile) in tiles.iter() {
        for &gi in &tile.indices {
            assert!(seen.insert(gi), "index {gi} assigned to two tiles");
            count += 1;
        }
    }
    assert_eq!(count, total);
    for i in 0..total as u32 {
        assert!(seen.contains(&i), "index {i} missing from every tile");
    }
}

#[test]
fn octree_partitions_every_index_exactly_once() {
    let store = grid_store(20, 20, 5, 1.0);
    let params = TilingParams {
        leaf_max_points: 100,
        max_depth: 12,
    };
    let (tiles, stats) = build_octree(&store.columns(), &params);

    assert_eq!(stats.total_points, store.len());
    assert_eq!(stats.num_tiles, tiles.len());
    assert!(tiles.len() > 1);
    assert_exact_partition(&tiles, store.len());
}

#[test]
fn leaf_boxes_tightly_hull_their_points() {
    let store = grid_store(16, 16, 4, 0.5);
    let params = TilingParams {
        leaf_max_points: 64,
        max_depth: 12,
    };
    let (tiles, _) = build_octree(&store.columns(), &params);

    for (_, tile) in tiles.iter() {
        assert!(!tile.bbox.is_void());
        let mut hull = pointlod::Aabb::VOID;
        for &gi in &tile.indices {
            let p = store.position(gi as usize).unwrap();
            assert!(tile.bbox.contains_point(p));
            hull.add_point(p);
        }
        assert_eq!(tile.bbox, hull, "box is looser than its points");
    }
}

#[test]
fn leaf_size_respects_the_point_limit_before_max_depth() {
    let store = grid_store(32, 32, 1, 1.0);
    let params = TilingParams {
        leaf_max_points: 50,
        max_depth: 20,
    };
    let (tiles, _) = build_octree(&store.columns(), &params);
    for (_, tile) in tiles.iter() {
        assert!(tile.indices.len() <= 50);
        assert!(tile.depth <= 20);
    }
}

#[test]
fn depth_bound_holds_for_coincident_points() {
    // identical points never separate; only the depth bound can stop this
    let n = 10_000;
    let store =
        PointStore::from_positions(vec![1.5; n], vec![-2.0; n], vec![0.25; n]).unwrap();
    let params = TilingParams {
        leaf_max_points: 16,
        max_depth: 6,
    };
    let (tiles, stats) = build_octree(&store.columns(), &params);

    assert_eq!(stats.num_tiles, 1);
    let (_, tile) = tiles.iter().next().unwrap();
    assert_eq!(tile.depth, 6);
    assert_eq!(tile.indices.len(), n);
    assert_exact_partition(&tiles, n);
}

#[test]
fn empty_store_yields_zero_tiles() {
    let store = PointStore::from_positions(Vec::new(), Vec::new(), Vec::new()).unwrap();
    let (tiles, stats) = build_octree(&store.columns(), &TilingParams::default());
    assert!(tiles.is_empty());
    assert_eq!(stats.num_tiles, 0);

    let (tiles, stats) = build_kdtree(&store.columns(), &TilingParams::default());
    assert!(tiles.is_empty());
    assert_eq!(stats.num_tiles, 0);
}

#[test]
fn kdtree_partitions_every_index_exactly_once() {
    let store = grid_store(25, 10, 3, 1.0);
    let params = TilingParams {
        leaf_max_points: 64,
        max_depth: 16,
    };
    let (tiles, stats) = build_kdtree(&store.columns(), &params);

    assert_eq!(stats.total_points, store.len());
    assert!(tiles.len() > 1);
    assert_exact_partition(&tiles, store.len());
    for (_, tile) in tiles.iter() {
        assert!(tile.depth <= 16);
        assert!(tile.indices.len() <= 64 || tile.depth == 16);
    }
}

#[test]
fn lod_counts_are_monotone_after_tiling() {
    let store = grid_store(20, 20, 2, 1.0);
    let columns = store.columns();
    let params = TilingParams {
        leaf_max_points: 128,
        max_depth: 12,
    };
    let (mut tiles, _) = build_octree(&columns, &params);
    build_lods(&columns, &mut tiles, 3, 2.0);

    for (_, tile) in tiles.iter() {
        assert!(!tile.lods.is_empty());
        assert_eq!(tile.lods[0].point_count, tile.indices.len());
        assert_eq!(tile.lods[0].indices, tile.indices);
        for pair in tile.lods.windows(2) {
            assert!(pair[0].point_count >= pair[1].point_count);
        }
        assert_eq!(tile.lod_arrays.len(), tile.lods.len());
    }
}
