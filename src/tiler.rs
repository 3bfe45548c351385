//! Spatial subdivision of point clouds into leaf tiles.
//!
//! Two builders share one contract: partition the global index range into
//! leaf tiles whose boxes tightly hull their points. `build_octree` splits
//! at the box center into 8 octants; `build_kdtree` splits at the median of
//! the longest axis. An invalid or empty position view yields zero tiles,
//! never an error.

use glam::Vec3;
use log::debug;

use crate::bounds::Aabb;
use crate::columns::{CloudColumns, Column3};
use crate::tile::{LodLevel, Tile, TileArena, TilingParams, TilingStats};

/// Build leaf tiles by recursive octant subdivision.
///
/// Every global index lands in exactly one leaf. Recursion stops on
/// `leaf_max_points` or `max_depth`; the depth bound alone guarantees
/// termination (coincident points never separate).
pub fn build_octree(
    columns: &CloudColumns<'_>,
    params: &TilingParams,
) -> (TileArena, TilingStats) {
    let mut arena = TileArena::new();
    let pos = &columns.position;
    if !pos.is_valid() || pos.is_empty() {
        return (arena, TilingStats::default());
    }

    let root_idx = root_indices(pos);
    let total_points = root_idx.len();
    let root_box = compute_bbox(pos, &root_idx);
    octree_recursive(pos, root_idx, root_box, 0, params, &mut arena);

    let stats = TilingStats {
        num_tiles: arena.len(),
        total_points,
    };
    debug!(
        "octree: {} leaf tiles over {} points",
        stats.num_tiles, stats.total_points
    );
    (arena, stats)
}

/// Build leaf tiles by recursive median split along the longest axis.
///
/// Same stop rule and guarantees as [`build_octree`]; produces a binary
/// partition with more evenly sized leaves on skewed distributions.
pub fn build_kdtree(
    columns: &CloudColumns<'_>,
    params: &TilingParams,
) -> (TileArena, TilingStats) {
    let mut arena = TileArena::new();
    let pos = &columns.position;
    if !pos.is_valid() || pos.is_empty() {
        return (arena, TilingStats::default());
    }

    let root_idx = root_indices(pos);
    let total_points = root_idx.len();
    let root_box = compute_bbox(pos, &root_idx);
    kd_recursive(pos, root_idx, root_box, 0, params, &mut arena);

    let stats = TilingStats {
        num_tiles: arena.len(),
        total_points,
    };
    debug!(
        "kdtree: {} leaf tiles over {} points",
        stats.num_tiles, stats.total_points
    );
    (arena, stats)
}

/// Resolve the view's logical range to global indices once, up front.
fn root_indices(pos: &Column3<'_>) -> Vec<u32> {
    (0..pos.len())
        .filter_map(|i| pos.resolve(i))
        .map(|gi| gi as u32)
        .collect()
}

fn point_at(pos: &Column3<'_>, gi: u32) -> Option<Vec3> {
    let gi = gi as usize;
    (gi < pos.global_len()).then(|| Vec3::new(pos.x[gi], pos.y[gi], pos.z[gi]))
}

fn compute_bbox(pos: &Column3<'_>, indices: &[u32]) -> Aabb {
    let mut bbox = Aabb::VOID;
    for &gi in indices {
        if let Some(p) = point_at(pos, gi) {
            bbox.add_point(p);
        }
    }
    bbox
}

fn stop_split(num_points: usize, depth: u32, params: &TilingParams) -> bool {
    num_points <= params.leaf_max_points || depth >= params.max_depth
}

fn make_leaf(pos: &Column3<'_>, depth: u32, indices: Vec<u32>, bbox: Aabb) -> Tile {
    let bbox = if bbox.is_void() {
        compute_bbox(pos, &indices)
    } else {
        bbox
    };
    let mut tile = Tile::leaf(depth, bbox, indices);
    // Seed a full-resolution level so a freshly tiled cloud is displayable;
    // build_lods replaces the whole list.
    tile.lods.push(LodLevel {
        level: 0,
        indices: tile.indices.clone(),
        point_count: tile.indices.len(),
        error_world: 0.0,
    });
    tile.lod_arrays.push(None);
    tile
}

/// Octant code per axis: `>= center` sets the axis bit.
fn partition_octants(pos: &Column3<'_>, indices: &[u32], bbox: &Aabb) -> [Vec<u32>; 8] {
    let c = bbox.center();
    let mut out: [Vec<u32>; 8] = std::array::from_fn(|_| Vec::new());
    for &gi in indices {
        let Some(p) = point_at(pos, gi) else { continue };
        let oct = (p.x >= c.x) as usize
            | (((p.y >= c.y) as usize) << 1)
            | (((p.z >= c.z) as usize) << 2);
        out[oct].push(gi);
    }
    out
}

fn octree_recursive(
    pos: &Column3<'_>,
    indices: Vec<u32>,
    bbox: Aabb,
    depth: u32,
    params: &TilingParams,
    arena: &mut TileArena,
) {
    if indices.is_empty() {
        return;
    }
    if stop_split(indices.len(), depth, params) {
        arena.push(make_leaf(pos, depth, indices, bbox));
        return;
    }

    let bbox = if bbox.is_void() {
        compute_bbox(pos, &indices)
    } else {
        bbox
    };

    // Octants visited in increasing code order keeps leaf order deterministic.
    for child in partition_octants(pos, &indices, &bbox) {
        if child.is_empty() {
            continue;
        }
        let child_box = compute_bbox(pos, &child);
        octree_recursive(pos, child, child_box, depth + 1, params, arena);
    }
}

fn longest_axis(bbox: &Aabb) -> usize {
    let s = bbox.size();
    if s.x >= s.y && s.x >= s.z {
        0
    } else if s.y >= s.x && s.y >= s.z {
        1
    } else {
        2
    }
}

fn axis_value(pos: &Column3<'_>, gi: u32, axis: usize) -> f32 {
    let col = match axis {
        0 => pos.x,
        1 => pos.y,
        _ => pos.z,
    };
    col.get(gi as usize).copied().unwrap_or(0.0)
}

fn kd_recursive(
    pos: &Column3<'_>,
    mut indices: Vec<u32>,
    bbox: Aabb,
    depth: u32,
    params: &TilingParams,
    arena: &mut TileArena,
) {
    if indices.is_empty() {
        return;
    }
    if stop_split(indices.len(), depth, params) {
        arena.push(make_leaf(pos, depth, indices, bbox));
        return;
    }

    let bbox = if bbox.is_void() {
        compute_bbox(pos, &indices)
    } else {
        bbox
    };

    let axis = longest_axis(&bbox);
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        axis_value(pos, a, axis)
            .partial_cmp(&axis_value(pos, b, axis))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let right = indices.split_off(mid);
    let left = indices;

    let left_box = compute_bbox(pos, &left);
    kd_recursive(pos, left, left_box, depth + 1, params, arena);
    let right_box = compute_bbox(pos, &right);
    kd_recursive(pos, right, right_box, depth + 1, params, arena);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::columns::PointStore;

    #[test]
    fn invalid_view_yields_no_tiles() {
        let store = PointStore::from_positions(Vec::new(), Vec::new(), Vec::new()).unwrap();
        let (tiles, stats) = build_octree(&store.columns(), &TilingParams::default());
        assert!(tiles.is_empty());
        assert_eq!(stats.num_tiles, 0);
        assert_eq!(stats.total_points, 0);
    }

    #[test]
    fn single_point_makes_a_single_leaf() {
        let store = PointStore::from_positions(vec![1.0], vec![2.0], vec![3.0]).unwrap();
        let (tiles, stats) = build_octree(&store.columns(), &TilingParams::default());
        assert_eq!(stats.num_tiles, 1);
        let (_, tile) = tiles.iter().next().unwrap();
        assert_eq!(tile.indices, vec![0]);
        assert_eq!(tile.depth, 0);
        assert_eq!(tile.lods.len(), 1);
        assert_eq!(tile.lods[0].point_count, 1);
    }

    #[test]
    fn octant_codes_separate_the_eight_corners() {
        // one point per octant of the unit cube
        let mut x = Vec::new();
        let mut y = Vec::new();
        let mut z = Vec::new();
        for oct in 0..8u32 {
            x.push(if oct & 1 == 0 { 0.0 } else { 1.0 });
            y.push(if oct & 2 == 0 { 0.0 } else { 1.0 });
            z.push(if oct & 4 == 0 { 0.0 } else { 1.0 });
        }
        let store = PointStore::from_positions(x, y, z).unwrap();
        let params = TilingParams {
            leaf_max_points: 1,
            max_depth: 4,
        };
        let (tiles, stats) = build_octree(&store.columns(), &params);
        assert_eq!(stats.num_tiles, 8);
        // increasing code order == insertion order of the corner points
        for (i, (_, tile)) in tiles.iter().enumerate() {
            assert_eq!(tile.indices, vec![i as u32]);
            assert_eq!(tile.depth, 1);
        }
    }
}
