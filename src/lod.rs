//! Multi-resolution level generation for tiles.

use log::debug;

use crate::columns::CloudColumns;
use crate::tile::{LodLevel, Tile, TileArena};

/// World-space diagonal of a tile's bounding box.
pub fn tile_diagonal(tile: &Tile) -> f64 {
    tile.bbox.diagonal() as f64
}

/// Replace every tile's LOD list with stride-sampled levels.
///
/// Level 0 is the tile's full index list verbatim; level `k` takes every
/// `2^k`-th entry of it, stopping once the stride reaches the full count
/// (a coarser level would not shrink further). Point counts are therefore
/// non-increasing across levels. Re-running with the same inputs produces
/// the same lists; any cached vertex arrays are invalidated.
pub fn build_lods(
    columns: &CloudColumns<'_>,
    arena: &mut TileArena,
    max_level: u32,
    base_world_error: f32,
) {
    if !columns.position.is_valid() {
        return;
    }

    let mut levels_built = 0usize;
    for (_, tile) in arena.iter_mut() {
        if tile.indices.is_empty() {
            continue;
        }
        tile.lods.clear();

        let full_count = tile.indices.len();
        tile.lods.push(LodLevel {
            level: 0,
            indices: tile.indices.clone(),
            point_count: full_count,
            error_world: base_world_error,
        });

        for level in 1..=max_level.min(31) {
            let stride = 1usize << level;
            if stride >= full_count {
                break;
            }
            let indices: Vec<u32> = tile.indices.iter().step_by(stride).copied().collect();
            if indices.is_empty() {
                continue;
            }
            let point_count = indices.len();
            tile.lods.push(LodLevel {
                level,
                indices,
                point_count,
                error_world: base_world_error * stride as f32,
            });
        }
        levels_built += tile.lods.len();

        // rebuilt levels invalidate any cached arrays and prior selection
        tile.lod_arrays.clear();
        tile.lod_arrays.resize(tile.lods.len(), None);
        tile.current_lod = None;
        tile.visible = false;
    }
    debug!("built {} LOD levels across {} tiles", levels_built, arena.len());
}
