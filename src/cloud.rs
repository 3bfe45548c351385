//! A tiled point cloud with cached per-LOD vertex arrays.

use std::sync::Arc;

use log::debug;

use crate::buffer::{build_vertex_array, VertexArray};
use crate::columns::PointStore;
use crate::lod::build_lods;
use crate::tile::{TileArena, TileId, TilingParams, TilingStats};
use crate::tiler::build_octree;

const DEFAULT_MAX_LOD_LEVEL: u32 = 2;
const DEFAULT_BASE_WORLD_ERROR: f32 = 2.0;

/// Handle identifying a cloud registered with the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CloudId(pub(crate) u32);

/// One point cloud: owning store, leaf tiles, and lazily built vertex
/// arrays per (tile, LOD) pair.
///
/// Replacing the store rebuilds tiles and LODs as one step, so no tile or
/// cached array can ever reference columns that are gone.
#[derive(Debug)]
pub struct PointCloud {
    store: PointStore,
    tiles: TileArena,
    tiling: TilingParams,
    tiling_stats: TilingStats,
    max_lod_level: u32,
    base_world_error: f32,
    color: [f32; 3],
    stale: bool,
    last_displayed_tiles: usize,
    last_displayed_points: usize,
}

impl PointCloud {
    pub fn new(color: [f32; 3]) -> Self {
        Self::with_params(
            color,
            TilingParams::default(),
            DEFAULT_MAX_LOD_LEVEL,
            DEFAULT_BASE_WORLD_ERROR,
        )
    }

    pub fn with_params(
        color: [f32; 3],
        tiling: TilingParams,
        max_lod_level: u32,
        base_world_error: f32,
    ) -> Self {
        Self {
            store: PointStore::default(),
            tiles: TileArena::new(),
            tiling,
            tiling_stats: TilingStats::default(),
            max_lod_level,
            base_world_error,
            color,
            stale: false,
            last_displayed_tiles: 0,
            last_displayed_points: 0,
        }
    }

    /// Replace the point data and rebuild tiles and LOD levels.
    ///
    /// This is the atomic re-tiling step: every previous tile, index list
    /// and cached vertex array is dropped together with the old store.
    pub fn set_store(&mut self, store: PointStore) {
        self.store = store;
        let columns = self.store.columns();
        let (mut tiles, stats) = build_octree(&columns, &self.tiling);
        build_lods(
            &columns,
            &mut tiles,
            self.max_lod_level,
            self.base_world_error,
        );
        self.tiles = tiles;
        self.tiling_stats = stats;
        self.last_displayed_tiles = 0;
        self.last_displayed_points = 0;
        self.stale = true;
        debug!(
            "cloud rebuilt: {} points, {} tiles",
            self.store.len(),
            self.tiles.len()
        );
    }

    pub fn nb_points(&self) -> usize {
        self.store.len()
    }

    pub fn store(&self) -> &PointStore {
        &self.store
    }

    pub fn tiles(&self) -> &TileArena {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut TileArena {
        &mut self.tiles
    }

    pub fn tiling_stats(&self) -> TilingStats {
        self.tiling_stats
    }

    pub fn color(&self) -> [f32; 3] {
        self.color
    }

    pub fn set_color(&mut self, color: [f32; 3]) {
        self.color = color;
        self.stale = true;
    }

    /// Whether the displayed presentation no longer matches tile state.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Cached vertex array for one (tile, LOD) pair, built on first use.
    ///
    /// Out-of-range requests return `None`. The slot is reused until the
    /// tile's LOD list is rebuilt by a store replacement.
    pub fn ensure_tile_lod_array(
        &mut self,
        tile: TileId,
        lod: usize,
    ) -> Option<Arc<VertexArray>> {
        let t = self.tiles.get_mut(tile)?;
        if lod >= t.lods.len() {
            return None;
        }
        if t.lod_arrays.len() != t.lods.len() {
            t.lod_arrays.resize(t.lods.len(), None);
        }
        if let Some(arr) = &t.lod_arrays[lod] {
            return Some(arr.clone());
        }
        let columns = self.store.columns();
        let arr = Arc::new(build_vertex_array(&columns, &t.lods[lod]));
        t.lod_arrays[lod] = Some(arr.clone());
        Some(arr)
    }

    /// Materialize the arrays of currently visible tiles, the renderer
    /// handoff. Records displayed tile/point counts and clears staleness.
    pub fn presentation(&mut self) -> Vec<Arc<VertexArray>> {
        let shown: Vec<(TileId, usize)> = self
            .tiles
            .iter()
            .filter(|(_, t)| t.visible)
            .filter_map(|(id, t)| {
                t.current_lod
                    .filter(|&lod| lod < t.lods.len())
                    .map(|lod| (id, lod))
            })
            .collect();

        let mut out = Vec::with_capacity(shown.len());
        let mut points = 0usize;
        for (id, lod) in shown {
            let Some(arr) = self.ensure_tile_lod_array(id, lod) else {
                continue;
            };
            if arr.is_empty() {
                continue;
            }
            points += arr.len();
            out.push(arr);
        }
        self.last_displayed_tiles = out.len();
        self.last_displayed_points = points;
        self.stale = false;
        out
    }

    pub fn last_displayed_tiles(&self) -> usize {
        self.last_displayed_tiles
    }

    pub fn last_displayed_points(&self) -> usize {
        self.last_displayed_points
    }
}
