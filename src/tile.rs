//! Tiles, LOD levels and the tile arena.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bounds::Aabb;
use crate::buffer::VertexArray;

/// Parameters controlling spatial subdivision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TilingParams {
    /// A node with at most this many points becomes a leaf.
    pub leaf_max_points: usize,
    /// Hard recursion bound; the only guarantee of termination when points
    /// are coincident.
    pub max_depth: u32,
}

impl Default for TilingParams {
    fn default() -> Self {
        Self {
            leaf_max_points: 4096,
            max_depth: 12,
        }
    }
}

/// Summary returned by the tilers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TilingStats {
    pub num_tiles: usize,
    pub total_points: usize,
}

/// One resolution level of a tile.
///
/// Level 0 is the tile's full index list; level `k` samples every
/// `2^k`-th entry of it. Indices address the global columns.
#[derive(Debug, Clone)]
pub struct LodLevel {
    /// 0 = full resolution, increasing = coarser.
    pub level: u32,
    /// Sample indices into the global columns.
    pub indices: Vec<u32>,
    pub point_count: usize,
    /// Nominal world-space sample spacing of this level. Reserved for
    /// error-driven policies.
    pub error_world: f32,
}

impl LodLevel {
    pub fn is_valid(&self) -> bool {
        self.point_count > 0 && !self.indices.is_empty()
    }
}

/// Stable handle into a [`TileArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub(crate) u32);

impl TileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A leaf (or interior) node of the spatial hierarchy.
///
/// Index membership is fixed at creation; only `lods`, `lod_arrays`,
/// `current_lod` and `visible` mutate afterwards.
#[derive(Debug, Default)]
pub struct Tile {
    pub depth: u32,
    /// Tight hull of the member points, not the partition cell.
    pub bbox: Aabb,
    /// Global point indices owned by this tile, full resolution.
    pub indices: Vec<u32>,
    pub lods: Vec<LodLevel>,
    /// Cached vertex arrays, aligned 1:1 with `lods`.
    pub lod_arrays: Vec<Option<Arc<VertexArray>>>,
    /// Selected LOD index; `None` = nothing selected yet.
    pub current_lod: Option<usize>,
    pub visible: bool,
    pub parent: Option<TileId>,
    pub children: Vec<TileId>,
}

impl Tile {
    pub fn leaf(depth: u32, bbox: Aabb, indices: Vec<u32>) -> Self {
        Self {
            depth,
            bbox,
            indices,
            ..Self::default()
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn level(&self, level: u32) -> Option<&LodLevel> {
        self.lods.iter().find(|l| l.level == level)
    }
}

/// Arena of tiles addressed by stable integer handles.
///
/// Handles stay valid as the arena grows; parent/child links are handle
/// lists rather than references.
#[derive(Debug, Default)]
pub struct TileArena {
    tiles: Vec<Tile>,
}

impl TileArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tile: Tile) -> TileId {
        let id = TileId(self.tiles.len() as u32);
        self.tiles.push(tile);
        id
    }

    pub fn get(&self, id: TileId) -> Option<&Tile> {
        self.tiles.get(id.index())
    }

    pub fn get_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.tiles.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (TileId(i as u32), t))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (TileId, &mut Tile)> {
        self.tiles
            .iter_mut()
            .enumerate()
            .map(|(i, t)| (TileId(i as u32), t))
    }

    /// Tiles without a parent, in insertion order.
    pub fn roots(&self) -> Vec<TileId> {
        self.iter()
            .filter(|(_, t)| t.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn total_points(&self) -> usize {
        self.tiles.iter().map(|t| t.indices.len()).sum()
    }
}
