//! Per-frame LOD selection with hysteresis and a global point budget.
//!
//! Each tick walks every registered cloud's tile tree, sizes tiles in
//! screen pixels, picks a desired level per displayable leaf, corrects the
//! whole set against the point budget, then diffs against the previous
//! frame so only tiles that changed are touched and only clouds that
//! changed are flagged for the renderer.

use std::collections::HashSet;
use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::cloud::{CloudId, PointCloud};
use crate::projector::{pixel_diag, ScreenProjection};
use crate::tile::TileId;

/// Pixel thresholds steering per-tile level choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LodThreshold {
    /// Projected diagonal at/above which a tile uses its finest level.
    pub pix_diag_fine: f64,
    /// Projected diagonal at/below which a tile uses its coarsest level.
    pub pix_diag_coarse: f64,
    /// Tiles projecting at/below this are culled outright.
    pub pix_diag_hide: f64,
    /// Multiplicative dead-zone margin against frame-to-frame oscillation;
    /// `<= 0` means no dead zone.
    pub hysteresis: f64,
}

impl Default for LodThreshold {
    fn default() -> Self {
        Self {
            pix_diag_fine: 600.0,
            pix_diag_coarse: 120.0,
            pix_diag_hide: 8.0,
            hysteresis: 1.2,
        }
    }
}

/// Global cap on rendered points; `<= 0` disables budgeting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointBudget {
    pub max_points: i64,
}

impl Default for PointBudget {
    fn default() -> Self {
        Self {
            max_points: 2_000_000,
        }
    }
}

/// One displayed (cloud, tile, level) triple, the unit of selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRep {
    pub cloud: CloudId,
    pub tile: TileId,
    pub lod: usize,
}

/// Receives one staleness notification per cloud whose tiles changed.
pub trait RenderNotifier {
    fn mark_stale(&mut self, cloud: CloudId);
}

/// No-op notifier for callers that poll cloud staleness instead.
impl RenderNotifier for () {
    fn mark_stale(&mut self, _cloud: CloudId) {}
}

/// Which selection algorithm `tick` runs. Baseline is the only
/// implemented policy; the enum is the slot for future alternatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SelectionPolicy {
    #[default]
    Baseline,
}

/// Per-tick selection statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeStats {
    /// Total points across all registered clouds.
    pub global_points: usize,
    /// Points implied by the accepted selection.
    pub points_chosen: usize,
    /// Tiles in the accepted selection.
    pub nodes_shown: usize,
    /// Time spent in selection + diff, milliseconds.
    pub select_ms: f64,
}

/// Aggregated displayed counts, refreshed by `update_displayed_stats`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisplayStats {
    pub displayed_tiles: usize,
    pub displayed_points: usize,
}

struct CloudEntry {
    id: CloudId,
    cloud: PointCloud,
}

struct TileState {
    cloud: CloudId,
    tile: TileId,
    pix_diag: f64,
    lod_cost: Vec<usize>,
    max_idx: usize,
    current: usize,
}

/// The per-frame decision engine over all registered clouds.
pub struct LodController {
    clouds: Vec<CloudEntry>,
    next_id: u32,
    thresholds: LodThreshold,
    budget: PointBudget,
    policy: SelectionPolicy,
    active_last: Vec<NodeRep>,
    stats: RuntimeStats,
    display: DisplayStats,
}

impl Default for LodController {
    fn default() -> Self {
        Self::new()
    }
}

impl LodController {
    pub fn new() -> Self {
        Self {
            clouds: Vec::new(),
            next_id: 0,
            thresholds: LodThreshold::default(),
            budget: PointBudget::default(),
            policy: SelectionPolicy::default(),
            active_last: Vec::new(),
            stats: RuntimeStats::default(),
            display: DisplayStats::default(),
        }
    }

    pub fn register_cloud(&mut self, cloud: PointCloud) -> CloudId {
        let id = CloudId(self.next_id);
        self.next_id += 1;
        self.clouds.push(CloudEntry { id, cloud });
        id
    }

    pub fn unregister_cloud(&mut self, id: CloudId) -> Option<PointCloud> {
        let at = self.clouds.iter().position(|e| e.id == id)?;
        Some(self.clouds.remove(at).cloud)
    }

    pub fn cloud(&self, id: CloudId) -> Option<&PointCloud> {
        self.clouds.iter().find(|e| e.id == id).map(|e| &e.cloud)
    }

    pub fn cloud_mut(&mut self, id: CloudId) -> Option<&mut PointCloud> {
        self.clouds
            .iter_mut()
            .find(|e| e.id == id)
            .map(|e| &mut e.cloud)
    }

    pub fn clouds(&self) -> impl Iterator<Item = (CloudId, &PointCloud)> {
        self.clouds.iter().map(|e| (e.id, &e.cloud))
    }

    pub fn thresholds(&self) -> LodThreshold {
        self.thresholds
    }

    pub fn set_thresholds(&mut self, thresholds: LodThreshold) {
        self.thresholds = thresholds;
    }

    pub fn budget(&self) -> PointBudget {
        self.budget
    }

    pub fn set_budget(&mut self, budget: PointBudget) {
        self.budget = budget;
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: SelectionPolicy) {
        self.policy = policy;
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    pub fn display_stats(&self) -> DisplayStats {
        self.display
    }

    /// Run one selection frame: choose levels, correct against the budget,
    /// diff against the previous frame and apply the difference.
    ///
    /// Returns whether anything changed, so the caller can skip a redraw
    /// on quiet frames. Never fails: missing or empty inputs produce an
    /// empty selection.
    pub fn tick<V, N>(&mut self, view: &V, notifier: &mut N) -> bool
    where
        V: ScreenProjection + ?Sized,
        N: RenderNotifier + ?Sized,
    {
        let t0 = Instant::now();
        let now = self.select_lod(view);
        let changed = self.apply_diff(now, notifier);
        self.stats.select_ms = t0.elapsed().as_secs_f64() * 1e3;
        changed
    }

    /// Re-aggregate displayed tile/point counts from the clouds.
    pub fn update_displayed_stats(&mut self) {
        let mut tiles = 0;
        let mut points = 0;
        for e in &self.clouds {
            tiles += e.cloud.last_displayed_tiles();
            points += e.cloud.last_displayed_points();
        }
        self.display = DisplayStats {
            displayed_tiles: tiles,
            displayed_points: points,
        };
    }

    fn select_lod<V: ScreenProjection + ?Sized>(&mut self, view: &V) -> Vec<NodeRep> {
        match self.policy {
            SelectionPolicy::Baseline => self.select_baseline(view),
        }
    }

    fn select_baseline<V: ScreenProjection + ?Sized>(&mut self, view: &V) -> Vec<NodeRep> {
        self.stats.points_chosen = 0;
        self.stats.nodes_shown = 0;
        self.stats.global_points = 0;
        if self.clouds.is_empty() {
            return Vec::new();
        }

        // When everything fits the budget anyway, levels stay finest and
        // only the hide cull applies.
        let global_points: usize = self.clouds.iter().map(|e| e.cloud.nb_points()).sum();
        self.stats.global_points = global_points;
        let budget = self.budget.max_points;
        let budget_slack = budget <= 0 || global_points as i64 <= budget;

        let mut states: Vec<TileState> = Vec::new();
        for entry in &self.clouds {
            let tiles = entry.cloud.tiles();
            let mut stack = tiles.roots();
            while let Some(id) = stack.pop() {
                let Some(tile) = tiles.get(id) else { continue };

                let pd = pixel_diag(view, &tile.bbox, 0.0);
                if pd <= self.thresholds.pix_diag_hide {
                    continue;
                }
                // only leaves are displayable
                if !tile.children.is_empty() {
                    stack.extend(tile.children.iter().copied());
                    continue;
                }
                if tile.lods.is_empty() {
                    continue;
                }

                let max_idx = tile.lods.len() - 1;
                let last = tile.current_lod.filter(|&l| l <= max_idx);
                let current = if budget_slack || tile.lods.len() == 1 {
                    0
                } else {
                    choose_lod(pd, &self.thresholds, max_idx, last)
                };
                states.push(TileState {
                    cloud: entry.id,
                    tile: id,
                    pix_diag: pd,
                    lod_cost: tile.lods.iter().map(|l| l.point_count).collect(),
                    max_idx,
                    current,
                });
            }
        }
        if states.is_empty() {
            return Vec::new();
        }

        let mut total: i64 = states.iter().map(|s| s.lod_cost[s.current] as i64).sum();

        if !budget_slack && total > budget {
            let min_cost: i64 = states.iter().map(|s| s.lod_cost[s.max_idx] as i64).sum();
            if min_cost >= budget {
                // The cap cannot be met even fully degraded: go coarsest
                // everywhere and overrun, rather than dropping tiles.
                for s in &mut states {
                    s.current = s.max_idx;
                }
                debug!("point budget {budget} infeasible, coarsest total is {min_cost}");
            } else {
                // Degrade the visually smallest tiles first, one level per
                // visit, until the cap is met.
                let mut order: Vec<usize> = (0..states.len()).collect();
                order.sort_by(|&a, &b| {
                    states[a]
                        .pix_diag
                        .partial_cmp(&states[b].pix_diag)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });

                let mut progressed = true;
                while progressed && total > budget {
                    progressed = false;
                    for &i in &order {
                        let s = &mut states[i];
                        if s.current >= s.max_idx {
                            continue;
                        }
                        let delta = s.lod_cost[s.current] as i64 - s.lod_cost[s.current + 1] as i64;
                        s.current += 1;
                        total -= delta;
                        progressed = true;
                        if total <= budget {
                            break;
                        }
                    }
                }
            }
        }

        let mut accepted = Vec::with_capacity(states.len());
        for s in &states {
            accepted.push(NodeRep {
                cloud: s.cloud,
                tile: s.tile,
                lod: s.current,
            });
            self.stats.points_chosen += s.lod_cost[s.current];
            self.stats.nodes_shown += 1;
        }
        accepted
    }

    fn apply_diff<N: RenderNotifier + ?Sized>(
        &mut self,
        now: Vec<NodeRep>,
        notifier: &mut N,
    ) -> bool {
        let last_set: HashSet<NodeRep> = self.active_last.iter().copied().collect();
        let now_set: HashSet<NodeRep> = now.iter().copied().collect();
        let mut dirty: Vec<CloudId> = Vec::new();

        // hide what fell out of the selection
        let active_last = std::mem::take(&mut self.active_last);
        for nr in &active_last {
            if now_set.contains(nr) {
                continue;
            }
            let Some(cloud) = self.cloud_mut(nr.cloud) else {
                continue;
            };
            if let Some(tile) = cloud.tiles_mut().get_mut(nr.tile) {
                tile.visible = false;
                tile.current_lod = None;
            }
            cloud.mark_stale();
            if !dirty.contains(&nr.cloud) {
                dirty.push(nr.cloud);
            }
        }

        // show what entered it, materializing arrays on first use
        for nr in &now {
            if last_set.contains(nr) {
                continue;
            }
            let Some(cloud) = self.cloud_mut(nr.cloud) else {
                continue;
            };
            cloud.ensure_tile_lod_array(nr.tile, nr.lod);
            if let Some(tile) = cloud.tiles_mut().get_mut(nr.tile) {
                tile.visible = true;
                tile.current_lod = Some(nr.lod);
            }
            cloud.mark_stale();
            if !dirty.contains(&nr.cloud) {
                dirty.push(nr.cloud);
            }
        }

        for &id in &dirty {
            notifier.mark_stale(id);
        }
        self.active_last = now;
        !dirty.is_empty()
    }
}

/// Threshold interpolation with a hysteresis dead zone.
///
/// Without a previous level the interpolated choice is taken as-is.
/// Otherwise refining requires the tile to have clearly grown past the
/// fine threshold, coarsening to have clearly shrunk below the coarse
/// one; anything in between keeps the previous level.
fn choose_lod(pix_diag: f64, th: &LodThreshold, max_idx: usize, last: Option<usize>) -> usize {
    let base = if pix_diag <= th.pix_diag_coarse {
        max_idx
    } else if pix_diag >= th.pix_diag_fine {
        0
    } else {
        let t = (pix_diag - th.pix_diag_coarse) / (th.pix_diag_fine - th.pix_diag_coarse);
        (((1.0 - t) * max_idx as f64).round() as usize).min(max_idx)
    };

    let Some(last) = last else {
        return base;
    };
    let h = if th.hysteresis <= 0.0 {
        1.0
    } else {
        th.hysteresis
    };

    if base < last {
        if pix_diag >= th.pix_diag_fine * h {
            base
        } else {
            last
        }
    } else if base > last {
        if pix_diag <= th.pix_diag_coarse / h {
            base
        } else {
            last
        }
    } else {
        last
    }
}
