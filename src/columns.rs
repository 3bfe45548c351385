//! Owning point storage and borrowed columnar views.
//!
//! The [`PointStore`] owns struct-of-arrays position (and optionally normal)
//! columns. Everything downstream borrows them through [`Column3`] views,
//! which are either dense (logical index == global index) or remapped
//! through an index list. Views are lifetime-tied to the store, so a tile or
//! LOD can never read columns that have been replaced out from under it.

use glam::Vec3;

use crate::bounds::Aabb;
use crate::error::{CloudError, CloudResult};

/// Owning struct-of-arrays storage for point positions and optional normals.
///
/// Construction validates column lengths; ingestion (file parsing etc.) is
/// the data source's business, not ours.
#[derive(Debug, Default)]
pub struct PointStore {
    x: Vec<f32>,
    y: Vec<f32>,
    z: Vec<f32>,
    nx: Vec<f32>,
    ny: Vec<f32>,
    nz: Vec<f32>,
    bbox: Aabb,
}

impl PointStore {
    pub fn from_positions(x: Vec<f32>, y: Vec<f32>, z: Vec<f32>) -> CloudResult<Self> {
        if x.len() != y.len() || x.len() != z.len() {
            return Err(CloudError::ColumnLength {
                x: x.len(),
                y: y.len(),
                z: z.len(),
            });
        }
        let bbox = bbox_of(&x, &y, &z);
        Ok(Self {
            x,
            y,
            z,
            nx: Vec::new(),
            ny: Vec::new(),
            nz: Vec::new(),
            bbox,
        })
    }

    pub fn from_positions_normals(
        x: Vec<f32>,
        y: Vec<f32>,
        z: Vec<f32>,
        nx: Vec<f32>,
        ny: Vec<f32>,
        nz: Vec<f32>,
    ) -> CloudResult<Self> {
        let mut store = Self::from_positions(x, y, z)?;
        if nx.len() != store.len() || ny.len() != store.len() || nz.len() != store.len() {
            return Err(CloudError::NormalLength {
                points: store.len(),
                normals: nx.len(),
            });
        }
        store.nx = nx;
        store.ny = ny;
        store.nz = nz;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn has_normals(&self) -> bool {
        !self.nx.is_empty()
    }

    /// Tight bounds of the whole cloud, cached at construction.
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    pub fn position(&self, i: usize) -> Option<Vec3> {
        (i < self.len()).then(|| Vec3::new(self.x[i], self.y[i], self.z[i]))
    }

    /// Dense column views over this store.
    pub fn columns(&self) -> CloudColumns<'_> {
        let position = Column3::dense(&self.x, &self.y, &self.z);
        let normal = self
            .has_normals()
            .then(|| Column3::dense(&self.nx, &self.ny, &self.nz));
        CloudColumns { position, normal }
    }
}

fn bbox_of(x: &[f32], y: &[f32], z: &[f32]) -> Aabb {
    let mut bbox = Aabb::VOID;
    for i in 0..x.len() {
        bbox.add_point(Vec3::new(x[i], y[i], z[i]));
    }
    bbox
}

/// Read-only view of one 3-component column, optionally remapped.
///
/// Dense views address the underlying arrays directly; remapped views
/// resolve logical index `i` through `indices[i]`. Out-of-range remap
/// entries resolve to `None` and are skipped by consumers, never fatal.
#[derive(Debug, Clone, Copy)]
pub struct Column3<'a> {
    pub x: &'a [f32],
    pub y: &'a [f32],
    pub z: &'a [f32],
    pub indices: Option<&'a [u32]>,
}

impl<'a> Column3<'a> {
    pub fn dense(x: &'a [f32], y: &'a [f32], z: &'a [f32]) -> Self {
        Self {
            x,
            y,
            z,
            indices: None,
        }
    }

    pub fn remapped(x: &'a [f32], y: &'a [f32], z: &'a [f32], indices: &'a [u32]) -> Self {
        Self {
            x,
            y,
            z,
            indices: Some(indices),
        }
    }

    pub fn is_dense(&self) -> bool {
        self.indices.is_none()
    }

    /// Logical length of the view: remap length when present, else global.
    pub fn len(&self) -> usize {
        self.indices.map_or(self.x.len(), |ix| ix.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of points in the underlying global arrays.
    pub fn global_len(&self) -> usize {
        self.x.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.x.is_empty() && self.x.len() == self.y.len() && self.x.len() == self.z.len()
    }

    /// Resolve a logical index to a global one; `None` when out of range.
    pub fn resolve(&self, i: usize) -> Option<usize> {
        let gi = match self.indices {
            None => i,
            Some(ix) => *ix.get(i)? as usize,
        };
        (gi < self.x.len()).then_some(gi)
    }

    pub fn get(&self, i: usize) -> Option<Vec3> {
        let gi = self.resolve(i)?;
        Some(Vec3::new(self.x[gi], self.y[gi], self.z[gi]))
    }
}

/// Position column plus optional normal column over one store.
#[derive(Debug, Clone, Copy)]
pub struct CloudColumns<'a> {
    pub position: Column3<'a>,
    pub normal: Option<Column3<'a>>,
}

impl CloudColumns<'_> {
    pub fn has_normal(&self) -> bool {
        self.normal.is_some_and(|n| n.is_valid())
    }
}
