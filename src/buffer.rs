//! Renderer-facing vertex arrays built from columnar point data.

use bytemuck::{Pod, Zeroable};
use log::debug;

use crate::columns::{CloudColumns, Column3};
use crate::tile::LodLevel;

/// Normal used when the store carries no normal columns.
pub const DEFAULT_NORMAL: [f32; 3] = [0.0, 0.0, 1.0];

/// One packed point vertex, ready for GPU upload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

/// An opaque point-vertex buffer handed to the renderer.
#[derive(Debug, Clone, Default)]
pub struct VertexArray {
    vertices: Vec<PointVertex>,
}

impl VertexArray {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, v: PointVertex) {
        self.vertices.push(v);
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertices(&self) -> &[PointVertex] {
        &self.vertices
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }
}

/// Materialize one LOD level against the global columns.
///
/// The level's index list acts as the remap; entries outside the global
/// range are skipped, so the result can be shorter than the level's
/// declared point count (which indicates inconsistent input data, not a
/// fatal condition). Missing normals fall back to [`DEFAULT_NORMAL`].
pub fn build_vertex_array(columns: &CloudColumns<'_>, level: &LodLevel) -> VertexArray {
    let pos = &columns.position;
    if !pos.is_valid() || level.point_count == 0 {
        return VertexArray::default();
    }

    let view = Column3::remapped(pos.x, pos.y, pos.z, &level.indices);
    let normal = columns
        .normal
        .filter(|n| n.is_valid())
        .map(|n| Column3::remapped(n.x, n.y, n.z, &level.indices));

    let mut out = VertexArray::with_capacity(level.point_count);
    let mut skipped = 0usize;
    for i in 0..view.len() {
        let Some(gi) = view.resolve(i) else {
            skipped += 1;
            continue;
        };
        let position = [view.x[gi], view.y[gi], view.z[gi]];
        let nrm = match &normal {
            Some(n) if gi < n.global_len() => [n.x[gi], n.y[gi], n.z[gi]],
            _ => DEFAULT_NORMAL,
        };
        out.push(PointVertex {
            position,
            normal: nrm,
        });
    }
    if skipped > 0 {
        debug!("vertex array build skipped {skipped} out-of-range indices");
    }
    out
}
