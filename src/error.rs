//! Error types for point store construction.
//!
//! Per-frame paths never produce errors: malformed or missing input degrades
//! to "nothing to show". Only the owning-store constructors, where the caller
//! hands us columns that must agree in length, are fallible.

use thiserror::Error;

pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, Error)]
pub enum CloudError {
    #[error("position columns differ in length: x={x} y={y} z={z}")]
    ColumnLength { x: usize, y: usize, z: usize },

    #[error("normal columns carry {normals} entries for {points} points")]
    NormalLength { points: usize, normals: usize },
}
