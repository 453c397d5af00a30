//! Point type for positions in physical (RAS+) space.

use nalgebra::Point as NaPoint;
use serde::{Deserialize, Serialize};

use super::Vector;
use crate::error::{Result, TransformError};

/// A point in D-dimensional physical space.
///
/// Used for image origins, voxel centers in world coordinates, and the
/// inputs/outputs of coordinate mappings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point<const D: usize>(pub NaPoint<f64, D>);

impl<const D: usize> Point<D> {
    /// Create a new point from coordinates.
    pub fn new(coords: [f64; D]) -> Self {
        Self(NaPoint::from(coords))
    }

    /// The origin (all coordinates zero).
    pub fn origin() -> Self {
        Self(NaPoint::origin())
    }

    /// Create a point from a slice; the slice length must be `D`.
    pub fn from_slice(coords: &[f64]) -> Result<Self> {
        Vector::<D>::from_slice(coords)
            .map(|v| Self(NaPoint::from(v.0)))
            .map_err(|_| {
                TransformError::dimension_mismatch(format!(
                    "expected {}-D point, got {} coordinates",
                    D,
                    coords.len()
                ))
            })
    }

    /// Coordinates as a `Vec`.
    pub fn to_vec(&self) -> Vec<f64> {
        self.0.coords.iter().copied().collect()
    }

    /// Position vector (point minus origin).
    pub fn coords(&self) -> Vector<D> {
        Vector(self.0.coords)
    }

    /// Get the inner nalgebra point.
    pub fn inner(&self) -> &NaPoint<f64, D> {
        &self.0
    }
}

impl<const D: usize> From<Vector<D>> for Point<D> {
    fn from(v: Vector<D>) -> Self {
        Self(NaPoint::from(v.0))
    }
}

impl<const D: usize> std::ops::Index<usize> for Point<D> {
    type Output = f64;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0.coords[index]
    }
}

impl<const D: usize> std::ops::IndexMut<usize> for Point<D> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0.coords[index]
    }
}

impl<const D: usize> std::ops::Sub for Point<D> {
    type Output = Vector<D>;

    fn sub(self, other: Self) -> Self::Output {
        Vector(self.0.coords - other.0.coords)
    }
}

impl<const D: usize> std::ops::Add<Vector<D>> for Point<D> {
    type Output = Self;

    fn add(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 + vector.0)
    }
}

impl<const D: usize> std::ops::Sub<Vector<D>> for Point<D> {
    type Output = Self;

    fn sub(self, vector: Vector<D>) -> Self::Output {
        Self(self.0 - vector.0)
    }
}
