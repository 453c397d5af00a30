//! Affine transform implementation.
//!
//! This module provides an affine transform (linear transformation + translation)
//! stored as a homogeneous matrix.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::{DMatrix, Rotation2, Rotation3, SMatrix, SVector};
use tracing::warn;

use super::trait_::Transform;
use crate::error::{Result, TransformError};
use crate::geometry::{allclose, as_homogeneous, split_homogeneous, to_homogeneous, transposed_tensor};
use crate::image::Image;
use crate::reference::SpatialReference;
use crate::resample::{resample, ResampleOptions, Resampled};
use crate::spatial::{Point, Vector};

/// Affine Transform (Linear transformation + Translation).
///
/// Represents `y = A x + t` where:
/// * `A` is a D×D matrix (rotation, scale, shear)
/// * `t` is a D-dimensional translation vector
///
/// The transform maps reference coordinates into the moving space.
///
/// # Examples
/// ```rust
/// use nitransforms_core::transform::Affine;
/// use nitransforms_core::spatial::{Point3, Vector3};
///
/// let xfm = Affine::from_translation(Vector3::new([1.0, 2.0, 3.0]));
/// let origin = Point3::origin();
/// assert_eq!(xfm.map_point(&origin, false).unwrap(), Point3::new([1.0, 2.0, 3.0]));
/// assert_eq!(xfm.map_point(&origin, true).unwrap(), Point3::new([-1.0, -2.0, -3.0]));
/// ```
#[derive(Debug, Clone)]
pub struct Affine<const D: usize> {
    linear: SMatrix<f64, D, D>,
    translation: SVector<f64, D>,
    reference: Option<SpatialReference<D>>,
}

impl<const D: usize> Affine<D> {
    /// Create an affine transform from its linear part and translation.
    pub fn new(linear: SMatrix<f64, D, D>, translation: SVector<f64, D>) -> Self {
        Self {
            linear,
            translation,
            reference: None,
        }
    }

    /// Create an identity affine transform.
    pub fn identity() -> Self {
        Self::new(SMatrix::identity(), SVector::zeros())
    }

    /// Create from a `(D+1)×(D+1)` homogeneous matrix.
    ///
    /// # Errors
    /// `NotSquare`, `DimensionMismatch` or `NotAffine` on malformed input.
    pub fn from_matrix(matrix: &DMatrix<f64>) -> Result<Self> {
        let (linear, translation) = split_homogeneous::<D>(matrix)?;
        Ok(Self::new(linear, translation))
    }

    /// Create from the rows of a homogeneous matrix.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let owned: Vec<Vec<f64>> = rows.iter().map(|r| r.to_vec()).collect();
        Self::from_matrix(&crate::geometry::matrix_from_rows(&owned)?)
    }

    /// Pure translation.
    pub fn from_translation(offset: Vector<D>) -> Self {
        Self::new(SMatrix::identity(), offset.0)
    }

    /// Axis-aligned scaling about the origin.
    pub fn from_scale(factors: Vector<D>) -> Self {
        Self::new(SMatrix::from_diagonal(&factors.0), SVector::zeros())
    }

    /// Linear map applied about `center`: `y = A (x - c) + c`.
    fn about_center(linear: SMatrix<f64, D, D>, center: Option<Point<D>>) -> Self {
        let c = center.map_or_else(SVector::zeros, |p| p.0.coords);
        Self::new(linear, c - linear * c)
    }

    /// Attach a reference space.
    pub fn with_reference(mut self, reference: impl Into<SpatialReference<D>>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// The attached reference space, if any.
    pub fn reference(&self) -> Option<&SpatialReference<D>> {
        self.reference.as_ref()
    }

    /// Homogeneous `(D+1)×(D+1)` matrix.
    pub fn matrix(&self) -> DMatrix<f64> {
        to_homogeneous(&self.linear, &self.translation)
    }

    /// Linear part `A`.
    pub fn linear(&self) -> &SMatrix<f64, D, D> {
        &self.linear
    }

    /// Translation `t`.
    pub fn translation(&self) -> Vector<D> {
        Vector(self.translation)
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        DMatrix::from_iterator(D, D, self.linear.iter().copied()).determinant()
    }

    /// Map one point; with `inverse` the transform is applied backwards.
    pub fn map_point(&self, point: &Point<D>, inverse: bool) -> Result<Point<D>> {
        let x = point.0.coords;
        if inverse {
            let inv = self.inverse_linear()?;
            Ok(Point::from(Vector(inv * (x - self.translation))))
        } else {
            Ok(Point::from(Vector(self.linear * x + self.translation)))
        }
    }

    /// Map a list of points.
    pub fn map(&self, points: &[Point<D>], inverse: bool) -> Result<Vec<Point<D>>> {
        if inverse {
            let inv = self.inverse()?;
            return inv.map(points, false);
        }
        Ok(points
            .iter()
            .map(|p| Point::from(Vector(self.linear * p.0.coords + self.translation)))
            .collect())
    }

    fn inverse_linear(&self) -> Result<SMatrix<f64, D, D>> {
        self.linear.try_inverse().ok_or_else(|| {
            TransformError::singular(format!("affine linear part is not invertible: {}", self.linear))
        })
    }

    /// The inverse transform; the reference is kept.
    pub fn inverse(&self) -> Result<Self> {
        let inv = self.inverse_linear()?;
        Ok(Self {
            linear: inv,
            translation: -(inv * self.translation),
            reference: self.reference.clone(),
        })
    }

    /// `next ∘ self`: apply `self` first, then `next`.
    pub fn compose(&self, next: &Self) -> Self {
        Self {
            linear: next.linear * self.linear,
            translation: next.linear * self.translation + next.translation,
            reference: self.reference.clone(),
        }
    }

    /// Resample `moving` onto `reference` (or the attached reference).
    pub fn apply<B: Backend>(
        &self,
        moving: &Image<B, D>,
        reference: Option<&SpatialReference<D>>,
        options: &ResampleOptions,
    ) -> Result<Resampled<B, D>> {
        resample(self, moving, reference, options)
    }
}

impl Affine<2> {
    /// Rotation by `angle` radians (counter-clockwise) about `center`.
    pub fn from_rotation(angle: f64, center: Option<Point<2>>) -> Self {
        Self::about_center(*Rotation2::new(angle).matrix(), center)
    }
}

impl Affine<3> {
    /// Rotation from Euler angles `[x, y, z]` in radians, `R = Rz Ry Rx`,
    /// about `center`.
    pub fn from_rotation(angles: [f64; 3], center: Option<Point<3>>) -> Self {
        let rotation = Rotation3::from_euler_angles(angles[0], angles[1], angles[2]);
        Self::about_center(*rotation.matrix(), center)
    }
}

impl<const D: usize> Default for Affine<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const D: usize> PartialEq for Affine<D> {
    /// Matrices equal within [`EQUALITY_TOL`](crate::geometry::EQUALITY_TOL).
    /// References are not compared, but a mismatch is logged.
    fn eq(&self, other: &Self) -> bool {
        let equal = allclose(&self.matrix(), &other.matrix());
        if equal && self.reference != other.reference {
            warn!("affines are equal but their reference spaces differ");
        }
        equal
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for Affine<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        // y = [x 1] @ M^T, dropping the homogeneous column
        let [n, _] = points.dims();
        let m = transposed_tensor::<B>(&self.matrix(), &points.device());
        as_homogeneous(points).matmul(m).slice([0..n, 0..D])
    }

    fn inverse(&self) -> Option<Box<dyn Transform<B, D>>> {
        Affine::inverse(self)
            .ok()
            .map(|inv| Box::new(inv) as Box<dyn Transform<B, D>>)
    }

    fn reference(&self) -> Option<&SpatialReference<D>> {
        self.reference.as_ref()
    }
}
