//! Displacement field transform implementation.
//!
//! This module provides a dense displacement field transform where each
//! voxel of a grid carries its own displacement vector.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{SMatrix, SVector};
use ndarray::{ArrayD, Axis, IxDyn};
use rayon::prelude::*;

use super::trait_::Transform;
use crate::error::{Result, TransformError};
use crate::geometry::split_homogeneous;
use crate::image::image::tensor_values;
use crate::image::ImageGrid;
use crate::interpolation::{ExtendMode, SplineInterpolator, SplineOrder};
use crate::reference::SpatialReference;
use crate::spatial::{Point, Vector};

/// Dense displacement field transform.
///
/// Represents `y = x + u(x)`, where `u` is a field of physical
/// displacement vectors sampled on an [`ImageGrid`] and interpolated
/// linearly in between. Beyond the grid the nearest border displacement
/// is used. The field grid is the transform's reference.
#[derive(Debug, Clone)]
pub struct DisplacementFieldTransform<const D: usize> {
    reference: SpatialReference<D>,
    shape: [usize; D],
    /// One C-ordered array per displacement component.
    components: Vec<Vec<f64>>,
    world_to_index: (SMatrix<f64, D, D>, SVector<f64, D>),
}

impl<const D: usize> DisplacementFieldTransform<D> {
    /// Create a transform from a field of shape `[shape..., D]`.
    pub fn new(grid: ImageGrid<D>, field: ArrayD<f64>) -> Result<Self> {
        let mut expected = grid.shape().to_vec();
        expected.push(D);
        if field.shape() != expected.as_slice() {
            return Err(TransformError::ShapeMismatch {
                expected,
                actual: field.shape().to_vec(),
            });
        }
        let components = field
            .axis_iter(Axis(D))
            .map(|component| component.iter().copied().collect())
            .collect();
        let world_to_index = split_homogeneous::<D>(&grid.inverse_affine()?)?;
        Ok(Self {
            reference: SpatialReference::Grid(grid),
            shape: grid.shape(),
            components,
            world_to_index,
        })
    }

    /// A field of zero displacements (the identity).
    pub fn zeros(grid: ImageGrid<D>) -> Result<Self> {
        let mut shape = grid.shape().to_vec();
        shape.push(D);
        Self::new(grid, ArrayD::zeros(IxDyn(&shape)))
    }

    /// Sample `transform` at every voxel of `grid` and store `T(x) - x`.
    pub fn from_transform<B, T>(grid: ImageGrid<D>, transform: &T, device: &B::Device) -> Result<Self>
    where
        B: Backend,
        T: Transform<B, D> + ?Sized,
    {
        let coords = grid.ndcoords_tensor::<B>(device);
        let moved = transform.transform_points(coords.clone());
        let values = tensor_values(moved - coords)?;
        let mut shape = grid.shape().to_vec();
        shape.push(D);
        let field = ArrayD::from_shape_vec(IxDyn(&shape), values.into_iter().map(f64::from).collect())
            .map_err(|e| TransformError::data(e.to_string()))?;
        Self::new(grid, field)
    }

    /// The field grid.
    pub fn grid(&self) -> Option<&ImageGrid<D>> {
        self.reference.grid()
    }

    /// The displacement field, shape `[shape..., D]`.
    pub fn field(&self) -> Result<ArrayD<f64>> {
        let mut shape = self.shape.to_vec();
        shape.push(D);
        let n: usize = self.shape.iter().product();
        let values = (0..n)
            .flat_map(|i| self.components.iter().map(move |c| c[i]))
            .collect();
        ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|e| TransformError::data(e.to_string()))
    }

    /// Displacement at one physical point, linearly interpolated and held
    /// constant past the edges of the field.
    pub fn displacement_at(&self, point: &Point<D>) -> Vector<D> {
        let u = self.displacement_at_coords(point.0.coords.as_slice());
        Vector(SVector::from_fn(|r, _| u[r]))
    }

    /// `point.len()` must be `D`.
    fn displacement_at_coords(&self, point: &[f64]) -> Vec<f64> {
        let interpolator = SplineInterpolator::new(SplineOrder::LINEAR, ExtendMode::Nearest, 0.0);
        let (inv, offset) = &self.world_to_index;
        let x = SVector::<f64, D>::from_fn(|r, _| point[r]);
        let index = inv * x + offset;
        self.components
            .iter()
            .map(|c| interpolator.sample_raw(c, &self.shape, index.as_slice()))
            .collect()
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for DisplacementFieldTransform<D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        let [n, _] = points.dims();
        let device = points.device();
        let coords: Vec<f64> = points.into_data().iter::<f32>().map(f64::from).collect();

        let moved: Vec<f32> = coords
            .par_chunks(D)
            .flat_map_iter(|x| {
                let u = self.displacement_at_coords(x);
                x.iter()
                    .zip(u)
                    .map(|(xi, ui)| (xi + ui) as f32)
                    .collect::<Vec<_>>()
            })
            .collect();

        Tensor::<B, 2>::from_data(TensorData::new(moved, [n, D]), &device)
    }

    fn reference(&self) -> Option<&SpatialReference<D>> {
        Some(&self.reference)
    }
}
