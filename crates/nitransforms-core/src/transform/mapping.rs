//! Series of linear transforms, one per volume of a time series.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use nalgebra::DMatrix;
use tracing::debug;

use super::affine::Affine;
use super::trait_::Transform;
use crate::error::{Result, TransformError};
use crate::image::{Image, ImageSeries};
use crate::reference::SpatialReference;
use crate::resample::{resolve_reference, ResampleOptions, ResampledSeries, Resampler};
use crate::spatial::Point;

/// An ordered series of affine transforms sharing one reference.
///
/// Typical use is head-motion correction: transform `t` aligns volume
/// `t` of a series.
///
/// # Examples
/// ```rust
/// use nitransforms_core::transform::{Affine, LinearTransformsMapping};
/// use nitransforms_core::spatial::{Point3, Vector3};
///
/// let shift = Affine::from_translation(Vector3::new([1.0, 2.0, 3.0]));
/// let mapping = LinearTransformsMapping::new(vec![shift.clone(), shift.inverse().unwrap()]).unwrap();
/// let mapped = mapping.map(&[Point3::origin()], false).unwrap();
/// assert_eq!(mapped[1][0], Point3::new([-1.0, -2.0, -3.0]));
/// ```
#[derive(Debug, Clone)]
pub struct LinearTransformsMapping<const D: usize> {
    transforms: Vec<Affine<D>>,
    reference: Option<SpatialReference<D>>,
}

impl<const D: usize> LinearTransformsMapping<D> {
    /// Create a mapping; at least one transform is required.
    pub fn new(transforms: Vec<Affine<D>>) -> Result<Self> {
        if transforms.is_empty() {
            return Err(TransformError::EmptyMapping);
        }
        let reference = transforms.iter().find_map(|t| t.reference().cloned());
        Ok(Self {
            transforms,
            reference,
        })
    }

    /// Create a mapping from homogeneous matrices.
    pub fn from_matrices(matrices: &[DMatrix<f64>]) -> Result<Self> {
        let transforms = matrices
            .iter()
            .map(Affine::from_matrix)
            .collect::<Result<Vec<_>>>()?;
        Self::new(transforms)
    }

    /// Attach a reference space.
    pub fn with_reference(mut self, reference: impl Into<SpatialReference<D>>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn reference(&self) -> Option<&SpatialReference<D>> {
        self.reference.as_ref()
    }

    /// Number of transforms.
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    /// Transform `i`, carrying the mapping's reference.
    pub fn get(&self, i: usize) -> Option<Affine<D>> {
        self.transforms.get(i).map(|t| self.attach(t.clone()))
    }

    fn attach(&self, affine: Affine<D>) -> Affine<D> {
        match &self.reference {
            Some(reference) => affine.with_reference(reference.clone()),
            None => affine,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Affine<D>> + '_ {
        self.transforms.iter().map(|t| self.attach(t.clone()))
    }

    /// Homogeneous matrices of every transform.
    pub fn matrices(&self) -> Vec<DMatrix<f64>> {
        self.transforms.iter().map(Affine::matrix).collect()
    }

    /// Apply every transform to every point: the result is indexed `[t][n]`.
    pub fn map(&self, points: &[Point<D>], inverse: bool) -> Result<Vec<Vec<Point<D>>>> {
        self.transforms.iter().map(|t| t.map(points, inverse)).collect()
    }

    /// Batched form of [`map`](Self::map): `[N, D]` points to `[T, N, D]`.
    pub fn transform_points_series<B: Backend>(&self, points: Tensor<B, 2>) -> Tensor<B, 3> {
        let mapped = self
            .transforms
            .iter()
            .map(|t| Transform::<B, D>::transform_points(t, points.clone()))
            .collect();
        Tensor::stack(mapped, 0)
    }

    /// Element-wise inverse.
    pub fn inverse(&self) -> Result<Self> {
        let transforms = self
            .transforms
            .iter()
            .map(Affine::inverse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            transforms,
            reference: self.reference.clone(),
        })
    }

    /// Resample one volume with every transform; the output holds
    /// `len()` volumes.
    pub fn apply<B: Backend>(
        &self,
        moving: &Image<B, D>,
        reference: Option<&SpatialReference<D>>,
        options: &ResampleOptions,
    ) -> Result<ResampledSeries<B, D>> {
        let reference = resolve_reference(reference, self.reference.as_ref())?;
        let device = moving.data().device();
        let resampler = Resampler::new(moving, options)?;
        debug!(transforms = self.len(), "resampling one volume with a transform series");
        let parts = self
            .transforms
            .iter()
            .map(|t| resampler.run::<B, _>(t, reference, &device))
            .collect::<Result<Vec<_>>>()?;
        ResampledSeries::collect(parts)
    }

    /// Resample a series: volume `t` goes through transform `t`.
    ///
    /// # Errors
    /// [`TransformError::TimepointMismatch`] when the series length differs
    /// from the number of transforms.
    pub fn apply_series<B: Backend>(
        &self,
        moving: &ImageSeries<B, D>,
        reference: Option<&SpatialReference<D>>,
        options: &ResampleOptions,
    ) -> Result<ResampledSeries<B, D>> {
        if moving.len() != self.len() {
            return Err(TransformError::TimepointMismatch {
                transforms: self.len(),
                timepoints: moving.len(),
            });
        }
        let reference = resolve_reference(reference, self.reference.as_ref())?;
        debug!(timepoints = moving.len(), "resampling series");
        let parts = moving
            .iter()
            .zip(&self.transforms)
            .map(|(volume, t)| {
                let resampler = Resampler::new(&volume, options)?;
                resampler.run::<B, _>(t, reference, &volume.data().device())
            })
            .collect::<Result<Vec<_>>>()?;
        ResampledSeries::collect(parts)
    }
}

impl<const D: usize> PartialEq for LinearTransformsMapping<D> {
    fn eq(&self, other: &Self) -> bool {
        self.transforms == other.transforms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::ImageGrid;
    use crate::spatial::Vector;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn shifts() -> LinearTransformsMapping<3> {
        let shift = Affine::from_translation(Vector::new([1.0, 2.0, 3.0]));
        LinearTransformsMapping::new(vec![shift.clone(), shift.inverse().unwrap()]).unwrap()
    }

    #[test]
    fn test_map_points() {
        let points = [
            Point::new([0.0, 0.0, 0.0]),
            Point::new([-1.0, -1.0, -1.0]),
            Point::new([1.0, 1.0, 1.0]),
        ];
        let mapped = shifts().map(&points, false).unwrap();
        let expected = [
            [[1.0, 2.0, 3.0], [0.0, 1.0, 2.0], [2.0, 3.0, 4.0]],
            [[-1.0, -2.0, -3.0], [-2.0, -3.0, -4.0], [0.0, -1.0, -2.0]],
        ];
        for (t, row) in expected.iter().enumerate() {
            for (n, coords) in row.iter().enumerate() {
                assert!((mapped[t][n] - Point::new(*coords)).norm() < 1e-12);
            }
        }
    }

    #[test]
    fn test_empty_mapping() {
        assert_eq!(
            LinearTransformsMapping::<3>::new(vec![]).unwrap_err(),
            TransformError::EmptyMapping
        );
    }

    #[test]
    fn test_series_tensor() {
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::from_floats([[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]], &device);
        let out = shifts().transform_points_series(points);
        assert_eq!(out.dims(), [2, 2, 3]);
        let values = out.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(&values[..3], &[1.0, 2.0, 3.0]);
        assert_eq!(&values[9..], &[0.0, -1.0, -2.0]);
    }

    #[test]
    fn test_reference_propagates() {
        let mapping = shifts().with_reference(ImageGrid::from_shape([2, 2, 2]));
        assert!(mapping.get(1).unwrap().reference().is_some());
        assert!(mapping.get(2).is_none());
        assert_eq!(mapping.iter().count(), 2);
        assert_eq!(mapping.inverse().unwrap().get(0).unwrap(), shifts().get(1).unwrap());
    }

    #[test]
    fn test_timepoint_mismatch() {
        let device = Default::default();
        let grid = ImageGrid::from_shape([2, 2, 2]);
        let volume = Image::<TestBackend, 3>::from_values(vec![0.0; 8], grid, &device).unwrap();
        let series = ImageSeries::from_images(vec![volume.clone(), volume.clone(), volume]).unwrap();
        let err = shifts()
            .apply_series(&series, Some(&grid.into()), &ResampleOptions::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Attempting to apply 2 transforms on a series with 3 timepoints"
        );
    }
}
