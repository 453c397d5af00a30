//! Spatial references: the locations a transform is evaluated on.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};

use crate::image::{Image, ImageGrid};
use crate::spatial::Point;

/// Where resampled values are computed.
///
/// A grid reference produces an image; a point reference (e.g. surface
/// vertices) produces one value per point.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialReference<const D: usize> {
    /// A voxel lattice.
    Grid(ImageGrid<D>),
    /// An unstructured set of physical points.
    Points(Vec<Point<D>>),
}

impl<const D: usize> SpatialReference<D> {
    /// Number of spatial dimensions.
    pub fn ndim(&self) -> usize {
        D
    }

    /// Number of sample locations.
    pub fn npoints(&self) -> usize {
        match self {
            Self::Grid(grid) => grid.npoints(),
            Self::Points(points) => points.len(),
        }
    }

    /// Physical coordinates of every sample location.
    pub fn ndcoords(&self) -> Vec<Point<D>> {
        match self {
            Self::Grid(grid) => grid.ndcoords(),
            Self::Points(points) => points.clone(),
        }
    }

    /// Physical coordinates as an `[N, D]` tensor.
    pub fn ndcoords_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        match self {
            Self::Grid(grid) => grid.ndcoords_tensor(device),
            Self::Points(points) => {
                let values: Vec<f32> = points
                    .iter()
                    .flat_map(|p| p.0.coords.iter().map(|&v| v as f32).collect::<Vec<_>>())
                    .collect();
                Tensor::<B, 2>::from_data(TensorData::new(values, [points.len(), D]), device)
            }
        }
    }

    /// The grid, for grid references.
    pub fn grid(&self) -> Option<&ImageGrid<D>> {
        match self {
            Self::Grid(grid) => Some(grid),
            Self::Points(_) => None,
        }
    }
}

impl<const D: usize> From<ImageGrid<D>> for SpatialReference<D> {
    fn from(grid: ImageGrid<D>) -> Self {
        Self::Grid(grid)
    }
}

impl<B: Backend, const D: usize> From<&Image<B, D>> for SpatialReference<D> {
    fn from(image: &Image<B, D>) -> Self {
        Self::Grid(*image.grid())
    }
}

impl<const D: usize> From<Vec<Point<D>>> for SpatialReference<D> {
    fn from(points: Vec<Point<D>>) -> Self {
        Self::Points(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_grid_reference() {
        let reference = SpatialReference::from(ImageGrid::<3>::from_shape([2, 3, 4]));
        assert_eq!(reference.ndim(), 3);
        assert_eq!(reference.npoints(), 24);
        assert!(reference.grid().is_some());
        assert_eq!(reference.ndcoords()[1], Point::new([0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_point_reference() {
        let points = vec![Point::new([1.0, 2.0]), Point::new([3.0, 4.0])];
        let reference = SpatialReference::from(points.clone());
        assert_eq!(reference.npoints(), 2);
        assert!(reference.grid().is_none());
        assert_eq!(reference.ndcoords(), points);

        let device = Default::default();
        let tensor = reference.ndcoords_tensor::<TestBackend>(&device);
        let values = tensor.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
