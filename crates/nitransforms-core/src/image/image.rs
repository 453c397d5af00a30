//! Images: voxel tensors placed in physical space.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use ndarray::{ArrayD, IxDyn};

use super::dtype::DataType;
use super::grid::ImageGrid;
use crate::error::{Result, TransformError};
use crate::spatial::{Direction, Point, Spacing};

/// Image with physical metadata.
///
/// Tensor axis `i` corresponds to index coordinate `i` of the grid, so a
/// voxel at `data[[i, j, k]]` sits at `grid.ras((i, j, k))`.
///
/// # Examples
/// ```rust
/// use burn::tensor::Tensor;
/// use burn_ndarray::NdArray;
/// use nitransforms_core::Image;
/// use nitransforms_core::spatial::{Direction3, Point3, Spacing3};
///
/// type Backend = NdArray<f32>;
///
/// let device = Default::default();
/// let data = Tensor::<Backend, 3>::zeros([10, 12, 14], &device);
/// let image = Image::new(
///     data,
///     Point3::new([0.0, 0.0, 0.0]),
///     Spacing3::new([1.0, 1.0, 1.0]),
///     Direction3::identity(),
/// );
/// assert_eq!(image.shape(), [10, 12, 14]);
/// ```
#[derive(Debug, Clone)]
pub struct Image<B: Backend, const D: usize> {
    data: Tensor<B, D>,
    grid: ImageGrid<D>,
    dtype: DataType,
}

impl<B: Backend, const D: usize> Image<B, D> {
    /// Create an image; the grid shape is taken from the tensor.
    pub fn new(data: Tensor<B, D>, origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        let grid = ImageGrid::new(data.dims(), origin, spacing, direction);
        Self {
            data,
            grid,
            dtype: DataType::default(),
        }
    }

    /// Create an image on an existing grid.
    pub fn from_grid(data: Tensor<B, D>, grid: ImageGrid<D>) -> Result<Self> {
        let dims = data.dims();
        if dims != grid.shape() {
            return Err(TransformError::ShapeMismatch {
                expected: grid.shape().to_vec(),
                actual: dims.to_vec(),
            });
        }
        Ok(Self {
            data,
            grid,
            dtype: DataType::default(),
        })
    }

    /// Build an image from flat C-ordered values.
    pub fn from_values(values: Vec<f32>, grid: ImageGrid<D>, device: &B::Device) -> Result<Self> {
        if values.len() != grid.npoints() {
            return Err(TransformError::ShapeMismatch {
                expected: grid.shape().to_vec(),
                actual: vec![values.len()],
            });
        }
        let data = Tensor::<B, D>::from_data(TensorData::new(values, grid.shape()), device);
        Self::from_grid(data, grid)
    }

    /// Record the storage type of the voxels.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    /// The voxel tensor.
    pub fn data(&self) -> &Tensor<B, D> {
        &self.data
    }

    /// Consume the image and return its tensor.
    pub fn into_data(self) -> Tensor<B, D> {
        self.data
    }

    /// The voxel grid.
    pub fn grid(&self) -> &ImageGrid<D> {
        &self.grid
    }

    /// Storage type of the voxels.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Physical coordinate of the first voxel.
    pub fn origin(&self) -> &Point<D> {
        self.grid.origin()
    }

    /// Voxel spacing.
    pub fn spacing(&self) -> &Spacing<D> {
        self.grid.spacing()
    }

    /// Axis directions.
    pub fn direction(&self) -> &Direction<D> {
        self.grid.direction()
    }

    /// Image shape.
    pub fn shape(&self) -> [usize; D] {
        self.grid.shape()
    }

    /// Continuous index of a physical point.
    pub fn transform_physical_point_to_continuous_index(&self, point: &Point<D>) -> Result<Point<D>> {
        self.grid.index(point)
    }

    /// Physical point of a continuous index.
    pub fn transform_continuous_index_to_physical_point(&self, index: &Point<D>) -> Point<D> {
        self.grid.ras(index)
    }

    /// Voxel values as flat C-ordered `f32`.
    pub fn to_values(&self) -> Result<Vec<f32>> {
        tensor_values(self.data.clone())
    }

    /// Voxel values as a dynamic-rank `f64` array.
    pub fn to_array(&self) -> Result<ArrayD<f64>> {
        let values = self.to_values()?;
        ArrayD::from_shape_vec(
            IxDyn(&self.shape()),
            values.into_iter().map(f64::from).collect(),
        )
        .map_err(|e| TransformError::data(e.to_string()))
    }
}

/// A series of volumes sharing one grid (e.g. a 4-D NIfTI file).
#[derive(Debug, Clone)]
pub struct ImageSeries<B: Backend, const D: usize> {
    volumes: Vec<Tensor<B, D>>,
    grid: ImageGrid<D>,
    dtype: DataType,
}

impl<B: Backend, const D: usize> ImageSeries<B, D> {
    /// Create a series; every volume must match the grid shape.
    pub fn new(volumes: Vec<Tensor<B, D>>, grid: ImageGrid<D>) -> Result<Self> {
        for volume in &volumes {
            let dims = volume.dims();
            if dims != grid.shape() {
                return Err(TransformError::ShapeMismatch {
                    expected: grid.shape().to_vec(),
                    actual: dims.to_vec(),
                });
            }
        }
        Ok(Self {
            volumes,
            grid,
            dtype: DataType::default(),
        })
    }

    /// Stack images that share a grid.
    pub fn from_images(images: Vec<Image<B, D>>) -> Result<Self> {
        let first = images.first().ok_or_else(|| {
            TransformError::dimension_mismatch("an image series needs at least one volume")
        })?;
        let grid = *first.grid();
        let dtype = first.dtype();
        let mut volumes = Vec::with_capacity(images.len());
        for image in images {
            if image.grid() != &grid {
                return Err(TransformError::dimension_mismatch(
                    "all volumes of a series must share the same grid",
                ));
            }
            volumes.push(image.into_data());
        }
        Ok(Self {
            volumes,
            grid,
            dtype,
        })
    }

    /// Record the storage type of the voxels.
    pub fn with_dtype(mut self, dtype: DataType) -> Self {
        self.dtype = dtype;
        self
    }

    /// Number of volumes (timepoints).
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// True when the series holds no volume.
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// Shared grid.
    pub fn grid(&self) -> &ImageGrid<D> {
        &self.grid
    }

    /// Storage type of the voxels.
    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    /// Volume `t` as a standalone image.
    pub fn volume(&self, t: usize) -> Option<Image<B, D>> {
        self.volumes.get(t).map(|data| Image {
            data: data.clone(),
            grid: self.grid,
            dtype: self.dtype,
        })
    }

    /// Iterate over the volumes as images.
    pub fn iter(&self) -> impl Iterator<Item = Image<B, D>> + '_ {
        (0..self.len()).filter_map(move |t| self.volume(t))
    }

    /// The raw volume tensors.
    pub fn volumes(&self) -> &[Tensor<B, D>] {
        &self.volumes
    }
}

/// Read a tensor back as flat `f32` values.
pub(crate) fn tensor_values<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| TransformError::data(format!("{:?}", e)))
}
