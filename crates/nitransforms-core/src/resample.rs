//! Resampling of images through spatial transforms.
//!
//! For every location of the reference, the transform gives the matching
//! physical point in the moving image; the moving voxels are interpolated
//! there and the values are laid out on the reference.

use burn::tensor::backend::Backend;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::image::image::tensor_values;
use crate::image::{DataType, Image, ImageGrid, ImageSeries};
use crate::interpolation::{ExtendMode, SplineInterpolator, SplineOrder};
use crate::reference::SpatialReference;
use crate::transform::Transform;

/// Interpolation settings for resampling.
///
/// # Examples
/// ```rust
/// use nitransforms_core::interpolation::{ExtendMode, SplineOrder};
/// use nitransforms_core::ResampleOptions;
///
/// let options = ResampleOptions::default()
///     .with_order(SplineOrder::LINEAR)
///     .with_mode(ExtendMode::Nearest);
/// assert_eq!(options.order, SplineOrder::LINEAR);
/// assert!(options.prefilter);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleOptions {
    /// Spline degree, 0 (nearest) to 5.
    pub order: SplineOrder,
    /// How samples beyond the moving grid are produced.
    pub mode: ExtendMode,
    /// Fill value for [`ExtendMode::Constant`].
    pub cval: f64,
    /// Convert voxels into spline coefficients before sampling.
    pub prefilter: bool,
    /// Output storage type; `None` keeps the moving image's type.
    pub output_dtype: Option<DataType>,
}

impl Default for ResampleOptions {
    fn default() -> Self {
        Self {
            order: SplineOrder::CUBIC,
            mode: ExtendMode::Constant,
            cval: 0.0,
            prefilter: true,
            output_dtype: None,
        }
    }
}

impl ResampleOptions {
    pub fn with_order(mut self, order: SplineOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_mode(mut self, mode: ExtendMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cval(mut self, cval: f64) -> Self {
        self.cval = cval;
        self
    }

    pub fn with_prefilter(mut self, prefilter: bool) -> Self {
        self.prefilter = prefilter;
        self
    }

    pub fn with_output_dtype(mut self, dtype: DataType) -> Self {
        self.output_dtype = Some(dtype);
        self
    }

    fn interpolator(&self) -> SplineInterpolator {
        SplineInterpolator::new(self.order, self.mode, self.cval)
    }
}

/// Result of resampling one volume.
#[derive(Debug, Clone)]
pub enum Resampled<B: Backend, const D: usize> {
    /// Values laid out on a grid reference.
    Image(Image<B, D>),
    /// One value per point of a point reference.
    Values(Vec<f64>),
}

impl<B: Backend, const D: usize> Resampled<B, D> {
    /// The image, for grid references.
    pub fn into_image(self) -> Option<Image<B, D>> {
        match self {
            Self::Image(image) => Some(image),
            Self::Values(_) => None,
        }
    }

    /// Sampled values in reference order.
    pub fn values(&self) -> Result<Vec<f64>> {
        match self {
            Self::Image(image) => Ok(image.to_values()?.into_iter().map(f64::from).collect()),
            Self::Values(values) => Ok(values.clone()),
        }
    }
}

/// Result of resampling with a series of transforms.
#[derive(Debug, Clone)]
pub enum ResampledSeries<B: Backend, const D: usize> {
    /// One volume per transform on a grid reference.
    Series(ImageSeries<B, D>),
    /// One value list per transform on a point reference.
    Values(Vec<Vec<f64>>),
}

impl<B: Backend, const D: usize> ResampledSeries<B, D> {
    /// Number of resampled volumes.
    pub fn len(&self) -> usize {
        match self {
            Self::Series(series) => series.len(),
            Self::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The series, for grid references.
    pub fn into_series(self) -> Option<ImageSeries<B, D>> {
        match self {
            Self::Series(series) => Some(series),
            Self::Values(_) => None,
        }
    }

    pub(crate) fn collect(parts: Vec<Resampled<B, D>>) -> Result<Self> {
        let mut images = Vec::with_capacity(parts.len());
        let mut values = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                Resampled::Image(image) => images.push(image),
                Resampled::Values(v) => values.push(v),
            }
        }
        if values.is_empty() {
            Ok(Self::Series(ImageSeries::from_images(images)?))
        } else {
            Ok(Self::Values(values))
        }
    }
}

/// Resample `moving` onto `reference` through `transform`.
///
/// When `reference` is `None` the transform's own reference is used.
///
/// # Errors
/// [`TransformError::MissingReference`] when no reference is available, or
/// [`TransformError::Singular`] when the moving grid cannot be inverted.
pub fn resample<B, T, const D: usize>(
    transform: &T,
    moving: &Image<B, D>,
    reference: Option<&SpatialReference<D>>,
    options: &ResampleOptions,
) -> Result<Resampled<B, D>>
where
    B: Backend,
    T: Transform<B, D> + ?Sized,
{
    let reference = resolve_reference(reference, transform.reference())?;
    let resampler = Resampler::new(moving, options)?;
    resampler.run(transform, reference, &moving.data().device())
}

/// Pick the explicit reference, falling back to the attached one.
pub(crate) fn resolve_reference<'a, const D: usize>(
    explicit: Option<&'a SpatialReference<D>>,
    attached: Option<&'a SpatialReference<D>>,
) -> Result<&'a SpatialReference<D>> {
    explicit.or(attached).ok_or(TransformError::MissingReference)
}

/// A moving volume prepared for repeated sampling.
pub(crate) struct Resampler<'a, const D: usize> {
    grid: &'a ImageGrid<D>,
    coefficients: ArrayD<f64>,
    interpolator: SplineInterpolator,
    dtype: DataType,
}

impl<'a, const D: usize> Resampler<'a, D> {
    pub(crate) fn new<B: Backend>(moving: &'a Image<B, D>, options: &ResampleOptions) -> Result<Self> {
        let interpolator = options.interpolator();
        let coefficients = interpolator.coefficients(moving.to_array()?, options.prefilter);
        Ok(Self {
            grid: moving.grid(),
            coefficients,
            interpolator,
            dtype: options.output_dtype.unwrap_or(moving.dtype()),
        })
    }

    pub(crate) fn run<B, T>(
        &self,
        transform: &T,
        reference: &SpatialReference<D>,
        device: &B::Device,
    ) -> Result<Resampled<B, D>>
    where
        B: Backend,
        T: Transform<B, D> + ?Sized,
    {
        debug!(
            moving = ?self.grid.shape(),
            targets = reference.npoints(),
            order = self.interpolator.order().get(),
            mode = %self.interpolator.mode(),
            "resampling"
        );

        let targets = reference.ndcoords_tensor::<B>(device);
        let mapped = transform.transform_points(targets);
        let indices = self.grid.world_to_index_tensor(mapped)?;
        let indices: Vec<f64> = tensor_values(indices)?.into_iter().map(f64::from).collect();

        let values: Vec<f64> = self
            .interpolator
            .sample_many(&self.coefficients, &indices)?
            .into_iter()
            .map(|v| self.dtype.cast(v))
            .collect();

        match reference {
            SpatialReference::Grid(grid) => {
                let values = values.into_iter().map(|v| v as f32).collect();
                let image = Image::from_values(values, *grid, device)?.with_dtype(self.dtype);
                Ok(Resampled::Image(image))
            }
            SpatialReference::Points(_) => Ok(Resampled::Values(values)),
        }
    }
}
