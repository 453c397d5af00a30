//! Spatial transforms for neuroimaging data.
//!
//! Affine transforms, transform series, displacement fields and the
//! spline resampler that applies them to images on physical grids.

pub mod error;
pub mod geometry;
pub mod image;
pub mod interpolation;
pub mod reference;
pub mod resample;
pub mod spatial;
pub mod transform;

pub use error::{Result, TransformError};
pub use geometry::EQUALITY_TOL;
pub use image::{DataType, Image, ImageGrid, ImageSeries};
pub use reference::SpatialReference;
pub use resample::{resample, ResampleOptions, Resampled, ResampledSeries};
pub use spatial::{Direction, Point, Spacing, Vector};
pub use transform::{Affine, DisplacementFieldTransform, LinearTransformsMapping, Transform, TransformChain};
