//! Spline interpolation of voxel arrays.
//!
//! Sampling runs on CPU `ndarray` arrays: tensors are read back once per
//! resampling call, prefiltered, and evaluated in parallel with rayon.

pub mod boundary;
pub mod bspline;
pub mod sampler;

pub use boundary::ExtendMode;
pub use bspline::SplineOrder;
pub use sampler::SplineInterpolator;
