//! Transform trait for spatial coordinate transformations.
//!
//! This module defines the core Transform trait that all spatial transforms implement.

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use crate::reference::SpatialReference;

/// Transform trait for spatial coordinate transformations.
///
/// Maps points from the reference space into the moving space, which is
/// the direction resampling needs: every output location is pulled from
/// the moving image.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait Transform<B: Backend, const D: usize> {
    /// Apply transform to a batch of points.
    ///
    /// # Arguments
    /// * `points` - Tensor of shape `[Batch, D]` containing physical points
    ///
    /// # Returns
    /// Tensor of shape `[Batch, D]` containing the transformed points
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Get the inverse transform (if available).
    ///
    /// Not all transforms are easily invertible, so this returns an Option.
    fn inverse(&self) -> Option<Box<dyn Transform<B, D>>> {
        None
    }

    /// Reference space attached to the transform, used as the default
    /// resampling target.
    fn reference(&self) -> Option<&SpatialReference<D>> {
        None
    }
}
