//! Chained transform implementation.
//!
//! This module chains any number of transforms: `T(x) = Tn(...T2(T1(x)))`.

use std::fmt;

use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

use super::trait_::Transform;
use crate::reference::SpatialReference;

/// Transforms applied in sequence, first to last.
///
/// This allows composing affine and displacement-field transforms into a
/// single reference-to-moving mapping.
pub struct TransformChain<B: Backend, const D: usize> {
    transforms: Vec<Box<dyn Transform<B, D>>>,
}

impl<B: Backend, const D: usize> TransformChain<B, D> {
    /// Create a chain from boxed transforms.
    pub fn new(transforms: Vec<Box<dyn Transform<B, D>>>) -> Self {
        Self { transforms }
    }

    /// Append a transform, applied after the current ones.
    pub fn push(&mut self, transform: impl Transform<B, D> + 'static) {
        self.transforms.push(Box::new(transform));
    }

    /// Builder form of [`push`](Self::push).
    pub fn then(mut self, transform: impl Transform<B, D> + 'static) -> Self {
        self.push(transform);
        self
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl<B: Backend, const D: usize> Default for TransformChain<B, D> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<B: Backend, const D: usize> fmt::Debug for TransformChain<B, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformChain")
            .field("len", &self.transforms.len())
            .finish()
    }
}

impl<B: Backend, const D: usize> Transform<B, D> for TransformChain<B, D> {
    fn transform_points(&self, points: Tensor<B, 2>) -> Tensor<B, 2> {
        self.transforms
            .iter()
            .fold(points, |acc, t| t.transform_points(acc))
    }

    /// Reversed inverses; `None` if any member is not invertible.
    fn inverse(&self) -> Option<Box<dyn Transform<B, D>>> {
        let inverses = self
            .transforms
            .iter()
            .rev()
            .map(|t| t.inverse())
            .collect::<Option<Vec<_>>>()?;
        Some(Box::new(Self::new(inverses)))
    }

    /// The reference of the first transform.
    fn reference(&self) -> Option<&SpatialReference<D>> {
        self.transforms.first().and_then(|t| t.reference())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Vector;
    use crate::transform::Affine;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_chained_transform_2d() {
        let device = Default::default();

        // T1: scale by 2, T2: translate by [0, 1]
        let chain = TransformChain::<TestBackend, 2>::default()
            .then(Affine::from_scale(Vector::new([2.0, 2.0])))
            .then(Affine::from_translation(Vector::new([0.0, 1.0])));
        assert_eq!(chain.len(), 2);

        // [1, 1] -> [2, 2] -> [2, 3]
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 1.0]], &device);
        let transformed = chain.transform_points(points.clone());
        let slice = transformed.clone().into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(slice, vec![2.0, 3.0]);

        let back = chain.inverse().unwrap().transform_points(transformed);
        let slice = back.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(slice, vec![1.0, 1.0]);
    }

    #[test]
    fn test_non_invertible_member() {
        let chain = TransformChain::<TestBackend, 2>::default()
            .then(Affine::from_scale(Vector::new([0.0, 1.0])));
        assert!(chain.inverse().is_none());
        assert!(chain.reference().is_none());
    }
}
