//! Spline sampling of voxel arrays at continuous indices.

use ndarray::ArrayD;
use rayon::prelude::*;

use super::boundary::ExtendMode;
use super::bspline::{spline_filter, support, SplineOrder};
use crate::error::{Result, TransformError};

/// Slack, in voxels, before a coordinate counts as outside the lattice in
/// `Constant` mode. Coordinates travel through `f32` tensors.
const BOUNDS_TOL: f64 = 1e-3;

/// Spline interpolator over dynamic-rank `f64` arrays.
///
/// # Examples
/// ```rust
/// use ndarray::{ArrayD, IxDyn};
/// use nitransforms_core::interpolation::{ExtendMode, SplineInterpolator, SplineOrder};
///
/// let data = ArrayD::from_shape_vec(IxDyn(&[4]), vec![0.0, 10.0, 20.0, 30.0]).unwrap();
/// let interp = SplineInterpolator::new(SplineOrder::LINEAR, ExtendMode::Constant, -1.0);
/// let coeffs = interp.coefficients(data, true);
/// let values = interp.sample_many(&coeffs, &[1.5, 5.0]).unwrap();
/// assert_eq!(values, vec![15.0, -1.0]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineInterpolator {
    order: SplineOrder,
    mode: ExtendMode,
    cval: f64,
}

impl SplineInterpolator {
    /// Create an interpolator.
    pub fn new(order: SplineOrder, mode: ExtendMode, cval: f64) -> Self {
        Self { order, mode, cval }
    }

    /// Spline degree.
    pub fn order(&self) -> SplineOrder {
        self.order
    }

    /// Boundary mode.
    pub fn mode(&self) -> ExtendMode {
        self.mode
    }

    /// Fill value for `Constant` mode.
    pub fn cval(&self) -> f64 {
        self.cval
    }

    /// Turn voxel values into interpolation coefficients.
    ///
    /// With `prefilter = false` the raw values are used directly, which
    /// smooths the result for orders above one. The prefilter uses the
    /// boundary of this interpolator's mode.
    pub fn coefficients(&self, values: ArrayD<f64>, prefilter: bool) -> ArrayD<f64> {
        let mut coeffs = values.as_standard_layout().into_owned();
        if prefilter && self.order.needs_prefilter() {
            spline_filter(&mut coeffs, self.order, self.mode);
        }
        coeffs
    }

    /// Sample at one continuous index (`index.len()` must equal the rank).
    pub fn sample(&self, coeffs: &ArrayD<f64>, index: &[f64]) -> Result<f64> {
        let shape = coeffs.shape();
        if index.len() != shape.len() {
            return Err(TransformError::dimension_mismatch(format!(
                "index has {} coordinates, data has {} axes",
                index.len(),
                shape.len()
            )));
        }
        let data = coeffs
            .as_slice()
            .ok_or_else(|| TransformError::data("coefficients are not in standard layout"))?;
        Ok(self.sample_raw(data, shape, index))
    }

    /// Sample at many indices, given flat as `[N * rank]`.
    pub fn sample_many(&self, coeffs: &ArrayD<f64>, indices: &[f64]) -> Result<Vec<f64>> {
        let shape = coeffs.shape();
        let rank = shape.len();
        if rank == 0 || indices.len() % rank != 0 {
            return Err(TransformError::dimension_mismatch(format!(
                "{} coordinates cannot be split into {}-D indices",
                indices.len(),
                rank
            )));
        }
        let data = coeffs
            .as_slice()
            .ok_or_else(|| TransformError::data("coefficients are not in standard layout"))?;
        Ok(indices
            .par_chunks(rank)
            .map(|index| self.sample_raw(data, shape, index))
            .collect())
    }

    /// Sample a C-ordered coefficient slice; `index.len()` must equal `shape.len()`.
    pub(crate) fn sample_raw(&self, data: &[f64], shape: &[usize], index: &[f64]) -> f64 {
        let rank = shape.len();
        if shape.contains(&0) || index.iter().any(|x| !x.is_finite()) {
            return self.cval;
        }
        if self.mode == ExtendMode::Constant {
            let outside = index
                .iter()
                .zip(shape)
                .any(|(&x, &n)| x < -BOUNDS_TOL || x > (n as f64 - 1.0) + BOUNDS_TOL);
            if outside {
                return self.cval;
            }
        }

        let order = self.order.get();
        let width = order + 1;

        // Per-axis folded positions and weights.
        let mut offsets = Vec::with_capacity(rank * width);
        let mut weights = Vec::with_capacity(rank * width);
        let mut stride = 1usize;
        let mut strides = vec![0usize; rank];
        for axis in (0..rank).rev() {
            strides[axis] = stride;
            stride *= shape[axis];
        }
        for axis in 0..rank {
            let (start, w) = support(order, index[axis]);
            for (k, wk) in w.into_iter().enumerate() {
                let pos = self.mode.fold(start + k as isize, shape[axis]);
                offsets.push(pos * strides[axis]);
                weights.push(wk);
            }
        }

        // Walk the (order+1)^rank neighbourhood with an odometer.
        let mut counter = vec![0usize; rank];
        let mut total = 0.0;
        loop {
            let mut w = 1.0;
            let mut flat = 0usize;
            for axis in 0..rank {
                let slot = axis * width + counter[axis];
                w *= weights[slot];
                flat += offsets[slot];
            }
            if w != 0.0 {
                total += w * data[flat];
            }

            let mut axis = rank;
            loop {
                if axis == 0 {
                    return total;
                }
                axis -= 1;
                counter[axis] += 1;
                if counter[axis] < width {
                    break;
                }
                counter[axis] = 0;
            }
        }
    }
}

impl Default for SplineInterpolator {
    fn default() -> Self {
        Self::new(SplineOrder::default(), ExtendMode::default(), 0.0)
    }
}
