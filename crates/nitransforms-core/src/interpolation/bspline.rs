//! B-spline basis functions and the recursive prefilter that turns voxel
//! values into interpolation coefficients.

use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};

use super::boundary::ExtendMode;
use crate::error::{Result, TransformError};

/// Degree of the interpolating spline, `0..=5`.
///
/// `0` is nearest-neighbour, `1` is (multi)linear, higher orders are
/// B-splines of that degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SplineOrder(u8);

impl SplineOrder {
    pub const NEAREST: Self = Self(0);
    pub const LINEAR: Self = Self(1);
    pub const CUBIC: Self = Self(3);

    /// Validate an order.
    pub fn new(order: u8) -> Result<Self> {
        if order > 5 {
            return Err(TransformError::InvalidOrder(order));
        }
        Ok(Self(order))
    }

    /// The degree as an integer.
    pub fn get(self) -> usize {
        self.0 as usize
    }

    /// Orders above one need their input prefiltered to interpolate.
    pub fn needs_prefilter(self) -> bool {
        self.0 > 1
    }

    /// Poles of the recursive prefilter for this order.
    pub fn poles(self) -> &'static [f64] {
        match self.0 {
            2 => &[-0.171_572_875_253_809_9],
            3 => &[-0.267_949_192_431_122_7],
            4 => &[-0.361_341_225_900_220_2, -0.013_725_429_297_339_121],
            5 => &[-0.430_575_347_099_973_8, -0.043_096_288_203_264_654],
            _ => &[],
        }
    }
}

impl Default for SplineOrder {
    fn default() -> Self {
        Self::CUBIC
    }
}

impl TryFrom<u8> for SplineOrder {
    type Error = TransformError;

    fn try_from(order: u8) -> Result<Self> {
        Self::new(order)
    }
}

impl From<SplineOrder> for u8 {
    fn from(order: SplineOrder) -> Self {
        order.0
    }
}

/// Centered B-spline basis of degree `order` evaluated at `x`.
///
/// Uses the truncated-power form
/// `β(x) = 1/n! Σ_k (-1)^k C(n+1, k) (x + (n+1)/2 - k)_+^n`.
pub fn basis(order: usize, x: f64) -> f64 {
    if order == 0 {
        // Half-open box so that neighbouring supports do not overlap.
        return if (-0.5..0.5).contains(&x) { 1.0 } else { 0.0 };
    }
    let half = (order as f64 + 1.0) / 2.0;
    if x.abs() >= half {
        return 0.0;
    }
    let mut sum = 0.0;
    let mut binom = 1.0;
    for k in 0..=order + 1 {
        let t = x + half - k as f64;
        if t > 0.0 {
            let term = binom * t.powi(order as i32);
            sum += if k % 2 == 0 { term } else { -term };
        }
        binom = binom * (order + 1 - k) as f64 / (k + 1) as f64;
    }
    sum / factorial(order)
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|v| v as f64).product()
}

/// First support index and weights of the `order + 1` samples around `x`.
pub fn support(order: usize, x: f64) -> (isize, Vec<f64>) {
    let start = if order % 2 == 1 {
        x.floor() as isize - (order / 2) as isize
    } else {
        (x + 0.5).floor() as isize - (order / 2) as isize
    };
    let weights = (0..=order)
        .map(|k| basis(order, x - (start + k as isize) as f64))
        .collect();
    (start, weights)
}

/// Convert `values` in place into B-spline coefficients along every axis.
///
/// The boundary conditions of the recursive filter follow `mode`, so that
/// the spline sampled with the same mode passes through every sample.
/// `Constant` filters like `Mirror`. `Nearest` has no closed-form pole
/// initialisation and is solved as a banded system instead. In `Wrap` mode
/// the last sample is identified with the first. Orders 0 and 1 leave the
/// data untouched.
pub fn spline_filter(values: &mut ArrayD<f64>, order: SplineOrder, mode: ExtendMode) {
    if !order.needs_prefilter() {
        return;
    }
    for axis in 0..values.ndim() {
        for mut lane in values.lanes_mut(Axis(axis)) {
            let mut line: Vec<f64> = lane.iter().copied().collect();
            filter_line(&mut line, order, mode);
            for (dst, src) in lane.iter_mut().zip(line) {
                *dst = src;
            }
        }
    }
}

fn filter_line(c: &mut [f64], order: SplineOrder, mode: ExtendMode) {
    let n = c.len();
    if n < 2 {
        return;
    }
    let poles = order.poles();
    match mode {
        ExtendMode::Constant | ExtendMode::Mirror => {
            recursive_filter(c, poles, init_causal_mirror, init_anticausal_mirror)
        }
        ExtendMode::Reflect => recursive_filter(c, poles, init_causal_reflect, init_anticausal_reflect),
        ExtendMode::GridWrap => recursive_filter(c, poles, init_causal_wrap, init_anticausal_wrap),
        ExtendMode::Wrap => {
            recursive_filter(&mut c[..n - 1], poles, init_causal_wrap, init_anticausal_wrap);
            c[n - 1] = c[0];
        }
        ExtendMode::Nearest => solve_clamped(c, order.get()),
    }
}

fn recursive_filter(c: &mut [f64], poles: &[f64], causal: fn(&mut [f64], f64), anticausal: fn(&mut [f64], f64)) {
    let n = c.len();
    if n < 2 {
        return;
    }
    let gain: f64 = poles.iter().map(|z| (1.0 - z) * (1.0 - 1.0 / z)).product();
    c.iter_mut().for_each(|v| *v *= gain);

    for &z in poles {
        causal(c, z);
        for i in 1..n {
            c[i] += z * c[i - 1];
        }
        anticausal(c, z);
        for i in (0..n - 1).rev() {
            c[i] = z * (c[i + 1] - c[i]);
        }
    }
}

fn init_causal_mirror(c: &mut [f64], z: f64) {
    let n = c.len();
    let z_n_1 = z.powi(n as i32 - 1);
    let mut sum = c[0] + z_n_1 * c[n - 1];
    let mut z_i = z;
    for i in 1..n - 1 {
        sum += z_i * (c[i] + z_n_1 * c[n - 1 - i]);
        z_i *= z;
    }
    c[0] = sum / (1.0 - z_n_1 * z_n_1);
}

fn init_anticausal_mirror(c: &mut [f64], z: f64) {
    let n = c.len();
    c[n - 1] = (z * c[n - 2] + c[n - 1]) * z / (z * z - 1.0);
}

fn init_causal_reflect(c: &mut [f64], z: f64) {
    let n = c.len();
    let z_n = z.powi(n as i32);
    let c0 = c[0];
    let mut sum = c[0] + z_n * c[n - 1];
    let mut z_i = z;
    for i in 1..n {
        sum += z_i * (c[i] + z_n * c[n - 1 - i]);
        z_i *= z;
    }
    c[0] = c0 + sum * z / (1.0 - z_n * z_n);
}

fn init_anticausal_reflect(c: &mut [f64], z: f64) {
    let n = c.len();
    c[n - 1] *= z / (z - 1.0);
}

fn init_causal_wrap(c: &mut [f64], z: f64) {
    let n = c.len();
    let mut sum = c[0];
    let mut z_i = z;
    for i in 1..n {
        sum += z_i * c[n - i];
        z_i *= z;
    }
    c[0] = sum / (1.0 - z_i);
}

fn init_anticausal_wrap(c: &mut [f64], z: f64) {
    let n = c.len();
    let mut sum = c[n - 1];
    let mut z_i = z;
    for &v in &c[..n - 1] {
        sum += z_i * v;
        z_i *= z;
    }
    c[n - 1] = sum * z / (z_i - 1.0);
}

/// Solve for coefficients under edge clamping.
///
/// Row `i` of the system holds the basis taps at integer offsets, with the
/// taps that fall off the lattice added onto the edge samples. Clamping
/// keeps every tap within `order / 2` of the diagonal and the matrix is
/// diagonally dominant, so banded elimination without pivoting is stable.
fn solve_clamped(c: &mut [f64], order: usize) {
    let n = c.len();
    let p = order / 2;
    let width = 2 * p + 1;
    let taps: Vec<f64> = (0..width).map(|k| basis(order, k as f64 - p as f64)).collect();

    // band[row * width + p + col - row] holds entry (row, col).
    let at = |row: usize, col: usize| row * width + p + col - row;
    let mut band = vec![0.0; n * width];
    for row in 0..n {
        for (k, tap) in taps.iter().enumerate() {
            let col = (row + k).saturating_sub(p).min(n - 1);
            band[at(row, col)] += tap;
        }
    }

    for col in 0..n {
        let pivot = band[at(col, col)];
        for row in col + 1..(col + p + 1).min(n) {
            let factor = band[at(row, col)] / pivot;
            if factor == 0.0 {
                continue;
            }
            for j in col..(col + p + 1).min(n) {
                band[at(row, j)] -= factor * band[at(col, j)];
            }
            c[row] -= factor * c[col];
        }
    }
    for row in (0..n).rev() {
        let mut sum = c[row];
        for j in row + 1..(row + p + 1).min(n) {
            sum -= band[at(row, j)] * c[j];
        }
        c[row] = sum / band[at(row, row)];
    }
}
