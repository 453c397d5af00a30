//! Homogeneous-matrix helpers shared by grids and affine transforms.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{DMatrix, SMatrix, SVector};

use crate::error::{Result, TransformError};

/// Relative tolerance used when comparing matrices for equality.
pub const EQUALITY_TOL: f64 = 1e-5;

/// Absolute tolerance paired with [`EQUALITY_TOL`].
const ABS_TOL: f64 = 1e-8;

/// Element-wise `|a - b| <= atol + rtol * |b|` with `rtol = EQUALITY_TOL`.
pub fn allclose(a: &DMatrix<f64>, b: &DMatrix<f64>) -> bool {
    a.shape() == b.shape()
        && a
            .iter()
            .zip(b.iter())
            .all(|(x, y)| (x - y).abs() <= ABS_TOL + EQUALITY_TOL * y.abs())
}

/// Check that `m` is a `(D+1)x(D+1)` homogeneous affine matrix.
pub fn validate_homogeneous<const D: usize>(m: &DMatrix<f64>) -> Result<()> {
    let (rows, cols) = m.shape();
    if rows != cols {
        return Err(TransformError::NotSquare { rows, cols });
    }
    if rows != D + 1 {
        return Err(TransformError::dimension_mismatch(format!(
            "expected a {0}x{0} homogeneous matrix for {1}-D coordinates, got {2}x{2}",
            D + 1,
            D,
            rows
        )));
    }
    let bottom_ok = (0..D).all(|j| m[(D, j)].abs() <= ABS_TOL)
        && (m[(D, D)] - 1.0).abs() <= ABS_TOL;
    if !bottom_ok {
        let row: Vec<f64> = m.row(D).iter().copied().collect();
        return Err(TransformError::not_affine(format!(
            "bottom row must be [0 ... 0 1], got {:?}",
            row
        )));
    }
    Ok(())
}

/// Split a validated homogeneous matrix into its linear part and translation.
pub fn split_homogeneous<const D: usize>(
    m: &DMatrix<f64>,
) -> Result<(SMatrix<f64, D, D>, SVector<f64, D>)> {
    validate_homogeneous::<D>(m)?;
    let linear = SMatrix::<f64, D, D>::from_fn(|r, c| m[(r, c)]);
    let translation = SVector::<f64, D>::from_fn(|r, _| m[(r, D)]);
    Ok((linear, translation))
}

/// Assemble a homogeneous matrix from a linear part and translation.
pub fn to_homogeneous<const D: usize>(
    linear: &SMatrix<f64, D, D>,
    translation: &SVector<f64, D>,
) -> DMatrix<f64> {
    let mut m = DMatrix::<f64>::identity(D + 1, D + 1);
    for r in 0..D {
        for c in 0..D {
            m[(r, c)] = linear[(r, c)];
        }
        m[(r, D)] = translation[r];
    }
    m
}

/// Build a homogeneous matrix from nested rows.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != ncols) {
        return Err(TransformError::dimension_mismatch(
            "matrix rows have different lengths",
        ));
    }
    if nrows != ncols {
        return Err(TransformError::NotSquare {
            rows: nrows,
            cols: ncols,
        });
    }
    Ok(DMatrix::from_fn(nrows, ncols, |r, c| rows[r][c]))
}

/// Nested rows of a matrix, the inverse of [`matrix_from_rows`].
pub fn matrix_to_rows(m: &DMatrix<f64>) -> Vec<Vec<f64>> {
    m.row_iter().map(|row| row.iter().copied().collect()).collect()
}

/// Append a column of ones to a `[N, D]` batch of points.
pub fn as_homogeneous<B: Backend>(points: Tensor<B, 2>) -> Tensor<B, 2> {
    let [n, _] = points.dims();
    let ones = Tensor::<B, 2>::ones([n, 1], &points.device());
    Tensor::cat(vec![points, ones], 1)
}

/// Upload a matrix as a `[rows, cols]` f32 tensor, transposed so that a
/// row-vector batch can be multiplied on the left (`points @ M^T`).
pub fn transposed_tensor<B: Backend>(m: &DMatrix<f64>, device: &B::Device) -> Tensor<B, 2> {
    let (rows, cols) = m.shape();
    let mut values = Vec::with_capacity(rows * cols);
    for c in 0..cols {
        for r in 0..rows {
            values.push(m[(r, c)] as f32);
        }
    }
    Tensor::<B, 2>::from_data(TensorData::new(values, [cols, rows]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_validate_homogeneous() {
        let ok = DMatrix::<f64>::identity(4, 4);
        assert!(validate_homogeneous::<3>(&ok).is_ok());

        let err = validate_homogeneous::<2>(&ok).unwrap_err();
        assert!(matches!(err, TransformError::DimensionMismatch(_)));

        let not_square = DMatrix::<f64>::zeros(3, 4);
        assert_eq!(
            validate_homogeneous::<3>(&not_square).unwrap_err(),
            TransformError::NotSquare { rows: 3, cols: 4 }
        );

        let mut projective = DMatrix::<f64>::identity(4, 4);
        projective[(3, 0)] = 0.5;
        assert!(matches!(
            validate_homogeneous::<3>(&projective),
            Err(TransformError::NotAffine(_))
        ));
    }

    #[test]
    fn test_split_and_join() {
        let rows = vec![
            vec![2.0, 0.0, 0.0, 1.0],
            vec![0.0, 3.0, 0.0, 2.0],
            vec![0.0, 0.0, 4.0, 3.0],
            vec![0.0, 0.0, 0.0, 1.0],
        ];
        let m = matrix_from_rows(&rows).unwrap();
        let (linear, translation) = split_homogeneous::<3>(&m).unwrap();
        assert_eq!(linear[(1, 1)], 3.0);
        assert_eq!(translation[2], 3.0);
        assert_eq!(to_homogeneous(&linear, &translation), m);
        assert_eq!(matrix_to_rows(&m), rows);
    }

    #[test]
    fn test_matrix_from_ragged_rows() {
        let rows = vec![vec![1.0, 0.0], vec![0.0]];
        assert!(matches!(
            matrix_from_rows(&rows),
            Err(TransformError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_allclose() {
        let a = DMatrix::<f64>::identity(3, 3) * 100.0;
        let mut b = a.clone();
        b[(0, 0)] += 100.0 * 1e-6;
        assert!(allclose(&a, &b));
        b[(0, 0)] += 100.0 * 1e-3;
        assert!(!allclose(&a, &b));
        assert!(!allclose(&a, &DMatrix::<f64>::identity(4, 4)));
    }

    #[test]
    fn test_as_homogeneous() {
        let device = Default::default();
        let points = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0], [3.0, 4.0]], &device);
        let h = as_homogeneous(points);
        assert_eq!(h.dims(), [2, 3]);
        let values = h.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![1.0, 2.0, 1.0, 3.0, 4.0, 1.0]);
    }
}
