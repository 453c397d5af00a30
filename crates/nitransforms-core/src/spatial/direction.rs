//! Direction cosines of image axes in physical space.

use nalgebra::{DMatrix, SMatrix};
use serde::{Deserialize, Serialize};

use super::Vector;

/// Direction matrix: column `i` is the unit direction of image axis `i`
/// expressed in physical (RAS+) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Direction<const D: usize>(pub SMatrix<f64, D, D>);

/// Positive/negative orientation letters for the first three RAS+ axes.
const AXIS_LABELS: [(char, char); 3] = [('R', 'L'), ('A', 'P'), ('S', 'I')];

impl<const D: usize> Direction<D> {
    /// Axis-aligned orientation.
    pub fn identity() -> Self {
        Self(SMatrix::identity())
    }

    /// All-zero matrix.
    pub fn zeros() -> Self {
        Self(SMatrix::zeros())
    }

    /// Build from columns, one per image axis.
    pub fn from_columns(columns: [Vector<D>; D]) -> Self {
        let mut m = SMatrix::<f64, D, D>::zeros();
        for (j, col) in columns.iter().enumerate() {
            m.set_column(j, &col.0);
        }
        Self(m)
    }

    /// True if `M * M^T` is the identity within 1e-6.
    pub fn is_orthogonal(&self) -> bool {
        let product = self.0 * self.0.transpose();
        let identity = SMatrix::<f64, D, D>::identity();
        (product - identity).iter().all(|v| v.abs() < 1e-6)
    }

    /// Orthogonal with determinant `+1`.
    pub fn is_proper_rotation(&self) -> bool {
        self.is_orthogonal() && (self.determinant() - 1.0).abs() < 1e-6
    }

    /// Determinant of the direction matrix.
    pub fn determinant(&self) -> f64 {
        // Fixed-size determinants need `DimMin` bounds that a generic
        // `Const<D>` cannot express; go through the dynamic matrix.
        DMatrix::from_iterator(D, D, self.0.iter().copied()).determinant()
    }

    /// Inverse, if the matrix is invertible.
    pub fn try_inverse(&self) -> Option<Self> {
        self.0.try_inverse().map(Self)
    }

    /// Direction vector of image axis `axis`.
    pub fn axis_direction(&self, axis: usize) -> Vector<D> {
        Vector(self.0.column(axis).into_owned())
    }

    /// Orientation codes such as `"RAS"` or `"LPI"`.
    ///
    /// Each image axis is labelled by the physical axis it is most aligned
    /// with. Returns `None` for more than three dimensions or when two image
    /// axes are dominated by the same physical axis.
    ///
    /// ```rust
    /// use nitransforms_core::spatial::Direction3;
    ///
    /// let mut las = Direction3::identity();
    /// las[(0, 0)] = -1.0;
    /// assert_eq!(las.axis_codes().as_deref(), Some("LAS"));
    /// ```
    pub fn axis_codes(&self) -> Option<String> {
        if D > 3 {
            return None;
        }
        let mut used = [false; 3];
        let mut codes = String::with_capacity(D);
        for j in 0..D {
            let (row, value) = (0..D)
                .map(|i| (i, self.0[(i, j)]))
                .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
            if used[row] || value == 0.0 {
                return None;
            }
            used[row] = true;
            let (pos, neg) = AXIS_LABELS[row];
            codes.push(if value > 0.0 { pos } else { neg });
        }
        Some(codes)
    }

    /// Get the inner nalgebra matrix.
    pub fn inner(&self) -> &SMatrix<f64, D, D> {
        &self.0
    }
}

impl<const D: usize> std::ops::Index<(usize, usize)> for Direction<D> {
    type Output = f64;

    fn index(&self, index: (usize, usize)) -> &Self::Output {
        &self.0[index]
    }
}

impl<const D: usize> std::ops::IndexMut<(usize, usize)> for Direction<D> {
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl<const D: usize> std::ops::Mul for Direction<D> {
    type Output = Self;

    fn mul(self, other: Self) -> Self::Output {
        Self(self.0 * other.0)
    }
}

impl<const D: usize> std::ops::Mul<Vector<D>> for Direction<D> {
    type Output = Vector<D>;

    fn mul(self, vector: Vector<D>) -> Self::Output {
        Vector(self.0 * vector.0)
    }
}
