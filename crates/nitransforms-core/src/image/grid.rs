//! Image grids: the voxel lattice of an image placed in physical space.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use nalgebra::{DMatrix, SMatrix, SVector};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::geometry::{allclose, split_homogeneous, to_homogeneous};
use crate::spatial::{Direction, Point, Spacing, Vector};

/// Shape and physical placement of a voxel lattice.
///
/// A continuous index `i` maps to the physical (RAS+) point
/// `origin + direction * (i ∘ spacing)`; the homogeneous form of this map is
/// [`ImageGrid::affine`].
///
/// # Examples
/// ```rust
/// use nitransforms_core::image::ImageGrid;
/// use nitransforms_core::spatial::{Direction3, Point3, Spacing3};
///
/// let grid = ImageGrid::new(
///     [10, 10, 10],
///     Point3::new([-5.0, -5.0, 0.0]),
///     Spacing3::new([2.0, 2.0, 2.0]),
///     Direction3::identity(),
/// );
/// let physical = grid.ras(&Point3::new([1.0, 1.0, 1.0]));
/// assert_eq!(physical, Point3::new([-3.0, -3.0, 2.0]));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ImageGrid<const D: usize> {
    #[serde(with = "shape_serde")]
    shape: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
}

impl<const D: usize> ImageGrid<D> {
    /// Create a grid from its components.
    pub fn new(shape: [usize; D], origin: Point<D>, spacing: Spacing<D>, direction: Direction<D>) -> Self {
        Self {
            shape,
            origin,
            spacing,
            direction,
        }
    }

    /// Unit-spaced, axis-aligned grid anchored at the origin.
    pub fn from_shape(shape: [usize; D]) -> Self {
        Self::new(shape, Point::origin(), Spacing::uniform(1.0), Direction::identity())
    }

    /// Decompose a homogeneous voxel-to-physical matrix.
    ///
    /// Spacing is the norm of each column of the linear part, direction the
    /// normalized columns. A degenerate (zero) column keeps unit spacing and
    /// the canonical axis direction.
    pub fn from_affine(shape: [usize; D], affine: &DMatrix<f64>) -> Result<Self> {
        let (linear, translation) = split_homogeneous::<D>(affine)?;
        let mut spacing = Spacing::<D>::zeros();
        let mut direction = SMatrix::<f64, D, D>::zeros();
        for j in 0..D {
            let column = linear.column(j);
            let norm = column.norm();
            if norm > 1e-9 {
                spacing[j] = norm;
                direction.set_column(j, &(column / norm));
            } else {
                spacing[j] = 1.0;
                direction[(j, j)] = 1.0;
            }
        }
        Ok(Self::new(
            shape,
            Point::from(Vector(translation)),
            spacing,
            Direction(direction),
        ))
    }

    /// Number of voxels along each axis.
    pub fn shape(&self) -> [usize; D] {
        self.shape
    }

    /// Physical position of voxel `(0, ..., 0)`.
    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    /// Physical distance between neighbouring voxels along each axis.
    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    /// Axis directions.
    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Number of spatial dimensions.
    pub fn ndim(&self) -> usize {
        D
    }

    /// Total number of voxels.
    pub fn npoints(&self) -> usize {
        self.shape.iter().product()
    }

    /// Linear part of the voxel-to-physical map: `direction * diag(spacing)`.
    pub fn linear(&self) -> SMatrix<f64, D, D> {
        self.direction.0 * SMatrix::<f64, D, D>::from_diagonal(&self.spacing.0)
    }

    /// Homogeneous `(D+1)x(D+1)` voxel-to-physical matrix.
    pub fn affine(&self) -> DMatrix<f64> {
        to_homogeneous(&self.linear(), &self.origin.0.coords)
    }

    /// Homogeneous physical-to-voxel matrix.
    pub fn inverse_affine(&self) -> Result<DMatrix<f64>> {
        let (inv_linear, offset) = self.inverse_parts()?;
        Ok(to_homogeneous(&inv_linear, &offset))
    }

    fn inverse_parts(&self) -> Result<(SMatrix<f64, D, D>, SVector<f64, D>)> {
        let inv_linear = self.linear().try_inverse().ok_or_else(|| {
            TransformError::singular("image grid direction/spacing is not invertible")
        })?;
        let offset = -(inv_linear * self.origin.0.coords);
        Ok((inv_linear, offset))
    }

    /// Physical coordinates of a (continuous) voxel index.
    pub fn ras(&self, index: &Point<D>) -> Point<D> {
        let scaled = Vector(index.0.coords).component_mul(&self.spacing);
        self.origin + self.direction * scaled
    }

    /// Continuous voxel index of a physical point.
    pub fn index(&self, point: &Point<D>) -> Result<Point<D>> {
        let (inv_linear, offset) = self.inverse_parts()?;
        Ok(Point::from(Vector(inv_linear * point.0.coords + offset)))
    }

    /// Continuous voxel indices of many physical points.
    pub fn index_many(&self, points: &[Point<D>]) -> Result<Vec<Point<D>>> {
        let (inv_linear, offset) = self.inverse_parts()?;
        Ok(points
            .iter()
            .map(|p| Point::from(Vector(inv_linear * p.0.coords + offset)))
            .collect())
    }

    /// Voxel index of the `flat`-th voxel in C order (last axis fastest).
    pub fn unravel(&self, flat: usize) -> [usize; D] {
        let mut rest = flat;
        let mut index = [0usize; D];
        for axis in (0..D).rev() {
            let n = self.shape[axis].max(1);
            index[axis] = rest % n;
            rest /= n;
        }
        index
    }

    /// All voxel indices in C order.
    pub fn ndindex(&self) -> impl Iterator<Item = [usize; D]> + '_ {
        (0..self.npoints()).map(move |flat| self.unravel(flat))
    }

    /// Physical coordinates of every voxel, in [`ImageGrid::ndindex`] order.
    pub fn ndcoords(&self) -> Vec<Point<D>> {
        self.ndindex()
            .map(|idx| self.ras(&Point::new(idx.map(|i| i as f64))))
            .collect()
    }

    /// Physical coordinates of every voxel as an `[N, D]` tensor.
    pub fn ndcoords_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 2> {
        let n = self.npoints();
        let mut values = Vec::with_capacity(n * D);
        for p in self.ndcoords() {
            values.extend(p.0.coords.iter().map(|&v| v as f32));
        }
        Tensor::<B, 2>::from_data(TensorData::new(values, [n, D]), device)
    }

    /// Batch physical points `[N, D]` to continuous indices `[N, D]`.
    pub fn world_to_index_tensor<B: Backend>(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let device = points.device();
        let (inv_linear, offset) = self.inverse_parts()?;

        // I = P @ L^-T + offset
        let mut t_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                t_data.push(inv_linear[(c, r)] as f32);
            }
        }
        let t = Tensor::<B, 2>::from_data(TensorData::new(t_data, [D, D]), &device);
        let o: Vec<f32> = offset.iter().map(|&v| v as f32).collect();
        let o = Tensor::<B, 2>::from_data(TensorData::new(o, [1, D]), &device);

        Ok(points.matmul(t) + o)
    }

    /// Batch continuous indices `[N, D]` to physical points `[N, D]`.
    pub fn index_to_world_tensor<B: Backend>(&self, indices: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = indices.device();
        let linear = self.linear();

        // P = I @ L^T + origin
        let mut m_data = Vec::with_capacity(D * D);
        for r in 0..D {
            for c in 0..D {
                m_data.push(linear[(c, r)] as f32);
            }
        }
        let m = Tensor::<B, 2>::from_data(TensorData::new(m_data, [D, D]), &device);
        let o: Vec<f32> = (0..D).map(|i| self.origin[i] as f32).collect();
        let o = Tensor::<B, 2>::from_data(TensorData::new(o, [1, D]), &device);

        indices.matmul(m) + o
    }

    /// Orientation codes of the grid axes (e.g. `"RAS"`).
    pub fn axis_codes(&self) -> Option<String> {
        self.direction.axis_codes()
    }
}

impl<const D: usize> PartialEq for ImageGrid<D> {
    /// Same shape and affines equal within tolerance.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && allclose(&self.affine(), &other.affine())
    }
}

/// Fixed-size shapes travel as plain sequences.
mod shape_serde {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer, const D: usize>(shape: &[usize; D], serializer: S) -> Result<S::Ok, S::Error> {
        shape.as_slice().serialize(serializer)
    }

    pub fn deserialize<'de, De: Deserializer<'de>, const D: usize>(deserializer: De) -> Result<[usize; D], De::Error> {
        let shape = Vec::<usize>::deserialize(deserializer)?;
        let len = shape.len();
        shape
            .try_into()
            .map_err(|_| De::Error::invalid_length(len, &"one extent per axis"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;
    type Point3 = Point<3>;

    fn oblique_grid() -> ImageGrid<3> {
        let mut direction = Direction::<3>::identity();
        direction[(0, 0)] = -1.0;
        ImageGrid::new(
            [4, 5, 6],
            Point3::new([10.0, -20.0, 30.0]),
            Spacing::new([2.0, 1.5, 3.0]),
            direction,
        )
    }

    #[test]
    fn test_serde_roundtrip() {
        let grid = oblique_grid();
        let json = serde_json::to_value(grid).unwrap();
        assert_eq!(json["shape"], serde_json::json!([4, 5, 6]));
        let back: ImageGrid<3> = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, grid);
        assert_eq!(back.shape(), [4, 5, 6]);

        let mut wrong = json;
        wrong["shape"] = serde_json::json!([4, 5]);
        assert!(serde_json::from_value::<ImageGrid<3>>(wrong).is_err());
    }

    #[test]
    fn test_affine_layout() {
        let grid = oblique_grid();
        let affine = grid.affine();
        assert_eq!(affine[(0, 0)], -2.0);
        assert_eq!(affine[(1, 1)], 1.5);
        assert_eq!(affine[(2, 2)], 3.0);
        assert_eq!(affine[(0, 3)], 10.0);
        assert_eq!(affine[(3, 3)], 1.0);
    }

    #[test]
    fn test_from_affine_roundtrip() {
        let grid = oblique_grid();
        let decoded = ImageGrid::<3>::from_affine(grid.shape(), &grid.affine()).unwrap();
        assert_eq!(decoded, grid);
        assert!((decoded.spacing()[2] - 3.0).abs() < 1e-12);
        assert_eq!(decoded.axis_codes().as_deref(), Some("LAS"));
    }

    #[test]
    fn test_index_ras_roundtrip() {
        let grid = oblique_grid();
        let index = Point3::new([1.5, 2.0, 3.25]);
        let physical = grid.ras(&index);
        let back = grid.index(&physical).unwrap();
        assert!((back - index).norm() < 1e-9);
    }

    #[test]
    fn test_inverse_affine() {
        let grid = oblique_grid();
        let product = grid.affine() * grid.inverse_affine().unwrap();
        assert!((product - DMatrix::<f64>::identity(4, 4)).norm() < 1e-12);
    }

    #[test]
    fn test_singular_grid() {
        let grid = ImageGrid::new(
            [2, 2],
            Point::origin(),
            Spacing::new([0.0, 1.0]),
            Direction::identity(),
        );
        assert!(matches!(
            grid.index(&Point::new([1.0, 1.0])),
            Err(TransformError::Singular(_))
        ));
    }

    #[test]
    fn test_ndindex_c_order() {
        let grid = ImageGrid::from_shape([2, 3]);
        let indices: Vec<[usize; 2]> = grid.ndindex().collect();
        assert_eq!(indices.len(), 6);
        assert_eq!(indices[0], [0, 0]);
        assert_eq!(indices[1], [0, 1]);
        assert_eq!(indices[3], [1, 0]);
        assert_eq!(indices[5], [1, 2]);
    }

    #[test]
    fn test_ndcoords() {
        let grid = ImageGrid::new(
            [2, 2],
            Point::new([1.0, 1.0]),
            Spacing::new([2.0, 3.0]),
            Direction::identity(),
        );
        let coords = grid.ndcoords();
        assert_eq!(coords[3], Point::new([3.0, 4.0]));
    }

    #[test]
    fn test_tensor_conversions_match_pointwise() {
        let device = Default::default();
        let grid = oblique_grid();
        let coords = grid.ndcoords_tensor::<TestBackend>(&device);
        assert_eq!(coords.dims(), [grid.npoints(), 3]);

        let indices = grid.world_to_index_tensor(coords.clone()).unwrap();
        let values = indices.clone().into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (flat, idx) in grid.ndindex().enumerate().take(20) {
            for axis in 0..3 {
                let got = values[flat * 3 + axis];
                assert!((got - idx[axis] as f32).abs() < 1e-3, "axis {axis}: {got}");
            }
        }

        let back = grid.index_to_world_tensor(indices);
        let original = coords.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let recovered = back.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        for (a, b) in original.iter().zip(recovered.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }
}
