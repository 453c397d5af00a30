//! Physical distance between adjacent voxels along each axis.

use super::Vector;

/// Voxel spacing (a `Vector` for semantic clarity).
pub type Spacing<const D: usize> = Vector<D>;

impl<const D: usize> Spacing<D> {
    /// Same spacing along every axis.
    pub fn uniform(value: f64) -> Self {
        Self::new([value; D])
    }

    /// True when all components are equal.
    pub fn is_uniform(&self) -> bool {
        if D == 0 {
            return true;
        }
        let first = self[0];
        (1..D).all(|i| (self[i] - first).abs() < 1e-9)
    }

    /// Smallest spacing component.
    pub fn min_spacing(&self) -> f64 {
        self.0.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Largest spacing component.
    pub fn max_spacing(&self) -> f64 {
        self.0.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Volume (or area) of one voxel.
    pub fn voxel_volume(&self) -> f64 {
        self.0.iter().product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Spacing3 = Spacing<3>;

    #[test]
    fn test_spacing_uniform() {
        let s = Spacing3::uniform(2.0);
        assert_eq!(s, Spacing3::new([2.0, 2.0, 2.0]));
        assert!(s.is_uniform());
        assert!(!Spacing3::new([1.0, 2.0, 3.0]).is_uniform());
    }

    #[test]
    fn test_spacing_extrema() {
        let s = Spacing3::new([1.0, 2.0, 3.0]);
        assert_eq!(s.min_spacing(), 1.0);
        assert_eq!(s.max_spacing(), 3.0);
        assert_eq!(s.voxel_volume(), 6.0);
    }
}
