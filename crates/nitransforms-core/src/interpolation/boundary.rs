//! Boundary extension modes for sampling outside the voxel lattice.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// How the input is extended beyond its edges.
///
/// Illustrated on a 1-D input `a b c d`:
///
/// | mode       | extension               |
/// |------------|-------------------------|
/// | `Constant` | `k k k k \| a b c d \| k k k k` (no interpolation past the edges) |
/// | `Nearest`  | `a a a a \| a b c d \| d d d d` |
/// | `Reflect`  | `d c b a \| a b c d \| d c b a` |
/// | `Mirror`   | `d c b \| a b c d \| c b a`   |
/// | `Wrap`     | `b c \| a b c d \| b c` (first and last samples coincide) |
/// | `GridWrap` | `a b c d \| a b c d \| a b c d` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtendMode {
    #[default]
    Constant,
    Nearest,
    Reflect,
    Mirror,
    Wrap,
    GridWrap,
}

impl ExtendMode {
    /// Fold an integer sample index into `0..n`.
    ///
    /// `Constant` folds like `Mirror`: it only matters for spline support
    /// indices of points that are themselves inside the lattice.
    pub fn fold(self, index: isize, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let n_i = n as isize;
        match self {
            Self::Nearest => index.clamp(0, n_i - 1) as usize,
            Self::GridWrap => index.rem_euclid(n_i) as usize,
            Self::Wrap => {
                if (0..n_i).contains(&index) {
                    return index as usize;
                }
                // Period n - 1: left of the lattice a multiple lands on the
                // last sample, right of it on the first.
                let period = n_i - 1;
                let m = index.rem_euclid(period);
                (if index < 0 && m == 0 { period } else { m }) as usize
            }
            Self::Reflect => {
                let period = 2 * n_i;
                let m = index.rem_euclid(period);
                (if m >= n_i { period - 1 - m } else { m }) as usize
            }
            Self::Mirror | Self::Constant => {
                let period = 2 * n_i - 2;
                let m = index.rem_euclid(period);
                (if m >= n_i { period - m } else { m }) as usize
            }
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Constant => "constant",
            Self::Nearest => "nearest",
            Self::Reflect => "reflect",
            Self::Mirror => "mirror",
            Self::Wrap => "wrap",
            Self::GridWrap => "grid-wrap",
        }
    }
}

impl fmt::Display for ExtendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtendMode {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "constant" => Ok(Self::Constant),
            "nearest" => Ok(Self::Nearest),
            "reflect" => Ok(Self::Reflect),
            "mirror" => Ok(Self::Mirror),
            "wrap" => Ok(Self::Wrap),
            "grid-wrap" => Ok(Self::GridWrap),
            other => Err(TransformError::InvalidMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extend(mode: ExtendMode, range: std::ops::Range<isize>, n: usize) -> Vec<usize> {
        range.map(|i| mode.fold(i, n)).collect()
    }

    #[test]
    fn test_fold_nearest() {
        assert_eq!(extend(ExtendMode::Nearest, -2..6, 4), vec![0, 0, 0, 1, 2, 3, 3, 3]);
    }

    #[test]
    fn test_fold_reflect() {
        assert_eq!(extend(ExtendMode::Reflect, -4..8, 4), vec![3, 2, 1, 0, 0, 1, 2, 3, 3, 2, 1, 0]);
    }

    #[test]
    fn test_fold_mirror() {
        assert_eq!(extend(ExtendMode::Mirror, -3..7, 4), vec![3, 2, 1, 0, 1, 2, 3, 2, 1, 0]);
    }

    #[test]
    fn test_fold_wrap() {
        assert_eq!(
            extend(ExtendMode::Wrap, -4..8, 4),
            vec![2, 3, 1, 2, 0, 1, 2, 3, 1, 2, 0, 1]
        );
        assert_eq!(ExtendMode::Wrap.fold(2, 2), 0);
        assert_eq!(ExtendMode::Wrap.fold(-1, 2), 1);
    }

    #[test]
    fn test_fold_grid_wrap() {
        assert_eq!(extend(ExtendMode::GridWrap, -2..6, 4), vec![2, 3, 0, 1, 2, 3, 0, 1]);
    }

    #[test]
    fn test_fold_single_sample() {
        for mode in [
            ExtendMode::Nearest,
            ExtendMode::Reflect,
            ExtendMode::Mirror,
            ExtendMode::Wrap,
            ExtendMode::GridWrap,
        ] {
            assert_eq!(mode.fold(-5, 1), 0);
            assert_eq!(mode.fold(7, 1), 0);
        }
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!("Mirror".parse::<ExtendMode>().unwrap(), ExtendMode::Mirror);
        assert_eq!(ExtendMode::Wrap.to_string(), "wrap");
        assert_eq!("grid-wrap".parse::<ExtendMode>().unwrap(), ExtendMode::GridWrap);
        assert_eq!(ExtendMode::GridWrap.to_string(), "grid-wrap");
        assert!(matches!(
            "grid-mirror".parse::<ExtendMode>(),
            Err(TransformError::InvalidMode(_))
        ));
    }
}
