//! Error types for transform operations.
//!
//! All fallible operations in `nitransforms-core` return [`TransformError`].

use thiserror::Error;

/// Main error type for transform, grid and resampling operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A matrix that must be square is not.
    #[error("Matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },

    /// A dimension does not match what the caller expects.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Homogeneous matrix whose bottom row is not `[0 ... 0 1]`.
    #[error("Matrix is not affine: {0}")]
    NotAffine(String),

    /// Matrix could not be inverted.
    #[error("Singular matrix: {0}")]
    Singular(String),

    /// A transform series was built from zero transforms.
    #[error("Transform mapping must hold at least one transform")]
    EmptyMapping,

    /// Resampling needs a reference space and none was provided.
    #[error("No reference space: pass one explicitly or attach it to the transform")]
    MissingReference,

    /// Spline order outside of the supported range.
    #[error("Invalid interpolation order {0}: must be in 0..=5")]
    InvalidOrder(u8),

    /// Unknown boundary extension mode.
    #[error("Invalid extension mode '{0}': expected one of constant, reflect, nearest, mirror, wrap")]
    InvalidMode(String),

    /// Unknown output data type name.
    #[error("Invalid data type '{0}'")]
    InvalidDataType(String),

    /// Array shape does not match.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// Number of transforms does not match the number of volumes.
    #[error("Attempting to apply {transforms} transforms on a series with {timepoints} timepoints")]
    TimepointMismatch { transforms: usize, timepoints: usize },

    /// Tensor data could not be read back.
    #[error("Tensor data error: {0}")]
    Data(String),
}

/// Result type for transform operations.
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create a not-affine error.
    pub fn not_affine(msg: impl Into<String>) -> Self {
        Self::NotAffine(msg.into())
    }

    /// Create a singular matrix error.
    pub fn singular(msg: impl Into<String>) -> Self {
        Self::Singular(msg.into())
    }

    /// Create a tensor data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data(msg.into())
    }
}
