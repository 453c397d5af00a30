//! JSON documents for linear transforms.

use anyhow::{bail, Context, Result};
use nalgebra::DMatrix;
use nitransforms_core::geometry::{matrix_from_rows, matrix_to_rows};
use nitransforms_core::{Affine, ImageGrid, LinearTransformsMapping, SpatialReference};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Kind of transform stored in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransformKind {
    Affine,
    LinearMapping,
}

/// A reference grid as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDocument {
    pub shape: Vec<usize>,
    /// Homogeneous voxel-to-physical matrix, row by row.
    pub affine: Vec<Vec<f64>>,
}

impl GridDocument {
    pub fn from_grid<const D: usize>(grid: &ImageGrid<D>) -> Self {
        Self {
            shape: grid.shape().to_vec(),
            affine: matrix_to_rows(&grid.affine()),
        }
    }

    pub fn to_grid<const D: usize>(&self) -> Result<ImageGrid<D>> {
        let shape: [usize; D] = self.shape.as_slice().try_into().with_context(|| {
            format!("Reference shape {:?} is not {}-D", self.shape, D)
        })?;
        let affine = matrix_from_rows(&self.affine)?;
        Ok(ImageGrid::from_affine(shape, &affine)?)
    }
}

/// On-disk form of an affine or a series of affines.
///
/// ```json
/// {"type": "affine", "dimension": 3, "matrices": [[[1,0,0,0],[0,1,0,0],[0,0,1,0],[0,0,0,1]]]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformDocument {
    #[serde(rename = "type")]
    pub kind: TransformKind,
    pub dimension: usize,
    /// Homogeneous matrices, each stored row by row.
    pub matrices: Vec<Vec<Vec<f64>>>,
    /// Inverse matrices, when every transform is invertible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse: Option<Vec<Vec<Vec<f64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<GridDocument>,
}

/// A linear transform loaded from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum Linear<const D: usize> {
    Affine(Affine<D>),
    Mapping(LinearTransformsMapping<D>),
}

impl<const D: usize> Linear<D> {
    /// Number of affines.
    pub fn len(&self) -> usize {
        match self {
            Self::Affine(_) => 1,
            Self::Mapping(mapping) => mapping.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Homogeneous matrices.
    pub fn matrices(&self) -> Vec<DMatrix<f64>> {
        match self {
            Self::Affine(affine) => vec![affine.matrix()],
            Self::Mapping(mapping) => mapping.matrices(),
        }
    }

    /// The attached reference space.
    pub fn reference(&self) -> Option<&SpatialReference<D>> {
        match self {
            Self::Affine(affine) => affine.reference(),
            Self::Mapping(mapping) => mapping.reference(),
        }
    }

    /// Element-wise inverse.
    pub fn inverse(&self) -> Result<Self> {
        Ok(match self {
            Self::Affine(affine) => Self::Affine(affine.inverse()?),
            Self::Mapping(mapping) => Self::Mapping(mapping.inverse()?),
        })
    }

    /// Every affine of the transform, reference attached.
    pub fn affines(&self) -> Vec<Affine<D>> {
        match self {
            Self::Affine(affine) => vec![affine.clone()],
            Self::Mapping(mapping) => mapping.iter().collect(),
        }
    }
}

impl<const D: usize> From<Affine<D>> for Linear<D> {
    fn from(affine: Affine<D>) -> Self {
        Self::Affine(affine)
    }
}

impl<const D: usize> From<LinearTransformsMapping<D>> for Linear<D> {
    fn from(mapping: LinearTransformsMapping<D>) -> Self {
        Self::Mapping(mapping)
    }
}

impl TransformDocument {
    /// Describe a linear transform.
    pub fn from_linear<const D: usize>(linear: &Linear<D>) -> Self {
        let kind = match linear {
            Linear::Affine(_) => TransformKind::Affine,
            Linear::Mapping(_) => TransformKind::LinearMapping,
        };
        let matrices = linear.matrices().iter().map(matrix_to_rows).collect();
        let inverse = linear
            .inverse()
            .ok()
            .map(|inv| inv.matrices().iter().map(matrix_to_rows).collect());
        let reference = match linear.reference() {
            Some(SpatialReference::Grid(grid)) => Some(GridDocument::from_grid(grid)),
            Some(SpatialReference::Points(_)) => {
                warn!("point references are not stored in transform documents");
                None
            }
            None => None,
        };
        Self {
            kind,
            dimension: D,
            matrices,
            inverse,
            reference,
        }
    }

    /// Rebuild the transform; a single matrix always yields an affine.
    pub fn to_linear<const D: usize>(&self) -> Result<Linear<D>> {
        if self.dimension != D {
            bail!(
                "Transform document is {}-D, expected {}-D coordinates",
                self.dimension,
                D
            );
        }
        let matrices = self
            .matrices
            .iter()
            .enumerate()
            .map(|(i, rows)| {
                matrix_from_rows(rows).with_context(|| format!("Invalid matrix #{}", i))
            })
            .collect::<Result<Vec<_>>>()?;
        let reference = self
            .reference
            .as_ref()
            .map(GridDocument::to_grid::<D>)
            .transpose()
            .context("Invalid reference grid")?;

        let linear = match matrices.as_slice() {
            [] => bail!("Transform document holds no matrix"),
            [single] => {
                let affine = Affine::from_matrix(single).context("Invalid affine matrix")?;
                Linear::Affine(match reference {
                    Some(grid) => affine.with_reference(grid),
                    None => affine,
                })
            }
            many => {
                let mapping = LinearTransformsMapping::from_matrices(many)
                    .context("Invalid transform series")?;
                Linear::Mapping(match reference {
                    Some(grid) => mapping.with_reference(grid),
                    None => mapping,
                })
            }
        };
        Ok(linear)
    }
}

/// Save a linear transform as a JSON document.
pub fn save_transform<const D: usize, P: AsRef<Path>>(path: P, linear: &Linear<D>) -> Result<()> {
    let path = path.as_ref();
    let document = TransformDocument::from_linear(linear);
    let json = serde_json::to_string_pretty(&document).context("Failed to serialize transform")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    debug!(path = %path.display(), transforms = linear.len(), "saved transform");
    Ok(())
}

/// Load a linear transform: an [`Affine`] when the file holds one matrix,
/// a [`LinearTransformsMapping`] otherwise.
pub fn load<const D: usize, P: AsRef<Path>>(path: P) -> Result<Linear<D>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let document: TransformDocument = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse transform document {}", path.display()))?;
    let linear = document
        .to_linear::<D>()
        .with_context(|| format!("Failed to load transform from {}", path.display()))?;
    debug!(path = %path.display(), transforms = linear.len(), "loaded transform");
    Ok(linear)
}
