//! Reading and writing NIfTI images and linear transform documents.

pub mod nifti_io;
pub mod transform_io;

pub use nifti_io::{read_nifti, write_nifti, write_nifti_series, NiftiImage};
pub use transform_io::{load, save_transform, GridDocument, Linear, TransformDocument, TransformKind};
