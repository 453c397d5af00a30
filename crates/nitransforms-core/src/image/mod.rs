//! Images, image series and the voxel grids that place them in space.

pub mod dtype;
pub mod grid;
pub mod image;

pub use dtype::DataType;
pub use grid::ImageGrid;
pub use image::{Image, ImageSeries};
