//! Transform types and operations.
//!
//! Every transform maps physical coordinates of a reference space into
//! the space of the moving image.

pub mod affine;
pub mod chain;
pub mod displacement;
pub mod mapping;
pub mod trait_;

pub use affine::Affine;
pub use chain::TransformChain;
pub use displacement::DisplacementFieldTransform;
pub use mapping::LinearTransformsMapping;
pub use trait_::Transform;
