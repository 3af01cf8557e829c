pub mod frame;
pub mod gradient;
pub mod pyramid;
pub mod sample;

pub use frame::Frame;
pub use pyramid::{build_pyramid, Pyramid, PyramidLevel, MIN_LEVEL_DIM};
pub use sample::{bilinear, FloatImage};
