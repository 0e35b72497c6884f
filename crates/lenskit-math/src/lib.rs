//! 2x2 matrices and 2D bounds used to size rotated streak buffers.

mod bounds;
mod matrix;

pub use bounds::Bounds2;
pub use matrix::Matrix2x2;
