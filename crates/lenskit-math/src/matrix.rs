use std::fmt;
use std::ops::{Add, Index, Mul, Sub};

use glam::Vec2;

/// Row-major 2x2 matrix.
///
/// Values are immutable once built: every arithmetic operator returns a new
/// matrix and leaves its operands untouched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix2x2 {
    rows: [[f32; 2]; 2],
}

impl Matrix2x2 {
    /// The identity transform.
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0);

    /// Build a matrix from its entries in row-major order.
    pub const fn new(m00: f32, m01: f32, m10: f32, m11: f32) -> Self {
        Self {
            rows: [[m00, m01], [m10, m11]],
        }
    }

    /// Plain counter-clockwise rotation by `degree` degrees:
    /// `[[cos, -sin], [sin, cos]]`.
    pub fn from_rotation(degree: f32) -> Self {
        let (sin, cos) = degree.to_radians().sin_cos();
        Self::new(cos, -sin, sin, cos)
    }

    /// Rotation by `degree` degrees, passed through a
    /// `[-1, 1] -> [0, 1] -> [-1, 1]` remap.
    ///
    /// The remap is algebraically the identity but not bit-exact for every
    /// angle. Streak buffer sizes depend on its exact rounding, so the four
    /// steps must stay in this order.
    pub fn rotation(degree: f32) -> Self {
        let remapped = Self::from_rotation(degree) * 0.5 + 0.5;
        remapped * 2.0 - 1.0
    }

    /// Entry at `(row, col)`. Panics when either index is above 1.
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.rows[row][col]
    }

    /// Entries in row-major order.
    pub fn to_array(&self) -> [f32; 4] {
        [self.rows[0][0], self.rows[0][1], self.rows[1][0], self.rows[1][1]]
    }

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        let [m00, m01, m10, m11] = self.to_array();
        Self::new(f(m00), f(m01), f(m10), f(m11))
    }
}

impl Default for Matrix2x2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Index<(usize, usize)> for Matrix2x2 {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        &self.rows[row][col]
    }
}

impl Mul<f32> for Matrix2x2 {
    type Output = Matrix2x2;

    fn mul(self, scalar: f32) -> Matrix2x2 {
        self.map(|v| v * scalar)
    }
}

impl Add<f32> for Matrix2x2 {
    type Output = Matrix2x2;

    fn add(self, scalar: f32) -> Matrix2x2 {
        self.map(|v| v + scalar)
    }
}

impl Sub<f32> for Matrix2x2 {
    type Output = Matrix2x2;

    fn sub(self, scalar: f32) -> Matrix2x2 {
        self + (-scalar)
    }
}

impl Mul<Vec2> for Matrix2x2 {
    type Output = Vec2;

    fn mul(self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.rows[0][0] * v.x + self.rows[0][1] * v.y,
            self.rows[1][0] * v.x + self.rows[1][1] * v.y,
        )
    }
}

impl fmt::Display for Matrix2x2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[[{}, {}], [{}, {}]]",
            self.rows[0][0], self.rows[0][1], self.rows[1][0], self.rows[1][1]
        )
    }
}
