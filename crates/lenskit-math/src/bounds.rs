use glam::Vec2;

/// Axis-aligned bounding box in 2D.
///
/// [`Bounds2::EMPTY`] is inverted (`min = +MAX`, `max = -MAX`) so that the
/// first included point defines the box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds2 {
    /// A box containing nothing.
    pub const EMPTY: Self = Self {
        min: Vec2::splat(f32::MAX),
        max: Vec2::splat(f32::MIN),
    };

    /// Smallest box enclosing every point. Returns [`Bounds2::EMPTY`] for no points.
    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        points
            .into_iter()
            .fold(Self::EMPTY, |bounds, p| bounds.including(p))
    }

    /// Grow the box to contain `p`.
    pub fn including(self, p: Vec2) -> Self {
        Self {
            min: Vec2::new(self.min.x.min(p.x), self.min.y.min(p.y)),
            max: Vec2::new(self.max.x.max(p.x), self.max.y.max(p.y)),
        }
    }

    /// True until at least one point has been included.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    /// Extent along each axis.
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }
}
