//! Axis-aligned collision boxes on the integer pixel grid.
//!
//! Overlap between two entities is approximated by sampling four reference
//! points of one box against the other (see [`CollisionBox::sample_points`]).
//! This is not a full rectangle intersection: thin or fast boxes can pass
//! through each other between frames.

use crate::math::{IVec2, Vec2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionBox {
    top_left: IVec2,
    dimensions: IVec2,
    bottom_right: IVec2,
}

impl CollisionBox {
    pub fn new(top_left: IVec2, dimensions: IVec2) -> Self {
        Self {
            top_left,
            dimensions,
            bottom_right: top_left + dimensions,
        }
    }

    pub fn top_left(&self) -> IVec2 {
        self.top_left
    }

    pub fn dimensions(&self) -> IVec2 {
        self.dimensions
    }

    pub fn bottom_right(&self) -> IVec2 {
        self.bottom_right
    }

    /// Inclusive containment on all four edges.
    pub fn inside(&self, point: Vec2) -> bool {
        let tl = self.top_left.as_vec2();
        let br = self.bottom_right.as_vec2();
        point.x >= tl.x && point.x <= br.x && point.y >= tl.y && point.y <= br.y
    }

    pub fn update(&mut self, top_left: IVec2) {
        self.top_left = top_left;
        self.bottom_right = top_left + self.dimensions;
    }

    /// The four points tested against other boxes.
    ///
    /// `position` is the owner's exact (unsnapped) position; the remaining
    /// three are the bottom-right corner and the two mixed corners
    /// `(left, bottom)` and `(right, top)`.
    pub fn sample_points(&self, position: Vec2) -> [Vec2; 4] {
        [
            position,
            self.bottom_right.as_vec2(),
            IVec2::new(self.top_left.x, self.bottom_right.y).as_vec2(),
            IVec2::new(self.bottom_right.x, self.top_left.y).as_vec2(),
        ]
    }

    /// Number of this box's sample points that land inside `other`.
    ///
    /// Each hit is reported to the collision hook separately.
    pub fn sample_hits(&self, position: Vec2, other: &CollisionBox) -> usize {
        self.sample_points(position)
            .into_iter()
            .filter(|p| other.inside(*p))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> CollisionBox {
        CollisionBox::new(IVec2::ZERO, IVec2::new(10, 10))
    }

    #[test]
    fn inside_is_inclusive_on_edges() {
        let b = unit_box();
        assert!(b.inside(Vec2::new(0.0, 0.0)));
        assert!(b.inside(Vec2::new(10.0, 10.0)));
        assert!(b.inside(Vec2::new(10.0, 0.0)));
        assert!(!b.inside(Vec2::new(11.0, 5.0)));
        assert!(!b.inside(Vec2::new(5.0, -0.5)));
    }

    #[test]
    fn update_recomputes_bottom_right() {
        let mut b = unit_box();
        b.update(IVec2::new(5, 7));
        assert_eq!(b.bottom_right(), IVec2::new(15, 17));
        assert!(!b.inside(Vec2::new(4.0, 8.0)));
    }

    #[test]
    fn sampling_detects_corner_overlap() {
        let a = CollisionBox::new(IVec2::new(5, 5), IVec2::new(10, 10));
        let b = unit_box();
        // Only a's top-left corner (its position) lands in b.
        assert_eq!(a.sample_hits(Vec2::new(5.0, 5.0), &b), 1);
    }

    #[test]
    fn sampling_misses_a_box_fully_inside() {
        // A small box sitting in the middle of a big one overlaps it, but the
        // big box's corners never land inside the small one.
        let big = CollisionBox::new(IVec2::ZERO, IVec2::new(100, 100));
        let small = CollisionBox::new(IVec2::new(40, 40), IVec2::new(5, 5));
        assert_eq!(big.sample_hits(Vec2::ZERO, &small), 0);
        assert_eq!(small.sample_hits(Vec2::new(40.0, 40.0), &big), 4);
    }
}
