//! Math types.
//!
//! This module intentionally stays small. Positions and velocities are
//! floating point; collision boxes live on the integer pixel grid.

use serde::{Deserialize, Serialize};

/// 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Truncates both components toward zero onto the integer grid.
    pub fn trunc(self) -> IVec2 {
        IVec2::new(self.x as i32, self.y as i32)
    }

    /// Clamps each component into `[min, max]`.
    pub fn clamp(self, min: Self, max: Self) -> Self {
        Self::new(
            clamp(self.x, min.x, max.x),
            clamp(self.y, min.y, max.y),
        )
    }
}

/// 2D integer vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct IVec2 {
    pub x: i32,
    pub y: i32,
}

impl IVec2 {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn as_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

/// Saturates at the `i32` range on both axes.
impl std::ops::Add for IVec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

/// `max(least, min(n, most))`.
///
/// Unlike `f32::clamp` this never panics when `least > most`.
#[inline]
pub fn clamp(n: f32, least: f32, most: f32) -> f32 {
    least.max(n.min(most))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunc_rounds_toward_zero() {
        assert_eq!(Vec2::new(-2.9, 3.9).trunc(), IVec2::new(-2, 3));
    }

    #[test]
    fn ivec_add_saturates() {
        let far = Vec2::new(u32::MAX as f32, -5.0e9).trunc();
        assert_eq!(far, IVec2::new(i32::MAX, i32::MIN));
        assert_eq!(far + IVec2::new(32, -32), IVec2::new(i32::MAX, i32::MIN));
        assert_eq!(IVec2::new(1, 2) + IVec2::new(3, 4), IVec2::new(4, 6));
    }

    #[test]
    fn clamp_keeps_value_in_range() {
        assert_eq!(clamp(7.0, 0.0, 5.0), 5.0);
        assert_eq!(clamp(-1.0, 0.0, 5.0), 0.0);
        assert_eq!(clamp(2.5, 0.0, 5.0), 2.5);
    }
}
