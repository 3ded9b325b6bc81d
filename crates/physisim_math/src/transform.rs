//! Rotation and rigid transform for 2D shape geometry

use crate::vector::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 2D rotation stored as cosine/sine of the angle
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Rot2 {
    pub cos: f64,
    pub sin: f64,
}

impl Rot2 {
    pub const IDENTITY: Self = Self { cos: 1.0, sin: 0.0 };

    /// Create from an angle in radians (counter-clockwise)
    #[inline]
    pub fn from_angle(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self { cos, sin }
    }

    /// Angle in radians, in `(-π, π]`
    #[inline]
    pub fn angle(&self) -> f64 {
        self.sin.atan2(self.cos)
    }

    /// Rotate a vector
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x - self.sin * v.y, self.sin * v.x + self.cos * v.y)
    }

    /// Rotate a vector by the inverse rotation
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.cos * v.x + self.sin * v.y, -self.sin * v.x + self.cos * v.y)
    }

    #[inline]
    pub fn inverse(&self) -> Self {
        Self { cos: self.cos, sin: -self.sin }
    }
}

impl Default for Rot2 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Rigid transform: rotation followed by translation
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Transform2 {
    pub position: Vec2,
    pub rotation: Rot2,
}

impl Transform2 {
    /// Identity transform
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: Rot2::IDENTITY,
    };

    /// Create a new transform
    #[inline]
    pub const fn new(position: Vec2, rotation: Rot2) -> Self {
        Self { position, rotation }
    }

    /// Create from position and angle in radians
    #[inline]
    pub fn from_position_angle(position: Vec2, angle: f64) -> Self {
        Self::new(position, Rot2::from_angle(angle))
    }

    /// Create from position only
    #[inline]
    pub fn from_position(position: Vec2) -> Self {
        Self::new(position, Rot2::IDENTITY)
    }

    /// Local point to world space
    #[inline]
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.position + self.rotation.apply(point)
    }

    /// Local direction to world space (ignores position)
    #[inline]
    pub fn transform_direction(&self, direction: Vec2) -> Vec2 {
        self.rotation.apply(direction)
    }

    /// World point to local space
    #[inline]
    pub fn inverse_transform_point(&self, point: Vec2) -> Vec2 {
        self.rotation.apply_inverse(point - self.position)
    }

    /// World direction to local space
    #[inline]
    pub fn inverse_transform_direction(&self, direction: Vec2) -> Vec2 {
        self.rotation.apply_inverse(direction)
    }

    /// Compute the inverse transform
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            position: rotation.apply(-self.position),
            rotation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f64::consts::FRAC_PI_2;

    #[test]
    fn test_transform_point_round_trip() {
        let t = Transform2::from_position_angle(Vec2::new(3.0, -1.0), 0.7);
        let p = Vec2::new(0.25, 2.0);
        let back = t.inverse_transform_point(t.transform_point(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_quarter_turn_about_offset() {
        let t = Transform2::from_position_angle(Vec2::new(1.0, 1.0), FRAC_PI_2);
        let p = t.transform_point(Vec2::X);
        assert_relative_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_inverse_composes_to_identity() {
        let t = Transform2::from_position_angle(Vec2::new(-2.0, 5.0), -1.3);
        let inv = t.inverse();
        let p = Vec2::new(4.0, 4.0);
        let q = inv.transform_point(t.transform_point(p));
        assert_relative_eq!(q.x, p.x, epsilon = 1e-12);
        assert_relative_eq!(q.y, p.y, epsilon = 1e-12);
    }

    #[test]
    fn test_rot2_angle() {
        assert_relative_eq!(Rot2::from_angle(2.5).angle(), 2.5, epsilon = 1e-12);
    }
}
