//! 2D ray for picking and ray casts

use crate::vector::Vec2;

/// 2D ray with a unit direction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray2 {
    /// Ray origin point
    pub origin: Vec2,
    /// Ray direction (normalized)
    pub direction: Vec2,
}

impl Ray2 {
    /// Create a new ray, normalizing the direction
    ///
    /// Returns `None` when the direction has near-zero length.
    #[inline]
    pub fn new(origin: Vec2, direction: Vec2) -> Option<Self> {
        direction
            .try_normalize()
            .map(|direction| Self { origin, direction })
    }

    /// Create a ray from two points
    #[inline]
    pub fn from_points(start: Vec2, end: Vec2) -> Option<Self> {
        Self::new(start, end - start)
    }

    /// Point at distance `t` along the ray
    #[inline]
    pub fn at(&self, t: f64) -> Vec2 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the first intersection with a circle
    ///
    /// A ray starting inside the circle reports `0.0`.
    pub fn intersect_circle(&self, center: Vec2, radius: f64) -> Option<f64> {
        let m = self.origin - center;
        let c = m.length_squared() - radius * radius;
        if c <= 0.0 {
            return Some(0.0);
        }
        let b = m.dot(self.direction);
        if b > 0.0 {
            return None;
        }
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        Some((-b - discriminant.sqrt()).max(0.0))
    }

    /// Distance along the ray to a segment `a..b`, if they cross
    pub fn intersect_segment(&self, a: Vec2, b: Vec2) -> Option<f64> {
        let edge = b - a;
        let denom = self.direction.cross(edge);
        if denom.abs() < crate::consts::EPSILON {
            return None;
        }
        let offset = a - self.origin;
        let t = offset.cross(edge) / denom;
        let u = offset.cross(self.direction) / denom;
        if t >= 0.0 && (0.0..=1.0).contains(&u) {
            Some(t)
        } else {
            None
        }
    }
}
