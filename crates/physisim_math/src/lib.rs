//! # physisim_math - 2D Math Primitives
//!
//! Double-precision vectors, rotations, rigid transforms, bounding boxes and
//! rays used by the PhysiSim rigid-body engine.

pub mod vector;
pub mod transform;
pub mod bounds;
pub mod ray;

pub use vector::*;
pub use transform::*;
pub use bounds::*;
pub use ray::*;

/// Common math constants
pub mod consts {
    pub const PI: f64 = core::f64::consts::PI;
    pub const TAU: f64 = PI * 2.0;
    pub const FRAC_PI_2: f64 = PI / 2.0;
    pub const DEG_TO_RAD: f64 = PI / 180.0;
    pub const RAD_TO_DEG: f64 = 180.0 / PI;
    /// Length below which vectors are treated as zero
    pub const EPSILON: f64 = 1e-9;
}

/// Convert degrees to radians
#[inline]
pub fn radians(degrees: f64) -> f64 {
    degrees * consts::DEG_TO_RAD
}

/// Convert radians to degrees
#[inline]
pub fn degrees(radians: f64) -> f64 {
    radians * consts::RAD_TO_DEG
}

/// Linear interpolation
#[inline]
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Wrap an angle into `[-π, π)`
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    (angle + consts::PI).rem_euclid(consts::TAU) - consts::PI
}

pub mod prelude {
    pub use crate::vector::Vec2;
    pub use crate::transform::{Rot2, Transform2};
    pub use crate::bounds::Aabb2;
    pub use crate::ray::Ray2;
    pub use crate::{degrees, lerp, normalize_angle, radians};
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_angle_range() {
        assert_relative_eq!(normalize_angle(0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(consts::PI), -consts::PI, epsilon = 1e-12);
        assert_relative_eq!(normalize_angle(3.0 * consts::PI + 0.25), -consts::PI + 0.25, epsilon = 1e-9);
        assert_relative_eq!(normalize_angle(-consts::TAU - 0.5), -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_degree_conversion() {
        assert_relative_eq!(radians(180.0), consts::PI, epsilon = 1e-12);
        assert_relative_eq!(degrees(consts::FRAC_PI_2), 90.0, epsilon = 1e-12);
    }
}
