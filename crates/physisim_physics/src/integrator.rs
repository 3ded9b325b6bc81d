//! Semi-implicit Euler integration over per-tick scratch state

use crate::body::Body;
use physisim_math::{normalize_angle, Vec2};

/// Working copy of a body's mutable state for the duration of one tick
///
/// The caller's bodies are only written once the whole tick has succeeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SolverBody {
    pub position: Vec2,
    pub angle: f64,
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
    pub inv_mass: f64,
    pub inv_inertia: f64,
    /// Forces that stay constant over the tick (gravity, caller, scripts)
    pub force: Vec2,
    pub torque: f64,
    /// Forces recomputed every substep (springs)
    pub spring_force: Vec2,
    pub spring_torque: f64,
}

impl SolverBody {
    /// Fixed bodies enter the solver at rest whatever velocity they store
    pub fn from_body(body: &Body) -> Self {
        let (linear_velocity, angular_velocity) = if body.is_fixed {
            (Vec2::ZERO, 0.0)
        } else {
            (body.linear_velocity, body.angular_velocity)
        };
        Self {
            position: body.position,
            angle: body.angle,
            linear_velocity,
            angular_velocity,
            inv_mass: body.inv_mass(),
            inv_inertia: body.inv_inertia(),
            force: body.force,
            torque: body.torque,
            spring_force: Vec2::ZERO,
            spring_torque: 0.0,
        }
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0 && self.inv_inertia == 0.0
    }

    /// World-space offset of a body-local anchor from the body origin
    #[inline]
    pub fn arm(&self, local: Vec2) -> Vec2 {
        local.rotate(self.angle)
    }

    /// Velocity of the point at offset `r` from the origin
    #[inline]
    pub fn velocity_at(&self, r: Vec2) -> Vec2 {
        self.linear_velocity + Vec2::cross_scalar(self.angular_velocity, r)
    }

    /// Apply an impulse at offset `r` from the origin
    #[inline]
    pub fn apply_impulse(&mut self, impulse: Vec2, r: Vec2) {
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia * r.cross(impulse);
    }

    /// Name of the first non-finite quantity, if any
    pub fn non_finite_quantity(&self) -> Option<&'static str> {
        if !self.position.is_finite() {
            Some("position")
        } else if !self.angle.is_finite() {
            Some("orientation")
        } else if !self.linear_velocity.is_finite() {
            Some("linear velocity")
        } else if !self.angular_velocity.is_finite() {
            Some("angular velocity")
        } else {
            None
        }
    }

    pub fn commit(&self, body: &mut Body) {
        body.position = self.position;
        body.angle = self.angle;
        body.linear_velocity = self.linear_velocity;
        body.angular_velocity = self.angular_velocity;
    }
}

/// v += F/m dt, ω += τ/I dt
pub(crate) fn integrate_velocities(bodies: &mut [SolverBody], dt: f64) {
    for body in bodies.iter_mut().filter(|b| !b.is_static()) {
        let force = body.force + body.spring_force;
        let torque = body.torque + body.spring_torque;
        body.linear_velocity += force * (body.inv_mass * dt);
        body.angular_velocity += torque * body.inv_inertia * dt;
    }
}

/// x += v dt, θ += ω dt with θ wrapped into [-π, π)
pub(crate) fn integrate_positions(bodies: &mut [SolverBody], dt: f64) {
    for body in bodies.iter_mut().filter(|b| !b.is_static()) {
        body.position += body.linear_velocity * dt;
        body.angle = normalize_angle(body.angle + body.angular_velocity * dt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, BodyId};
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    fn scratch(fixed: bool) -> SolverBody {
        let shape = Shape::circle(1.0).unwrap();
        let desc = if fixed {
            BodyDesc::fixed(shape)
        } else {
            BodyDesc::dynamic(shape).with_mass(2.0)
        };
        SolverBody::from_body(&desc.build(BodyId(1)).unwrap())
    }

    #[test]
    fn test_semi_implicit_order() {
        let mut bodies = [scratch(false)];
        bodies[0].force = Vec2::new(0.0, -20.0);
        integrate_velocities(&mut bodies, 0.1);
        integrate_positions(&mut bodies, 0.1);
        // velocity first, then position with the new velocity
        assert_relative_eq!(bodies[0].linear_velocity.y, -1.0, epsilon = 1e-12);
        assert_relative_eq!(bodies[0].position.y, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_angle_wraps() {
        let mut bodies = [scratch(false)];
        bodies[0].angle = 3.1;
        bodies[0].angular_velocity = 1.0;
        integrate_positions(&mut bodies, 0.1);
        assert!(bodies[0].angle < 0.0);
        assert_relative_eq!(bodies[0].angle, 3.2 - 2.0 * core::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn test_fixed_body_never_moves() {
        let mut bodies = [scratch(true)];
        bodies[0].force = Vec2::new(100.0, 100.0);
        bodies[0].linear_velocity = Vec2::ZERO;
        integrate_velocities(&mut bodies, 0.1);
        integrate_positions(&mut bodies, 0.1);
        assert_eq!(bodies[0].position, Vec2::ZERO);
        assert_eq!(bodies[0].linear_velocity, Vec2::ZERO);
    }

    #[test]
    fn test_fixed_body_velocity_is_ignored() {
        let body = BodyDesc::fixed(Shape::circle(1.0).unwrap())
            .with_linear_velocity(10.0, 0.0)
            .with_angular_velocity(3.0)
            .build(BodyId(1))
            .unwrap();
        let state = SolverBody::from_body(&body);
        assert_eq!(state.linear_velocity, Vec2::ZERO);
        assert_eq!(state.velocity_at(Vec2::new(1.0, 1.0)), Vec2::ZERO);
    }

    #[test]
    fn test_non_finite_detection() {
        let mut body = scratch(false);
        assert_eq!(body.non_finite_quantity(), None);
        body.angular_velocity = f64::INFINITY;
        assert_eq!(body.non_finite_quantity(), Some("angular velocity"));
    }
}
