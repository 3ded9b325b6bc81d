//! Contact resolution: restitution, Coulomb friction and position correction
//!
//! Two-point manifolds solve their normal impulses as one 2x2 block so a
//! box resting on a face gets the same impulse at both corners.

use crate::body::BodyId;
use crate::integrator::SolverBody;
use crate::manifold::ContactManifold;
use crate::material::ContactMaterial;
use crate::solver::VelocityConstraint;
use crate::warm_start::{CachedManifold, CachedPoint};
use physisim_math::Vec2;

/// Velocity thresholds that shape the contact response
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ContactSettings {
    /// Closing speed below which contacts do not bounce
    pub restitution_threshold: f64,
    /// Tangential speed below which static friction applies
    pub static_friction_threshold: f64,
}

#[derive(Debug, Clone, Copy)]
struct PointConstraint {
    r_a: Vec2,
    r_b: Vec2,
    normal_mass: f64,
    tangent_mass: f64,
    /// Target separating speed from restitution
    velocity_bias: f64,
    normal_impulse: f64,
    tangent_impulse: f64,
}

/// Coupled effective mass of a two-point manifold along the normal
#[derive(Debug, Clone, Copy)]
struct NormalBlock {
    k11: f64,
    k12: f64,
    k22: f64,
    det: f64,
}

/// Largest condition number at which the two points are solved together
const MAX_CONDITION: f64 = 1000.0;

impl NormalBlock {
    fn new(a: &SolverBody, b: &SolverBody, p1: &PointConstraint, p2: &PointConstraint, normal: Vec2) -> Option<Self> {
        let (rn1_a, rn1_b) = (p1.r_a.cross(normal), p1.r_b.cross(normal));
        let (rn2_a, rn2_b) = (p2.r_a.cross(normal), p2.r_b.cross(normal));
        let m = a.inv_mass + b.inv_mass;

        let k11 = m + a.inv_inertia * rn1_a * rn1_a + b.inv_inertia * rn1_b * rn1_b;
        let k22 = m + a.inv_inertia * rn2_a * rn2_a + b.inv_inertia * rn2_b * rn2_b;
        let k12 = m + a.inv_inertia * rn1_a * rn2_a + b.inv_inertia * rn1_b * rn2_b;
        let det = k11 * k22 - k12 * k12;

        (det > 0.0 && k11 * k11 < MAX_CONDITION * det).then_some(Self { k11, k12, k22, det })
    }

    /// Total impulses solving the two-contact complementarity problem
    ///
    /// `rhs` is the normal velocity error with the current totals removed:
    /// vn = K x + rhs, x >= 0, vn >= 0, x_i vn_i = 0.
    fn solve(&self, rhs: Vec2) -> Option<Vec2> {
        // Both points active
        let both = Vec2::new(
            -(self.k22 * rhs.x - self.k12 * rhs.y) / self.det,
            -(self.k11 * rhs.y - self.k12 * rhs.x) / self.det,
        );
        if both.x >= 0.0 && both.y >= 0.0 {
            return Some(both);
        }
        // Only the first
        let x1 = -rhs.x / self.k11;
        if x1 >= 0.0 && self.k12 * x1 + rhs.y >= 0.0 {
            return Some(Vec2::new(x1, 0.0));
        }
        // Only the second
        let x2 = -rhs.y / self.k22;
        if x2 >= 0.0 && self.k12 * x2 + rhs.x >= 0.0 {
            return Some(Vec2::new(0.0, x2));
        }
        // Neither
        (rhs.x >= 0.0 && rhs.y >= 0.0).then_some(Vec2::ZERO)
    }
}

/// Velocity constraint for one manifold
#[derive(Debug, Clone)]
pub(crate) struct ContactConstraint {
    /// Index of the manifold this constraint was built from
    pub manifold: usize,
    a: usize,
    b: usize,
    normal: Vec2,
    tangent: Vec2,
    friction: f64,
    points: Vec<PointConstraint>,
    block: Option<NormalBlock>,
}

fn effective_mass(a: &SolverBody, b: &SolverBody, r_a: Vec2, r_b: Vec2, axis: Vec2) -> f64 {
    let rn_a = r_a.cross(axis);
    let rn_b = r_b.cross(axis);
    let k = a.inv_mass + b.inv_mass + a.inv_inertia * rn_a * rn_a + b.inv_inertia * rn_b * rn_b;
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

impl ContactConstraint {
    /// Prepare a manifold for solving against the current velocities
    ///
    /// `warm` carries the pair's impulses from the previous solve and the
    /// step ratio to scale them by.
    pub fn new(
        manifold_index: usize,
        manifold: &ContactManifold,
        (a, b): (usize, usize),
        bodies: &[SolverBody],
        material: &ContactMaterial,
        settings: &ContactSettings,
        warm: Option<(&CachedManifold, f64)>,
    ) -> Self {
        let body_a = &bodies[a];
        let body_b = &bodies[b];
        let normal = manifold.normal;
        let tangent = normal.perpendicular();

        let mut sliding_speed: f64 = 0.0;
        let points: Vec<PointConstraint> = manifold
            .points
            .iter()
            .map(|point| {
                let r_a = point.position - body_a.position;
                let r_b = point.position - body_b.position;
                let dv = body_b.velocity_at(r_b) - body_a.velocity_at(r_a);
                let vn = dv.dot(normal);
                sliding_speed = sliding_speed.max(dv.dot(tangent).abs());

                let velocity_bias = if vn < -settings.restitution_threshold {
                    -material.restitution * vn
                } else {
                    0.0
                };

                let (normal_impulse, tangent_impulse) = warm
                    .and_then(|(cached, ratio)| {
                        let (n, t) = cached.find(r_a.rotate(-body_a.angle), r_b.rotate(-body_b.angle))?;
                        Some((n * ratio, t * ratio))
                    })
                    .unwrap_or((0.0, 0.0));

                PointConstraint {
                    r_a,
                    r_b,
                    normal_mass: effective_mass(body_a, body_b, r_a, r_b, normal),
                    tangent_mass: effective_mass(body_a, body_b, r_a, r_b, tangent),
                    velocity_bias,
                    normal_impulse,
                    tangent_impulse,
                }
            })
            .collect();

        let friction = if sliding_speed < settings.static_friction_threshold {
            material.static_friction
        } else {
            material.dynamic_friction
        };

        let block = match points.as_slice() {
            [p1, p2] => NormalBlock::new(body_a, body_b, p1, p2, normal),
            _ => None,
        };

        Self {
            manifold: manifold_index,
            a,
            b,
            normal,
            tangent,
            friction,
            points,
            block,
        }
    }

    /// Write the accumulated impulses back into the manifold
    pub fn store_impulses(&self, manifold: &mut ContactManifold) {
        for (point, solved) in manifold.points.iter_mut().zip(&self.points) {
            point.normal_impulse += solved.normal_impulse;
            point.tangent_impulse += solved.tangent_impulse;
        }
    }

    /// Accumulated impulses in the bodies' local frames, for the next solve
    pub fn cached(&self, body_a: BodyId, bodies: &[SolverBody]) -> CachedManifold {
        let (angle_a, angle_b) = (bodies[self.a].angle, bodies[self.b].angle);
        CachedManifold {
            body_a,
            normal: self.normal,
            points: self
                .points
                .iter()
                .map(|p| CachedPoint {
                    local_a: p.r_a.rotate(-angle_a),
                    local_b: p.r_b.rotate(-angle_b),
                    normal_impulse: p.normal_impulse,
                    tangent_impulse: p.tangent_impulse,
                })
                .collect(),
        }
    }
}

/// Move the two points' normal impulses to `total`, returning the largest change
fn apply_normal_pair(
    points: &mut [PointConstraint],
    normal: Vec2,
    total: Vec2,
    a: &mut SolverBody,
    b: &mut SolverBody,
) -> f64 {
    let delta = Vec2::new(total.x - points[0].normal_impulse, total.y - points[1].normal_impulse);
    for (point, d) in points.iter_mut().zip([delta.x, delta.y]) {
        let impulse = normal * d;
        a.apply_impulse(-impulse, point.r_a);
        b.apply_impulse(impulse, point.r_b);
    }
    points[0].normal_impulse = total.x;
    points[1].normal_impulse = total.y;
    delta.x.abs().max(delta.y.abs())
}

impl VelocityConstraint for ContactConstraint {
    fn warm_start(&mut self, bodies: &mut [SolverBody]) {
        let mut a = bodies[self.a];
        let mut b = bodies[self.b];
        for point in &self.points {
            let impulse = self.normal * point.normal_impulse + self.tangent * point.tangent_impulse;
            a.apply_impulse(-impulse, point.r_a);
            b.apply_impulse(impulse, point.r_b);
        }
        bodies[self.a] = a;
        bodies[self.b] = b;
    }

    fn solve_velocity(&mut self, bodies: &mut [SolverBody]) -> f64 {
        let mut a = bodies[self.a];
        let mut b = bodies[self.b];
        let mut max_delta: f64 = 0.0;

        // Friction first, bounded by the current normal impulses
        for point in &mut self.points {
            let dv = b.velocity_at(point.r_b) - a.velocity_at(point.r_a);
            let vt = dv.dot(self.tangent);
            let max_friction = self.friction * point.normal_impulse;
            let old = point.tangent_impulse;
            point.tangent_impulse = (old - point.tangent_mass * vt).clamp(-max_friction, max_friction);
            let delta = point.tangent_impulse - old;
            let impulse = self.tangent * delta;
            a.apply_impulse(-impulse, point.r_a);
            b.apply_impulse(impulse, point.r_b);
            max_delta = max_delta.max(delta.abs());
        }

        let pair = match self.points.as_slice() {
            [p1, p2] => Some((*p1, *p2)),
            _ => None,
        };
        if let (Some(block), Some((p1, p2))) = (self.block, pair) {
            let vn1 = (b.velocity_at(p1.r_b) - a.velocity_at(p1.r_a)).dot(self.normal);
            let vn2 = (b.velocity_at(p2.r_b) - a.velocity_at(p2.r_a)).dot(self.normal);
            let (x1, x2) = (p1.normal_impulse, p2.normal_impulse);
            let rhs = Vec2::new(
                vn1 - p1.velocity_bias - (block.k11 * x1 + block.k12 * x2),
                vn2 - p2.velocity_bias - (block.k12 * x1 + block.k22 * x2),
            );
            if let Some(total) = block.solve(rhs) {
                let delta = apply_normal_pair(&mut self.points, self.normal, total, &mut a, &mut b);
                max_delta = max_delta.max(delta);
            }
        } else {
            // Normal impulse never pulls
            for point in &mut self.points {
                let dv = b.velocity_at(point.r_b) - a.velocity_at(point.r_a);
                let vn = dv.dot(self.normal);
                let old = point.normal_impulse;
                point.normal_impulse = (old - point.normal_mass * (vn - point.velocity_bias)).max(0.0);
                let delta = point.normal_impulse - old;
                let impulse = self.normal * delta;
                a.apply_impulse(-impulse, point.r_a);
                b.apply_impulse(impulse, point.r_b);
                max_delta = max_delta.max(delta.abs());
            }
        }

        bodies[self.a] = a;
        bodies[self.b] = b;
        max_delta
    }
}

/// Push overlapping bodies apart by a fraction of the penetration beyond `slop`
///
/// The correction is split by inverse mass so fixed bodies never move.
pub(crate) fn correct_positions(
    manifolds: &[ContactManifold],
    pairs: &[(usize, usize)],
    bodies: &mut [SolverBody],
    fraction: f64,
    slop: f64,
) {
    for (manifold, &(a, b)) in manifolds.iter().zip(pairs) {
        if manifold.is_sensor {
            continue;
        }
        let inv_sum = bodies[a].inv_mass + bodies[b].inv_mass;
        if inv_sum <= 0.0 {
            continue;
        }
        let depth = (manifold.penetration - slop).max(0.0);
        if depth == 0.0 {
            continue;
        }
        let correction = manifold.normal * (fraction * depth / inv_sum);
        let inv_a = bodies[a].inv_mass;
        let inv_b = bodies[b].inv_mass;
        bodies[a].position -= correction * inv_a;
        bodies[b].position += correction * inv_b;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, BodyId};
    use crate::manifold::ContactPoint;
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    const SETTINGS: ContactSettings = ContactSettings {
        restitution_threshold: 0.5,
        static_friction_threshold: 0.01,
    };

    fn ground_and_ball(velocity: Vec2) -> Vec<SolverBody> {
        let ground = BodyDesc::fixed(Shape::rectangle(10.0, 1.0).unwrap())
            .build(BodyId(1))
            .unwrap();
        let ball = BodyDesc::dynamic(Shape::circle(0.5).unwrap())
            .with_mass(1.0)
            .with_position(0.0, 0.95)
            .with_linear_velocity(velocity.x, velocity.y)
            .build(BodyId(2))
            .unwrap();
        vec![SolverBody::from_body(&ground), SolverBody::from_body(&ball)]
    }

    fn manifold() -> ContactManifold {
        ContactManifold {
            body_a: BodyId(1),
            body_b: BodyId(2),
            normal: Vec2::Y,
            penetration: 0.05,
            points: vec![ContactPoint::new(Vec2::new(0.0, 0.45), 0.05)],
            is_sensor: false,
        }
    }

    fn material(restitution: f64, friction: f64) -> ContactMaterial {
        ContactMaterial {
            restitution,
            static_friction: friction,
            dynamic_friction: friction,
        }
    }

    fn solve(bodies: &mut [SolverBody], constraint: &mut ContactConstraint) {
        for _ in 0..10 {
            constraint.solve_velocity(bodies);
        }
    }

    #[test]
    fn test_inelastic_contact_stops_approach() {
        let mut bodies = ground_and_ball(Vec2::new(0.0, -3.0));
        let mut c = ContactConstraint::new(0, &manifold(), (0, 1), &bodies, &material(0.0, 0.0), &SETTINGS, None);
        solve(&mut bodies, &mut c);
        assert_relative_eq!(bodies[1].linear_velocity.y, 0.0, epsilon = 1e-9);
        assert_eq!(bodies[0].linear_velocity, Vec2::ZERO);
    }

    #[test]
    fn test_restitution_reverses_velocity() {
        let mut bodies = ground_and_ball(Vec2::new(0.0, -4.0));
        let mut c = ContactConstraint::new(0, &manifold(), (0, 1), &bodies, &material(0.5, 0.0), &SETTINGS, None);
        solve(&mut bodies, &mut c);
        assert_relative_eq!(bodies[1].linear_velocity.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_slow_contacts_do_not_bounce() {
        let mut bodies = ground_and_ball(Vec2::new(0.0, -0.2));
        let mut c = ContactConstraint::new(0, &manifold(), (0, 1), &bodies, &material(1.0, 0.0), &SETTINGS, None);
        solve(&mut bodies, &mut c);
        assert_relative_eq!(bodies[1].linear_velocity.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_friction_is_bounded_by_normal_impulse() {
        let mut bodies = ground_and_ball(Vec2::new(5.0, -1.0));
        let mut c = ContactConstraint::new(0, &manifold(), (0, 1), &bodies, &material(0.0, 0.2), &SETTINGS, None);
        solve(&mut bodies, &mut c);
        let point = c.points[0];
        assert!(point.tangent_impulse.abs() <= 0.2 * point.normal_impulse + 1e-12);
        assert!(bodies[1].linear_velocity.x < 5.0);
        assert!(bodies[1].linear_velocity.x > 0.0);
    }

    #[test]
    fn test_separating_contact_gets_no_impulse() {
        let mut bodies = ground_and_ball(Vec2::new(0.0, 2.0));
        let mut c = ContactConstraint::new(0, &manifold(), (0, 1), &bodies, &material(0.5, 0.5), &SETTINGS, None);
        solve(&mut bodies, &mut c);
        assert_eq!(c.points[0].normal_impulse, 0.0);
        assert_relative_eq!(bodies[1].linear_velocity.y, 2.0, epsilon = 1e-12);
    }

    fn ground_and_box(velocity: Vec2) -> Vec<SolverBody> {
        let ground = BodyDesc::fixed(Shape::rectangle(10.0, 1.0).unwrap())
            .build(BodyId(1))
            .unwrap();
        let block = BodyDesc::dynamic(Shape::rectangle(1.0, 1.0).unwrap())
            .with_mass(1.0)
            .with_position(0.0, 0.99)
            .with_linear_velocity(velocity.x, velocity.y)
            .build(BodyId(2))
            .unwrap();
        vec![SolverBody::from_body(&ground), SolverBody::from_body(&block)]
    }

    fn face_manifold() -> ContactManifold {
        ContactManifold {
            body_a: BodyId(1),
            body_b: BodyId(2),
            normal: Vec2::Y,
            penetration: 0.01,
            points: vec![
                ContactPoint::new(Vec2::new(-0.5, 0.49), 0.01),
                ContactPoint::new(Vec2::new(0.5, 0.49), 0.01),
            ],
            is_sensor: false,
        }
    }

    #[test]
    fn test_face_contact_is_symmetric_after_one_pass() {
        let mut bodies = ground_and_box(Vec2::new(0.0, -1.0));
        let mut c = ContactConstraint::new(0, &face_manifold(), (0, 1), &bodies, &material(0.0, 0.5), &SETTINGS, None);
        assert!(c.block.is_some());
        c.solve_velocity(&mut bodies);
        assert_relative_eq!(c.points[0].normal_impulse, 0.5, epsilon = 1e-12);
        assert_relative_eq!(c.points[1].normal_impulse, 0.5, epsilon = 1e-12);
        assert_relative_eq!(bodies[1].linear_velocity.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(bodies[1].angular_velocity, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_block_releases_separating_point() {
        // Spinning counter-clockwise: the left corner approaches, the right one leaves
        let mut bodies = ground_and_box(Vec2::ZERO);
        bodies[1].angular_velocity = 2.0;
        let mut c = ContactConstraint::new(0, &face_manifold(), (0, 1), &bodies, &material(0.0, 0.0), &SETTINGS, None);
        c.solve_velocity(&mut bodies);
        assert!(c.points[0].normal_impulse > 0.0);
        assert_eq!(c.points[1].normal_impulse, 0.0);
        let left = bodies[1].velocity_at(c.points[0].r_b).y;
        assert_relative_eq!(left, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_warm_start_applies_cached_impulses() {
        let mut bodies = ground_and_box(Vec2::new(0.0, -1.0));
        let cold = ContactConstraint::new(0, &face_manifold(), (0, 1), &bodies, &material(0.0, 0.5), &SETTINGS, None);
        let mut cached = cold.cached(BodyId(1), &bodies);
        for point in &mut cached.points {
            point.normal_impulse = 0.25;
        }

        // Cached over a step half as long
        let mut c = ContactConstraint::new(
            0,
            &face_manifold(),
            (0, 1),
            &bodies,
            &material(0.0, 0.5),
            &SETTINGS,
            Some((&cached, 2.0)),
        );
        c.warm_start(&mut bodies);
        assert_relative_eq!(bodies[1].linear_velocity.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.solve_velocity(&mut bodies), 0.0, epsilon = 1e-12);
        assert_relative_eq!(c.points[1].normal_impulse, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_position_correction_moves_only_dynamic_body() {
        let mut bodies = ground_and_ball(Vec2::ZERO);
        let mut deep = manifold();
        deep.penetration = 0.105;
        correct_positions(&[deep], &[(0, 1)], &mut bodies, 0.2, 0.005);
        assert_eq!(bodies[0].position, Vec2::ZERO);
        assert_relative_eq!(bodies[1].position.y, 0.95 + 0.02, epsilon = 1e-12);
    }
}
