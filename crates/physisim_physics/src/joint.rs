//! Rod, rope and revolute constraints

use crate::connector::{Connector, ConnectorKind};
use crate::integrator::SolverBody;
use crate::solver::VelocityConstraint;
use crate::warm_start::JointImpulse;
use physisim_math::{consts::EPSILON, Vec2};

#[derive(Debug, Clone, Copy)]
enum JointKind {
    /// Anchor distance along `axis`; `pull_only` for ropes
    Distance {
        axis: Vec2,
        mass: f64,
        bias: f64,
        pull_only: bool,
        impulse: f64,
    },
    /// Anchor coincidence, solved as a 2x2 block
    Point {
        /// Inverse of the effective mass matrix, row major
        inv_k: [f64; 4],
        bias: Vec2,
        impulse: Vec2,
    },
}

/// Prepared velocity constraint for one connector
#[derive(Debug, Clone)]
pub(crate) struct JointConstraint {
    /// Index of the connector this constraint was built from
    pub connector: usize,
    a: usize,
    b: usize,
    r_a: Vec2,
    r_b: Vec2,
    /// Position error at preparation time (distance error or gap length)
    pub error: f64,
    kind: JointKind,
}

impl JointConstraint {
    /// Build the constraint for a connector; springs and static pairs yield `None`
    ///
    /// `baumgarte` is the fraction of the position error fed back per step.
    /// `warm` is the impulse carried over from the previous solve, already
    /// scaled to this step; a slack rope starts from zero regardless.
    pub fn new(
        connector_index: usize,
        connector: &Connector,
        (a, b): (usize, usize),
        bodies: &[SolverBody],
        baumgarte: f64,
        dt: f64,
        warm: Option<JointImpulse>,
    ) -> Option<Self> {
        let body_a = &bodies[a];
        let body_b = &bodies[b];
        if body_a.is_static() && body_b.is_static() {
            return None;
        }

        let r_a = body_a.arm(connector.anchor_a);
        let r_b = body_b.arm(connector.anchor_b);
        let delta = (body_b.position + r_b) - (body_a.position + r_a);
        let carried = match warm {
            Some(JointImpulse::Distance(impulse)) => impulse,
            _ => 0.0,
        };

        let (kind, error) = match connector.kind {
            ConnectorKind::Spring { .. } => return None,
            ConnectorKind::Rod { length } => {
                let (axis, distance) = axis_and_distance(delta);
                let error = distance - length;
                let kind = JointKind::Distance {
                    axis,
                    mass: distance_mass(body_a, body_b, r_a, r_b, axis),
                    bias: baumgarte * error / dt,
                    pull_only: false,
                    impulse: carried,
                };
                (kind, error)
            }
            ConnectorKind::Rope { max_length } => {
                let (axis, distance) = axis_and_distance(delta);
                let error = distance - max_length;
                // Slack ropes only stop the motion that would overshoot this step
                let bias = if error < 0.0 { error / dt } else { baumgarte * error / dt };
                let kind = JointKind::Distance {
                    axis,
                    mass: distance_mass(body_a, body_b, r_a, r_b, axis),
                    bias,
                    pull_only: true,
                    impulse: if error < 0.0 { 0.0 } else { carried.min(0.0) },
                };
                (kind, error)
            }
            ConnectorKind::Revolute => {
                let inv_k = point_inverse_mass(body_a, body_b, r_a, r_b)?;
                let impulse = match warm {
                    Some(JointImpulse::Point(impulse)) => impulse,
                    _ => Vec2::ZERO,
                };
                let kind = JointKind::Point {
                    inv_k,
                    bias: delta * (baumgarte / dt),
                    impulse,
                };
                (kind, delta.length())
            }
        };

        Some(Self {
            connector: connector_index,
            a,
            b,
            r_a,
            r_b,
            error,
            kind,
        })
    }

    /// Magnitude of the impulse accumulated so far
    pub fn impulse_magnitude(&self) -> f64 {
        match self.kind {
            JointKind::Distance { impulse, .. } => impulse.abs(),
            JointKind::Point { impulse, .. } => impulse.length(),
        }
    }

    /// Impulse accumulated so far, for the next solve
    pub fn accumulated(&self) -> JointImpulse {
        match self.kind {
            JointKind::Distance { impulse, .. } => JointImpulse::Distance(impulse),
            JointKind::Point { impulse, .. } => JointImpulse::Point(impulse),
        }
    }

    /// Whether the constraint applied any impulse or is violated
    pub fn is_engaged(&self) -> bool {
        match self.kind {
            JointKind::Distance { pull_only: true, impulse, .. } => impulse != 0.0 || self.error >= 0.0,
            _ => true,
        }
    }
}

impl VelocityConstraint for JointConstraint {
    fn warm_start(&mut self, bodies: &mut [SolverBody]) {
        let impulse = match self.kind {
            JointKind::Distance { axis, impulse, .. } => axis * impulse,
            JointKind::Point { impulse, .. } => impulse,
        };
        bodies[self.a].apply_impulse(-impulse, self.r_a);
        bodies[self.b].apply_impulse(impulse, self.r_b);
    }

    fn solve_velocity(&mut self, bodies: &mut [SolverBody]) -> f64 {
        let mut a = bodies[self.a];
        let mut b = bodies[self.b];
        let relative = b.velocity_at(self.r_b) - a.velocity_at(self.r_a);

        let delta = match &mut self.kind {
            JointKind::Distance {
                axis,
                mass,
                bias,
                pull_only,
                impulse,
            } => {
                let cdot = relative.dot(*axis);
                let lambda = -*mass * (cdot + *bias);
                let old = *impulse;
                *impulse = if *pull_only { (old + lambda).min(0.0) } else { old + lambda };
                let step = *impulse - old;
                let p = *axis * step;
                a.apply_impulse(-p, self.r_a);
                b.apply_impulse(p, self.r_b);
                step.abs()
            }
            JointKind::Point { inv_k, bias, impulse } => {
                let rhs = -(relative + *bias);
                let lambda = Vec2::new(inv_k[0] * rhs.x + inv_k[1] * rhs.y, inv_k[2] * rhs.x + inv_k[3] * rhs.y);
                *impulse += lambda;
                a.apply_impulse(-lambda, self.r_a);
                b.apply_impulse(lambda, self.r_b);
                lambda.length()
            }
        };

        bodies[self.a] = a;
        bodies[self.b] = b;
        delta
    }
}

fn axis_and_distance(delta: Vec2) -> (Vec2, f64) {
    let distance = delta.length();
    if distance > EPSILON {
        (delta / distance, distance)
    } else {
        (Vec2::X, 0.0)
    }
}

fn distance_mass(a: &SolverBody, b: &SolverBody, r_a: Vec2, r_b: Vec2, axis: Vec2) -> f64 {
    let cr_a = r_a.cross(axis);
    let cr_b = r_b.cross(axis);
    let k = a.inv_mass + b.inv_mass + a.inv_inertia * cr_a * cr_a + b.inv_inertia * cr_b * cr_b;
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

/// Inverse of K = (mA + mB) I + iA [rA]x^T [rA]x + iB [rB]x^T [rB]x
///
/// K is positive definite whenever one body can move, so only a singular
/// matrix relative to its own scale is rejected.
fn point_inverse_mass(a: &SolverBody, b: &SolverBody, r_a: Vec2, r_b: Vec2) -> Option<[f64; 4]> {
    let m = a.inv_mass + b.inv_mass;
    let (ia, ib) = (a.inv_inertia, b.inv_inertia);

    let k11 = m + ia * r_a.y * r_a.y + ib * r_b.y * r_b.y;
    let k12 = -ia * r_a.x * r_a.y - ib * r_b.x * r_b.y;
    let k22 = m + ia * r_a.x * r_a.x + ib * r_b.x * r_b.x;

    let det = k11 * k22 - k12 * k12;
    if !(det > f64::EPSILON * k11 * k22) {
        return None;
    }
    let inv = 1.0 / det;
    Some([k22 * inv, -k12 * inv, -k12 * inv, k11 * inv])
}
