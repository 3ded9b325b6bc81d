//! Force accumulation: gravity, springs and external force sources

use crate::body::{Body, BodyId};
use crate::connector::{Connector, ConnectorId, ConnectorKind};
use crate::integrator::SolverBody;
use physisim_math::Vec2;
use serde::{Deserialize, Serialize};

/// Time information handed to external force sources
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepContext {
    /// Simulation time at the start of the tick
    pub time: f64,
    /// Index of the tick being simulated
    pub tick: u64,
    pub dt: f64,
}

/// What an external source wants applied to one body this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceRequest {
    /// Force through the body origin, held for the whole tick
    pub force: Vec2,
    pub torque: f64,
    /// Instant change of momentum at the start of the tick
    pub impulse: Vec2,
    pub angular_impulse: f64,
}

impl ForceRequest {
    pub fn force(force: Vec2) -> Self {
        Self {
            force,
            ..Default::default()
        }
    }

    pub fn impulse(impulse: Vec2) -> Self {
        Self {
            impulse,
            ..Default::default()
        }
    }

    pub fn with_torque(mut self, torque: f64) -> Self {
        self.torque = torque;
        self
    }

    pub fn with_angular_impulse(mut self, angular_impulse: f64) -> Self {
        self.angular_impulse = angular_impulse;
        self
    }

    pub fn is_finite(&self) -> bool {
        self.force.is_finite()
            && self.torque.is_finite()
            && self.impulse.is_finite()
            && self.angular_impulse.is_finite()
    }
}

/// External force contributor queried once per body per tick
///
/// This is how scripted behaviour reaches the engine: the source sees the
/// body's pre-tick state and returns the forces it wants applied.
pub trait ForceSource {
    fn forces(&mut self, body: &Body, ctx: &StepContext) -> Option<ForceRequest>;
}

impl<F> ForceSource for F
where
    F: FnMut(&Body, &StepContext) -> Option<ForceRequest>,
{
    fn forces(&mut self, body: &Body, ctx: &StepContext) -> Option<ForceRequest> {
        self(body, ctx)
    }
}

/// Force source that never contributes
#[derive(Debug, Clone, Copy, Default)]
pub struct NoExternalForces;

impl ForceSource for NoExternalForces {
    fn forces(&mut self, _body: &Body, _ctx: &StepContext) -> Option<ForceRequest> {
        None
    }
}

/// Origin of a recorded force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForceKind {
    Gravity,
    Spring(ConnectorId),
    /// Accumulated on the body by the caller before the tick
    Applied,
    /// Returned by the tick's force source
    External,
}

/// One force acting on a body, for force analysis displays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForceDetail {
    pub body: BodyId,
    pub force: Vec2,
    /// Where the force acts, in body-local coordinates
    pub application_point_local: Vec2,
    pub kind: ForceKind,
}

/// Result of evaluating one spring
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpringForce {
    /// Force on body A; body B receives the opposite
    pub force_on_a: Vec2,
    pub arm_a: Vec2,
    pub arm_b: Vec2,
    /// Signed tension (positive when stretched)
    pub tension: f64,
}

/// Hooke's law with damping along the anchor line
pub(crate) fn spring_force(connector: &Connector, a: &SolverBody, b: &SolverBody) -> Option<SpringForce> {
    let ConnectorKind::Spring {
        stiffness,
        damping,
        rest_length,
    } = connector.kind
    else {
        return None;
    };

    let arm_a = a.arm(connector.anchor_a);
    let arm_b = b.arm(connector.anchor_b);
    let delta = (b.position + arm_b) - (a.position + arm_a);
    let length = delta.length();
    // Coincident anchors have no line of action
    let direction = delta.try_normalize()?;

    let rate = (b.velocity_at(arm_b) - a.velocity_at(arm_a)).dot(direction);
    let tension = stiffness * (length - rest_length) + damping * rate;

    Some(SpringForce {
        force_on_a: direction * tension,
        arm_a,
        arm_b,
        tension,
    })
}

/// Evaluate every active spring into the scratch accumulators
///
/// Returns `(connector index, force)` pairs in connector order.
pub(crate) fn accumulate_springs(
    connectors: &[Connector],
    endpoints: &[Option<(usize, usize)>],
    bodies: &mut [SolverBody],
) -> Vec<(usize, SpringForce)> {
    for body in bodies.iter_mut() {
        body.spring_force = Vec2::ZERO;
        body.spring_torque = 0.0;
    }

    let mut applied = Vec::new();
    for (index, connector) in connectors.iter().enumerate() {
        if connector.is_broken {
            continue;
        }
        let Some((ia, ib)) = endpoints[index] else {
            continue;
        };
        let Some(spring) = spring_force(connector, &bodies[ia], &bodies[ib]) else {
            continue;
        };

        let a = &mut bodies[ia];
        if !a.is_static() {
            a.spring_force += spring.force_on_a;
            a.spring_torque += spring.arm_a.cross(spring.force_on_a);
        }
        let b = &mut bodies[ib];
        if !b.is_static() {
            b.spring_force -= spring.force_on_a;
            b.spring_torque -= spring.arm_b.cross(spring.force_on_a);
        }
        applied.push((index, spring));
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Body, BodyDesc};
    use crate::shape::Shape;
    use approx::assert_relative_eq;

    fn body_at(id: u64, x: f64) -> Body {
        BodyDesc::dynamic(Shape::circle(0.2).unwrap())
            .with_mass(1.0)
            .with_position(x, 0.0)
            .build(BodyId(id))
            .unwrap()
    }

    #[test]
    fn test_stretched_spring_pulls_together() {
        let spring = Connector::spring(ConnectorId(1), BodyId(1), BodyId(2), 10.0, 0.0, 1.0);
        let mut bodies = vec![
            SolverBody::from_body(&body_at(1, 0.0)),
            SolverBody::from_body(&body_at(2, 1.5)),
        ];
        let applied = accumulate_springs(&[spring], &[Some((0, 1))], &mut bodies);
        assert_eq!(applied.len(), 1);
        assert_relative_eq!(applied[0].1.tension, 5.0, epsilon = 1e-12);
        assert_relative_eq!(bodies[0].spring_force.x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(bodies[1].spring_force.x, -5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_damping_opposes_separation() {
        let spring = Connector::spring(ConnectorId(1), BodyId(1), BodyId(2), 10.0, 2.0, 1.0);
        let a = SolverBody::from_body(&body_at(1, 0.0));
        let mut b = SolverBody::from_body(&body_at(2, 1.0));
        b.linear_velocity = Vec2::new(3.0, 0.0);
        let force = spring_force(&spring, &a, &b).unwrap();
        assert_relative_eq!(force.tension, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coincident_anchors_produce_nothing() {
        let spring = Connector::spring(ConnectorId(1), BodyId(1), BodyId(2), 10.0, 0.0, 1.0);
        let a = SolverBody::from_body(&body_at(1, 0.0));
        let b = SolverBody::from_body(&body_at(2, 0.0));
        assert!(spring_force(&spring, &a, &b).is_none());
    }

    #[test]
    fn test_closure_force_source() {
        let mut source = |body: &Body, _ctx: &StepContext| {
            (body.id == BodyId(1)).then(|| ForceRequest::force(Vec2::new(1.0, 0.0)))
        };
        let ctx = StepContext { time: 0.0, tick: 0, dt: 0.1 };
        assert!(source.forces(&body_at(1, 0.0), &ctx).is_some());
        assert!(source.forces(&body_at(2, 0.0), &ctx).is_none());
        assert!(NoExternalForces.forces(&body_at(1, 0.0), &ctx).is_none());
    }
}
