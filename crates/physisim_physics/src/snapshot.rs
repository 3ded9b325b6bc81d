//! Plain-data snapshots of simulation state

use crate::body::{Body, BodyState};
use crate::connector::{Connector, ConnectorState};
use crate::error::{PhysicsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything needed to resume a simulation, without derived solver state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    /// Simulation time in seconds
    pub time: f64,
    /// Number of ticks simulated
    pub tick: u64,
    pub bodies: Vec<BodyState>,
    pub connectors: Vec<ConnectorState>,
}

impl SimulationSnapshot {
    /// Capture the kinematic state of bodies and connectors
    pub fn capture(time: f64, tick: u64, bodies: &[Body], connectors: &[Connector]) -> Self {
        Self {
            time,
            tick,
            bodies: bodies.iter().map(Body::state).collect(),
            connectors: connectors.iter().map(Connector::state).collect(),
        }
    }

    /// Write the captured state back
    ///
    /// Every captured id must be present; nothing is written otherwise.
    /// Per-tick force accumulators are cleared.
    pub fn restore_into(&self, bodies: &mut [Body], connectors: &mut [Connector]) -> Result<()> {
        let body_index: HashMap<_, _> = bodies.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
        let connector_index: HashMap<_, _> = connectors.iter().enumerate().map(|(i, c)| (c.id, i)).collect();

        let mut body_targets = Vec::with_capacity(self.bodies.len());
        for state in &self.bodies {
            let index = body_index
                .get(&state.id)
                .ok_or_else(|| PhysicsError::SnapshotMismatch(format!("{}", state.id)))?;
            body_targets.push((*index, state));
        }
        let mut connector_targets = Vec::with_capacity(self.connectors.len());
        for state in &self.connectors {
            let index = connector_index
                .get(&state.id)
                .ok_or_else(|| PhysicsError::SnapshotMismatch(format!("{}", state.id)))?;
            connector_targets.push((*index, state));
        }

        for (index, state) in body_targets {
            bodies[index].set_state(state);
            bodies[index].clear_forces();
        }
        for (index, state) in connector_targets {
            connectors[index].is_broken = state.is_broken;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{BodyDesc, BodyId};
    use crate::connector::ConnectorId;
    use crate::shape::Shape;
    use physisim_math::Vec2;

    fn bodies() -> Vec<Body> {
        vec![
            BodyDesc::dynamic(Shape::circle(0.5).unwrap())
                .with_position(1.0, 2.0)
                .with_linear_velocity(0.5, -0.25)
                .build(BodyId(1))
                .unwrap(),
            BodyDesc::fixed(Shape::rectangle(4.0, 1.0).unwrap()).build(BodyId(2)).unwrap(),
        ]
    }

    #[test]
    fn test_capture_and_restore() {
        let mut bodies = bodies();
        let mut connectors = vec![Connector::rod(ConnectorId(1), BodyId(1), BodyId(2), 2.0)];
        let snapshot = SimulationSnapshot::capture(1.5, 90, &bodies, &connectors);

        bodies[0].position = Vec2::new(9.0, 9.0);
        bodies[0].apply_force(Vec2::X);
        connectors[0].is_broken = true;

        snapshot.restore_into(&mut bodies, &mut connectors).unwrap();
        assert_eq!(bodies[0].position, Vec2::new(1.0, 2.0));
        assert_eq!(bodies[0].force, Vec2::ZERO);
        assert!(!connectors[0].is_broken);
    }

    #[test]
    fn test_unknown_id_writes_nothing() {
        let mut bodies = bodies();
        let snapshot = SimulationSnapshot::capture(0.0, 0, &bodies, &[]);
        bodies[0].position = Vec2::new(9.0, 9.0);
        let mut fewer = vec![bodies[0].clone()];
        fewer[0].id = BodyId(1);
        let result = snapshot.restore_into(&mut fewer, &mut []);
        assert!(matches!(result, Err(PhysicsError::SnapshotMismatch(_))));
        assert_eq!(fewer[0].position, Vec2::new(9.0, 9.0));
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = SimulationSnapshot::capture(0.25, 15, &bodies(), &[]);
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SimulationSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
