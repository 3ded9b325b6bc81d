//! Contact manifolds produced by the narrow phase

use crate::body::BodyId;
use physisim_math::Vec2;
use serde::{Deserialize, Serialize};

/// A single point of contact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactPoint {
    /// World-space contact position
    pub position: Vec2,
    /// Penetration at this point (positive when overlapping)
    pub penetration: f64,
    /// Total normal impulse the solver applied here during the tick
    pub normal_impulse: f64,
    /// Total friction impulse the solver applied here during the tick
    pub tangent_impulse: f64,
}

impl ContactPoint {
    pub fn new(position: Vec2, penetration: f64) -> Self {
        Self {
            position,
            penetration,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
        }
    }
}

/// Contact geometry between two touching bodies
///
/// Derived fresh every tick; only the solved impulses are carried over,
/// and only until the next snapshot restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactManifold {
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Unit separation normal pointing from A to B
    pub normal: Vec2,
    /// Depth along `normal` that would separate the shapes
    pub penetration: f64,
    /// One or two contact points
    pub points: Vec<ContactPoint>,
    /// At least one body is a sensor; no response is applied
    pub is_sensor: bool,
}

impl ContactManifold {
    /// Sum of normal impulses over all points
    pub fn total_normal_impulse(&self) -> f64 {
        self.points.iter().map(|p| p.normal_impulse).sum()
    }

    /// Average of the contact positions
    pub fn average_point(&self) -> Option<Vec2> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self.points.iter().fold(Vec2::ZERO, |acc, p| acc + p.position);
        Some(sum / self.points.len() as f64)
    }

    /// Swap the roles of A and B
    pub fn flipped(mut self) -> Self {
        std::mem::swap(&mut self.body_a, &mut self.body_b);
        self.normal = -self.normal;
        self
    }
}
