//! Accumulated impulses carried from one solve into the next
//!
//! The solver starts every pass from the impulses the previous pass ended
//! with, scaled by the ratio of step lengths. Contacts are keyed by body
//! pair and matched point by point in body-local coordinates; connectors
//! are keyed by id.

use crate::body::BodyId;
use crate::connector::ConnectorId;
use crate::layers::BodyPair;
use physisim_math::Vec2;
use std::collections::BTreeMap;

/// Contact points further apart than this in both body frames are different points
pub(crate) const MATCH_DISTANCE: f64 = 0.05;

/// Minimum cosine between the old and new normal for impulses to carry over
const NORMAL_AGREEMENT: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CachedPoint {
    /// Contact position in body A's frame
    pub local_a: Vec2,
    /// Contact position in body B's frame
    pub local_b: Vec2,
    pub normal_impulse: f64,
    pub tangent_impulse: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CachedManifold {
    pub body_a: BodyId,
    pub normal: Vec2,
    pub points: Vec<CachedPoint>,
}

impl CachedManifold {
    /// Impulses of the cached point closest to the given local positions
    pub fn find(&self, local_a: Vec2, local_b: Vec2) -> Option<(f64, f64)> {
        self.points
            .iter()
            .map(|p| (p, p.local_a.distance(local_a).min(p.local_b.distance(local_b))))
            .filter(|(_, d)| *d < MATCH_DISTANCE)
            .min_by(|(_, x), (_, y)| x.total_cmp(y))
            .map(|(p, _)| (p.normal_impulse, p.tangent_impulse))
    }
}

/// Impulse a connector accumulated during a solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum JointImpulse {
    Distance(f64),
    Point(Vec2),
}

impl JointImpulse {
    pub fn scaled(self, ratio: f64) -> Self {
        match self {
            Self::Distance(impulse) => Self::Distance(impulse * ratio),
            Self::Point(impulse) => Self::Point(impulse * ratio),
        }
    }
}

/// Impulses from the last solve of the last committed tick
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ImpulseCache {
    /// Step length the impulses were accumulated over
    step: f64,
    contacts: BTreeMap<BodyPair, CachedManifold>,
    joints: BTreeMap<ConnectorId, JointImpulse>,
}

impl ImpulseCache {
    pub fn new(step: f64) -> Self {
        Self {
            step,
            ..Default::default()
        }
    }

    /// Factor that converts cached impulses to a step of length `step`
    pub fn ratio(&self, step: f64) -> f64 {
        if self.step > 0.0 {
            step / self.step
        } else {
            0.0
        }
    }

    /// Cached manifold for a pair, if its orientation still agrees
    pub fn contact(&self, body_a: BodyId, body_b: BodyId, normal: Vec2) -> Option<&CachedManifold> {
        self.contacts
            .get(&BodyPair::new(body_a, body_b))
            .filter(|cached| cached.body_a == body_a && cached.normal.dot(normal) >= NORMAL_AGREEMENT)
    }

    pub fn joint(&self, connector: ConnectorId) -> Option<JointImpulse> {
        self.joints.get(&connector).copied()
    }

    pub fn insert_contact(&mut self, body_b: BodyId, manifold: CachedManifold) {
        self.contacts.insert(BodyPair::new(manifold.body_a, body_b), manifold);
    }

    pub fn insert_joint(&mut self, connector: ConnectorId, impulse: JointImpulse) {
        self.joints.insert(connector, impulse);
    }

    pub fn clear(&mut self) {
        self.step = 0.0;
        self.contacts.clear();
        self.joints.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty() && self.joints.is_empty()
    }
}
