//! Connectors linking two bodies: springs and joints

use crate::body::BodyId;
use crate::error::{PhysicsError, Result};
use physisim_math::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a connector, owned by the caller's entity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectorId(pub u64);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connector#{}", self.0)
    }
}

/// Kind of link and its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ConnectorKind {
    /// Hooke spring with linear damping, applied as a force
    Spring {
        stiffness: f64,
        damping: f64,
        rest_length: f64,
    },
    /// Anchor distance held at exactly `length`
    Rod { length: f64 },
    /// Anchor distance held at or below `max_length`
    Rope { max_length: f64 },
    /// Anchors held together, rotation free
    Revolute,
}

impl ConnectorKind {
    /// Springs act through forces; every other kind is a solver constraint
    pub fn is_constraint(&self) -> bool {
        !matches!(self, Self::Spring { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Spring { .. } => "spring",
            Self::Rod { .. } => "rod",
            Self::Rope { .. } => "rope",
            Self::Revolute => "revolute",
        }
    }
}

/// A link between two bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connector {
    pub id: ConnectorId,
    pub body_a: BodyId,
    pub body_b: BodyId,
    /// Anchor on body A, body-local
    pub anchor_a: Vec2,
    /// Anchor on body B, body-local
    pub anchor_b: Vec2,
    pub kind: ConnectorKind,
    /// Reaction force magnitude above which the connector breaks
    pub break_threshold: Option<f64>,
    /// Set by the engine; broken connectors are ignored
    pub is_broken: bool,
    /// Whether the two connected bodies still collide with each other
    pub collide_connected: bool,
}

impl Connector {
    fn with_kind(id: ConnectorId, body_a: BodyId, body_b: BodyId, kind: ConnectorKind) -> Self {
        Self {
            id,
            body_a,
            body_b,
            anchor_a: Vec2::ZERO,
            anchor_b: Vec2::ZERO,
            kind,
            break_threshold: None,
            is_broken: false,
            collide_connected: !matches!(kind, ConnectorKind::Revolute),
        }
    }

    /// Damped spring between the two body origins
    pub fn spring(
        id: ConnectorId,
        body_a: BodyId,
        body_b: BodyId,
        stiffness: f64,
        damping: f64,
        rest_length: f64,
    ) -> Self {
        Self::with_kind(
            id,
            body_a,
            body_b,
            ConnectorKind::Spring {
                stiffness,
                damping,
                rest_length,
            },
        )
    }

    /// Rigid rod between the two body origins
    pub fn rod(id: ConnectorId, body_a: BodyId, body_b: BodyId, length: f64) -> Self {
        Self::with_kind(id, body_a, body_b, ConnectorKind::Rod { length })
    }

    /// Rope between the two body origins
    pub fn rope(id: ConnectorId, body_a: BodyId, body_b: BodyId, max_length: f64) -> Self {
        Self::with_kind(id, body_a, body_b, ConnectorKind::Rope { max_length })
    }

    /// Pin joint; connected bodies do not collide by default
    pub fn revolute(id: ConnectorId, body_a: BodyId, body_b: BodyId) -> Self {
        Self::with_kind(id, body_a, body_b, ConnectorKind::Revolute)
    }

    /// Set body-local anchors
    pub fn with_anchors(mut self, anchor_a: Vec2, anchor_b: Vec2) -> Self {
        self.anchor_a = anchor_a;
        self.anchor_b = anchor_b;
        self
    }

    /// Set break threshold (force magnitude)
    pub fn with_break_threshold(mut self, threshold: f64) -> Self {
        self.break_threshold = Some(threshold);
        self
    }

    /// Set whether the connected bodies collide
    pub fn with_collide_connected(mut self, collide: bool) -> Self {
        self.collide_connected = collide;
        self
    }

    /// Whether this connector still takes part in simulation
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.is_broken
    }

    pub fn connects(&self, a: BodyId, b: BodyId) -> bool {
        (self.body_a == a && self.body_b == b) || (self.body_a == b && self.body_b == a)
    }

    pub fn state(&self) -> ConnectorState {
        ConnectorState {
            id: self.id,
            is_broken: self.is_broken,
        }
    }

    /// Check parameters; body references are checked by the world
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PhysicsError::InvalidConnector { id: self.id, reason });

        if self.body_a == self.body_b {
            return invalid(format!("connects {} to itself", self.body_a));
        }
        if !self.anchor_a.is_finite() || !self.anchor_b.is_finite() {
            return invalid("anchors must be finite".to_string());
        }
        if let Some(threshold) = self.break_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return invalid(format!("break threshold must be positive, got {}", threshold));
            }
        }

        match self.kind {
            ConnectorKind::Spring {
                stiffness,
                damping,
                rest_length,
            } => {
                if !(stiffness.is_finite() && stiffness > 0.0) {
                    return invalid(format!("spring stiffness must be positive, got {}", stiffness));
                }
                if !(damping.is_finite() && damping >= 0.0) {
                    return invalid(format!("spring damping must be non-negative, got {}", damping));
                }
                if !(rest_length.is_finite() && rest_length >= 0.0) {
                    return invalid(format!("spring rest length must be non-negative, got {}", rest_length));
                }
            }
            ConnectorKind::Rod { length } => {
                if !(length.is_finite() && length > 0.0) {
                    return invalid(format!("rod length must be positive, got {}", length));
                }
            }
            ConnectorKind::Rope { max_length } => {
                if !(max_length.is_finite() && max_length > 0.0) {
                    return invalid(format!("rope length must be positive, got {}", max_length));
                }
            }
            ConnectorKind::Revolute => {}
        }
        Ok(())
    }
}

/// Persisted part of a connector's runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorState {
    pub id: ConnectorId,
    pub is_broken: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collide_connected_defaults() {
        let a = BodyId(1);
        let b = BodyId(2);
        assert!(!Connector::revolute(ConnectorId(1), a, b).collide_connected);
        assert!(Connector::rod(ConnectorId(2), a, b, 1.0).collide_connected);
        assert!(Connector::rope(ConnectorId(3), a, b, 1.0).collide_connected);
        assert!(Connector::spring(ConnectorId(4), a, b, 10.0, 0.0, 1.0).collide_connected);
    }

    #[test]
    fn test_validation() {
        let a = BodyId(1);
        let b = BodyId(2);
        assert!(Connector::rod(ConnectorId(1), a, a, 1.0).validate().is_err());
        assert!(Connector::rod(ConnectorId(1), a, b, 0.0).validate().is_err());
        assert!(Connector::rope(ConnectorId(1), a, b, -1.0).validate().is_err());
        assert!(Connector::spring(ConnectorId(1), a, b, 0.0, 0.0, 1.0).validate().is_err());
        assert!(Connector::spring(ConnectorId(1), a, b, 1.0, -0.5, 1.0).validate().is_err());
        assert!(Connector::revolute(ConnectorId(1), a, b)
            .with_break_threshold(0.0)
            .validate()
            .is_err());
        assert!(Connector::revolute(ConnectorId(1), a, b)
            .with_anchors(Vec2::new(0.5, 0.0), Vec2::ZERO)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_connects_either_order() {
        let c = Connector::rod(ConnectorId(1), BodyId(1), BodyId(2), 1.0);
        assert!(c.connects(BodyId(2), BodyId(1)));
        assert!(!c.connects(BodyId(2), BodyId(3)));
        assert!(c.kind.is_constraint());
    }
}
