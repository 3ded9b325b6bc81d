//! Collision layers and pair filtering

use crate::body::BodyId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Bit index into a `CollisionGroups` mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CollisionLayer(pub u32);

impl CollisionLayer {
    pub const DEFAULT: Self = Self(0);

    pub const fn custom(bit: u32) -> Self {
        Self(bit)
    }

    /// Single-bit mask; layers past bit 31 map to an empty mask
    pub fn as_mask(&self) -> u32 {
        1u32.checked_shl(self.0).unwrap_or(0)
    }
}

/// Membership and filter masks deciding which bodies may touch
///
/// Two bodies collide only if each one's memberships intersect the other's
/// filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionGroups {
    pub memberships: u32,
    pub filter: u32,
}

impl CollisionGroups {
    pub const ALL: Self = Self {
        memberships: u32::MAX,
        filter: u32::MAX,
    };

    /// Touches nothing
    pub const NONE: Self = Self {
        memberships: 0,
        filter: 0,
    };

    pub fn new(memberships: u32, filter: u32) -> Self {
        Self { memberships, filter }
    }

    /// Member of one layer, colliding with the listed layers
    pub fn from_layer(layer: CollisionLayer, collides_with: &[CollisionLayer]) -> Self {
        Self {
            memberships: layer.as_mask(),
            filter: collides_with.iter().fold(0, |mask, l| mask | l.as_mask()),
        }
    }

    pub fn can_collide(&self, other: &CollisionGroups) -> bool {
        self.memberships & other.filter != 0 && other.memberships & self.filter != 0
    }

    /// Same groups, ignoring one more layer
    pub fn exclude(mut self, layer: CollisionLayer) -> Self {
        self.filter &= !layer.as_mask();
        self
    }
}

impl Default for CollisionGroups {
    fn default() -> Self {
        Self::ALL
    }
}

/// Unordered body pair, stored with the smaller id first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyPair(pub BodyId, pub BodyId);

impl BodyPair {
    pub fn new(a: BodyId, b: BodyId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn contains(&self, id: BodyId) -> bool {
        self.0 == id || self.1 == id
    }
}

/// Explicit per-pair collision switches
///
/// Pairs are unordered: disabling `(a, b)` also disables `(b, a)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairFilter {
    disabled: BTreeSet<BodyPair>,
}

impl PairFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the two bodies from generating contacts with each other
    pub fn disable(&mut self, a: BodyId, b: BodyId) {
        self.disabled.insert(BodyPair::new(a, b));
    }

    /// Undo a previous `disable`
    pub fn enable(&mut self, a: BodyId, b: BodyId) {
        self.disabled.remove(&BodyPair::new(a, b));
    }

    pub fn is_disabled(&self, a: BodyId, b: BodyId) -> bool {
        self.disabled.contains(&BodyPair::new(a, b))
    }

    /// Forget every pair involving a body
    pub fn remove_body(&mut self, id: BodyId) {
        self.disabled.retain(|pair| !pair.contains(id));
    }

    pub fn len(&self) -> usize {
        self.disabled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disabled.is_empty()
    }

    pub fn clear(&mut self) {
        self.disabled.clear();
    }
}
