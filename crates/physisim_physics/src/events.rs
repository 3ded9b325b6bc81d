//! Physics events (collisions, connector breakage)

use crate::body::BodyId;
use crate::connector::ConnectorId;
use crate::layers::BodyPair;
use crate::manifold::ContactManifold;
use physisim_math::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Contact data from a collision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactData {
    /// Contact point in world space
    pub point: Vec2,
    /// Contact normal (pointing from body1 to body2)
    pub normal: Vec2,
    /// Penetration depth
    pub depth: f64,
    /// Normal impulse applied at this contact
    pub impulse: f64,
}

/// Type of collision event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollisionEventType {
    /// The pair started touching this tick
    Began,
    /// The pair was touching last tick and still is
    Persisted,
    /// The pair stopped touching this tick
    Ended,
}

/// A collision event between two bodies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionEvent {
    /// Body with the smaller id
    pub body1: BodyId,
    /// Body with the larger id
    pub body2: BodyId,
    /// Event type
    pub event_type: CollisionEventType,
    /// Whether this is a sensor event
    pub is_sensor: bool,
    /// Contact points (empty for ended events)
    pub contacts: Vec<ContactData>,
}

impl CollisionEvent {
    pub fn is_began(&self) -> bool {
        self.event_type == CollisionEventType::Began
    }

    pub fn is_persisted(&self) -> bool {
        self.event_type == CollisionEventType::Persisted
    }

    pub fn is_ended(&self) -> bool {
        self.event_type == CollisionEventType::Ended
    }

    pub fn involves(&self, body: BodyId) -> bool {
        self.body1 == body || self.body2 == body
    }

    /// Get the average contact point
    pub fn average_contact_point(&self) -> Option<Vec2> {
        if self.contacts.is_empty() {
            return None;
        }
        let sum = self.contacts.iter().fold(Vec2::ZERO, |acc, c| acc + c.point);
        Some(sum / self.contacts.len() as f64)
    }

    /// Get total impulse from all contacts
    pub fn total_impulse(&self) -> f64 {
        self.contacts.iter().map(|c| c.impulse).sum()
    }
}

/// Everything the engine reports outward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicsEvent {
    Collision(CollisionEvent),
    /// A connector exceeded its break threshold this tick
    ConnectorBroken {
        connector: ConnectorId,
        /// Reaction force magnitude that broke it
        reaction: f64,
    },
}

/// Handler trait for physics events
pub trait PhysicsEventHandler {
    /// Called for every collision transition or persisting contact
    fn on_collision(&mut self, event: &CollisionEvent);

    /// Called once when a connector breaks
    fn on_connector_broken(&mut self, _connector: ConnectorId, _reaction: f64) {}

    fn handle(&mut self, event: &PhysicsEvent) {
        match event {
            PhysicsEvent::Collision(collision) => self.on_collision(collision),
            PhysicsEvent::ConnectorBroken { connector, reaction } => self.on_connector_broken(*connector, *reaction),
        }
    }
}

/// Default event handler that collects events into a buffer
#[derive(Debug, Default)]
pub struct EventCollector {
    /// Collision events
    pub collision_events: Vec<CollisionEvent>,
    /// Broken connectors and their reaction force
    pub broken_connectors: Vec<(ConnectorId, f64)>,
}

impl EventCollector {
    /// Create a new event collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all collected events
    pub fn clear(&mut self) {
        self.collision_events.clear();
        self.broken_connectors.clear();
    }

    /// Get collision begin events
    pub fn began_collisions(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.collision_events.iter().filter(|e| e.is_began())
    }

    /// Get collision end events
    pub fn ended_collisions(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.collision_events.iter().filter(|e| e.is_ended())
    }

    /// Get sensor begin events
    pub fn sensor_enters(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.collision_events.iter().filter(|e| e.is_sensor && e.is_began())
    }

    /// Get sensor end events
    pub fn sensor_exits(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.collision_events.iter().filter(|e| e.is_sensor && e.is_ended())
    }
}

impl PhysicsEventHandler for EventCollector {
    fn on_collision(&mut self, event: &CollisionEvent) {
        self.collision_events.push(event.clone());
    }

    fn on_connector_broken(&mut self, connector: ConnectorId, reaction: f64) {
        self.broken_connectors.push((connector, reaction));
    }
}

/// Tracks which pairs touched on the previous tick
#[derive(Debug, Clone, Default)]
pub(crate) struct ContactTracker {
    touching: BTreeMap<BodyPair, bool>,
}

impl ContactTracker {
    /// Diff this tick's manifolds against the previous tick
    ///
    /// Events come out in pair order.
    pub fn update(&mut self, manifolds: &[ContactManifold]) -> Vec<CollisionEvent> {
        let mut current: BTreeMap<BodyPair, &ContactManifold> = BTreeMap::new();
        for manifold in manifolds {
            current
                .entry(BodyPair::new(manifold.body_a, manifold.body_b))
                .or_insert(manifold);
        }

        let pairs: BTreeSet<BodyPair> = current.keys().chain(self.touching.keys()).copied().collect();
        let mut events = Vec::new();
        for pair in pairs {
            let event = match (current.get(&pair), self.touching.get(&pair)) {
                (Some(manifold), previous) => {
                    let event_type = if previous.is_some() {
                        CollisionEventType::Persisted
                    } else {
                        log::debug!("Contact began between {} and {}", pair.0, pair.1);
                        CollisionEventType::Began
                    };
                    collision_event(pair, event_type, manifold)
                }
                (None, Some(&is_sensor)) => {
                    log::debug!("Contact ended between {} and {}", pair.0, pair.1);
                    CollisionEvent {
                        body1: pair.0,
                        body2: pair.1,
                        event_type: CollisionEventType::Ended,
                        is_sensor,
                        contacts: Vec::new(),
                    }
                }
                (None, None) => continue,
            };
            events.push(event);
        }

        self.touching = current.iter().map(|(pair, m)| (*pair, m.is_sensor)).collect();
        events
    }

    pub fn clear(&mut self) {
        self.touching.clear();
    }

    pub fn len(&self) -> usize {
        self.touching.len()
    }
}

fn collision_event(pair: BodyPair, event_type: CollisionEventType, manifold: &ContactManifold) -> CollisionEvent {
    // Report the normal from body1 to body2
    let normal = if manifold.body_a == pair.0 { manifold.normal } else { -manifold.normal };
    CollisionEvent {
        body1: pair.0,
        body2: pair.1,
        event_type,
        is_sensor: manifold.is_sensor,
        contacts: manifold
            .points
            .iter()
            .map(|p| ContactData {
                point: p.position,
                normal,
                depth: p.penetration,
                impulse: p.normal_impulse,
            })
            .collect(),
    }
}
