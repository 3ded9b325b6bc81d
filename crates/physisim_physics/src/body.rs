//! Rigid body records and their builder

use crate::error::{PhysicsError, Result};
use crate::layers::CollisionGroups;
use crate::material::{validate_material, PhysicsMaterial, SurfaceOverride};
use crate::shape::Shape;
use physisim_math::{Transform2, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a body, owned by the caller's entity store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub u64);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// A rigid body as handed to the engine for one tick
///
/// Fixed bodies have infinite mass and inertia: their `mass` and `inertia`
/// fields are ignored and the engine never changes their pose or velocity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub id: BodyId,
    pub shape: Shape,
    /// World position of the body origin
    pub position: Vec2,
    /// Orientation in radians
    pub angle: f64,
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
    pub mass: f64,
    /// Moment of inertia about the body origin
    pub inertia: f64,
    pub is_fixed: bool,
    pub material: PhysicsMaterial,
    #[serde(default)]
    pub surface: SurfaceOverride,
    /// Gravity scale (0 = no gravity, 1 = normal, 2 = double)
    pub gravity_scale: f64,
    /// Sensors report contacts but never receive a contact response
    pub is_sensor: bool,
    #[serde(default)]
    pub groups: CollisionGroups,
    /// Net force accumulated for the coming tick, cleared after integration
    #[serde(default)]
    pub force: Vec2,
    /// Net torque accumulated for the coming tick, cleared after integration
    #[serde(default)]
    pub torque: f64,
}

impl Body {
    /// Dynamic body with automatic inertia
    pub fn new(id: BodyId, shape: Shape, mass: f64) -> Result<Self> {
        BodyDesc::dynamic(shape).with_mass(mass).build(id)
    }

    /// Immovable body
    pub fn fixed(id: BodyId, shape: Shape) -> Result<Self> {
        BodyDesc::fixed(shape).build(id)
    }

    #[inline]
    pub fn transform(&self) -> Transform2 {
        Transform2::from_position_angle(self.position, self.angle)
    }

    /// Inverse mass, zero for fixed bodies
    #[inline]
    pub fn inv_mass(&self) -> f64 {
        if self.is_fixed {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Inverse moment of inertia, zero for fixed bodies
    #[inline]
    pub fn inv_inertia(&self) -> f64 {
        if self.is_fixed {
            0.0
        } else {
            1.0 / self.inertia
        }
    }

    /// World-space position of a body-local point
    pub fn world_point(&self, local: Vec2) -> Vec2 {
        self.transform().transform_point(local)
    }

    /// Velocity of a world-space point rigidly attached to the body
    pub fn velocity_at_point(&self, world_point: Vec2) -> Vec2 {
        let r = world_point - self.position;
        self.linear_velocity + Vec2::cross_scalar(self.angular_velocity, r)
    }

    /// Add a force through the body origin for the coming tick
    pub fn apply_force(&mut self, force: Vec2) {
        if !self.is_fixed {
            self.force += force;
        }
    }

    /// Add a force at a world-space point, producing torque about the origin
    pub fn apply_force_at_point(&mut self, force: Vec2, world_point: Vec2) {
        if !self.is_fixed {
            self.force += force;
            self.torque += (world_point - self.position).cross(force);
        }
    }

    pub fn apply_torque(&mut self, torque: f64) {
        if !self.is_fixed {
            self.torque += torque;
        }
    }

    /// Change momentum immediately
    pub fn apply_impulse(&mut self, impulse: Vec2) {
        if !self.is_fixed {
            self.linear_velocity += impulse * self.inv_mass();
        }
    }

    /// Change linear and angular momentum immediately through a world-space point
    pub fn apply_impulse_at_point(&mut self, impulse: Vec2, world_point: Vec2) {
        if !self.is_fixed {
            self.linear_velocity += impulse * self.inv_mass();
            self.angular_velocity += (world_point - self.position).cross(impulse) * self.inv_inertia();
        }
    }

    pub fn clear_forces(&mut self) {
        self.force = Vec2::ZERO;
        self.torque = 0.0;
    }

    pub fn kinetic_energy(&self) -> f64 {
        if self.is_fixed {
            return 0.0;
        }
        0.5 * self.mass * self.linear_velocity.length_squared()
            + 0.5 * self.inertia * self.angular_velocity * self.angular_velocity
    }

    /// Kinematic state only
    pub fn state(&self) -> BodyState {
        BodyState {
            id: self.id,
            position: self.position,
            angle: self.angle,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
        }
    }

    pub fn set_state(&mut self, state: &BodyState) {
        self.position = state.position;
        self.angle = state.angle;
        self.linear_velocity = state.linear_velocity;
        self.angular_velocity = state.angular_velocity;
    }

    /// Check every property the engine relies on
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(PhysicsError::InvalidBody { id: self.id, reason });

        if !self.position.is_finite() || !self.angle.is_finite() {
            return invalid("pose must be finite".to_string());
        }
        if !self.linear_velocity.is_finite() || !self.angular_velocity.is_finite() {
            return invalid("velocity must be finite".to_string());
        }
        if !self.force.is_finite() || !self.torque.is_finite() {
            return invalid("accumulated force must be finite".to_string());
        }
        if !self.gravity_scale.is_finite() {
            return invalid("gravity scale must be finite".to_string());
        }
        if !self.is_fixed {
            if !(self.mass.is_finite() && self.mass > 0.0) {
                return invalid(format!("mass must be positive, got {}", self.mass));
            }
            if !(self.inertia.is_finite() && self.inertia > 0.0) {
                return invalid(format!("inertia must be positive, got {}", self.inertia));
            }
        }
        validate_material(&self.material, self.id)?;
        self.surface
            .validate()
            .map_err(|reason| PhysicsError::InvalidBody { id: self.id, reason })
    }
}

/// Kinematic state of a body, the part that changes from tick to tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyState {
    pub id: BodyId,
    pub position: Vec2,
    pub angle: f64,
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
}

/// Description for creating a body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BodyDesc {
    pub shape: Shape,
    pub is_fixed: bool,
    pub position: Vec2,
    pub angle: f64,
    pub linear_velocity: Vec2,
    pub angular_velocity: f64,
    /// Explicit mass; derived from material density and shape area when unset
    pub mass: Option<f64>,
    /// Explicit inertia; derived from shape and mass when unset
    pub inertia: Option<f64>,
    pub material: PhysicsMaterial,
    pub surface: SurfaceOverride,
    pub gravity_scale: f64,
    pub is_sensor: bool,
    pub groups: CollisionGroups,
}

impl BodyDesc {
    /// Create a dynamic body description
    pub fn dynamic(shape: Shape) -> Self {
        Self {
            shape,
            is_fixed: false,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            mass: None,
            inertia: None,
            material: PhysicsMaterial::default(),
            surface: SurfaceOverride::default(),
            gravity_scale: 1.0,
            is_sensor: false,
            groups: CollisionGroups::ALL,
        }
    }

    /// Create a fixed body description
    pub fn fixed(shape: Shape) -> Self {
        Self {
            is_fixed: true,
            ..Self::dynamic(shape)
        }
    }

    /// Set position
    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Vec2::new(x, y);
        self
    }

    /// Set orientation (radians)
    pub fn with_angle(mut self, angle: f64) -> Self {
        self.angle = angle;
        self
    }

    /// Set linear velocity
    pub fn with_linear_velocity(mut self, x: f64, y: f64) -> Self {
        self.linear_velocity = Vec2::new(x, y);
        self
    }

    /// Set angular velocity
    pub fn with_angular_velocity(mut self, omega: f64) -> Self {
        self.angular_velocity = omega;
        self
    }

    /// Set mass
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Set moment of inertia
    pub fn with_inertia(mut self, inertia: f64) -> Self {
        self.inertia = Some(inertia);
        self
    }

    /// Set material
    pub fn with_material(mut self, material: PhysicsMaterial) -> Self {
        self.material = material;
        self
    }

    /// Set surface overrides
    pub fn with_surface(mut self, surface: SurfaceOverride) -> Self {
        self.surface = surface;
        self
    }

    /// Set gravity scale
    pub fn with_gravity_scale(mut self, scale: f64) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Mark as sensor
    pub fn sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Set collision groups
    pub fn with_groups(mut self, groups: CollisionGroups) -> Self {
        self.groups = groups;
        self
    }

    /// Build and validate the body
    pub fn build(self, id: BodyId) -> Result<Body> {
        let mass = self
            .mass
            .unwrap_or_else(|| self.material.density * self.shape.area());
        let inertia = self
            .inertia
            .unwrap_or_else(|| self.shape.inertia_for_mass(mass));

        let body = Body {
            id,
            shape: self.shape,
            position: self.position,
            angle: self.angle,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
            mass,
            inertia,
            is_fixed: self.is_fixed,
            material: self.material,
            surface: self.surface,
            gravity_scale: self.gravity_scale,
            is_sensor: self.is_sensor,
            groups: self.groups,
            force: Vec2::ZERO,
            torque: 0.0,
        };
        body.validate()?;
        Ok(body)
    }
}
