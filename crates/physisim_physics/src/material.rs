//! Physics materials defining surface properties

use crate::error::{PhysicsError, Result};
use serde::{Deserialize, Serialize};

/// Physics material defining restitution and friction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsMaterial {
    /// Restitution/bounciness in [0, 1] (0 = no bounce, 1 = perfect bounce)
    pub restitution: f64,
    /// Friction coefficient while the contact is not sliding
    pub static_friction: f64,
    /// Friction coefficient while the contact slides
    pub dynamic_friction: f64,
    /// Density for mass calculation (kg/m²)
    pub density: f64,
}

impl Default for PhysicsMaterial {
    fn default() -> Self {
        Self {
            restitution: 0.5,
            static_friction: 0.6,
            dynamic_friction: 0.4,
            density: 1.0,
        }
    }
}

impl PhysicsMaterial {
    /// Create a new physics material
    pub fn new(restitution: f64, static_friction: f64, dynamic_friction: f64) -> Self {
        Self {
            restitution,
            static_friction,
            dynamic_friction,
            ..Default::default()
        }
    }

    /// Frictionless ice-like material
    pub fn ice() -> Self {
        Self {
            restitution: 0.05,
            static_friction: 0.05,
            dynamic_friction: 0.02,
            density: 0.9,
        }
    }

    /// Bouncy rubber-like material
    pub fn rubber() -> Self {
        Self {
            restitution: 0.8,
            static_friction: 1.0,
            dynamic_friction: 0.8,
            density: 1.1,
        }
    }

    /// Metal material
    pub fn metal() -> Self {
        Self {
            restitution: 0.2,
            static_friction: 0.4,
            dynamic_friction: 0.3,
            density: 7.8,
        }
    }

    /// Wood material
    pub fn wood() -> Self {
        Self {
            restitution: 0.3,
            static_friction: 0.6,
            dynamic_friction: 0.45,
            density: 0.6,
        }
    }

    /// Stone/concrete material
    pub fn stone() -> Self {
        Self {
            restitution: 0.1,
            static_friction: 0.8,
            dynamic_friction: 0.65,
            density: 2.5,
        }
    }

    /// Set restitution
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    /// Set both friction coefficients
    pub fn with_friction(mut self, static_friction: f64, dynamic_friction: f64) -> Self {
        self.static_friction = static_friction.max(0.0);
        self.dynamic_friction = dynamic_friction.max(0.0);
        self
    }

    /// Set density
    pub fn with_density(mut self, density: f64) -> Self {
        self.density = density.max(0.001);
        self
    }

    /// Check ranges: restitution in [0, 1], friction coefficients and density non-negative
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(format!("restitution {} outside [0, 1]", self.restitution));
        }
        if !(self.static_friction >= 0.0 && self.static_friction.is_finite()) {
            return Err(format!("static friction {} must be non-negative", self.static_friction));
        }
        if !(self.dynamic_friction >= 0.0 && self.dynamic_friction.is_finite()) {
            return Err(format!("dynamic friction {} must be non-negative", self.dynamic_friction));
        }
        if !(self.density > 0.0 && self.density.is_finite()) {
            return Err(format!("density {} must be positive", self.density));
        }
        Ok(())
    }
}

/// Overrides a body applies when it acts as the surface of a contact
///
/// When either body of a contact carries an override, the override wins over
/// the combined coefficient (the first body's override is checked first).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceOverride {
    pub restitution: Option<f64>,
    pub static_friction: Option<f64>,
    pub dynamic_friction: Option<f64>,
}

impl SurfaceOverride {
    /// True when no coefficient is overridden
    pub fn is_empty(&self) -> bool {
        self.restitution.is_none() && self.static_friction.is_none() && self.dynamic_friction.is_none()
    }

    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if let Some(e) = self.restitution {
            if !(0.0..=1.0).contains(&e) {
                return Err(format!("surface restitution {} outside [0, 1]", e));
            }
        }
        for mu in [self.static_friction, self.dynamic_friction].into_iter().flatten() {
            if !(mu >= 0.0 && mu.is_finite()) {
                return Err(format!("surface friction {} must be non-negative", mu));
            }
        }
        Ok(())
    }
}

/// Rule for combining material properties
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineRule {
    /// Use the average of both values
    #[default]
    Average,
    /// Use the minimum value
    Min,
    /// Use the maximum value
    Max,
    /// Multiply the values
    Multiply,
}

impl CombineRule {
    /// Combine two values using this rule
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Average => (a + b) * 0.5,
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::Multiply => a * b,
        }
    }
}

/// Effective coefficients of one contact pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactMaterial {
    pub restitution: f64,
    pub static_friction: f64,
    pub dynamic_friction: f64,
}

impl ContactMaterial {
    /// Combine two bodies' materials, letting surface overrides win
    pub fn combine(
        a: (&PhysicsMaterial, &SurfaceOverride),
        b: (&PhysicsMaterial, &SurfaceOverride),
        restitution_rule: CombineRule,
        friction_rule: CombineRule,
    ) -> Self {
        let (mat_a, over_a) = a;
        let (mat_b, over_b) = b;
        let pick = |x: Option<f64>, y: Option<f64>, combined: f64| x.or(y).unwrap_or(combined);

        Self {
            restitution: pick(
                over_a.restitution,
                over_b.restitution,
                restitution_rule.combine(mat_a.restitution, mat_b.restitution),
            ),
            static_friction: pick(
                over_a.static_friction,
                over_b.static_friction,
                friction_rule.combine(mat_a.static_friction, mat_b.static_friction),
            ),
            dynamic_friction: pick(
                over_a.dynamic_friction,
                over_b.dynamic_friction,
                friction_rule.combine(mat_a.dynamic_friction, mat_b.dynamic_friction),
            ),
        }
    }
}

pub(crate) fn validate_material(material: &PhysicsMaterial, id: crate::body::BodyId) -> Result<()> {
    material
        .validate()
        .map_err(|reason| PhysicsError::InvalidBody { id, reason })
}
