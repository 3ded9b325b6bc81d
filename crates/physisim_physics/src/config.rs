//! Physics configuration

use crate::error::{PhysicsError, Result};
use crate::material::CombineRule;
use physisim_math::Vec2;
use serde::{Deserialize, Serialize};

/// What to do when a tick produces NaN or infinite body state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaultPolicy {
    /// Discard the whole tick and return `PhysicsError::SimulationFault`
    #[default]
    Reject,
    /// Restore the offending body's pre-tick pose with zero velocity and report the fault
    Clamp,
}

/// Physics world configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicsConfig {
    /// Gravity acceleration (default: -9.81 in Y)
    pub gravity: Vec2,

    /// Whether gravity is applied at all
    pub gravity_enabled: bool,

    /// Fixed timestep used by `PhysicsWorld::advance`
    pub timestep: f64,

    /// Maximum number of fixed ticks run by a single `advance` call
    pub max_steps_per_frame: u32,

    /// Internal substeps per tick (1 = no sub-stepping)
    pub substeps: u32,

    /// Iteration cap for the velocity solver
    pub solver_iterations: usize,

    /// Largest impulse change in a solver pass below which the solver stops early
    pub convergence_tolerance: f64,

    /// Start each solve from the impulses the previous one ended with
    pub warm_starting: bool,

    /// Fraction of contact penetration removed per tick by position correction
    pub position_correction: f64,

    /// Penetration allowed before position correction kicks in
    pub penetration_slop: f64,

    /// Baumgarte factor for connector drift (bias = factor / dt * error)
    pub baumgarte: f64,

    /// Closing speed below which contacts do not bounce
    pub restitution_threshold: f64,

    /// Tangential speed below which a contact uses its static friction coefficient
    pub static_friction_threshold: f64,

    /// How the two bodies' restitution coefficients are combined
    pub restitution_combine: CombineRule,

    /// How the two bodies' friction coefficients are combined
    pub friction_combine: CombineRule,

    /// Handling of non-finite state produced by a tick
    pub fault_policy: FaultPolicy,

    /// Record per-force details (gravity, springs, external) in the step report
    pub record_forces: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec2::new(0.0, -9.81),
            gravity_enabled: true,
            timestep: 1.0 / 60.0,
            max_steps_per_frame: 4,
            substeps: 1,
            solver_iterations: 10,
            convergence_tolerance: 1e-7,
            warm_starting: true,
            position_correction: 0.2,
            penetration_slop: 0.005,
            baumgarte: 0.2,
            restitution_threshold: 0.5,
            static_friction_threshold: 0.01,
            restitution_combine: CombineRule::Min,
            friction_combine: CombineRule::Average,
            fault_policy: FaultPolicy::Reject,
            record_forces: false,
        }
    }
}

impl PhysicsConfig {
    /// Create a configuration for high-precision simulation
    pub fn high_precision() -> Self {
        Self {
            solver_iterations: 30,
            substeps: 4,
            convergence_tolerance: 1e-10,
            ..Default::default()
        }
    }

    /// Create a configuration for fast simulation (lower quality)
    pub fn fast() -> Self {
        Self {
            solver_iterations: 4,
            max_steps_per_frame: 2,
            ..Default::default()
        }
    }

    /// Set gravity
    pub fn with_gravity(mut self, x: f64, y: f64) -> Self {
        self.gravity = Vec2::new(x, y);
        self
    }

    /// Disable gravity
    pub fn without_gravity(mut self) -> Self {
        self.gravity_enabled = false;
        self
    }

    /// Set timestep
    pub fn with_timestep(mut self, timestep: f64) -> Self {
        self.timestep = timestep;
        self
    }

    /// Set solver iteration cap
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.solver_iterations = iterations;
        self
    }

    /// Enable or disable warm starting
    pub fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Set number of substeps per tick
    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.substeps = substeps.max(1);
        self
    }

    /// Set fault policy
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// Enable force detail recording
    pub fn with_force_recording(mut self, enabled: bool) -> Self {
        self.record_forces = enabled;
        self
    }

    /// Gravity actually applied this tick
    pub fn effective_gravity(&self) -> Vec2 {
        if self.gravity_enabled {
            self.gravity
        } else {
            Vec2::ZERO
        }
    }

    /// Check that every parameter is in range
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(PhysicsError::InvalidConfig(msg.to_string()));

        if !self.gravity.is_finite() {
            return invalid("gravity must be finite");
        }
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return invalid("timestep must be positive");
        }
        if self.max_steps_per_frame == 0 {
            return invalid("max_steps_per_frame must be at least 1");
        }
        if self.substeps == 0 {
            return invalid("substeps must be at least 1");
        }
        if self.solver_iterations == 0 {
            return invalid("solver_iterations must be at least 1");
        }
        if !(self.convergence_tolerance >= 0.0) {
            return invalid("convergence_tolerance must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.position_correction) {
            return invalid("position_correction must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.baumgarte) {
            return invalid("baumgarte must be in [0, 1]");
        }
        if !(self.penetration_slop >= 0.0
            && self.restitution_threshold >= 0.0
            && self.static_friction_threshold >= 0.0)
        {
            return invalid("thresholds must be non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(PhysicsConfig::default().validate().is_ok());
        assert!(PhysicsConfig::high_precision().validate().is_ok());
        assert!(PhysicsConfig::fast().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(PhysicsConfig::default().with_timestep(0.0).validate().is_err());
        assert!(PhysicsConfig::default().with_iterations(0).validate().is_err());
        let mut config = PhysicsConfig::default();
        config.position_correction = 1.5;
        assert!(config.validate().is_err());
        config = PhysicsConfig::default().with_gravity(f64::NAN, 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_steps_per_frame() {
        let config = PhysicsConfig {
            max_steps_per_frame: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(PhysicsError::InvalidConfig("max_steps_per_frame must be at least 1".to_string()))
        );
    }

    #[test]
    fn test_gravity_toggle() {
        let config = PhysicsConfig::default().without_gravity();
        assert_eq!(config.effective_gravity(), Vec2::ZERO);
    }

    #[test]
    fn test_substeps_never_zero() {
        assert_eq!(PhysicsConfig::default().with_substeps(0).substeps, 1);
    }
}
