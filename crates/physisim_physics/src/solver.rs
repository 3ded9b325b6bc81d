//! Iterative sequential-impulse solver

use crate::integrator::SolverBody;
use serde::{Deserialize, Serialize};

/// A constraint that corrects body velocities with impulses
pub(crate) trait VelocityConstraint {
    /// Apply one corrective impulse using the current velocities
    ///
    /// Returns the magnitude of the impulse change made by this pass.
    fn solve_velocity(&mut self, bodies: &mut [SolverBody]) -> f64;

    /// Apply the impulse carried over from the previous solve
    fn warm_start(&mut self, _bodies: &mut [SolverBody]) {}
}

/// How the last solve went
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SolverStats {
    /// Passes performed over all constraints
    pub iterations: usize,
    /// Whether the impulse change dropped below tolerance before the cap
    pub converged: bool,
    /// Largest impulse change in the final pass
    pub residual: f64,
}

impl SolverStats {
    /// Fold another substep's statistics into these
    pub fn merge(&mut self, other: &SolverStats) {
        self.iterations += other.iterations;
        self.converged &= other.converged;
        self.residual = self.residual.max(other.residual);
    }
}

/// Gauss-Seidel style solver over joints and contacts
///
/// Constraints are visited in the order they are given: joints first in
/// connector order, then contacts in pair order. Impulses carried over from
/// the previous solve are applied once before the first pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConstraintSolver {
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl ConstraintSolver {
    pub fn new(max_iterations: usize, tolerance: f64) -> Self {
        Self {
            max_iterations,
            tolerance,
        }
    }

    pub fn solve<J, C>(&self, bodies: &mut [SolverBody], joints: &mut [J], contacts: &mut [C]) -> SolverStats
    where
        J: VelocityConstraint,
        C: VelocityConstraint,
    {
        if joints.is_empty() && contacts.is_empty() {
            return SolverStats {
                iterations: 0,
                converged: true,
                residual: 0.0,
            };
        }

        for joint in joints.iter_mut() {
            joint.warm_start(bodies);
        }
        for contact in contacts.iter_mut() {
            contact.warm_start(bodies);
        }

        let mut stats = SolverStats::default();
        for iteration in 1..=self.max_iterations {
            let mut residual: f64 = 0.0;
            for joint in joints.iter_mut() {
                residual = residual.max(joint.solve_velocity(bodies));
            }
            for contact in contacts.iter_mut() {
                residual = residual.max(contact.solve_velocity(bodies));
            }

            stats.iterations = iteration;
            stats.residual = residual;
            if residual < self.tolerance {
                stats.converged = true;
                break;
            }
        }

        if !stats.converged {
            log::debug!(
                "Solver stopped at {} iterations without converging (residual {:e})",
                stats.iterations,
                stats.residual
            );
        }
        stats
    }
}
