//! Physics world - per-tick step orchestration

use crate::body::{Body, BodyId};
use crate::broad_phase::{compute_aabbs, find_pairs};
use crate::config::{FaultPolicy, PhysicsConfig};
use crate::connector::{Connector, ConnectorId};
use crate::contact::{correct_positions, ContactConstraint, ContactSettings};
use crate::error::{PhysicsError, Result};
use crate::events::{CollisionEvent, ContactTracker, PhysicsEvent, PhysicsEventHandler};
use crate::forces::{accumulate_springs, ForceDetail, ForceKind, ForceRequest, ForceSource, NoExternalForces, StepContext};
use crate::integrator::{integrate_positions, integrate_velocities, SolverBody};
use crate::joint::JointConstraint;
use crate::layers::{BodyPair, PairFilter};
use crate::manifold::ContactManifold;
use crate::material::ContactMaterial;
use crate::narrow_phase::collide;
use crate::query::PhysicsQuery;
use crate::snapshot::SimulationSnapshot;
use crate::solver::{ConstraintSolver, SolverStats};
use crate::warm_start::ImpulseCache;
use crossbeam_channel::{Receiver, Sender};
use physisim_math::{Transform2, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Reaction of one connector during a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConnectorReaction {
    pub connector: ConnectorId,
    /// Largest force magnitude the connector exerted during the tick
    pub force: f64,
    /// Whether the connector acted at all (slack ropes do not)
    pub active: bool,
}

/// Non-finite state that was clamped away under `FaultPolicy::Clamp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultReport {
    pub body: BodyId,
    pub quantity: String,
}

/// Outcome of one simulated tick
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Index of the tick that was simulated
    pub tick: u64,
    /// Simulation time at the end of the tick
    pub time: f64,
    pub dt: f64,
    /// Touching pairs, in pair order
    pub manifolds: Vec<ContactManifold>,
    /// Collision transitions followed by connector breakages
    pub events: Vec<PhysicsEvent>,
    /// Connectors that broke this tick
    pub broken: Vec<ConnectorId>,
    pub reactions: Vec<ConnectorReaction>,
    pub solver: SolverStats,
    pub faults: Vec<FaultReport>,
    /// Only filled when force recording is enabled
    pub forces: Vec<ForceDetail>,
}

impl StepReport {
    /// Collision events of this tick
    pub fn collision_events(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.iter().filter_map(|e| match e {
            PhysicsEvent::Collision(collision) => Some(collision),
            PhysicsEvent::ConnectorBroken { .. } => None,
        })
    }

    /// Reaction of a connector, if it took part in the tick
    pub fn reaction(&self, connector: ConnectorId) -> Option<&ConnectorReaction> {
        self.reactions.iter().find(|r| r.connector == connector)
    }

    /// Feed every event to a handler in order
    pub fn dispatch(&self, handler: &mut dyn PhysicsEventHandler) {
        for event in &self.events {
            handler.handle(event);
        }
    }
}

/// Validated per-tick lookup tables
struct TickInput {
    /// Body indices of each connector's endpoints; `None` for broken connectors
    endpoints: Vec<Option<(usize, usize)>>,
    /// Body index pairs that must not collide because a connector joins them
    excluded: BTreeSet<(usize, usize)>,
}

/// The step orchestrator
///
/// Bodies and connectors belong to the caller and are only borrowed for the
/// duration of a call. The world keeps configuration, the pair filter, the
/// contact cache used for begin/end events, the impulses carried into the
/// next tick's solve, the clock and event subscribers.
pub struct PhysicsWorld {
    /// Configuration
    config: PhysicsConfig,

    /// Explicitly disabled collision pairs
    pair_filter: PairFilter,

    /// Pairs touching at the end of the previous tick
    contacts: ContactTracker,

    /// Solver impulses from the last committed tick
    impulses: ImpulseCache,

    /// Live event subscribers
    subscribers: Vec<Sender<PhysicsEvent>>,

    /// Simulation time in seconds
    time: f64,

    /// Ticks simulated so far
    tick: u64,

    /// Accumulated time for fixed timestep
    accumulated_time: f64,
}

impl PhysicsWorld {
    /// Create a new physics world
    pub fn new(config: PhysicsConfig) -> Self {
        Self {
            config,
            pair_filter: PairFilter::new(),
            contacts: ContactTracker::default(),
            impulses: ImpulseCache::default(),
            subscribers: Vec::new(),
            time: 0.0,
            tick: 0,
            accumulated_time: 0.0,
        }
    }

    /// Get the physics configuration
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Replace the configuration; checked on the next tick
    pub fn set_config(&mut self, config: PhysicsConfig) {
        self.config = config;
    }

    /// Set gravity
    pub fn set_gravity(&mut self, x: f64, y: f64) {
        self.config.gravity = Vec2::new(x, y);
    }

    /// Get gravity
    pub fn gravity(&self) -> Vec2 {
        self.config.gravity
    }

    /// Switch gravity on or off without losing its vector
    pub fn toggle_gravity(&mut self, enabled: bool) {
        self.config.gravity_enabled = enabled;
    }

    /// Simulation time in seconds
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Ticks simulated so far
    pub fn tick(&self) -> u64 {
        self.tick
    }

    // ==================== Collision Filtering ====================

    /// Stop two bodies from colliding with each other
    pub fn disable_collision(&mut self, a: BodyId, b: BodyId) {
        self.pair_filter.disable(a, b);
    }

    /// Allow two bodies to collide again
    pub fn enable_collision(&mut self, a: BodyId, b: BodyId) {
        self.pair_filter.enable(a, b);
    }

    pub fn pair_filter(&self) -> &PairFilter {
        &self.pair_filter
    }

    pub fn pair_filter_mut(&mut self) -> &mut PairFilter {
        &mut self.pair_filter
    }

    // ==================== Events ====================

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> Receiver<PhysicsEvent> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        self.subscribers.push(sender);
        receiver
    }

    /// Number of pairs that were touching after the last tick
    pub fn touching_pairs(&self) -> usize {
        self.contacts.len()
    }

    fn broadcast(&mut self, events: &[PhysicsEvent]) {
        if events.is_empty() {
            return;
        }
        // Drop subscribers whose receiver is gone
        self.subscribers
            .retain(|sender| events.iter().all(|event| sender.send(event.clone()).is_ok()));
    }

    // ==================== Snapshots ====================

    /// Capture the current state
    pub fn snapshot(&self, bodies: &[Body], connectors: &[Connector]) -> SimulationSnapshot {
        SimulationSnapshot::capture(self.time, self.tick, bodies, connectors)
    }

    /// Restore state and clock; derived contact and solver state is discarded
    pub fn restore(
        &mut self,
        snapshot: &SimulationSnapshot,
        bodies: &mut [Body],
        connectors: &mut [Connector],
    ) -> Result<()> {
        snapshot.restore_into(bodies, connectors)?;
        self.time = snapshot.time;
        self.tick = snapshot.tick;
        self.accumulated_time = 0.0;
        self.contacts.clear();
        self.impulses.clear();
        log::debug!("Restored snapshot at tick {} (t = {:.4}s)", snapshot.tick, snapshot.time);
        Ok(())
    }

    // ==================== Queries ====================

    /// Get a query interface for picking and raycasting
    pub fn query<'a>(&self, bodies: &'a [Body]) -> PhysicsQuery<'a> {
        PhysicsQuery::new(bodies)
    }

    // ==================== Simulation ====================

    /// Run as many fixed ticks as `frame_time` allows
    ///
    /// Leftover time is carried into the next call. At most
    /// `max_steps_per_frame` ticks run; any further backlog is dropped.
    pub fn advance<F>(
        &mut self,
        bodies: &mut [Body],
        connectors: &mut [Connector],
        frame_time: f64,
        forces: &mut F,
    ) -> Result<Vec<StepReport>>
    where
        F: ForceSource + ?Sized,
    {
        self.config.validate()?;
        if !(frame_time.is_finite() && frame_time >= 0.0) {
            return Err(PhysicsError::InvalidTimestep(frame_time));
        }
        let timestep = self.config.timestep;
        let max_steps = self.config.max_steps_per_frame as usize;
        self.accumulated_time += frame_time;

        let mut reports = Vec::new();
        while self.accumulated_time >= timestep && reports.len() < max_steps {
            reports.push(self.simulate(bodies, connectors, timestep, forces)?);
            self.accumulated_time -= timestep;
        }

        if self.accumulated_time >= timestep {
            log::debug!(
                "Dropping {:.4}s of simulation backlog after {} steps",
                self.accumulated_time - timestep,
                reports.len()
            );
            self.accumulated_time %= timestep;
        }
        Ok(reports)
    }

    /// Simulate one tick without external forces
    pub fn step(&mut self, bodies: &mut [Body], connectors: &mut [Connector], dt: f64) -> Result<StepReport> {
        self.simulate(bodies, connectors, dt, &mut NoExternalForces)
    }

    /// Simulate one tick
    ///
    /// The whole input is validated first; any error aborts the tick with
    /// nothing changed. On success every body is advanced by `dt`, force
    /// accumulators are cleared, broken connectors are flagged and events
    /// are sent to subscribers.
    pub fn simulate<F>(
        &mut self,
        bodies: &mut [Body],
        connectors: &mut [Connector],
        dt: f64,
        forces: &mut F,
    ) -> Result<StepReport>
    where
        F: ForceSource + ?Sized,
    {
        self.config.validate()?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(PhysicsError::InvalidTimestep(dt));
        }
        let input = validate_input(bodies, connectors)?;

        let ctx = StepContext {
            time: self.time,
            tick: self.tick,
            dt,
        };
        let mut requests = Vec::with_capacity(bodies.len());
        for body in bodies.iter() {
            let request = if body.is_fixed { None } else { forces.forces(body, &ctx) };
            if request.is_some_and(|r| !r.is_finite()) {
                return Err(PhysicsError::InvalidBody {
                    id: body.id,
                    reason: "external force must be finite".to_string(),
                });
            }
            requests.push(request);
        }

        let mut report = StepReport {
            tick: self.tick,
            dt,
            ..Default::default()
        };
        let mut scratch = self.accumulate_forces(bodies, &requests, &mut report.forces);

        let substeps = self.config.substeps;
        let h = dt / substeps as f64;
        let solver = ConstraintSolver::new(self.config.solver_iterations, self.config.convergence_tolerance);
        let settings = ContactSettings {
            restitution_threshold: self.config.restitution_threshold,
            static_friction_threshold: self.config.static_friction_threshold,
        };

        let mut reactions: Vec<Option<ConnectorReaction>> = vec![None; connectors.len()];
        let mut touching: BTreeMap<BodyPair, ContactManifold> = BTreeMap::new();
        let mut stats: Option<SolverStats> = None;
        let warm_starting = self.config.warm_starting;
        let mut impulses = if warm_starting {
            self.impulses.clone()
        } else {
            ImpulseCache::default()
        };

        for substep in 0..substeps {
            // Springs act as forces re-evaluated from the current pose
            let springs = accumulate_springs(connectors, &input.endpoints, &mut scratch);
            for (index, spring) in &springs {
                record_reaction(&mut reactions, connectors[*index].id, *index, spring.tension.abs(), true);
                if self.config.record_forces && substep == 0 {
                    let connector = &connectors[*index];
                    report.forces.push(ForceDetail {
                        body: connector.body_a,
                        force: spring.force_on_a,
                        application_point_local: connector.anchor_a,
                        kind: ForceKind::Spring(connector.id),
                    });
                    report.forces.push(ForceDetail {
                        body: connector.body_b,
                        force: -spring.force_on_a,
                        application_point_local: connector.anchor_b,
                        kind: ForceKind::Spring(connector.id),
                    });
                }
            }

            integrate_velocities(&mut scratch, h);

            let (pairs, mut manifolds) = self.detect_contacts(bodies, &scratch, &input.excluded);

            let ratio = impulses.ratio(h);
            let mut joints: Vec<JointConstraint> = connectors
                .iter()
                .enumerate()
                .filter_map(|(index, connector)| {
                    let ends = input.endpoints[index]?;
                    let warm = impulses.joint(connector.id).map(|j| j.scaled(ratio));
                    JointConstraint::new(index, connector, ends, &scratch, self.config.baumgarte, h, warm)
                })
                .collect();

            let mut contacts: Vec<ContactConstraint> = manifolds
                .iter()
                .enumerate()
                .filter(|(_, m)| !m.is_sensor)
                .map(|(index, manifold)| {
                    let (a, b) = pairs[index];
                    let material = ContactMaterial::combine(
                        (&bodies[a].material, &bodies[a].surface),
                        (&bodies[b].material, &bodies[b].surface),
                        self.config.restitution_combine,
                        self.config.friction_combine,
                    );
                    let warm = impulses
                        .contact(manifold.body_a, manifold.body_b, manifold.normal)
                        .map(|cached| (cached, ratio));
                    ContactConstraint::new(index, manifold, (a, b), &scratch, &material, &settings, warm)
                })
                .collect();

            let substep_stats = solver.solve(&mut scratch, &mut joints, &mut contacts);
            stats = Some(match stats {
                Some(mut total) => {
                    total.merge(&substep_stats);
                    total
                }
                None => substep_stats,
            });

            let mut next = ImpulseCache::new(h);
            for contact in &contacts {
                let manifold = &mut manifolds[contact.manifold];
                contact.store_impulses(manifold);
                next.insert_contact(manifold.body_b, contact.cached(manifold.body_a, &scratch));
            }
            for joint in &joints {
                let connector = &connectors[joint.connector];
                next.insert_joint(connector.id, joint.accumulated());
                record_reaction(
                    &mut reactions,
                    connector.id,
                    joint.connector,
                    joint.impulse_magnitude() / h,
                    joint.is_engaged(),
                );
            }

            if warm_starting {
                impulses = next;
            }

            correct_positions(
                &manifolds,
                &pairs,
                &mut scratch,
                self.config.position_correction,
                self.config.penetration_slop,
            );
            integrate_positions(&mut scratch, h);

            for manifold in manifolds {
                touching.insert(BodyPair::new(manifold.body_a, manifold.body_b), manifold);
            }
        }

        report.faults = self.check_faults(bodies, &mut scratch)?;

        // Connectors still act during the tick they break in
        let mut breaking = Vec::new();
        for (index, reaction) in reactions.iter().enumerate() {
            let Some(reaction) = reaction else {
                continue;
            };
            if connectors[index].break_threshold.is_some_and(|t| reaction.force > t) {
                breaking.push(index);
                report.broken.push(reaction.connector);
            }
        }
        report.reactions = reactions.into_iter().flatten().collect();

        // Commit
        for (body, state) in bodies.iter_mut().zip(&scratch) {
            if !body.is_fixed {
                state.commit(body);
            }
            body.clear_forces();
        }
        self.impulses = impulses;
        for index in breaking {
            let connector = &mut connectors[index];
            log::warn!(
                "Connector {} ({}) broke at tick {} (threshold {:?})",
                connector.id,
                connector.kind.name(),
                self.tick,
                connector.break_threshold
            );
            connector.is_broken = true;
        }

        report.manifolds = touching.into_values().collect();
        report.solver = stats.unwrap_or(SolverStats {
            iterations: 0,
            converged: true,
            residual: 0.0,
        });

        report.events = self
            .contacts
            .update(&report.manifolds)
            .into_iter()
            .map(PhysicsEvent::Collision)
            .collect();
        for id in &report.broken {
            let reaction = report.reaction(*id).map_or(0.0, |r| r.force);
            report.events.push(PhysicsEvent::ConnectorBroken {
                connector: *id,
                reaction,
            });
        }

        self.tick += 1;
        self.time += dt;
        report.time = self.time;

        log::trace!(
            "Tick {}: {} manifolds, {} solver iterations, {} events",
            report.tick,
            report.manifolds.len(),
            report.solver.iterations,
            report.events.len()
        );

        let events = std::mem::take(&mut report.events);
        self.broadcast(&events);
        report.events = events;
        Ok(report)
    }

    /// Gravity, caller-accumulated and external forces into scratch state
    fn accumulate_forces(
        &self,
        bodies: &[Body],
        requests: &[Option<ForceRequest>],
        details: &mut Vec<ForceDetail>,
    ) -> Vec<SolverBody> {
        let gravity = self.config.effective_gravity();
        let record = self.config.record_forces;

        bodies
            .iter()
            .zip(requests)
            .map(|(body, request)| {
                let mut state = SolverBody::from_body(body);
                if body.is_fixed {
                    state.force = Vec2::ZERO;
                    state.torque = 0.0;
                    return state;
                }

                if record && (body.force != Vec2::ZERO || body.torque != 0.0) {
                    details.push(ForceDetail {
                        body: body.id,
                        force: body.force,
                        application_point_local: Vec2::ZERO,
                        kind: ForceKind::Applied,
                    });
                }

                let weight = gravity * (body.mass * body.gravity_scale);
                state.force += weight;
                if record && weight != Vec2::ZERO {
                    details.push(ForceDetail {
                        body: body.id,
                        force: weight,
                        application_point_local: Vec2::ZERO,
                        kind: ForceKind::Gravity,
                    });
                }

                if let Some(request) = request {
                    state.force += request.force;
                    state.torque += request.torque;
                    state.linear_velocity += request.impulse * state.inv_mass;
                    state.angular_velocity += request.angular_impulse * state.inv_inertia;
                    if record && request.force != Vec2::ZERO {
                        details.push(ForceDetail {
                            body: body.id,
                            force: request.force,
                            application_point_local: Vec2::ZERO,
                            kind: ForceKind::External,
                        });
                    }
                }
                state
            })
            .collect()
    }

    /// Broad phase, filtering and narrow phase over the current scratch poses
    fn detect_contacts(
        &self,
        bodies: &[Body],
        scratch: &[SolverBody],
        excluded: &BTreeSet<(usize, usize)>,
    ) -> (Vec<(usize, usize)>, Vec<ContactManifold>) {
        let poses: Vec<Transform2> = scratch
            .iter()
            .map(|s| Transform2::from_position_angle(s.position, s.angle))
            .collect();
        let aabbs = compute_aabbs(bodies, &poses);

        let mut pairs = Vec::new();
        let mut manifolds = Vec::new();
        for (i, j) in find_pairs(&aabbs) {
            let (a, b) = (&bodies[i], &bodies[j]);
            if a.is_fixed && b.is_fixed {
                continue;
            }
            if !a.groups.can_collide(&b.groups)
                || self.pair_filter.is_disabled(a.id, b.id)
                || excluded.contains(&(i, j))
            {
                continue;
            }
            let Some(hit) = collide(&a.shape, &poses[i], &b.shape, &poses[j]) else {
                continue;
            };
            pairs.push((i, j));
            manifolds.push(ContactManifold {
                body_a: a.id,
                body_b: b.id,
                normal: hit.normal,
                penetration: hit.penetration,
                points: hit.points,
                is_sensor: a.is_sensor || b.is_sensor,
            });
        }

        log::trace!("Narrow phase produced {} manifolds", manifolds.len());
        (pairs, manifolds)
    }

    /// Apply the fault policy to non-finite scratch state
    fn check_faults(&self, bodies: &[Body], scratch: &mut [SolverBody]) -> Result<Vec<FaultReport>> {
        let mut faults = Vec::new();
        for (body, state) in bodies.iter().zip(scratch.iter_mut()) {
            let Some(quantity) = state.non_finite_quantity() else {
                continue;
            };
            log::warn!("Non-finite {} on {} at tick {}", quantity, body.id, self.tick);
            match self.config.fault_policy {
                FaultPolicy::Reject => {
                    return Err(PhysicsError::SimulationFault { body: body.id, quantity });
                }
                FaultPolicy::Clamp => {
                    state.position = body.position;
                    state.angle = body.angle;
                    state.linear_velocity = Vec2::ZERO;
                    state.angular_velocity = 0.0;
                    faults.push(FaultReport {
                        body: body.id,
                        quantity: quantity.to_string(),
                    });
                }
            }
        }
        Ok(faults)
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

/// Keep the largest reaction seen for a connector across substeps
fn record_reaction(
    reactions: &mut [Option<ConnectorReaction>],
    connector: ConnectorId,
    index: usize,
    force: f64,
    active: bool,
) {
    let entry = reactions[index].get_or_insert(ConnectorReaction {
        connector,
        force: 0.0,
        active: false,
    });
    entry.force = entry.force.max(force);
    entry.active |= active;
}

/// Check bodies and connectors before anything is touched
fn validate_input(bodies: &[Body], connectors: &[Connector]) -> Result<TickInput> {
    let mut index: HashMap<BodyId, usize> = HashMap::with_capacity(bodies.len());
    for (i, body) in bodies.iter().enumerate() {
        body.validate()?;
        if index.insert(body.id, i).is_some() {
            return Err(PhysicsError::DuplicateBody(body.id));
        }
    }

    let mut seen = BTreeSet::new();
    let mut endpoints = Vec::with_capacity(connectors.len());
    let mut excluded = BTreeSet::new();
    for connector in connectors {
        connector.validate()?;
        if !seen.insert(connector.id) {
            return Err(PhysicsError::DuplicateConnector(connector.id));
        }
        let lookup = |body: BodyId| {
            index.get(&body).copied().ok_or(PhysicsError::UnknownBody {
                connector: connector.id,
                body,
            })
        };
        let a = lookup(connector.body_a)?;
        let b = lookup(connector.body_b)?;

        if connector.is_broken {
            endpoints.push(None);
            continue;
        }
        if !connector.collide_connected {
            excluded.insert((a.min(b), a.max(b)));
        }
        endpoints.push(Some((a, b)));
    }

    Ok(TickInput { endpoints, excluded })
}
