//! PhysiSim Physics - Deterministic 2D Rigid-Body Engine
//!
//! Fixed-timestep simulation of convex polygons and circles joined by
//! springs, rods, ropes and revolute joints.
//!
//! # Features
//!
//! - Semi-implicit Euler integration with optional substeps
//! - Sort-and-sweep broad phase, SAT narrow phase with edge clipping
//! - Warm-started sequential impulses; two-point contacts solved as a block
//! - Restitution and Coulomb friction
//! - Breakable connectors with reaction reporting
//! - Sensors, collision groups and per-pair filtering
//! - Collision and breakage events over channels
//! - Serializable snapshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 PhysicsWorld                    │
//! │  ┌──────────┐  ┌─────────────┐  ┌────────────┐  │
//! │  │  Forces  │  │ Broad phase │  │ Narrow/SAT │  │
//! │  └──────────┘  └─────────────┘  └────────────┘  │
//! │  ┌─────────────────────────────────────────────┐│
//! │  │        ConstraintSolver                     ││
//! │  │  (warm start, joints, contacts, correction) ││
//! │  └─────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────┘
//!                        │
//!         ┌──────────────┼──────────────┐
//!         ▼              ▼              ▼
//!    ┌─────────┐   ┌───────────┐   ┌──────────┐
//!    │  Body   │   │ Connector │   │  Events  │
//!    └─────────┘   └───────────┘   └──────────┘
//! ```
//!
//! The caller owns bodies and connectors; the world borrows them for each
//! tick and writes back only when the whole tick succeeded.
//!
//! # Example
//!
//! ```
//! use physisim_physics::prelude::*;
//!
//! let mut world = PhysicsWorld::new(PhysicsConfig::default());
//!
//! let ground = BodyDesc::fixed(Shape::rectangle(20.0, 1.0)?)
//!     .with_position(0.0, -0.5)
//!     .build(BodyId(1))?;
//! let ball = BodyDesc::dynamic(Shape::circle(0.5)?)
//!     .with_position(0.0, 5.0)
//!     .build(BodyId(2))?;
//! let mut bodies = vec![ground, ball];
//!
//! for _ in 0..120 {
//!     world.step(&mut bodies, &mut [], 1.0 / 60.0)?;
//! }
//! assert!(bodies[1].position.y < 5.0);
//! # Ok::<(), PhysicsError>(())
//! ```

pub mod body;
pub mod broad_phase;
pub mod config;
pub mod connector;
mod contact;
pub mod error;
pub mod events;
pub mod forces;
mod integrator;
mod joint;
pub mod layers;
pub mod manifold;
pub mod material;
pub mod narrow_phase;
pub mod query;
pub mod shape;
pub mod snapshot;
pub mod solver;
mod warm_start;
pub mod world;

pub mod prelude {
    //! Common imports for physics functionality
    pub use crate::body::{Body, BodyDesc, BodyId, BodyState};
    pub use crate::config::{FaultPolicy, PhysicsConfig};
    pub use crate::connector::{Connector, ConnectorId, ConnectorKind, ConnectorState};
    pub use crate::error::{PhysicsError, Result};
    pub use crate::events::{CollisionEvent, CollisionEventType, ContactData, EventCollector, PhysicsEvent, PhysicsEventHandler};
    pub use crate::forces::{ForceDetail, ForceKind, ForceRequest, ForceSource, NoExternalForces, StepContext};
    pub use crate::layers::{BodyPair, CollisionGroups, CollisionLayer};
    pub use crate::manifold::{ContactManifold, ContactPoint};
    pub use crate::material::{CombineRule, PhysicsMaterial, SurfaceOverride};
    pub use crate::query::{PhysicsQuery, QueryOptions, RaycastHit};
    pub use crate::shape::{Circle, Polygon, Shape};
    pub use crate::snapshot::SimulationSnapshot;
    pub use crate::solver::SolverStats;
    pub use crate::world::{ConnectorReaction, FaultReport, PhysicsWorld, StepReport};
    pub use physisim_math::Vec2;
}

pub use prelude::*;
