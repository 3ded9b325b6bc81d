//! Error types for the physics engine

use crate::body::BodyId;
use crate::connector::ConnectorId;
use thiserror::Error;

/// Physics engine errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// Degenerate or otherwise unusable geometry
    #[error("Invalid shape: {0}")]
    InvalidShape(String),

    /// Body properties out of range
    #[error("Invalid body {id:?}: {reason}")]
    InvalidBody { id: BodyId, reason: String },

    /// Two bodies in the same tick share an id
    #[error("Duplicate body id: {0:?}")]
    DuplicateBody(BodyId),

    /// Connector parameters out of range
    #[error("Invalid connector {id:?}: {reason}")]
    InvalidConnector { id: ConnectorId, reason: String },

    /// Two connectors in the same tick share an id
    #[error("Duplicate connector id: {0:?}")]
    DuplicateConnector(ConnectorId),

    /// Connector references a body that is not part of the tick
    #[error("Connector {connector:?} references unknown body {body:?}")]
    UnknownBody { connector: ConnectorId, body: BodyId },

    /// Snapshot references a body or connector that is not present
    #[error("Snapshot entry not found: {0}")]
    SnapshotMismatch(String),

    /// Invalid configuration
    #[error("Invalid physics configuration: {0}")]
    InvalidConfig(String),

    /// Timestep must be positive and finite
    #[error("Invalid timestep: {0}")]
    InvalidTimestep(f64),

    /// A tick produced non-finite state and was discarded
    #[error("Simulation fault on body {body:?}: non-finite {quantity}")]
    SimulationFault { body: BodyId, quantity: &'static str },
}

/// Result type for physics operations
pub type Result<T> = std::result::Result<T, PhysicsError>;
