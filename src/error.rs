//! Error types

use thiserror::Error;

use crate::engine::NodeId;
use crate::unit::ComponentDescriptor;

/// Errors from registration, instantiation, and parameter forwarding
#[derive(Debug, Error)]
pub enum Error {
    /// The external unit has not finished instantiating yet
    #[error("unit is not ready yet")]
    NotReady,

    /// The external unit failed to instantiate; the proxy is permanently down
    #[error("unit failed to instantiate: {reason}")]
    UnitFailed {
        /// Message carried over from the instantiation failure.
        reason: String,
    },

    /// No component is registered under this descriptor
    #[error("no component registered for {0}")]
    ComponentNotFound(ComponentDescriptor),

    /// A different component is already registered under this descriptor
    #[error("conflicting registration for {0}")]
    ConflictingRegistration(ComponentDescriptor),

    /// The component factory returned an error
    #[error("instantiation failed: {0}")]
    InstantiationFailed(String),

    /// The unit's parameter tree is missing an expected parameter
    #[error("parameter '{0}' not found in unit parameter tree")]
    MissingParameter(&'static str),

    /// A connection endpoint was never attached to the engine
    #[error("node {0:?} is not attached to the engine")]
    UnknownNode(NodeId),
}
