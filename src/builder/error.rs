//! Build errors for state machine builders.

use crate::core::DomainViolation;
use crate::error::MachineError;
use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(
        "Invalid state domain: {}",
        .violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
    )]
    InvalidDomain { violations: Vec<DomainViolation> },

    /// Auto-registering a node failed, usually in its `Initialize` hook.
    #[error("Auto-registration failed: {0}")]
    Machine(#[from] MachineError),
}
