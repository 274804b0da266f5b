//! Errors raised while driving a state machine.

use crate::core::LifecyclePhase;
use thiserror::Error;

/// Failure raised from inside a node hook or fallback callback.
///
/// Boxed so hooks can propagate any error with `?`.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while registering nodes or running the loop.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("State '{state}' has no registered node")]
    UnknownState { state: String },

    #[error("{phase} hook for state '{state}' failed: {source}")]
    Hook {
        state: String,
        phase: LifecyclePhase,
        #[source]
        source: HookError,
    },

    #[error("State machine loop has already been started")]
    AlreadyStarted,

    #[error("State machine loop has not been started")]
    NotStarted,

    #[error("Fallback for state '{state}' suspended during {phase}; it must complete without awaiting")]
    Suspended { state: String, phase: LifecyclePhase },

    #[error("State machine {machine} is gone")]
    Detached { machine: uuid::Uuid },
}

impl MachineError {
    pub(crate) fn unknown(state: &impl crate::core::State) -> Self {
        Self::UnknownState {
            state: state.name().to_string(),
        }
    }

    pub(crate) fn hook(
        state: &impl crate::core::State,
        phase: LifecyclePhase,
        source: HookError,
    ) -> Self {
        Self::Hook {
            state: state.name().to_string(),
            phase,
            source,
        }
    }

    pub(crate) fn suspended(state: &impl crate::core::State, phase: LifecyclePhase) -> Self {
        Self::Suspended {
            state: state.name().to_string(),
            phase,
        }
    }

    /// True for `UnknownState`, including one raised by a hook that
    /// requested a transition to an unregistered state.
    pub fn is_unknown_state(&self) -> bool {
        match self {
            Self::UnknownState { .. } => true,
            Self::Hook { source, .. } => source
                .downcast_ref::<MachineError>()
                .is_some_and(MachineError::is_unknown_state),
            _ => false,
        }
    }
}
