//! Builders for constructing configured state machines.

use crate::asynchronous::{AsyncFallback, AsyncStateMachine, DefaultAsyncNode};
use crate::builder::error::BuildError;
use crate::core::{
    validate_domain, Control, LifecyclePhase, State, TransitionLog, DEFAULT_HISTORY_CAPACITY,
};
use crate::error::HookError;
use crate::sync::{DefaultNode, FallbackFn, StateMachine};
use stillwater::validation::Validation;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Builder for a [`StateMachine`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use stagehand::builder::StateMachineBuilder;
/// use stagehand::core::{Control, LifecyclePhase};
/// use stagehand::state_enum;
///
/// state_enum! {
///     enum Door { Closed, Open }
/// }
///
/// let machine = StateMachineBuilder::new()
///     .fallback(|_: &Door, _: LifecyclePhase, _: &mut Control<'_, Door>| Ok(()))
///     .auto_register(true)
///     .build()
///     .unwrap();
///
/// assert!(machine.is_registered(&Door::Closed));
/// assert!(machine.is_registered(&Door::Open));
/// ```
pub struct StateMachineBuilder<S: State> {
    fallback: Option<FallbackFn<S>>,
    auto_register: bool,
    domain: Option<Vec<S>>,
    history_capacity: usize,
}

impl<S: State> StateMachineBuilder<S> {
    pub fn new() -> Self {
        Self {
            fallback: None,
            auto_register: false,
            domain: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    /// Callback the default hooks forward to.
    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: FnMut(&S, LifecyclePhase, &mut Control<'_, S>) -> Result<(), HookError> + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Register a [`DefaultNode`] for every state of the domain at build time.
    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    /// Replace `S::variants()` as the domain used by auto-registration.
    pub fn domain(mut self, states: Vec<S>) -> Self {
        self.domain = Some(states);
        self
    }

    /// Number of transitions kept in the machine's history (0 disables it).
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Build the machine, auto-registering nodes if requested.
    ///
    /// Fails if the domain is empty or repeats a state, or if a node's
    /// `Initialize` fails; nodes registered before the failure are finalized.
    pub fn build(self) -> Result<StateMachine<S>, BuildError> {
        let domain = if self.auto_register {
            Some(resolve_domain(self.domain)?)
        } else {
            None
        };

        let mut machine = StateMachine::from_parts(
            self.fallback,
            TransitionLog::with_capacity(self.history_capacity),
        );
        for state in domain.into_iter().flatten() {
            machine.register_node(state, DefaultNode)?;
        }
        debug!(machine = %machine.id(), "built state machine");
        Ok(machine)
    }
}

impl<S: State> Default for StateMachineBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for an [`AsyncStateMachine`].
///
/// Takes the same options as [`StateMachineBuilder`] plus the cancellation
/// token the loop observes.
pub struct AsyncStateMachineBuilder<S: State> {
    fallback: Option<Box<dyn AsyncFallback<S>>>,
    cancel: CancellationToken,
    auto_register: bool,
    domain: Option<Vec<S>>,
    history_capacity: usize,
}

impl<S: State> AsyncStateMachineBuilder<S> {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            fallback: None,
            cancel,
            auto_register: false,
            domain: None,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn fallback<F>(mut self, fallback: F) -> Self
    where
        F: AsyncFallback<S> + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn auto_register(mut self, enabled: bool) -> Self {
        self.auto_register = enabled;
        self
    }

    pub fn domain(mut self, states: Vec<S>) -> Self {
        self.domain = Some(states);
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn build(self) -> Result<AsyncStateMachine<S>, BuildError> {
        let domain = if self.auto_register {
            Some(resolve_domain(self.domain)?)
        } else {
            None
        };

        let mut machine = AsyncStateMachine::from_parts(
            self.fallback,
            self.cancel,
            TransitionLog::with_capacity(self.history_capacity),
        );
        for state in domain.into_iter().flatten() {
            machine.register_node(state, DefaultAsyncNode)?;
        }
        debug!(machine = %machine.id(), "built async state machine");
        Ok(machine)
    }
}

/// The explicit domain, or `S::variants()`, once validated.
fn resolve_domain<S: State>(explicit: Option<Vec<S>>) -> Result<Vec<S>, BuildError> {
    let domain = explicit.unwrap_or_else(S::variants);
    match validate_domain(&domain) {
        Validation::Success(()) => Ok(domain),
        Validation::Failure(errors) => Err(BuildError::InvalidDomain {
            violations: errors.iter().cloned().collect(),
        }),
    }
}
