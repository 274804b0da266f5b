//! Cooperative state machine driven one iteration per host tick.

use super::node::{dispatch, FallbackFn, NodeContext, StateNode};
use crate::core::registry::Registry;
use crate::core::{
    request_transition, Control, Cursor, LifecyclePhase, LoopStatus, State, Step, TransitionLog,
};
use crate::error::MachineError;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Single-threaded lifecycle state machine.
///
/// The loop is resumable: [`start`](Self::start) schedules the initial
/// state and each [`step`](Self::step) runs exactly one iteration, so a
/// host scheduler (a frame loop, a tick timer) drives it one step per tick
/// and may request transitions or shutdown between steps. Hooks may do the
/// same from inside an iteration; requests take effect at the next one.
///
/// Nodes still registered when the machine is dropped are finalized; use
/// [`teardown`](Self::teardown) to observe finalization failures.
///
/// # Example
///
/// ```rust
/// use stagehand::core::{Control, LifecyclePhase};
/// use stagehand::sync::{DefaultNode, StateMachine};
/// use stagehand::state_enum;
///
/// state_enum! {
///     enum Boot { Load, Run }
/// }
///
/// let mut machine = StateMachine::with_fallback(
///     |state: &Boot, phase: LifecyclePhase, control: &mut Control<'_, Boot>| {
///         match (state, phase) {
///             (Boot::Load, LifecyclePhase::Enter) => control.request_transition(Boot::Run)?,
///             (Boot::Run, LifecyclePhase::Update) => control.shutdown(),
///             _ => {}
///         }
///         Ok(())
///     },
/// );
/// machine.register_node(Boot::Load, DefaultNode).unwrap();
/// machine.register_node(Boot::Run, DefaultNode).unwrap();
///
/// machine.run_loop(Boot::Load).unwrap();
/// assert_eq!(machine.previous(), Some(&Boot::Load));
/// assert_eq!(machine.current(), Some(&Boot::Run));
/// ```
pub struct StateMachine<S: State> {
    id: Uuid,
    registry: Registry<S, Box<dyn StateNode<S>>>,
    cursor: Cursor<S>,
    fallback: Option<FallbackFn<S>>,
    status: LoopStatus,
    history: TransitionLog<S>,
}

impl<S: State> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: State> StateMachine<S> {
    /// Create an empty machine without a fallback callback.
    pub fn new() -> Self {
        Self::from_parts(None, TransitionLog::default())
    }

    /// Create an empty machine whose default hooks forward to `fallback`.
    pub fn with_fallback<F>(fallback: F) -> Self
    where
        F: FnMut(&S, LifecyclePhase, &mut Control<'_, S>) -> Result<(), crate::HookError>
            + 'static,
    {
        Self::from_parts(Some(Box::new(fallback)), TransitionLog::default())
    }

    pub(crate) fn from_parts(fallback: Option<FallbackFn<S>>, history: TransitionLog<S>) -> Self {
        Self {
            id: Uuid::new_v4(),
            registry: Registry::default(),
            cursor: Cursor::default(),
            fallback,
            status: LoopStatus::Idle,
            history,
        }
    }

    /// Identifier attached to this machine's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> LoopStatus {
        self.status
    }

    pub fn previous(&self) -> Option<&S> {
        self.cursor.previous()
    }

    pub fn current(&self) -> Option<&S> {
        self.cursor.current()
    }

    pub fn next(&self) -> Option<&S> {
        self.cursor.next()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cursor.shutdown_requested()
    }

    pub fn is_registered(&self, state: &S) -> bool {
        self.registry.contains(state)
    }

    /// Registered states, in registration order.
    pub fn registered_states(&self) -> impl Iterator<Item = &S> {
        self.registry.states().iter()
    }

    pub fn history(&self) -> &TransitionLog<S> {
        &self.history
    }

    /// Bind `node` to `state` and deliver `Initialize` to it.
    ///
    /// A state that is already bound has its old node finalized and
    /// replaced in place. If that finalize fails the old node is released,
    /// the new node is not installed, and the error is returned. A node whose
    /// `Initialize` fails is removed again without being finalized.
    pub fn register_node<N>(&mut self, state: S, node: N) -> Result<(), MachineError>
    where
        N: StateNode<S> + 'static,
    {
        if self.registry.contains(&state) {
            warn!(
                machine = %self.id,
                state = state.name(),
                "state already has a node, finalizing and replacing it"
            );
            if let Err(error) = self.invoke(&state, LifecyclePhase::Finalize) {
                self.registry.remove(&state);
                return Err(error);
            }
        }

        self.registry.insert(state.clone(), Box::new(node));
        debug!(machine = %self.id, state = state.name(), "registered state node");

        if let Err(error) = self.invoke(&state, LifecyclePhase::Initialize) {
            self.registry.remove(&state);
            return Err(error);
        }
        Ok(())
    }

    /// Finalize and remove the node bound to `state`.
    ///
    /// Returns `Ok(false)` when nothing was bound. The node is released even
    /// if its `Finalize` fails.
    pub fn unregister_node(&mut self, state: &S) -> Result<bool, MachineError> {
        if !self.registry.contains(state) {
            return Ok(false);
        }

        let finalized = self.invoke(state, LifecyclePhase::Finalize);
        self.registry.remove(state);
        debug!(machine = %self.id, state = state.name(), "unregistered state node");
        finalized.map(|_| true)
    }

    /// Schedule a transition; it happens at the next iteration boundary.
    pub fn request_transition(&mut self, state: S) -> Result<(), MachineError> {
        request_transition(self.registry.states(), &mut self.cursor, state)
    }

    /// Request an orderly stop: the next iteration exits the current state
    /// and terminates the loop. Idempotent.
    pub fn shutdown(&mut self) {
        self.cursor.request_shutdown();
    }

    /// Schedule `initial` and mark the loop as running.
    pub fn start(&mut self, initial: S) -> Result<(), MachineError> {
        if self.status != LoopStatus::Idle {
            return Err(MachineError::AlreadyStarted);
        }
        self.request_transition(initial)?;
        self.status = LoopStatus::Running;
        info!(machine = %self.id, "state machine loop started");
        Ok(())
    }

    /// Run one loop iteration.
    ///
    /// Returns the loop status afterwards. Stepping a terminated loop is a
    /// no-op; any error terminates the loop.
    pub fn step(&mut self) -> Result<LoopStatus, MachineError> {
        match self.status {
            LoopStatus::Idle => return Err(MachineError::NotStarted),
            LoopStatus::Terminated => return Ok(LoopStatus::Terminated),
            LoopStatus::Running | LoopStatus::Draining => {}
        }

        let result = self.iterate();
        if let Err(error) = &result {
            self.status = LoopStatus::Terminated;
            warn!(machine = %self.id, %error, "state machine loop failed");
        }
        result
    }

    /// Start at `initial` and step until the loop terminates.
    ///
    /// Only returns once a hook or the caller's fallback requests shutdown,
    /// or a hook fails.
    pub fn run_loop(&mut self, initial: S) -> Result<(), MachineError> {
        self.start(initial)?;
        while !self.step()?.is_terminated() {}
        Ok(())
    }

    /// Finalize every remaining node in registration order and release it.
    ///
    /// Every node is finalized even if an earlier one fails; the first
    /// failure is returned.
    pub fn teardown(mut self) -> Result<(), MachineError> {
        self.finalize_all()
    }

    fn iterate(&mut self) -> Result<LoopStatus, MachineError> {
        let step = self.cursor.plan().ok_or(MachineError::NotStarted)?;

        match step {
            Step::Drain { current } => {
                self.status = LoopStatus::Draining;
                if let Some(current) = current {
                    self.invoke(&current, LifecyclePhase::Exit)?;
                }
                self.status = LoopStatus::Terminated;
                info!(machine = %self.id, "state machine loop terminated");
            }
            Step::Transition { from, to } => {
                if !self.registry.contains(&to) {
                    return Err(MachineError::unknown(&to));
                }
                if let Some(from) = &from {
                    self.invoke(from, LifecyclePhase::Exit)?;
                }
                debug!(
                    machine = %self.id,
                    from = ?from,
                    to = to.name(),
                    "transitioning"
                );
                self.cursor.advance(to.clone());
                self.history.record(from, to.clone());
                self.invoke(&to, LifecyclePhase::Enter)?;
            }
            Step::Update(state) => {
                trace!(machine = %self.id, state = state.name(), "updating");
                self.invoke(&state, LifecyclePhase::Update)?;
            }
        }

        Ok(self.status)
    }

    fn invoke(&mut self, state: &S, phase: LifecyclePhase) -> Result<(), MachineError> {
        let Self {
            registry,
            cursor,
            fallback,
            ..
        } = self;
        let (registered, node) = registry
            .split_mut(state)
            .ok_or_else(|| MachineError::unknown(state))?;

        let mut ctx = NodeContext::new(
            state,
            phase,
            Control::new(registered, cursor),
            fallback.as_mut(),
        );
        dispatch(&mut **node, &mut ctx).map_err(|source| MachineError::hook(state, phase, source))
    }

    fn finalize_all(&mut self) -> Result<(), MachineError> {
        let mut first_error = None;
        while let Some(state) = self.registry.first().cloned() {
            if let Err(error) = self.invoke(&state, LifecyclePhase::Finalize) {
                warn!(machine = %self.id, state = state.name(), %error, "finalize failed");
                first_error.get_or_insert(error);
            }
            self.registry.remove(&state);
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<S: State> Drop for StateMachine<S> {
    fn drop(&mut self) {
        if self.registry.len() > 0 {
            debug!(machine = %self.id, nodes = self.registry.len(), "finalizing nodes on drop");
            let _ = self.finalize_all();
        }
    }
}
