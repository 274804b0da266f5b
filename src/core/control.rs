//! Loop bookkeeping shared by the sync and async machines.
//!
//! `Cursor` holds the previous/current/next states and the shutdown flag.
//! Deciding what an iteration does is a pure function of the cursor
//! (`Cursor::plan`); the machines only execute the resulting `Step`.

use super::state::State;
use crate::error::MachineError;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Coarse status of a machine's driving loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum LoopStatus {
    /// The loop has not been started.
    Idle,
    /// Iterations are running (transitioning or updating).
    Running,
    /// Shutdown was observed and the final exit is in progress.
    Draining,
    /// The loop has finished, normally or because of an error.
    Terminated,
}

impl LoopStatus {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// The work one loop iteration performs.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Step<S: State> {
    /// Shutdown was requested: exit `current` (if any) and stop.
    Drain { current: Option<S> },
    /// `current != next`: exit `from` (if any), then enter `to`.
    Transition { from: Option<S>, to: S },
    /// No transition pending: update the current state.
    Update(S),
}

/// Previous/current/next states plus the shutdown flag.
///
/// `None` is the uninitialized value every slot holds before the loop starts.
#[derive(Clone, Debug)]
pub(crate) struct Cursor<S: State> {
    previous: Option<S>,
    current: Option<S>,
    next: Option<S>,
    shutdown_requested: bool,
}

impl<S: State> Default for Cursor<S> {
    fn default() -> Self {
        Self {
            previous: None,
            current: None,
            next: None,
            shutdown_requested: false,
        }
    }
}

impl<S: State> Cursor<S> {
    pub(crate) fn previous(&self) -> Option<&S> {
        self.previous.as_ref()
    }

    pub(crate) fn current(&self) -> Option<&S> {
        self.current.as_ref()
    }

    pub(crate) fn next(&self) -> Option<&S> {
        self.next.as_ref()
    }

    pub(crate) fn set_next(&mut self, state: S) {
        self.next = Some(state);
    }

    pub(crate) fn request_shutdown(&mut self) {
        self.shutdown_requested = true;
    }

    pub(crate) fn shutdown_requested(&self) -> bool {
        self.shutdown_requested
    }

    /// Decide the next iteration. `None` means nothing has been scheduled
    /// yet (the loop was never started).
    pub(crate) fn plan(&self) -> Option<Step<S>> {
        if self.shutdown_requested {
            return Some(Step::Drain {
                current: self.current.clone(),
            });
        }

        let next = self.next.as_ref()?;
        if self.current.as_ref() == Some(next) {
            Some(Step::Update(next.clone()))
        } else {
            Some(Step::Transition {
                from: self.current.clone(),
                to: next.clone(),
            })
        }
    }

    /// Make `to` current, remembering the state being left.
    pub(crate) fn advance(&mut self, to: S) {
        self.previous = self.current.replace(to);
    }
}

/// Control surface handed to hooks and fallback callbacks.
///
/// Requests made through a `Control` take effect at the next iteration
/// boundary of the loop that is currently running the hook.
pub struct Control<'a, S: State> {
    registered: &'a IndexSet<S>,
    cursor: &'a mut Cursor<S>,
}

impl<'a, S: State> Control<'a, S> {
    pub(crate) fn new(registered: &'a IndexSet<S>, cursor: &'a mut Cursor<S>) -> Self {
        Self { registered, cursor }
    }

    /// Schedule a transition to `state`.
    ///
    /// Fails with `UnknownState` if `state` has no registered node.
    pub fn request_transition(&mut self, state: S) -> Result<(), MachineError> {
        request_transition(self.registered, self.cursor, state)
    }

    /// Ask the loop to drain: one more exit of the current state, then stop.
    pub fn shutdown(&mut self) {
        self.cursor.request_shutdown();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cursor.shutdown_requested()
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

    pub fn is_registered(&self, state: &S) -> bool {
        self.registered.contains(state)
    }
}

pub(crate) fn request_transition<S: State>(
    registered: &IndexSet<S>,
    cursor: &mut Cursor<S>,
    state: S,
) -> Result<(), MachineError> {
    if !registered.contains(&state) {
        return Err(MachineError::unknown(&state));
    }
    cursor.set_next(state);
    Ok(())
}
