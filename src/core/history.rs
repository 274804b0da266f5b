//! Transition history of a running machine.
//!
//! The machine itself only needs `previous` and `current`; the log keeps a
//! bounded window of past transitions for diagnostics and tests.

use super::state::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of transitions a machine remembers.
pub const DEFAULT_HISTORY_CAPACITY: usize = 64;

/// Record of a single completed transition.
///
/// `from` is `None` for the very first transition of a loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionRecord<S: State> {
    /// The state that was exited
    pub from: Option<S>,
    /// The state that was entered
    pub to: S,
    /// When the transition completed
    pub at: DateTime<Utc>,
    /// Position of this transition since the machine was created
    pub sequence: u64,
}

/// Bounded, ordered log of transitions.
///
/// Once `capacity` is reached the oldest record is dropped. A capacity of
/// zero disables recording.
///
/// # Example
///
/// ```rust
/// use stagehand::core::TransitionLog;
/// use stagehand::state_enum;
///
/// state_enum! {
///     enum Phase { Boot, Run, Halt }
/// }
///
/// let mut log = TransitionLog::with_capacity(8);
/// log.record(None, Phase::Boot);
/// log.record(Some(Phase::Boot), Phase::Run);
/// log.record(Some(Phase::Run), Phase::Halt);
///
/// assert_eq!(log.path(), vec![&Phase::Boot, &Phase::Run, &Phase::Halt]);
/// assert_eq!(log.total_recorded(), 3);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct TransitionLog<S: State> {
    records: VecDeque<TransitionRecord<S>>,
    capacity: usize,
    recorded: u64,
}

impl<S: State> Default for TransitionLog<S> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<S: State> TransitionLog<S> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            capacity,
            recorded: 0,
        }
    }

    /// Append a transition, evicting the oldest record when full.
    pub fn record(&mut self, from: Option<S>, to: S) {
        let sequence = self.recorded;
        self.recorded += 1;

        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(TransitionRecord {
            from,
            to,
            at: Utc::now(),
            sequence,
        });
    }

    /// States traversed within the retained window: the `from` of the
    /// oldest record (when there is one), then every `to`.
    pub fn path(&self) -> Vec<&S> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(first) = self.records.front().and_then(|r| r.from.as_ref()) {
            path.push(first);
        }
        path.extend(self.records.iter().map(|r| &r.to));
        path
    }

    /// Time between the oldest and newest retained transitions.
    pub fn span(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.at.signed_duration_since(first.at).to_std().ok()
    }

    pub fn records(&self) -> impl Iterator<Item = &TransitionRecord<S>> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord<S>> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Transitions seen since creation, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.recorded
    }
}
