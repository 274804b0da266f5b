//! Cooperative, single-threaded state machine.
//!
//! Each hook runs as one synchronous unit of work per loop iteration and
//! the host drives the loop one [`StateMachine::step`] per tick. There are
//! no locks: the loop is the only writer of the machine's state, and hooks
//! reach the machine through the [`NodeContext`] they are handed.

mod machine;
mod node;

pub use machine::StateMachine;
pub use node::{DefaultNode, FallbackFn, NodeContext, StateNode};
