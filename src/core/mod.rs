//! Core types shared by the sync and async state machines.
//!
//! This module contains the variant-independent parts of the engine:
//! - State definitions via the `State` trait and `LifecyclePhase`
//! - Domain validation for auto-registration
//! - The pure iteration planner and the `Control` handle given to hooks
//! - Bounded transition history
//!
//! Nothing in here runs hooks; the `sync` and `asynchronous` modules
//! execute the steps planned here.

mod control;
mod domain;
mod history;
pub(crate) mod registry;
mod state;

pub(crate) use control::{request_transition, Cursor};
pub use control::{Control, LoopStatus, Step};
pub use domain::{validate_domain, DomainViolation};
pub use history::{TransitionLog, TransitionRecord, DEFAULT_HISTORY_CAPACITY};
pub use state::{LifecyclePhase, State};
