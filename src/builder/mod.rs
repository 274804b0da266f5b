//! Builder API for configured state machine construction.
//!
//! Builders collect the construction-time options (fallback callback,
//! auto-registration, domain override, history capacity and, for the async
//! machine, the cancellation token) and validate them in `build()`.

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::{AsyncStateMachineBuilder, StateMachineBuilder};
