//! Stagehand: a lifecycle state machine engine
//!
//! Stagehand sequences the lifecycle of a real-time entity (a scene, a
//! character, a loading flow) through a small, closed set of discrete
//! states. Each state is bound to a node that receives the lifecycle
//! phases `Initialize`, `Enter`, `Update`, `Exit` and `Finalize`.
//!
//! Deciding what a loop iteration does is pure (`core`); running hooks is
//! left to the two machine variants:
//!
//! - [`sync::StateMachine`]: cooperative and single-threaded, stepped once
//!   per host tick
//! - [`asynchronous::AsyncStateMachine`]: awaits its hooks on tokio and
//!   honors a `CancellationToken`
//!
//! # Core Concepts
//!
//! - **State**: the machine's domain, via the `State` trait or `state_enum!`
//! - **Node**: per-state behavior; default hooks forward to a fallback callback
//! - **Transitions**: requested at any time, applied at iteration boundaries
//! - **Shutdown**: drains with exactly one `Exit` of the current state
//!
//! # Example
//!
//! ```rust
//! use stagehand::builder::StateMachineBuilder;
//! use stagehand::core::{Control, LifecyclePhase};
//! use stagehand::state_enum;
//!
//! state_enum! {
//!     enum Lifecycle {
//!         Init,
//!         Loading,
//!         Shutdown,
//!     }
//! }
//!
//! let mut machine = StateMachineBuilder::new()
//!     .fallback(
//!         |state: &Lifecycle, phase: LifecyclePhase, control: &mut Control<'_, Lifecycle>| {
//!             match (state, phase) {
//!                 (Lifecycle::Init, LifecyclePhase::Enter) => {
//!                     control.request_transition(Lifecycle::Loading)?
//!                 }
//!                 (Lifecycle::Loading, LifecyclePhase::Update) => {
//!                     control.request_transition(Lifecycle::Shutdown)?
//!                 }
//!                 (Lifecycle::Shutdown, LifecyclePhase::Update) => control.shutdown(),
//!                 _ => {}
//!             }
//!             Ok(())
//!         },
//!     )
//!     .auto_register(true)
//!     .build()
//!     .unwrap();
//!
//! machine.run_loop(Lifecycle::Init).unwrap();
//! assert_eq!(machine.current(), Some(&Lifecycle::Shutdown));
//! assert_eq!(machine.history().total_recorded(), 3);
//! ```

pub mod asynchronous;
pub mod builder;
pub mod combo;
pub mod core;
pub mod easing;
pub mod error;
pub mod sync;

// Re-export commonly used types
pub use asynchronous::{AsyncMachineHandle, AsyncStateMachine, AsyncStateNode};
pub use builder::{AsyncStateMachineBuilder, BuildError, StateMachineBuilder};
pub use core::{Control, LifecyclePhase, LoopStatus, State};
pub use error::{HookError, MachineError};
pub use sync::{StateMachine, StateNode};

pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
