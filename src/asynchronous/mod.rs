//! Asynchronous state machine for tokio.
//!
//! Loop hooks (`enter`, `update`, `exit`) are awaited one at a time, so a
//! node may wait on timers, I/O or nested machines without blocking the
//! runtime. Registration hooks stay synchronous. A [`CancellationToken`]
//! handed to the machine cancels the loop the same way `shutdown` does, and
//! an [`AsyncMachineHandle`] carries requests in from other tasks.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

mod handle;
mod machine;
mod node;

pub use handle::AsyncMachineHandle;
pub use machine::AsyncStateMachine;
pub use node::{AsyncFallback, AsyncNodeContext, AsyncStateNode, BoxedAsyncFallback, DefaultAsyncNode};
