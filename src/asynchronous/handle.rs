//! Steering a running async machine from other tasks.

use crate::core::State;
use crate::error::MachineError;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Request queued by a handle for the loop.
#[derive(Debug)]
pub(crate) enum Command<S> {
    Transition(S),
    Shutdown,
}

/// Cloneable sender for an [`AsyncStateMachine`](super::AsyncStateMachine)
/// whose loop is owned by another task.
///
/// Requests are applied in the order sent, at the top of the loop's next
/// iteration and before shutdown or cancellation is checked. A transition
/// target is validated when it is applied: an unregistered target
/// terminates the loop with [`MachineError::UnknownState`].
///
/// # Example
///
/// ```rust
/// use stagehand::asynchronous::DefaultAsyncNode;
/// use stagehand::{state_enum, AsyncStateMachine, CancellationToken};
///
/// state_enum! {
///     enum Phase { Idle, Busy }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut machine = AsyncStateMachine::new(CancellationToken::new());
/// machine.register_node(Phase::Idle, DefaultAsyncNode).unwrap();
/// machine.register_node(Phase::Busy, DefaultAsyncNode).unwrap();
/// let handle = machine.handle();
///
/// let task = tokio::spawn(async move {
///     machine.run_loop(Phase::Idle).await.map(|_| machine)
/// });
/// handle.request_transition(Phase::Busy).unwrap();
/// handle.shutdown().await.unwrap();
///
/// let machine = task.await.unwrap().unwrap();
/// assert!(machine.status().is_terminated());
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct AsyncMachineHandle<S> {
    machine: Uuid,
    commands: mpsc::UnboundedSender<Command<S>>,
}

impl<S: State> AsyncMachineHandle<S> {
    pub(crate) fn new(machine: Uuid, commands: mpsc::UnboundedSender<Command<S>>) -> Self {
        Self { machine, commands }
    }

    /// Id of the machine this handle steers.
    pub fn machine_id(&self) -> Uuid {
        self.machine
    }

    /// Queue a transition to `state`.
    ///
    /// Fails with [`MachineError::Detached`] once the machine is dropped.
    pub fn request_transition(&self, state: S) -> Result<(), MachineError> {
        self.send(Command::Transition(state))
    }

    /// Queue an orderly stop, then yield once to the runtime.
    pub async fn shutdown(&self) -> Result<(), MachineError> {
        self.send(Command::Shutdown)?;
        tokio::task::yield_now().await;
        Ok(())
    }

    fn send(&self, command: Command<S>) -> Result<(), MachineError> {
        self.commands
            .send(command)
            .map_err(|_| MachineError::Detached {
                machine: self.machine,
            })
    }
}
