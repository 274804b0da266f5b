//! State nodes for the async machine.

use crate::core::{Control, LifecyclePhase, State};
use crate::error::{HookError, MachineError};
use async_trait::async_trait;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Callback invoked by an async node's default hooks.
///
/// Receives the node's state, the phase being delivered, the machine's
/// control surface and the machine's cancellation token. Long-running
/// callbacks should watch the token to return early on cancellation.
#[async_trait]
pub trait AsyncFallback<S: State>: Send + Sync {
    async fn on_phase(
        &self,
        state: &S,
        phase: LifecyclePhase,
        control: &mut Control<'_, S>,
        cancel: &CancellationToken,
    ) -> Result<(), HookError>;
}

pub type BoxedAsyncFallback<S> = Box<dyn AsyncFallback<S>>;

/// Per-call context handed to every async hook.
pub struct AsyncNodeContext<'a, S: State> {
    state: &'a S,
    phase: LifecyclePhase,
    control: Control<'a, S>,
    fallback: Option<&'a BoxedAsyncFallback<S>>,
    cancel: &'a CancellationToken,
}

impl<'a, S: State> AsyncNodeContext<'a, S> {
    pub(crate) fn new(
        state: &'a S,
        phase: LifecyclePhase,
        control: Control<'a, S>,
        fallback: Option<&'a BoxedAsyncFallback<S>>,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            state,
            phase,
            control,
            fallback,
            cancel,
        }
    }

    /// The state this node is bound to.
    pub fn state(&self) -> &S {
        self.state
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// The owning machine's cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Schedule a transition on the owning machine; see
    /// [`Control::request_transition`].
    pub fn request_transition(&mut self, state: S) -> Result<(), MachineError> {
        self.control.request_transition(state)
    }

    /// Ask the owning machine to drain and stop, then yield once to the
    /// runtime.
    pub async fn shutdown(&mut self) {
        self.control.shutdown();
        tokio::task::yield_now().await;
    }

    pub fn control(&mut self) -> &mut Control<'a, S> {
        &mut self.control
    }

    /// Await the fallback callback for this call's state and phase.
    pub async fn forward(&mut self) -> Result<(), HookError> {
        match self.fallback {
            Some(fallback) => {
                fallback
                    .on_phase(self.state, self.phase, &mut self.control, self.cancel)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Run the fallback callback synchronously, for `Initialize` and
    /// `Finalize`.
    ///
    /// The callback is polled once. A callback that suspends is dropped and
    /// reported as [`MachineError::Suspended`], so registration rolls back
    /// and teardown surfaces the failure.
    pub fn forward_now(&mut self) -> Result<(), HookError> {
        let Some(fallback) = self.fallback else {
            return Ok(());
        };

        let polled = fallback
            .on_phase(self.state, self.phase, &mut self.control, self.cancel)
            .now_or_never();
        match polled {
            Some(result) => result,
            None => {
                warn!(
                    state = self.state.name(),
                    phase = %self.phase,
                    "fallback suspended during a synchronous phase"
                );
                Err(MachineError::suspended(self.state, self.phase).into())
            }
        }
    }
}

/// Behavior bound to one state of an
/// [`AsyncStateMachine`](super::AsyncStateMachine).
///
/// `enter`, `update` and `exit` are awaited one at a time by the loop and
/// may suspend (timers, I/O, nested machines). `initialize` and `finalize`
/// run synchronously during registration and teardown; a fallback that
/// awaits a pending future in those phases fails the hook. Every hook
/// defaults to forwarding to the machine's fallback.
///
/// # Example
///
/// ```rust
/// use stagehand::asynchronous::{AsyncNodeContext, AsyncStateNode};
/// use stagehand::{async_trait, state_enum, HookError};
/// use std::time::Duration;
///
/// state_enum! {
///     enum Stage { Splash, Menu }
/// }
///
/// struct Splash;
///
/// #[async_trait]
/// impl AsyncStateNode<Stage> for Splash {
///     async fn enter(&mut self, ctx: &mut AsyncNodeContext<'_, Stage>) -> Result<(), HookError> {
///         tokio::select! {
///             _ = tokio::time::sleep(Duration::from_millis(10)) => {}
///             _ = ctx.cancellation().cancelled() => return Ok(()),
///         }
///         ctx.request_transition(Stage::Menu)?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncStateNode<S: State>: Send {
    /// Called once, when the node is registered.
    fn initialize(&mut self, ctx: &mut AsyncNodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward_now()
    }

    async fn enter(&mut self, ctx: &mut AsyncNodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward().await
    }

    async fn update(&mut self, ctx: &mut AsyncNodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward().await
    }

    async fn exit(&mut self, ctx: &mut AsyncNodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward().await
    }

    /// Called once, when the node is unregistered or the machine is torn down.
    fn finalize(&mut self, ctx: &mut AsyncNodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward_now()
    }
}

/// Node that forwards every phase to the fallback callback.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultAsyncNode;

impl<S: State> AsyncStateNode<S> for DefaultAsyncNode {}

/// Hooks run synchronously, outside the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SyncHook {
    Initialize,
    Finalize,
}

impl SyncHook {
    pub(crate) fn phase(self) -> LifecyclePhase {
        match self {
            Self::Initialize => LifecyclePhase::Initialize,
            Self::Finalize => LifecyclePhase::Finalize,
        }
    }

    pub(crate) fn call<S: State>(
        self,
        node: &mut dyn AsyncStateNode<S>,
        ctx: &mut AsyncNodeContext<'_, S>,
    ) -> Result<(), HookError> {
        match self {
            Self::Initialize => node.initialize(ctx),
            Self::Finalize => node.finalize(ctx),
        }
    }
}

/// Hooks awaited by the loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LoopHook {
    Enter,
    Update,
    Exit,
}

impl LoopHook {
    pub(crate) fn phase(self) -> LifecyclePhase {
        match self {
            Self::Enter => LifecyclePhase::Enter,
            Self::Update => LifecyclePhase::Update,
            Self::Exit => LifecyclePhase::Exit,
        }
    }

    pub(crate) async fn call<S: State>(
        self,
        node: &mut dyn AsyncStateNode<S>,
        ctx: &mut AsyncNodeContext<'_, S>,
    ) -> Result<(), HookError> {
        match self {
            Self::Enter => node.enter(ctx).await,
            Self::Update => node.update(ctx).await,
            Self::Exit => node.exit(ctx).await,
        }
    }
}
