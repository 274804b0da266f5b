//! State nodes for the cooperative (sync) machine.

use crate::core::{Control, LifecyclePhase, State};
use crate::error::{HookError, MachineError};

/// Callback invoked by a node's default hooks.
///
/// Receives the node's state, the phase being delivered and the machine's
/// control surface, so a callback can steer the machine the same way a
/// node can.
pub type FallbackFn<S> =
    Box<dyn FnMut(&S, LifecyclePhase, &mut Control<'_, S>) -> Result<(), HookError>>;

/// Per-call context handed to every hook.
///
/// Stands in for a node's reference to its machine: it knows which state
/// the node is bound to, which phase is being delivered, and can schedule
/// transitions or shutdown on the owning machine.
pub struct NodeContext<'a, S: State> {
    state: &'a S,
    phase: LifecyclePhase,
    control: Control<'a, S>,
    fallback: Option<&'a mut FallbackFn<S>>,
}

impl<'a, S: State> NodeContext<'a, S> {
    pub(crate) fn new(
        state: &'a S,
        phase: LifecyclePhase,
        control: Control<'a, S>,
        fallback: Option<&'a mut FallbackFn<S>>,
    ) -> Self {
        Self {
            state,
            phase,
            control,
            fallback,
        }
    }

    /// The state this node is bound to.
    pub fn state(&self) -> &S {
        self.state
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// Schedule a transition on the owning machine.
    ///
    /// Takes effect at the next iteration boundary; fails with
    /// `UnknownState` if `state` has no registered node.
    pub fn request_transition(&mut self, state: S) -> Result<(), MachineError> {
        self.control.request_transition(state)
    }

    /// Ask the owning machine to drain and stop.
    pub fn shutdown(&mut self) {
        self.control.shutdown();
    }

    pub fn control(&mut self) -> &mut Control<'a, S> {
        &mut self.control
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Deliver this call's state and phase to the machine's fallback
    /// callback. Does nothing when no callback is installed.
    pub fn forward(&mut self) -> Result<(), HookError> {
        match self.fallback.as_deref_mut() {
            Some(fallback) => fallback(self.state, self.phase, &mut self.control),
            None => Ok(()),
        }
    }
}

/// Behavior bound to one state of a [`StateMachine`](super::StateMachine).
///
/// Every hook defaults to [`NodeContext::forward`]; implementors override
/// the subset they care about. Errors returned from a hook are not caught
/// by the machine: they end the running loop and surface to its caller.
///
/// # Example
///
/// ```rust
/// use stagehand::sync::{NodeContext, StateNode};
/// use stagehand::{state_enum, HookError};
///
/// state_enum! {
///     enum Scene { Title, Game }
/// }
///
/// struct TitleScreen {
///     frames: u32,
/// }
///
/// impl StateNode<Scene> for TitleScreen {
///     fn update(&mut self, ctx: &mut NodeContext<'_, Scene>) -> Result<(), HookError> {
///         self.frames += 1;
///         if self.frames == 3 {
///             ctx.request_transition(Scene::Game)?;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait StateNode<S: State> {
    /// Called once, when the node is registered.
    fn initialize(&mut self, ctx: &mut NodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward()
    }

    fn enter(&mut self, ctx: &mut NodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward()
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward()
    }

    fn exit(&mut self, ctx: &mut NodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward()
    }

    /// Called once, when the node is unregistered or the machine is torn down.
    fn finalize(&mut self, ctx: &mut NodeContext<'_, S>) -> Result<(), HookError> {
        ctx.forward()
    }
}

/// Node that forwards every phase to the fallback callback.
///
/// Used for auto-registration.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultNode;

impl<S: State> StateNode<S> for DefaultNode {}

/// Route `phase` to the matching hook of `node`.
pub(crate) fn dispatch<S: State>(
    node: &mut dyn StateNode<S>,
    ctx: &mut NodeContext<'_, S>,
) -> Result<(), HookError> {
    match ctx.phase() {
        LifecyclePhase::Initialize => node.initialize(ctx),
        LifecyclePhase::Enter => node.enter(ctx),
        LifecyclePhase::Update => node.update(ctx),
        LifecyclePhase::Exit => node.exit(ctx),
        LifecyclePhase::Finalize => node.finalize(ctx),
    }
}
