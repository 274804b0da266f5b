//! Asynchronous state machine driven to completion on a tokio runtime.

use super::handle::{AsyncMachineHandle, Command};
use super::node::{AsyncFallback, AsyncNodeContext, AsyncStateNode, BoxedAsyncFallback, LoopHook, SyncHook};
use crate::core::registry::Registry;
use crate::core::{request_transition, Control, Cursor, LoopStatus, State, Step, TransitionLog};
use crate::error::MachineError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Lifecycle state machine whose loop hooks are awaited.
///
/// Hooks run one at a time: the loop awaits each before starting the next,
/// and yields to the runtime after every iteration. The machine observes
/// its [`CancellationToken`] at the top of each iteration; a cancelled
/// token has the same effect as [`shutdown`](Self::shutdown). Hooks that
/// wait on long operations should also watch the token through
/// [`AsyncNodeContext::cancellation`].
///
/// `run_loop` borrows the machine for the whole run, so other tasks steer
/// it through an [`AsyncMachineHandle`] or the token.
pub struct AsyncStateMachine<S: State> {
    id: Uuid,
    registry: Registry<S, Box<dyn AsyncStateNode<S>>>,
    cursor: Cursor<S>,
    fallback: Option<BoxedAsyncFallback<S>>,
    cancel: CancellationToken,
    status: LoopStatus,
    history: TransitionLog<S>,
    sender: mpsc::UnboundedSender<Command<S>>,
    commands: mpsc::UnboundedReceiver<Command<S>>,
}

impl<S: State> AsyncStateMachine<S> {
    /// Create an empty machine observing `cancel`.
    pub fn new(cancel: CancellationToken) -> Self {
        Self::from_parts(None, cancel, TransitionLog::default())
    }

    /// Create an empty machine whose default hooks forward to `fallback`.
    pub fn with_fallback<F>(fallback: F, cancel: CancellationToken) -> Self
    where
        F: AsyncFallback<S> + 'static,
    {
        Self::from_parts(Some(Box::new(fallback)), cancel, TransitionLog::default())
    }

    pub(crate) fn from_parts(
        fallback: Option<BoxedAsyncFallback<S>>,
        cancel: CancellationToken,
        history: TransitionLog<S>,
    ) -> Self {
        let (sender, commands) = mpsc::unbounded_channel();
        Self {
            id: Uuid::new_v4(),
            registry: Registry::default(),
            cursor: Cursor::default(),
            fallback,
            cancel,
            status: LoopStatus::Idle,
            history,
            sender,
            commands,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> LoopStatus {
        self.status
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

    pub fn is_shutting_down(&self) -> bool {
        self.cursor.shutdown_requested()
    }

    pub fn is_registered(&self, state: &S) -> bool {
        self.registry.contains(state)
    }

    pub fn registered_states(&self) -> impl Iterator<Item = &S> {
        self.registry.states().iter()
    }

    pub fn history(&self) -> &TransitionLog<S> {
        &self.history
    }

    /// The token this machine observes. Clone it to cancel from elsewhere.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// A cloneable handle that queues transition and shutdown requests for
    /// the loop.
    pub fn handle(&self) -> AsyncMachineHandle<S> {
        AsyncMachineHandle::new(self.id, self.sender.clone())
    }

    /// Bind `node` to `state` and deliver `Initialize` to it synchronously.
    ///
    /// Replacement and failure rules match
    /// [`StateMachine::register_node`](crate::sync::StateMachine::register_node).
    pub fn register_node<N>(&mut self, state: S, node: N) -> Result<(), MachineError>
    where
        N: AsyncStateNode<S> + 'static,
    {
        if self.registry.contains(&state) {
            warn!(
                machine = %self.id,
                state = state.name(),
                "state already has a node, finalizing and replacing it"
            );
            if let Err(error) = self.invoke_now(&state, SyncHook::Finalize) {
                self.registry.remove(&state);
                return Err(error);
            }
        }

        self.registry.insert(state.clone(), Box::new(node));
        debug!(machine = %self.id, state = state.name(), "registered async state node");

        if let Err(error) = self.invoke_now(&state, SyncHook::Initialize) {
            self.registry.remove(&state);
            return Err(error);
        }
        Ok(())
    }

    /// Finalize and remove the node bound to `state`; `Ok(false)` when
    /// nothing was bound.
    pub fn unregister_node(&mut self, state: &S) -> Result<bool, MachineError> {
        if !self.registry.contains(state) {
            return Ok(false);
        }

        let finalized = self.invoke_now(state, SyncHook::Finalize);
        self.registry.remove(state);
        debug!(machine = %self.id, state = state.name(), "unregistered async state node");
        finalized.map(|_| true)
    }

    pub fn request_transition(&mut self, state: S) -> Result<(), MachineError> {
        request_transition(self.registry.states(), &mut self.cursor, state)
    }

    /// Request an orderly stop before the loop starts, then yield once.
    ///
    /// While `run_loop` is running, stop it with
    /// [`AsyncMachineHandle::shutdown`], the cancellation token or
    /// [`AsyncNodeContext::shutdown`] from inside a hook.
    pub async fn shutdown(&mut self) {
        self.cursor.request_shutdown();
        tokio::task::yield_now().await;
    }

    /// Enter `initial` and run until shutdown, cancellation or a hook
    /// failure.
    #[tracing::instrument(skip_all, fields(machine = %self.id))]
    pub async fn run_loop(&mut self, initial: S) -> Result<(), MachineError> {
        if self.status != LoopStatus::Idle {
            return Err(MachineError::AlreadyStarted);
        }
        self.request_transition(initial)?;
        self.status = LoopStatus::Running;
        info!("async state machine loop started");

        loop {
            match self.iterate().await {
                Ok(LoopStatus::Terminated) => return Ok(()),
                Ok(_) => tokio::task::yield_now().await,
                Err(error) => {
                    self.status = LoopStatus::Terminated;
                    warn!(%error, "async state machine loop failed");
                    return Err(error);
                }
            }
        }
    }

    /// Finalize every remaining node in registration order; returns the
    /// first failure after attempting all of them.
    pub fn teardown(mut self) -> Result<(), MachineError> {
        self.finalize_all()
    }

    async fn iterate(&mut self) -> Result<LoopStatus, MachineError> {
        self.apply_commands()?;
        if self.cancel.is_cancelled() && !self.cursor.shutdown_requested() {
            debug!("cancellation observed, shutting down");
            self.cursor.request_shutdown();
        }

        let step = self.cursor.plan().ok_or(MachineError::NotStarted)?;
        match step {
            Step::Drain { current } => {
                self.status = LoopStatus::Draining;
                if let Some(current) = current {
                    self.invoke(&current, LoopHook::Exit).await?;
                }
                self.status = LoopStatus::Terminated;
                info!("async state machine loop terminated");
            }
            Step::Transition { from, to } => {
                if !self.registry.contains(&to) {
                    return Err(MachineError::unknown(&to));
                }
                if let Some(from) = &from {
                    self.invoke(from, LoopHook::Exit).await?;
                }
                debug!(from = ?from, to = to.name(), "transitioning");
                self.cursor.advance(to.clone());
                self.history.record(from, to.clone());
                self.invoke(&to, LoopHook::Enter).await?;
            }
            Step::Update(state) => {
                trace!(state = state.name(), "updating");
                self.invoke(&state, LoopHook::Update).await?;
            }
        }

        Ok(self.status)
    }

    fn apply_commands(&mut self) -> Result<(), MachineError> {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Transition(state) => {
                    debug!(to = state.name(), "transition requested through handle");
                    request_transition(self.registry.states(), &mut self.cursor, state)?;
                }
                Command::Shutdown => {
                    debug!("shutdown requested through handle");
                    self.cursor.request_shutdown();
                }
            }
        }
        Ok(())
    }

    async fn invoke(&mut self, state: &S, hook: LoopHook) -> Result<(), MachineError> {
        let Self {
            registry,
            cursor,
            fallback,
            cancel,
            ..
        } = self;
        let (registered, node) = registry
            .split_mut(state)
            .ok_or_else(|| MachineError::unknown(state))?;

        let phase = hook.phase();
        let mut ctx = AsyncNodeContext::new(
            state,
            phase,
            Control::new(registered, cursor),
            fallback.as_ref(),
            cancel,
        );
        hook.call(&mut **node, &mut ctx)
            .await
            .map_err(|source| MachineError::hook(state, phase, source))
    }

    fn invoke_now(&mut self, state: &S, hook: SyncHook) -> Result<(), MachineError> {
        let Self {
            registry,
            cursor,
            fallback,
            cancel,
            ..
        } = self;
        let (registered, node) = registry
            .split_mut(state)
            .ok_or_else(|| MachineError::unknown(state))?;

        let phase = hook.phase();
        let mut ctx = AsyncNodeContext::new(
            state,
            phase,
            Control::new(registered, cursor),
            fallback.as_ref(),
            cancel,
        );
        hook.call(&mut **node, &mut ctx)
            .map_err(|source| MachineError::hook(state, phase, source))
    }

    fn finalize_all(&mut self) -> Result<(), MachineError> {
        let mut first_error = None;
        while let Some(state) = self.registry.first().cloned() {
            if let Err(error) = self.invoke_now(&state, SyncHook::Finalize) {
                warn!(machine = %self.id, state = state.name(), %error, "finalize failed");
                first_error.get_or_insert(error);
            }
            self.registry.remove(&state);
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl<S: State> Drop for AsyncStateMachine<S> {
    fn drop(&mut self) {
        if self.registry.len() > 0 {
            debug!(machine = %self.id, nodes = self.registry.len(), "finalizing async nodes on drop");
            let _ = self.finalize_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asynchronous::DefaultAsyncNode;
    use crate::core::LifecyclePhase;
    use crate::{async_trait, state_enum, HookError};
    use std::sync::{Arc, Mutex};

    state_enum! {
        enum TestState {
            Init,
            Loading,
            Shutdown,
        }
    }

    type Events = Arc<Mutex<Vec<(TestState, LifecyclePhase)>>>;

    /// Records every phase and drives Init -> Loading -> Shutdown -> stop.
    struct Script {
        events: Events,
    }

    #[async_trait]
    impl AsyncFallback<TestState> for Script {
        async fn on_phase(
            &self,
            state: &TestState,
            phase: LifecyclePhase,
            control: &mut Control<'_, TestState>,
            _cancel: &CancellationToken,
        ) -> Result<(), HookError> {
            self.events.lock().unwrap().push((state.clone(), phase));
            match (state, phase) {
                (TestState::Init, LifecyclePhase::Enter) => {
                    control.request_transition(TestState::Loading)?
                }
                (TestState::Loading, LifecyclePhase::Update) => {
                    tokio::task::yield_now().await;
                    control.request_transition(TestState::Shutdown)?
                }
                (TestState::Shutdown, LifecyclePhase::Update) => control.shutdown(),
                _ => {}
            }
            Ok(())
        }
    }

    fn scripted(cancel: CancellationToken) -> (AsyncStateMachine<TestState>, Events) {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            Script {
                events: Arc::clone(&events),
            },
            cancel,
        );
        for state in TestState::variants() {
            machine.register_node(state, DefaultAsyncNode).unwrap();
        }
        events.lock().unwrap().clear();
        (machine, events)
    }

    struct CancelAfter {
        updates: usize,
        limit: usize,
    }

    #[async_trait]
    impl AsyncStateNode<TestState> for CancelAfter {
        async fn update(&mut self, ctx: &mut AsyncNodeContext<'_, TestState>) -> Result<(), HookError> {
            self.updates += 1;
            if self.updates == self.limit {
                ctx.cancellation().cancel();
            }
            Ok(())
        }
    }

    /// Records every phase without steering.
    struct Record {
        events: Events,
    }

    #[async_trait]
    impl AsyncFallback<TestState> for Record {
        async fn on_phase(
            &self,
            state: &TestState,
            phase: LifecyclePhase,
            _control: &mut Control<'_, TestState>,
            _cancel: &CancellationToken,
        ) -> Result<(), HookError> {
            self.events.lock().unwrap().push((state.clone(), phase));
            Ok(())
        }
    }

    /// Awaits before doing its work in `phase`, like a fallback that
    /// sleeps in every phase.
    struct SuspendOn {
        phase: LifecyclePhase,
        events: Events,
    }

    #[async_trait]
    impl AsyncFallback<TestState> for SuspendOn {
        async fn on_phase(
            &self,
            state: &TestState,
            phase: LifecyclePhase,
            _control: &mut Control<'_, TestState>,
            _cancel: &CancellationToken,
        ) -> Result<(), HookError> {
            if phase == self.phase {
                tokio::task::yield_now().await;
                self.events.lock().unwrap().push((state.clone(), phase));
                return Err("phase failed".into());
            }
            Ok(())
        }
    }

    struct FailingFinalize;

    #[async_trait]
    impl AsyncStateNode<TestState> for FailingFinalize {
        fn finalize(&mut self, _ctx: &mut AsyncNodeContext<'_, TestState>) -> Result<(), HookError> {
            Err("finalize failed".into())
        }
    }

    fn is_suspended(error: &MachineError, expected: LifecyclePhase) -> bool {
        match error {
            MachineError::Hook { phase, source, .. } => {
                *phase == expected
                    && matches!(
                        source.downcast_ref::<MachineError>(),
                        Some(MachineError::Suspended { phase, .. }) if *phase == expected
                    )
            }
            _ => false,
        }
    }

    struct FailingEnter;

    #[async_trait]
    impl AsyncStateNode<TestState> for FailingEnter {
        async fn enter(&mut self, _ctx: &mut AsyncNodeContext<'_, TestState>) -> Result<(), HookError> {
            Err("enter failed".into())
        }
    }

    #[tokio::test]
    async fn scripted_run_visits_states_in_order() {
        let (mut machine, events) = scripted(CancellationToken::new());

        machine.run_loop(TestState::Init).await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                (TestState::Init, LifecyclePhase::Enter),
                (TestState::Init, LifecyclePhase::Exit),
                (TestState::Loading, LifecyclePhase::Enter),
                (TestState::Loading, LifecyclePhase::Update),
                (TestState::Loading, LifecyclePhase::Exit),
                (TestState::Shutdown, LifecyclePhase::Enter),
                (TestState::Shutdown, LifecyclePhase::Update),
                (TestState::Shutdown, LifecyclePhase::Exit),
            ]
        );
        assert_eq!(machine.status(), LoopStatus::Terminated);
        assert_eq!(
            machine.history().path(),
            vec![&TestState::Init, &TestState::Loading, &TestState::Shutdown]
        );
    }

    #[tokio::test]
    async fn pre_cancelled_token_runs_no_loop_hooks() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (mut machine, events) = scripted(cancel);

        machine.run_loop(TestState::Init).await.unwrap();

        assert!(events.lock().unwrap().is_empty());
        assert_eq!(machine.current(), None);
    }

    #[tokio::test]
    async fn cancellation_mid_run_exits_current_state() {
        let mut machine = AsyncStateMachine::new(CancellationToken::new());
        machine
            .register_node(TestState::Loading, CancelAfter { updates: 0, limit: 3 })
            .unwrap();

        machine.run_loop(TestState::Loading).await.unwrap();

        assert!(machine.cancellation_token().is_cancelled());
        assert_eq!(machine.current(), Some(&TestState::Loading));
        assert_eq!(machine.status(), LoopStatus::Terminated);
    }

    #[tokio::test]
    async fn external_cancellation_stops_loop() {
        let mut machine = AsyncStateMachine::new(CancellationToken::new());
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();
        let token = machine.cancellation_token().clone();

        let handle = tokio::spawn(async move {
            let result = machine.run_loop(TestState::Init).await;
            (machine, result)
        });
        tokio::task::yield_now().await;
        token.cancel();

        let (machine, result) = handle.await.unwrap();
        assert!(result.is_ok());
        assert!(machine.status().is_terminated());
    }

    #[tokio::test]
    async fn shutdown_before_run_exits_nothing() {
        let (mut machine, events) = scripted(CancellationToken::new());

        machine.shutdown().await;
        machine.run_loop(TestState::Init).await.unwrap();

        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_loop_only_starts_once() {
        let (mut machine, _events) = scripted(CancellationToken::new());
        machine.run_loop(TestState::Init).await.unwrap();

        assert!(matches!(
            machine.run_loop(TestState::Init).await,
            Err(MachineError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn unknown_initial_state_is_rejected() {
        let mut machine: AsyncStateMachine<TestState> = AsyncStateMachine::new(CancellationToken::new());

        let result = machine.run_loop(TestState::Init).await;
        assert!(matches!(result, Err(MachineError::UnknownState { .. })));
        assert_eq!(machine.status(), LoopStatus::Idle);
    }

    #[tokio::test]
    async fn hook_failure_terminates_loop() {
        let mut machine = AsyncStateMachine::new(CancellationToken::new());
        machine.register_node(TestState::Init, FailingEnter).unwrap();

        let result = machine.run_loop(TestState::Init).await;

        assert!(matches!(
            result,
            Err(MachineError::Hook {
                phase: LifecyclePhase::Enter,
                ..
            })
        ));
        assert_eq!(machine.status(), LoopStatus::Terminated);
    }

    #[test]
    fn registration_delivers_initialize_and_teardown_finalize() {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            Script {
                events: Arc::clone(&events),
            },
            CancellationToken::new(),
        );
        machine.register_node(TestState::Loading, DefaultAsyncNode).unwrap();
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();
        assert!(machine.unregister_node(&TestState::Loading).unwrap());
        machine.teardown().unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                (TestState::Loading, LifecyclePhase::Initialize),
                (TestState::Init, LifecyclePhase::Initialize),
                (TestState::Loading, LifecyclePhase::Finalize),
                (TestState::Init, LifecyclePhase::Finalize),
            ]
        );
    }

    #[test]
    fn duplicate_registration_finalizes_then_replaces() {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            Record {
                events: Arc::clone(&events),
            },
            CancellationToken::new(),
        );
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();
        machine.register_node(TestState::Loading, DefaultAsyncNode).unwrap();
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                (TestState::Init, LifecyclePhase::Initialize),
                (TestState::Loading, LifecyclePhase::Initialize),
                (TestState::Init, LifecyclePhase::Finalize),
                (TestState::Init, LifecyclePhase::Initialize),
            ]
        );
        let order: Vec<_> = machine.registered_states().cloned().collect();
        assert_eq!(order, vec![TestState::Init, TestState::Loading]);
    }

    #[test]
    fn failed_finalize_on_replace_releases_old_node() {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            Record {
                events: Arc::clone(&events),
            },
            CancellationToken::new(),
        );
        machine.register_node(TestState::Init, FailingFinalize).unwrap();

        let result = machine.register_node(TestState::Init, DefaultAsyncNode);

        assert!(matches!(
            result,
            Err(MachineError::Hook {
                phase: LifecyclePhase::Finalize,
                ..
            })
        ));
        assert!(!machine.is_registered(&TestState::Init));
        assert_eq!(
            *events.lock().unwrap(),
            vec![(TestState::Init, LifecyclePhase::Initialize)]
        );
    }

    #[test]
    fn fallback_suspending_in_initialize_rolls_back_registration() {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            SuspendOn {
                phase: LifecyclePhase::Initialize,
                events: Arc::clone(&events),
            },
            CancellationToken::new(),
        );

        let err = machine
            .register_node(TestState::Init, DefaultAsyncNode)
            .unwrap_err();

        assert!(is_suspended(&err, LifecyclePhase::Initialize));
        assert!(!machine.is_registered(&TestState::Init));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn fallback_suspending_in_finalize_fails_teardown() {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            SuspendOn {
                phase: LifecyclePhase::Finalize,
                events: Arc::clone(&events),
            },
            CancellationToken::new(),
        );
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();
        machine.register_node(TestState::Loading, DefaultAsyncNode).unwrap();

        let err = machine.teardown().unwrap_err();

        assert!(is_suspended(&err, LifecyclePhase::Finalize));
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handle_steers_a_loop_running_in_another_task() {
        let events: Events = Arc::default();
        let mut machine = AsyncStateMachine::with_fallback(
            Record {
                events: Arc::clone(&events),
            },
            CancellationToken::new(),
        );
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();
        machine.register_node(TestState::Loading, DefaultAsyncNode).unwrap();
        events.lock().unwrap().clear();
        let handle = machine.handle();

        let task = tokio::spawn(async move {
            let result = machine.run_loop(TestState::Init).await;
            (machine, result)
        });
        let seen = |entry: (TestState, LifecyclePhase)| events.lock().unwrap().contains(&entry);
        while !seen((TestState::Init, LifecyclePhase::Update)) {
            tokio::task::yield_now().await;
        }
        handle.request_transition(TestState::Loading).unwrap();
        while !seen((TestState::Loading, LifecyclePhase::Update)) {
            tokio::task::yield_now().await;
        }
        handle.shutdown().await.unwrap();

        let (machine, result) = task.await.unwrap();
        result.unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&(TestState::Init, LifecyclePhase::Enter)));
        assert_eq!(events.last(), Some(&(TestState::Loading, LifecyclePhase::Exit)));
        assert_eq!(
            machine.history().path(),
            vec![&TestState::Init, &TestState::Loading]
        );
        assert!(machine.status().is_terminated());
    }

    #[tokio::test]
    async fn handle_transition_to_unknown_state_ends_the_loop() {
        let mut machine = AsyncStateMachine::new(CancellationToken::new());
        machine.register_node(TestState::Init, DefaultAsyncNode).unwrap();
        machine.handle().request_transition(TestState::Loading).unwrap();

        let err = machine.run_loop(TestState::Init).await.unwrap_err();

        assert!(err.is_unknown_state());
        assert_eq!(machine.status(), LoopStatus::Terminated);
    }

    #[test]
    fn handle_outliving_its_machine_is_detached() {
        let machine: AsyncStateMachine<TestState> = AsyncStateMachine::new(CancellationToken::new());
        let handle = machine.handle();
        let id = machine.id();
        drop(machine);

        assert!(matches!(
            handle.request_transition(TestState::Init),
            Err(MachineError::Detached { machine }) if machine == id
        ));
    }
}
