//! Async Loading
//!
//! This example runs a loading flow on tokio: a node awaits simulated
//! asset fetches, and Ctrl-C cancels the machine through its token.
//!
//! Key concepts:
//! - Awaiting timers inside `enter`/`update` hooks
//! - Watching the cancellation token for fast exit
//! - An async fallback for the states without custom nodes
//! - Orderly drain on cancellation (one final `Exit`)
//!
//! Run with: RUST_LOG=info cargo run --example async_loading

use stagehand::asynchronous::{AsyncFallback, AsyncNodeContext, AsyncStateNode};
use stagehand::core::{Control, LifecyclePhase};
use stagehand::{
    async_trait, state_enum, AsyncStateMachineBuilder, CancellationToken, HookError, State,
};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

state_enum! {
    enum Flow {
        Init,
        Loading,
        Running,
        Shutdown,
    }
}

const ASSETS: [&str; 3] = ["textures", "audio", "levels"];

struct AssetLoader {
    loaded: usize,
}

#[async_trait]
impl AsyncStateNode<Flow> for AssetLoader {
    async fn update(&mut self, ctx: &mut AsyncNodeContext<'_, Flow>) -> Result<(), HookError> {
        let Some(asset) = ASSETS.get(self.loaded) else {
            ctx.request_transition(Flow::Running)?;
            return Ok(());
        };

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(300)) => {
                self.loaded += 1;
                info!(asset, loaded = self.loaded, total = ASSETS.len(), "asset loaded");
            }
            _ = ctx.cancellation().cancelled() => {
                warn!(asset, "asset fetch abandoned");
            }
        }
        Ok(())
    }
}

/// Handles every state without its own node.
struct Director;

#[async_trait]
impl AsyncFallback<Flow> for Director {
    async fn on_phase(
        &self,
        state: &Flow,
        phase: LifecyclePhase,
        control: &mut Control<'_, Flow>,
        cancel: &CancellationToken,
    ) -> Result<(), HookError> {
        info!(state = state.name(), %phase, "fallback");
        match (state, phase) {
            (Flow::Init, LifecyclePhase::Enter) => control.request_transition(Flow::Loading)?,
            (Flow::Running, LifecyclePhase::Update) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        control.request_transition(Flow::Shutdown)?;
                    }
                    _ = cancel.cancelled() => {}
                }
            }
            (Flow::Shutdown, LifecyclePhase::Enter) => control.shutdown(),
            _ => {}
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cancel = CancellationToken::new();
    let mut machine = AsyncStateMachineBuilder::new(cancel.clone())
        .fallback(Director)
        .auto_register(true)
        .build()?;
    machine.register_node(Flow::Loading, AssetLoader { loaded: 0 })?;

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            interrupt.cancel();
        }
    });

    machine.run_loop(Flow::Init).await?;
    info!(
        previous = ?machine.previous(),
        current = ?machine.current(),
        "flow finished"
    );

    machine.teardown()?;
    Ok(())
}
