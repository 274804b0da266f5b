//! Loading Sequence
//!
//! This example drives a game's boot flow with the cooperative machine,
//! one step per simulated frame.
//!
//! Key concepts:
//! - Custom nodes overriding a subset of hooks
//! - A fallback callback logging every phase the defaults forward
//! - Eased progress while loading
//! - A key combo that ends the title screen
//!
//! Run with: RUST_LOG=debug cargo run --example loading_sequence

use stagehand::combo::{ComboMatcher, ComboStep, KeyNote};
use stagehand::core::{Control, LifecyclePhase};
use stagehand::easing::{EasingKind, EasingSampler};
use stagehand::sync::{DefaultNode, NodeContext, StateNode};
use stagehand::{state_enum, HookError, State, StateMachineBuilder};
use tracing::info;
use tracing_subscriber::EnvFilter;

const FRAME: f32 = 1.0 / 30.0;
const PRESSED: i32 = 1;

state_enum! {
    enum Boot {
        Splash,
        Loading,
        Title,
        Shutdown,
    }
}

struct Splash {
    frames: u32,
}

impl StateNode<Boot> for Splash {
    fn update(&mut self, ctx: &mut NodeContext<'_, Boot>) -> Result<(), HookError> {
        self.frames += 1;
        if self.frames == 15 {
            ctx.request_transition(Boot::Loading)?;
        }
        Ok(())
    }
}

struct Loading {
    sampler: EasingSampler,
    elapsed: f32,
}

impl StateNode<Boot> for Loading {
    fn enter(&mut self, _ctx: &mut NodeContext<'_, Boot>) -> Result<(), HookError> {
        self.elapsed = 0.0;
        Ok(())
    }

    fn update(&mut self, ctx: &mut NodeContext<'_, Boot>) -> Result<(), HookError> {
        self.elapsed += FRAME;
        let t = (self.elapsed / 2.0).min(1.0);
        let progress = self
            .sampler
            .sample(Some(EasingKind::Sine), Some(EasingKind::Cubic), t)
            .unwrap_or(t);
        info!(progress = format!("{:.0}%", progress * 100.0), "loading");

        if t >= 1.0 {
            ctx.request_transition(Boot::Title)?;
        }
        Ok(())
    }
}

/// Waits for the player to hold A and B within half a second of each other.
struct Title {
    combo: ComboMatcher,
    clock: f32,
}

impl StateNode<Boot> for Title {
    fn update(&mut self, ctx: &mut NodeContext<'_, Boot>) -> Result<(), HookError> {
        self.clock += FRAME;
        let held = simulated_input(self.clock);
        if self.combo.matches(&held, self.clock) {
            info!("combo entered, leaving title screen");
            ctx.request_transition(Boot::Shutdown)?;
        } else if held.is_empty() {
            self.combo.reset();
        }
        Ok(())
    }
}

// A held from 1.0s, B joins at 1.2s.
fn simulated_input(clock: f32) -> Vec<KeyNote> {
    let mut held = Vec::new();
    if clock >= 1.0 {
        held.push(KeyNote::new(0, PRESSED));
    }
    if clock >= 1.2 {
        held.push(KeyNote::new(1, PRESSED));
    }
    held
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut machine = StateMachineBuilder::new()
        .fallback(
            |state: &Boot, phase: LifecyclePhase, control: &mut Control<'_, Boot>| {
                info!(state = ?state, %phase, "phase forwarded to fallback");
                if *state == Boot::Shutdown && phase == LifecyclePhase::Enter {
                    control.shutdown();
                }
                Ok(())
            },
        )
        .history_capacity(16)
        .build()?;

    machine.register_node(Boot::Splash, Splash { frames: 0 })?;
    machine.register_node(
        Boot::Loading,
        Loading {
            sampler: EasingSampler::new(32)?,
            elapsed: 0.0,
        },
    )?;
    machine.register_node(
        Boot::Title,
        Title {
            combo: ComboMatcher::new(vec![
                ComboStep::bounded(KeyNote::new(0, PRESSED), 0.0, 0.5),
                ComboStep::bounded(KeyNote::new(1, PRESSED), 0.0, 0.5),
            ]),
            clock: 0.0,
        },
    )?;
    machine.register_node(Boot::Shutdown, DefaultNode)?;

    machine.start(Boot::Splash)?;
    let mut frames = 0;
    while !machine.step()?.is_terminated() {
        frames += 1;
    }

    let path: Vec<_> = machine.history().path().into_iter().map(|s| s.name()).collect();
    info!(frames, path = ?path, "boot sequence finished");

    machine.teardown()?;
    Ok(())
}
