//! State and lifecycle phase definitions.
//!
//! A state machine is generic over a small, closed domain of discrete
//! states. The domain is described by the `State` trait, which replaces
//! runtime enumeration of an enum type with an explicit `variants()` list.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::hash::Hash;

/// Trait for the discrete states a machine can occupy.
///
/// # Required Traits
///
/// - `Clone` + `Eq` + `Hash`: states key the node registry
/// - `Debug`: states must be debuggable for diagnostics
/// - `Serialize` + `Deserialize`: transition records are serializable
/// - `Send` + `Sync`: async machines move across tasks
///
/// # Example
///
/// ```rust
/// use stagehand::core::State;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
/// enum Lifecycle {
///     Loading,
///     Running,
///     Shutdown,
/// }
///
/// impl State for Lifecycle {
///     fn name(&self) -> &str {
///         match self {
///             Self::Loading => "Loading",
///             Self::Running => "Running",
///             Self::Shutdown => "Shutdown",
///         }
///     }
///
///     fn variants() -> Vec<Self> {
///         vec![Self::Loading, Self::Running, Self::Shutdown]
///     }
/// }
///
/// assert_eq!(Lifecycle::variants().len(), 3);
/// ```
pub trait State:
    Clone + Eq + Hash + Debug + Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static
{
    /// Get the state's name for display/logging.
    fn name(&self) -> &str;

    /// The finite, ordered domain of this state type.
    ///
    /// Used when a machine auto-registers one node per state. The default
    /// is an empty domain, which auto-registration rejects.
    fn variants() -> Vec<Self>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// A lifecycle event delivered to a state node together with its state.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum LifecyclePhase {
    /// Delivered once, when the node is registered.
    Initialize,
    /// Delivered when the machine moves into the node's state.
    Enter,
    /// Delivered once per loop iteration while no transition is pending.
    Update,
    /// Delivered when the machine leaves the node's state.
    Exit,
    /// Delivered once, when the node is unregistered or the machine is torn down.
    Finalize,
}

impl LifecyclePhase {
    /// All phases, in the order a node observes them.
    pub const ALL: [LifecyclePhase; 5] = [
        Self::Initialize,
        Self::Enter,
        Self::Update,
        Self::Exit,
        Self::Finalize,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize => "Initialize",
            Self::Enter => "Enter",
            Self::Update => "Update",
            Self::Exit => "Exit",
            Self::Finalize => "Finalize",
        }
    }

    /// Phases driven by the loop, as opposed to registration bookkeeping.
    pub fn is_loop_phase(&self) -> bool {
        matches!(self, Self::Enter | Self::Update | Self::Exit)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
