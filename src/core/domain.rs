//! Validation of state domains used for auto-registration.
//!
//! Uses Stillwater's `Validation` so every problem with a domain is
//! reported in one pass instead of stopping at the first duplicate.

use super::state::State;
use indexmap::IndexSet;
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// A problem found in a state domain.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainViolation {
    #[error("State domain is empty")]
    Empty,

    #[error("State '{state}' appears more than once in the domain")]
    Duplicate { state: String },
}

/// Check that a domain is non-empty and lists every state once.
///
/// Each duplicated state is reported once, however many times it repeats.
///
/// # Example
///
/// ```rust
/// use stagehand::core::{validate_domain, DomainViolation};
/// use stagehand::state_enum;
/// use stillwater::validation::Validation;
///
/// state_enum! {
///     enum Light { Red, Green }
/// }
///
/// assert!(validate_domain(&[Light::Red, Light::Green]).is_success());
///
/// match validate_domain(&[Light::Red, Light::Red, Light::Green, Light::Green]) {
///     Validation::Failure(errors) => assert_eq!(errors.len(), 2),
///     Validation::Success(_) => panic!("duplicates must be rejected"),
/// }
/// ```
pub fn validate_domain<S: State>(states: &[S]) -> Validation<(), NonEmptyVec<DomainViolation>> {
    let mut checks: Vec<Validation<(), NonEmptyVec<DomainViolation>>> = Vec::new();

    let check = if states.is_empty() {
        Validation::fail(DomainViolation::Empty)
    } else {
        Validation::success(())
    };
    checks.push(check);

    let mut seen = IndexSet::new();
    let mut reported = IndexSet::new();
    for state in states {
        if !seen.insert(state) && reported.insert(state) {
            checks.push(Validation::fail(DomainViolation::Duplicate {
                state: state.name().to_string(),
            }));
        }
    }

    Validation::all_vec(checks).map(|_| ())
}
