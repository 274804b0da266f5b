//! Timed key-combo matching.
//!
//! A combo is a timeline of [`ComboStep`]s, each saying which key note must
//! be held during which window. The timeline is anchored at the first call
//! that sees any input, so step times are relative to when the player
//! started the combo rather than to the game clock.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// A key (button id, touch id, ...) together with its status (down, held, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyNote {
    pub key: i32,
    pub status: i32,
}

impl KeyNote {
    pub fn new(key: i32, status: i32) -> Self {
        Self { key, status }
    }
}

/// One entry of a combo timeline.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComboStep {
    pub note: KeyNote,
    /// Seconds after the anchor at which the step becomes live.
    pub start: f32,
    /// How long the step stays live; `None` keeps it live forever.
    pub duration: Option<f32>,
}

impl ComboStep {
    /// A step live during `[start, start + duration]`.
    ///
    /// A non-positive duration means the step never expires.
    pub fn bounded(note: KeyNote, start: f32, duration: f32) -> Self {
        Self {
            note,
            start,
            duration: (duration > 0.0).then_some(duration),
        }
    }

    /// A step live from `start` onwards.
    pub fn open(note: KeyNote, start: f32) -> Self {
        Self {
            note,
            start,
            duration: None,
        }
    }

    /// Whether the step's window covers `elapsed` seconds after the anchor.
    pub fn is_live(&self, elapsed: f32) -> bool {
        self.start <= elapsed
            && self
                .duration
                .map_or(true, |duration| self.start + duration >= elapsed)
    }
}

/// Matches live input against a combo timeline.
///
/// # Example
///
/// ```rust
/// use stagehand::combo::{ComboMatcher, ComboStep, KeyNote};
///
/// const DOWN: i32 = 1;
/// let punch = KeyNote::new(7, DOWN);
/// let kick = KeyNote::new(8, DOWN);
///
/// let mut matcher = ComboMatcher::new(vec![
///     ComboStep::bounded(punch, 0.0, 0.5),
///     ComboStep::bounded(kick, 0.4, 0.5),
/// ]);
///
/// assert!(matcher.matches(&[punch], 10.0));
/// assert!(!matcher.matches(&[punch], 10.45));
/// assert!(matcher.matches(&[punch, kick], 10.45));
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ComboMatcher {
    steps: Vec<ComboStep>,
    anchor: Option<f32>,
}

impl ComboMatcher {
    pub fn new(steps: Vec<ComboStep>) -> Self {
        Self {
            steps,
            anchor: None,
        }
    }

    pub fn push(&mut self, step: ComboStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ComboStep] {
        &self.steps
    }

    /// Time of the call that anchored the timeline, if any.
    pub fn anchor(&self) -> Option<f32> {
        self.anchor
    }

    /// True when every step live at `now` is matched by an active note.
    ///
    /// Returns false without anchoring when there are no steps or no
    /// active notes, and false when no step is live at `now`.
    pub fn matches(&mut self, active: &[KeyNote], now: f32) -> bool {
        if self.steps.is_empty() || active.is_empty() {
            return false;
        }

        let anchor = *self.anchor.get_or_insert_with(|| {
            trace!(anchor = now, "combo timeline anchored");
            now
        });
        let elapsed = now - anchor;

        let mut live = self.steps.iter().filter(|step| step.is_live(elapsed)).peekable();
        if live.peek().is_none() {
            return false;
        }
        live.all(|step| active.contains(&step.note))
    }

    /// Forget the anchor; the next call with input starts a new attempt.
    pub fn reset(&mut self) {
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOWN: i32 = 1;
    const HELD: i32 = 2;

    fn note(key: i32, status: i32) -> KeyNote {
        KeyNote::new(key, status)
    }

    #[test]
    fn empty_inputs_never_match_and_do_not_anchor() {
        let mut empty = ComboMatcher::default();
        assert!(!empty.matches(&[note(1, DOWN)], 0.0));

        let mut matcher = ComboMatcher::new(vec![ComboStep::open(note(1, DOWN), 0.0)]);
        assert!(!matcher.matches(&[], 3.0));
        assert_eq!(matcher.anchor(), None);
    }

    #[test]
    fn first_call_with_input_anchors_timeline() {
        let mut matcher = ComboMatcher::new(vec![ComboStep::bounded(note(1, DOWN), 0.0, 1.0)]);

        assert!(matcher.matches(&[note(1, DOWN)], 5.0));
        assert_eq!(matcher.anchor(), Some(5.0));
        assert!(matcher.matches(&[note(1, DOWN)], 6.0));
        assert!(!matcher.matches(&[note(1, DOWN)], 6.5));
    }

    #[test]
    fn no_live_step_is_not_a_match() {
        let mut matcher = ComboMatcher::new(vec![ComboStep::bounded(note(1, DOWN), 1.0, 1.0)]);

        assert!(!matcher.matches(&[note(1, DOWN)], 0.0));
        assert!(matcher.matches(&[note(1, DOWN)], 1.5));
    }

    #[test]
    fn status_must_match_as_well_as_key() {
        let mut matcher = ComboMatcher::new(vec![ComboStep::open(note(4, HELD), 0.0)]);

        assert!(!matcher.matches(&[note(4, DOWN)], 0.0));
        assert!(matcher.matches(&[note(4, DOWN), note(4, HELD)], 0.1));
    }

    #[test]
    fn every_live_step_must_be_active() {
        let mut matcher = ComboMatcher::new(vec![
            ComboStep::open(note(1, DOWN), 0.0),
            ComboStep::bounded(note(2, DOWN), 0.5, 0.5),
        ]);

        assert!(matcher.matches(&[note(1, DOWN)], 0.0));
        assert!(!matcher.matches(&[note(1, DOWN)], 0.75));
        assert!(matcher.matches(&[note(2, DOWN), note(1, DOWN)], 0.75));
        assert!(matcher.matches(&[note(1, DOWN)], 2.0));
    }

    #[test]
    fn non_positive_duration_never_expires() {
        let step = ComboStep::bounded(note(1, DOWN), 2.0, 0.0);

        assert_eq!(step.duration, None);
        assert!(!step.is_live(1.0));
        assert!(step.is_live(1_000.0));
    }

    #[test]
    fn reset_reanchors_on_next_input() {
        let mut matcher = ComboMatcher::new(vec![ComboStep::bounded(note(1, DOWN), 0.0, 1.0)]);
        matcher.matches(&[note(1, DOWN)], 0.0);
        assert!(!matcher.matches(&[note(1, DOWN)], 10.0));

        matcher.reset();
        assert!(matcher.matches(&[note(1, DOWN)], 10.0));
        assert_eq!(matcher.anchor(), Some(10.0));
    }
}
