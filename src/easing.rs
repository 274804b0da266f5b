//! Pre-sampled easing curves for timed transitions.
//!
//! Each base easing function is sampled once into a [`SampledCurve`] and
//! evaluated by Hermite interpolation over smoothed tangents. Combined
//! in/out curves (ease in over the first half, ease out over the second)
//! are built on first use and cached per pair.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;
use thiserror::Error;
use tracing::debug;

/// Smallest resolution that still describes a curve.
pub const MIN_SAMPLE_COUNT: usize = 2;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EasingError {
    #[error("Easing curves need at least {MIN_SAMPLE_COUNT} samples, got {0}")]
    TooFewSamples(usize),
}

/// The base easing families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EasingKind {
    Sine,
    Quad,
    Cubic,
}

impl EasingKind {
    pub const ALL: [EasingKind; 3] = [Self::Sine, Self::Quad, Self::Cubic];

    /// Accelerating from zero velocity.
    pub fn ease_in(self, t: f32) -> f32 {
        match self {
            Self::Sine => 1.0 - (t * FRAC_PI_2).cos(),
            Self::Quad => t * t,
            Self::Cubic => t * t * t,
        }
    }

    /// Decelerating to zero velocity.
    pub fn ease_out(self, t: f32) -> f32 {
        match self {
            Self::Sine => (t * FRAC_PI_2).sin(),
            Self::Quad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::Cubic => 1.0 - (1.0 - t).powi(3),
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Sine => 0,
            Self::Quad => 1,
            Self::Cubic => 2,
        }
    }
}

/// One key of a sampled curve.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurveKey {
    pub time: f32,
    pub value: f32,
    pub tangent: f32,
}

/// A curve stored as keys sorted by time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampledCurve {
    keys: Vec<CurveKey>,
}

impl SampledCurve {
    /// Build a curve through `(time, value)` points.
    ///
    /// Points are sorted by time. Each key's tangent is the mean of the
    /// slopes to its neighbors (one-sided at the ends).
    pub fn from_points(mut points: Vec<(f32, f32)>) -> Self {
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        let slope = |a: (f32, f32), b: (f32, f32)| {
            let dt = b.0 - a.0;
            if dt > 0.0 {
                (b.1 - a.1) / dt
            } else {
                0.0
            }
        };

        let keys = (0..points.len())
            .map(|i| {
                let incoming = i.checked_sub(1).map(|prev| slope(points[prev], points[i]));
                let outgoing = points.get(i + 1).map(|&next| slope(points[i], next));
                let tangent = match (incoming, outgoing) {
                    (Some(a), Some(b)) => (a + b) / 2.0,
                    (Some(a), None) | (None, Some(a)) => a,
                    (None, None) => 0.0,
                };
                CurveKey {
                    time: points[i].0,
                    value: points[i].1,
                    tangent,
                }
            })
            .collect();

        Self { keys }
    }

    fn sample<F: Fn(f32) -> f32>(sample_count: usize, f: F) -> Self {
        let last = (sample_count - 1) as f32;
        Self::from_points(
            (0..sample_count)
                .map(|i| {
                    let t = i as f32 / last;
                    (t, f(t))
                })
                .collect(),
        )
    }

    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Value at `time`, clamped to the curve's time range. NaN evaluates
    /// to the first key.
    pub fn evaluate(&self, time: f32) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if time.is_nan() || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let upper = self.keys.partition_point(|key| key.time <= time);
        let (a, b) = (self.keys[upper - 1], self.keys[upper]);
        let dt = b.time - a.time;
        let s = (time - a.time) / dt;
        let (s2, s3) = (s * s, s * s * s);

        (2.0 * s3 - 3.0 * s2 + 1.0) * a.value
            + (s3 - 2.0 * s2 + s) * dt * a.tangent
            + (-2.0 * s3 + 3.0 * s2) * b.value
            + (s3 - s2) * dt * b.tangent
    }
}

/// Sampled easing curves with a per-pair cache.
///
/// # Example
///
/// ```rust
/// use stagehand::easing::{EasingKind, EasingSampler};
///
/// let mut sampler = EasingSampler::new(32).unwrap();
///
/// let halfway = sampler.sample(Some(EasingKind::Quad), Some(EasingKind::Cubic), 0.5);
/// assert!((halfway.unwrap() - 0.5).abs() < 1e-4);
/// assert_eq!(sampler.sample(None, None, 0.5), None);
/// ```
#[derive(Clone, Debug)]
pub struct EasingSampler {
    sample_count: usize,
    ease_in: [SampledCurve; 3],
    ease_out: [SampledCurve; 3],
    pairs: HashMap<(EasingKind, EasingKind), SampledCurve>,
}

impl EasingSampler {
    pub fn new(sample_count: usize) -> Result<Self, EasingError> {
        if sample_count < MIN_SAMPLE_COUNT {
            return Err(EasingError::TooFewSamples(sample_count));
        }

        Ok(Self {
            sample_count,
            ease_in: EasingKind::ALL.map(|kind| SampledCurve::sample(sample_count, |t| kind.ease_in(t))),
            ease_out: EasingKind::ALL
                .map(|kind| SampledCurve::sample(sample_count, |t| kind.ease_out(t))),
            pairs: HashMap::new(),
        })
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Number of in/out pair curves built so far.
    pub fn cached_pairs(&self) -> usize {
        self.pairs.len()
    }

    /// The curve for an in/out pair.
    ///
    /// `None` when both sides are absent; a single side yields its base
    /// curve. A full pair eases in over `[0, 0.5]` and out over `[0.5, 1]`.
    pub fn curve(
        &mut self,
        ease_in: Option<EasingKind>,
        ease_out: Option<EasingKind>,
    ) -> Option<&SampledCurve> {
        match (ease_in, ease_out) {
            (None, None) => None,
            (Some(kind), None) => Some(&self.ease_in[kind.index()]),
            (None, Some(kind)) => Some(&self.ease_out[kind.index()]),
            (Some(in_kind), Some(out_kind)) => {
                let sample_count = self.sample_count;
                let (ins, outs) = (&self.ease_in, &self.ease_out);
                let curve = self.pairs.entry((in_kind, out_kind)).or_insert_with(|| {
                    debug!(?in_kind, ?out_kind, "building easing pair curve");
                    pair_curve(
                        &ins[in_kind.index()],
                        &outs[out_kind.index()],
                        sample_count,
                    )
                });
                Some(curve)
            }
        }
    }

    /// Evaluate the in/out pair's curve at `time` in `[0, 1]`.
    pub fn sample(
        &mut self,
        ease_in: Option<EasingKind>,
        ease_out: Option<EasingKind>,
        time: f32,
    ) -> Option<f32> {
        self.curve(ease_in, ease_out)
            .map(|curve| curve.evaluate(time))
    }
}

fn pair_curve(ease_in: &SampledCurve, ease_out: &SampledCurve, sample_count: usize) -> SampledCurve {
    let last = (sample_count - 1) as f32;
    let mut points = Vec::with_capacity(sample_count * 2);
    for i in 0..sample_count {
        let t = i as f32 / last;
        points.push((t / 2.0, ease_in.evaluate(t) / 2.0));
        if i > 0 {
            points.push((0.5 + t / 2.0, 0.5 + ease_out.evaluate(t) / 2.0));
        }
    }
    SampledCurve::from_points(points)
}
