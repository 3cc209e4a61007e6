//! Mutation-rate scheduling.
//!
//! Three independent modifiers, each a pure function:
//!
//! - [`distance_decayed_sigma`] eases from a base rate toward a floor rate as
//!   the generation's best car gets further around the track.
//! - [`parameter_scale`] lowers the rate for networks with more parameters.
//! - [`nearness_blend`] boosts the rate when the population keeps dying near
//!   the all-time-best death point.
//!
//! [`MutationSchedule`] composes them in that order.

use serde::{Deserialize, Serialize};

/// CSS-style cubic Bézier easing curve from `(0, 0)` to `(1, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl CubicBezier {
    pub const LINEAR: CubicBezier = CubicBezier::new(0.0, 0.0, 1.0, 1.0);
    pub const EASE_OUT: CubicBezier = CubicBezier::new(0.0, 0.0, 0.58, 1.0);

    pub const fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    fn component(p1: f64, p2: f64, s: f64) -> f64 {
        let inv = 1.0 - s;
        3.0 * inv * inv * s * p1 + 3.0 * inv * s * s * p2 + s * s * s
    }

    fn component_slope(p1: f64, p2: f64, s: f64) -> f64 {
        let inv = 1.0 - s;
        3.0 * inv * inv * p1 + 6.0 * inv * s * (p2 - p1) + 3.0 * s * s * (1.0 - p2)
    }

    /// Eased value for progress `t`, clamped to `[0, 1]`.
    pub fn ease(&self, t: f64) -> f64 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let x1 = self.x1.clamp(0.0, 1.0);
        let x2 = self.x2.clamp(0.0, 1.0);

        // Newton first, bisection if the slope flattens out.
        let mut s = t;
        for _ in 0..8 {
            let err = Self::component(x1, x2, s) - t;
            if err.abs() < 1e-9 {
                return Self::component(self.y1, self.y2, s);
            }
            let slope = Self::component_slope(x1, x2, s);
            if slope.abs() < 1e-6 {
                break;
            }
            s = (s - err / slope).clamp(0.0, 1.0);
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        s = t;
        for _ in 0..60 {
            let x = Self::component(x1, x2, s);
            if (x - t).abs() < 1e-9 {
                break;
            }
            if x < t {
                lo = s;
            } else {
                hi = s;
            }
            s = 0.5 * (lo + hi);
        }
        Self::component(self.y1, self.y2, s)
    }
}

impl Default for CubicBezier {
    fn default() -> Self {
        Self::EASE_OUT
    }
}

/// Eases from `base` toward `floor` as `progress_ratio` goes from 0 to 1.
pub fn distance_decayed_sigma(base: f64, floor: f64, progress_ratio: f64, curve: &CubicBezier) -> f64 {
    base - (base - floor) * curve.ease(progress_ratio)
}

/// Multiplier for a network with `param_count` parameters.
///
/// Linear from `max_multiplier` at the smallest network in the population to
/// `min_multiplier` at the largest. A degenerate range yields `1.0`.
pub fn parameter_scale(
    param_count: usize,
    min_count: usize,
    max_count: usize,
    min_multiplier: f64,
    max_multiplier: f64,
) -> f64 {
    if max_count <= min_count {
        return 1.0;
    }
    let frac = (param_count.saturating_sub(min_count) as f64 / (max_count - min_count) as f64)
        .clamp(0.0, 1.0);
    max_multiplier - frac * (max_multiplier - min_multiplier)
}

/// How close this generation's best got to the all-time best, in `[0, 1]`.
///
/// `1` means within `window` of it or beyond, `0` means at least `window`
/// short of it or no all-time best yet.
pub fn nearness_ratio(generation_best: f64, all_time_best: f64, window: f64) -> f64 {
    if all_time_best <= 0.0 || window <= 0.0 {
        return 0.0;
    }
    let gap = (all_time_best - generation_best).max(0.0);
    (1.0 - gap / window).clamp(0.0, 1.0)
}

/// Raises `sigma` by up to `boost` (relative) as `nearness` approaches 1.
pub fn nearness_blend(sigma: f64, nearness: f64, boost: f64) -> f64 {
    let nearness = if nearness.is_nan() { 0.0 } else { nearness.clamp(0.0, 1.0) };
    sigma * (1.0 + boost * nearness)
}

/// Base and floor sigma of one mutation-rate preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MutationRange {
    pub base: f64,
    pub floor: f64,
}

impl MutationRange {
    pub const fn new(base: f64, floor: f64) -> Self {
        Self { base, floor }
    }
}

/// Knobs for composing the three modifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationSchedule {
    pub decay_curve: CubicBezier,
    pub param_scale_min: f64,
    pub param_scale_max: f64,
    pub nearness_boost: f64,
}

impl Default for MutationSchedule {
    fn default() -> Self {
        Self {
            decay_curve: CubicBezier::default(),
            param_scale_min: 0.5,
            param_scale_max: 1.5,
            nearness_boost: 1.0,
        }
    }
}

/// Everything the schedule needs to price one generation's mutation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaInputs {
    pub base_rate: f64,
    pub floor_rate: f64,
    /// `None` skips the distance decay and uses the floor rate.
    pub progress_ratio: Option<f64>,
    pub param_count: usize,
    /// Smallest and largest parameter counts among the active species.
    pub param_range: (usize, usize),
    pub nearness: Option<f64>,
}

impl MutationSchedule {
    pub fn sigma(&self, inputs: &SigmaInputs) -> f64 {
        let decayed = match inputs.progress_ratio {
            Some(ratio) => {
                distance_decayed_sigma(inputs.base_rate, inputs.floor_rate, ratio, &self.decay_curve)
            }
            None => inputs.floor_rate,
        };
        let scaled = decayed
            * parameter_scale(
                inputs.param_count,
                inputs.param_range.0,
                inputs.param_range.1,
                self.param_scale_min,
                self.param_scale_max,
            );
        let sigma = match inputs.nearness {
            Some(nearness) => nearness_blend(scaled, nearness, self.nearness_boost),
            None => scaled,
        };
        sigma.max(0.0)
    }
}
