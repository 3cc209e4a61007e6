//! # EvolutionOptions
//!
//! Tunables of the [`GeneticAlgorithm`](super::genetic::GeneticAlgorithm)
//! that are not tied to one species: spawn heading jitter, the elite's size
//! marker, fallback and preset mutation rates, and the knobs of the mutation
//! schedule.
//!
//! ## Example
//!
//! ```rust
//! use neurorace::evolution::mutation::MutationRange;
//! use neurorace::evolution::options::EvolutionOptions;
//!
//! let options = EvolutionOptions::builder()
//!     .initial_heading_jitter_deg(30.0)
//!     .mutation_presets(vec![MutationRange::new(0.5, 0.1), MutationRange::new(0.2, 0.02)])
//!     .max_markers(20)
//!     .build();
//!
//! assert_eq!(options.get_max_markers(), 20);
//! assert_eq!(options.preset(1), Some(MutationRange::new(0.2, 0.02)));
//! assert_eq!(options.preset(5), None);
//! ```

use serde::{Deserialize, Serialize};

use super::mutation::{CubicBezier, MutationRange, MutationSchedule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionOptions {
    /// Heading jitter of freshly initialized populations, ± degrees.
    initial_heading_jitter_deg: f64,
    /// Heading jitter of mutated offspring, ± degrees. The elite gets none.
    respawn_heading_jitter_deg: f64,
    elite_size_multiplier: f64,
    /// Used when a species carries no usable mutation bounds.
    base_mutation_rate: f64,
    floor_mutation_rate: f64,
    mutation_presets: Vec<MutationRange>,
    decay_curve: CubicBezier,
    param_scale_min: f64,
    param_scale_max: f64,
    nearness_boost: f64,
    max_markers: usize,
}

impl EvolutionOptions {
    pub fn get_initial_heading_jitter_deg(&self) -> f64 {
        self.initial_heading_jitter_deg
    }

    pub fn get_respawn_heading_jitter_deg(&self) -> f64 {
        self.respawn_heading_jitter_deg
    }

    pub fn get_elite_size_multiplier(&self) -> f64 {
        self.elite_size_multiplier
    }

    pub fn get_base_mutation_rate(&self) -> f64 {
        self.base_mutation_rate
    }

    pub fn get_floor_mutation_rate(&self) -> f64 {
        self.floor_mutation_rate
    }

    pub fn get_mutation_presets(&self) -> &[MutationRange] {
        &self.mutation_presets
    }

    pub fn get_max_markers(&self) -> usize {
        self.max_markers
    }

    /// Preset selected by a host-side mutation-rate index.
    pub fn preset(&self, index: usize) -> Option<MutationRange> {
        self.mutation_presets.get(index).copied()
    }

    pub fn fallback_range(&self) -> MutationRange {
        MutationRange::new(self.base_mutation_rate, self.floor_mutation_rate)
    }

    /// The sigma pipeline built from these options.
    pub fn schedule(&self) -> MutationSchedule {
        MutationSchedule {
            decay_curve: self.decay_curve,
            param_scale_min: self.param_scale_min,
            param_scale_max: self.param_scale_max,
            nearness_boost: self.nearness_boost,
        }
    }

    pub fn set_max_markers(&mut self, max_markers: usize) {
        self.max_markers = max_markers;
    }

    pub fn set_mutation_presets(&mut self, presets: Vec<MutationRange>) {
        self.mutation_presets = presets;
    }

    /// Returns a builder for creating an `EvolutionOptions` instance.
    pub fn builder() -> EvolutionOptionsBuilder {
        EvolutionOptionsBuilder::default()
    }
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        EvolutionOptionsBuilder::default().build()
    }
}

/// Builder for `EvolutionOptions`. Unset fields take the defaults.
#[derive(Debug, Clone, Default)]
pub struct EvolutionOptionsBuilder {
    initial_heading_jitter_deg: Option<f64>,
    respawn_heading_jitter_deg: Option<f64>,
    elite_size_multiplier: Option<f64>,
    base_mutation_rate: Option<f64>,
    floor_mutation_rate: Option<f64>,
    mutation_presets: Option<Vec<MutationRange>>,
    decay_curve: Option<CubicBezier>,
    param_scale_min: Option<f64>,
    param_scale_max: Option<f64>,
    nearness_boost: Option<f64>,
    max_markers: Option<usize>,
}

impl EvolutionOptionsBuilder {
    pub fn initial_heading_jitter_deg(mut self, value: f64) -> Self {
        self.initial_heading_jitter_deg = Some(value);
        self
    }

    pub fn respawn_heading_jitter_deg(mut self, value: f64) -> Self {
        self.respawn_heading_jitter_deg = Some(value);
        self
    }

    pub fn elite_size_multiplier(mut self, value: f64) -> Self {
        self.elite_size_multiplier = Some(value);
        self
    }

    pub fn base_mutation_rate(mut self, value: f64) -> Self {
        self.base_mutation_rate = Some(value);
        self
    }

    pub fn floor_mutation_rate(mut self, value: f64) -> Self {
        self.floor_mutation_rate = Some(value);
        self
    }

    pub fn mutation_presets(mut self, value: Vec<MutationRange>) -> Self {
        self.mutation_presets = Some(value);
        self
    }

    pub fn decay_curve(mut self, value: CubicBezier) -> Self {
        self.decay_curve = Some(value);
        self
    }

    /// Multipliers for the largest (`min`) and smallest (`max`) network.
    pub fn param_scale(mut self, min: f64, max: f64) -> Self {
        self.param_scale_min = Some(min);
        self.param_scale_max = Some(max);
        self
    }

    pub fn nearness_boost(mut self, value: f64) -> Self {
        self.nearness_boost = Some(value);
        self
    }

    pub fn max_markers(mut self, value: usize) -> Self {
        self.max_markers = Some(value);
        self
    }

    pub fn build(self) -> EvolutionOptions {
        EvolutionOptions {
            initial_heading_jitter_deg: self.initial_heading_jitter_deg.unwrap_or(45.0),
            respawn_heading_jitter_deg: self.respawn_heading_jitter_deg.unwrap_or(10.0),
            elite_size_multiplier: self.elite_size_multiplier.unwrap_or(1.5),
            base_mutation_rate: self.base_mutation_rate.unwrap_or(0.3),
            floor_mutation_rate: self.floor_mutation_rate.unwrap_or(0.05),
            mutation_presets: self.mutation_presets.unwrap_or_else(|| {
                vec![
                    MutationRange::new(0.5, 0.1),
                    MutationRange::new(0.3, 0.05),
                    MutationRange::new(0.1, 0.01),
                ]
            }),
            decay_curve: self.decay_curve.unwrap_or_default(),
            param_scale_min: self.param_scale_min.unwrap_or(0.5),
            param_scale_max: self.param_scale_max.unwrap_or(1.5),
            nearness_boost: self.nearness_boost.unwrap_or(1.0),
            max_markers: self.max_markers.unwrap_or(50),
        }
    }
}
