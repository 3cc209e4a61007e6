//! Species (car-brain configurations) and brain-selection strategies.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::car::InputModification;
use crate::error::{RaceError, Result};
use crate::network::Activation;

/// Identifier of one independently evolved sub-population.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpeciesId(String);

impl SpeciesId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SpeciesId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SpeciesId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for SpeciesId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A named architecture + activation + input mode, evolved on its own.
///
/// The crate treats this as validated input supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub id: SpeciesId,
    pub architecture: Vec<usize>,
    #[serde(default)]
    pub input_modification: InputModification,
    #[serde(default)]
    pub activation: Activation,
    /// Mutation sigma at zero progress.
    pub base_mutation_rate: f64,
    /// Mutation sigma the distance decay eases toward.
    pub min_mutation_rate: f64,
    /// Opaque render tag for the elite car.
    #[serde(default)]
    pub elite_color: String,
    /// Opaque render tag for the other cars.
    #[serde(default)]
    pub color: String,
}

impl SpeciesConfig {
    pub fn new(id: impl Into<SpeciesId>, architecture: Vec<usize>, activation: Activation) -> Self {
        Self {
            id: id.into(),
            architecture,
            input_modification: InputModification::Direct,
            activation,
            base_mutation_rate: 0.3,
            min_mutation_rate: 0.05,
            elite_color: String::new(),
            color: String::new(),
        }
    }

    pub fn with_input_modification(mut self, input_modification: InputModification) -> Self {
        self.input_modification = input_modification;
        self
    }

    pub fn with_mutation_rates(mut self, base: f64, min: f64) -> Self {
        self.base_mutation_rate = base;
        self.min_mutation_rate = min;
        self
    }

    pub fn with_colors(mut self, color: impl Into<String>, elite_color: impl Into<String>) -> Self {
        self.color = color.into();
        self.elite_color = elite_color.into();
        self
    }

    /// Weights plus biases of a network with this architecture.
    pub fn parameter_count(&self) -> usize {
        self.architecture
            .windows(2)
            .map(|pair| pair[0] * pair[1] + pair[1])
            .sum()
    }
}

/// Rule choosing the brain carried into the next generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrainStrategy {
    /// Always this generation's best.
    Generation,
    /// This generation's best only if it matches the stored all-time best.
    #[default]
    AllTime,
    /// Elementwise mean of the all-time best and this generation's best.
    #[serde(alias = "sexual")]
    Averaging,
    /// `alltime + (alltime - generation)`.
    Overcorrect,
}

impl FromStr for BrainStrategy {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generation" => Ok(BrainStrategy::Generation),
            "alltime" | "all-time" => Ok(BrainStrategy::AllTime),
            "averaging" | "sexual" => Ok(BrainStrategy::Averaging),
            "overcorrect" => Ok(BrainStrategy::Overcorrect),
            _ => Err(RaceError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for BrainStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            BrainStrategy::Generation => "generation",
            BrainStrategy::AllTime => "alltime",
            BrainStrategy::Averaging => "averaging",
            BrainStrategy::Overcorrect => "overcorrect",
        };
        f.write_str(tag)
    }
}
