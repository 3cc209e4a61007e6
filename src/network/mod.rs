//! # NeuralNetwork
//!
//! A small fully connected feed-forward network used as a car's brain. Every
//! hidden layer applies the configured [`Activation`]; the output layer is
//! always linear. Networks are values: [`NeuralNetwork::mutate`] returns a new
//! network and never touches the parent's weights.
//!
//! ## Example
//!
//! ```rust
//! use neurorace::network::{Activation, NeuralInput, NeuralNetwork};
//!
//! let net = NeuralNetwork::create_random(12345, &[9, 6, 1], Activation::Relu)?;
//! let input = NeuralInput::new(vec![0.5; 9]);
//! let first = net.run(&input)?;
//! let second = net.run(&input)?;
//! assert!(first.direction.is_finite());
//! assert_eq!(first, second);
//! # Ok::<(), neurorace::error::RaceError>(())
//! ```
pub mod activation;
pub mod weights;

use crate::error::{RaceError, Result, ResultExt};
use crate::rng::RandomNumberGenerator;

pub use activation::Activation;
pub use weights::{LayerWeights, NetworkWeights};

/// Sensor-derived network input.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NeuralInput {
    pub rays: Vec<f64>,
}

impl NeuralInput {
    pub fn new(rays: Vec<f64>) -> Self {
        Self { rays }
    }
}

/// Steering decision. Not clamped; the linear output layer may exceed `[-1, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NeuralOutput {
    pub direction: f64,
}

impl NeuralOutput {
    pub const NEUTRAL: NeuralOutput = NeuralOutput { direction: 0.0 };
}

#[derive(Debug, Clone, PartialEq)]
pub struct NeuralNetwork {
    architecture: Vec<usize>,
    activation: Activation,
    weights: NetworkWeights,
}

impl NeuralNetwork {
    /// Creates a network with gaussian-initialized weights and zero biases.
    ///
    /// ReLU-family activations use He scaling `sqrt(2 / fan_in)`, the others
    /// Xavier scaling `sqrt(2 / (fan_in + fan_out))`.
    ///
    /// # Errors
    ///
    /// Fails if the architecture has fewer than two layers or a zero-width
    /// layer.
    pub fn create_random(seed: u64, architecture: &[usize], activation: Activation) -> Result<Self> {
        validate_architecture(architecture)?;
        let mut rng = RandomNumberGenerator::from_seed(seed);

        let layers = architecture
            .windows(2)
            .map(|pair| {
                let (fan_in, fan_out) = (pair[0], pair[1]);
                let scale = if activation.is_relu_family() {
                    (2.0 / fan_in as f64).sqrt()
                } else {
                    (2.0 / (fan_in + fan_out) as f64).sqrt()
                };
                LayerWeights {
                    weights: (0..fan_out)
                        .map(|_| (0..fan_in).map(|_| rng.normal(0.0, scale)).collect())
                        .collect(),
                    biases: vec![0.0; fan_out],
                }
            })
            .collect();

        Ok(Self {
            architecture: architecture.to_vec(),
            activation,
            weights: NetworkWeights { layers },
        })
    }

    /// Rebuilds a network from serialized weights.
    ///
    /// # Errors
    ///
    /// Fails with a shape mismatch when the structure is ragged or does not
    /// chain layer to layer.
    pub fn from_weights(weights: NetworkWeights, activation: Activation) -> Result<Self> {
        let architecture = weights.architecture()?;
        if weights.values().any(|v| !v.is_finite()) {
            return Err(RaceError::InvalidNumericValue(
                "network weights contain non-finite values".to_string(),
            ));
        }
        Ok(Self {
            architecture,
            activation,
            weights,
        })
    }

    /// Parses the `{"layers":[...]}` JSON form.
    pub fn from_json(json: &str, activation: Activation) -> Result<Self> {
        let weights: NetworkWeights = serde_json::from_str(json)?;
        Self::from_weights(weights, activation)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.weights).context("failed to encode network weights")
    }

    pub fn weights(&self) -> &NetworkWeights {
        &self.weights
    }

    pub fn into_weights(self) -> NetworkWeights {
        self.weights
    }

    pub fn architecture(&self) -> &[usize] {
        &self.architecture
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.parameter_count()
    }

    /// Forward pass.
    ///
    /// Non-finite inputs or outputs yield [`NeuralOutput::NEUTRAL`].
    ///
    /// # Errors
    ///
    /// Returns [`RaceError::InputSize`] when the input width does not match
    /// the first layer.
    pub fn run(&self, input: &NeuralInput) -> Result<NeuralOutput> {
        let expected = self.architecture[0];
        if input.rays.len() != expected {
            return Err(RaceError::InputSize {
                expected,
                actual: input.rays.len(),
            });
        }
        if input.rays.iter().any(|v| !v.is_finite()) {
            return Ok(NeuralOutput::NEUTRAL);
        }

        let last = self.weights.layers.len() - 1;
        let mut activations = input.rays.clone();
        for (l, layer) in self.weights.layers.iter().enumerate() {
            activations = layer
                .weights
                .iter()
                .zip(&layer.biases)
                .map(|(row, bias)| {
                    let sum = row
                        .iter()
                        .zip(&activations)
                        .fold(*bias, |acc, (w, x)| acc + w * x);
                    if l < last {
                        self.activation.apply(sum)
                    } else {
                        sum
                    }
                })
                .collect();
        }

        let direction = activations.first().copied().unwrap_or(0.0);
        if direction.is_finite() {
            Ok(NeuralOutput { direction })
        } else {
            Ok(NeuralOutput::NEUTRAL)
        }
    }

    /// Returns a copy with independent `N(0, sigma)` noise added to every
    /// weight and bias, drawn from a generator seeded with `seed`.
    pub fn mutate(&self, sigma: f64, seed: u64) -> NeuralNetwork {
        let mut rng = RandomNumberGenerator::from_seed(seed);
        let sigma = if sigma.is_finite() { sigma.abs() } else { 0.0 };

        let mut child = self.clone();
        for layer in &mut child.weights.layers {
            for row in &mut layer.weights {
                for w in row.iter_mut() {
                    *w += rng.normal(0.0, sigma);
                }
            }
            for b in &mut layer.biases {
                *b += rng.normal(0.0, sigma);
            }
        }
        child
    }
}

fn validate_architecture(architecture: &[usize]) -> Result<()> {
    if architecture.len() < 2 {
        return Err(RaceError::Configuration(format!(
            "architecture needs an input and an output layer, got {:?}",
            architecture
        )));
    }
    if architecture.contains(&0) {
        return Err(RaceError::Configuration(format!(
            "architecture has a zero-width layer: {:?}",
            architecture
        )));
    }
    Ok(())
}
