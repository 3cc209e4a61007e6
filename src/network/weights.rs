//! Serialized network weights and the elementwise operators the brain
//! selection strategies use on them.
//!
//! The JSON shape is `{"layers":[{"weights":[[..]],"biases":[..]}]}`, with
//! `weights[n][i]` the weight from input `i` into neuron `n`.

use serde::{Deserialize, Serialize};

use crate::error::{RaceError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkWeights {
    pub layers: Vec<LayerWeights>,
}

impl NetworkWeights {
    /// Layer widths implied by the weight matrices, inputs first.
    ///
    /// # Errors
    ///
    /// Fails when the structure is empty, ragged, or consecutive layers do
    /// not chain.
    pub fn architecture(&self) -> Result<Vec<usize>> {
        let first = self
            .layers
            .first()
            .ok_or_else(|| RaceError::ShapeMismatch("network has no layers".to_string()))?;
        let inputs = first.weights.first().map(Vec::len).unwrap_or(0);

        let mut architecture = vec![inputs];
        for (l, layer) in self.layers.iter().enumerate() {
            let fan_in = architecture[l];
            if layer.weights.is_empty() || layer.weights.len() != layer.biases.len() {
                return Err(RaceError::ShapeMismatch(format!(
                    "layer {} has {} weight rows and {} biases",
                    l,
                    layer.weights.len(),
                    layer.biases.len()
                )));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != fan_in) {
                return Err(RaceError::ShapeMismatch(format!(
                    "layer {} row {} has {} weights, expected {}",
                    l,
                    row,
                    layer.weights[row].len(),
                    fan_in
                )));
            }
            architecture.push(layer.weights.len());
        }
        if inputs == 0 {
            return Err(RaceError::ShapeMismatch("network has zero inputs".to_string()));
        }
        Ok(architecture)
    }

    /// Trainable parameter count (weights plus biases).
    pub fn parameter_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.biases.len() + l.weights.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    pub fn same_shape(&self, other: &NetworkWeights) -> bool {
        self.layers.len() == other.layers.len()
            && self.layers.iter().zip(&other.layers).all(|(a, b)| {
                a.biases.len() == b.biases.len()
                    && a.weights.len() == b.weights.len()
                    && a.weights.iter().zip(&b.weights).all(|(x, y)| x.len() == y.len())
            })
    }

    /// Elementwise mean of two same-shaped structures ("crossover").
    pub fn average(&self, other: &NetworkWeights) -> Result<NetworkWeights> {
        self.zip_with(other, |a, b| (a + b) * 0.5)
    }

    /// Extrapolates past `alltime` away from `generation`:
    /// `alltime + (alltime - generation)`.
    pub fn overcorrect(alltime: &NetworkWeights, generation: &NetworkWeights) -> Result<NetworkWeights> {
        alltime.zip_with(generation, |a, g| a + (a - g))
    }

    /// `(1 - ratio) * self + ratio * other`.
    pub fn blend(&self, other: &NetworkWeights, ratio: f64) -> Result<NetworkWeights> {
        self.zip_with(other, |a, b| (1.0 - ratio) * a + ratio * b)
    }

    fn zip_with<F>(&self, other: &NetworkWeights, f: F) -> Result<NetworkWeights>
    where
        F: Fn(f64, f64) -> f64,
    {
        if !self.same_shape(other) {
            return Err(RaceError::ShapeMismatch(
                "weight structures have different layer shapes".to_string(),
            ));
        }

        let layers = self
            .layers
            .iter()
            .zip(&other.layers)
            .map(|(a, b)| LayerWeights {
                weights: a
                    .weights
                    .iter()
                    .zip(&b.weights)
                    .map(|(ra, rb)| zip_values(ra, rb, &f))
                    .collect(),
                biases: zip_values(&a.biases, &b.biases, &f),
            })
            .collect();
        Ok(NetworkWeights { layers })
    }

    /// Iterates every weight and bias in layer order.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.layers.iter().flat_map(|l| {
            l.weights
                .iter()
                .flat_map(|row| row.iter().copied())
                .chain(l.biases.iter().copied())
        })
    }
}

fn zip_values<F>(a: &[f64], b: &[f64], f: &F) -> Vec<f64>
where
    F: Fn(f64, f64) -> f64,
{
    a.iter().zip(b).map(|(&x, &y)| f(x, y)).collect()
}
