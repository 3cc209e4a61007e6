//! Hidden-layer activation functions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RaceError;

/// The closed set of hidden-layer activations.
///
/// The output layer of a [`NeuralNetwork`](super::NeuralNetwork) is always
/// linear regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    /// Identity.
    None,
    #[default]
    Relu,
    /// Tanh approximation of GELU.
    Gelu,
    /// Heaviside step, `0` at the origin.
    Step,
    /// `x * sigmoid(x)`, the gate used by SwiGLU.
    #[serde(alias = "swiglu")]
    Swish,
    Linear,
}

impl Activation {
    pub const ALL: [Activation; 6] = [
        Activation::None,
        Activation::Relu,
        Activation::Gelu,
        Activation::Step,
        Activation::Swish,
        Activation::Linear,
    ];

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::None | Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::Gelu => {
                const SQRT_2_OVER_PI: f64 = 0.797_884_560_802_865_4;
                0.5 * x * (1.0 + (SQRT_2_OVER_PI * (x + 0.044_715 * x * x * x)).tanh())
            }
            Activation::Step => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Swish => x / (1.0 + (-x).exp()),
        }
    }

    /// ReLU-like activations get He initialization, the rest Xavier.
    pub fn is_relu_family(self) -> bool {
        matches!(self, Activation::Relu | Activation::Gelu | Activation::Swish)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Activation::None => "none",
            Activation::Relu => "relu",
            Activation::Gelu => "gelu",
            Activation::Step => "step",
            Activation::Swish => "swish",
            Activation::Linear => "linear",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Activation {
    type Err = RaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "identity" => Ok(Activation::None),
            "relu" => Ok(Activation::Relu),
            "gelu" => Ok(Activation::Gelu),
            "step" | "heaviside" => Ok(Activation::Step),
            "swish" | "swiglu" => Ok(Activation::Swish),
            "linear" => Ok(Activation::Linear),
            _ => Err(RaceError::UnknownActivation(s.to_string())),
        }
    }
}
