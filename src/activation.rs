//! Squashing functions for node activation.
//!
//! Every node in a network applies the same bounded, monotonic nonlinearity to
//! its summed input. The function is chosen once per run through
//! [`GenomeConfig::squash`](crate::config::GenomeConfig::squash) and never varies
//! between nodes.

use serde::{Deserialize, Serialize};

/// Bounded squashing function applied uniformly at every node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Activation {
    /// Sigmoid: f(x) = 1 / (1 + e^(-x)), range (0, 1).
    #[default]
    Sigmoid,
    /// Steepened sigmoid: f(x) = 1 / (1 + e^(-4.9x)), range (0, 1).
    ///
    /// The slope used in the classic NEAT XOR experiments.
    SteepSigmoid,
    /// Hyperbolic tangent: f(x) = tanh(x), range (-1, 1).
    Tanh,
    /// Softsign: f(x) = x / (1 + |x|), range (-1, 1).
    Softsign,
}

impl Activation {
    /// All available squashing functions.
    pub const ALL: [Self; 4] = [Self::Sigmoid, Self::SteepSigmoid, Self::Tanh, Self::Softsign];

    /// Apply this squashing function to an input value.
    ///
    /// NaN propagates. Infinite inputs map onto the range bounds.
    #[inline]
    #[must_use]
    pub fn apply(self, x: f32) -> f32 {
        if x.is_nan() {
            return f32::NAN;
        }

        match self {
            Self::Sigmoid => sigmoid(x),
            Self::SteepSigmoid => sigmoid(4.9 * x),
            Self::Tanh => {
                if x == f32::INFINITY {
                    return 1.0;
                }
                if x == f32::NEG_INFINITY {
                    return -1.0;
                }
                x.tanh()
            }
            Self::Softsign => {
                if x == f32::INFINITY {
                    return 1.0;
                }
                if x == f32::NEG_INFINITY {
                    return -1.0;
                }
                x / (1.0 + x.abs())
            }
        }
    }

    /// The closed interval containing every value [`apply`](Self::apply) can return
    /// for finite input.
    #[must_use]
    pub const fn output_range(self) -> (f32, f32) {
        match self {
            Self::Sigmoid | Self::SteepSigmoid => (0.0, 1.0),
            Self::Tanh | Self::Softsign => (-1.0, 1.0),
        }
    }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    if x == f32::INFINITY {
        return 1.0;
    }
    if x == f32::NEG_INFINITY {
        return 0.0;
    }
    // sigmoid(-88) underflows to 0 in f32, exp(88) is near f32::MAX
    let clamped = x.clamp(-88.0, 88.0);
    1.0 / (1.0 + (-clamped).exp())
}
