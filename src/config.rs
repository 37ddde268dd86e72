//! Hyperparameters for genome construction, mutation and reproduction.

use serde::{Deserialize, Serialize};

use crate::activation::Activation;
use crate::error::{NeatError, Result};

/// Per-genome configuration, carried by every genome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenomeConfig {
    /// Number of input nodes.
    pub num_inputs: usize,
    /// Number of output nodes.
    pub num_outputs: usize,
    /// Squashing function applied at every node.
    pub squash: Activation,
    /// Range for initial and replaced weights: [-weight_range, weight_range].
    pub weight_range: f32,
    /// Probability of mutating each connection weight.
    pub weight_mutation_prob: f32,
    /// Maximum perturbation applied to a mutated weight.
    pub weight_mutation_power: f32,
    /// Probability that a mutated weight is replaced instead of perturbed.
    pub weight_replace_prob: f32,
    /// Admit self-loops, loops into inputs and cycle-closing edges as
    /// recurrent connections.
    pub allow_recurrence: bool,
}

impl Default for GenomeConfig {
    fn default() -> Self {
        Self {
            num_inputs: 2,
            num_outputs: 1,
            squash: Activation::Sigmoid,
            weight_range: 1.0,
            weight_mutation_prob: 0.8,
            weight_mutation_power: 0.5,
            weight_replace_prob: 0.1,
            allow_recurrence: false,
        }
    }
}

impl GenomeConfig {
    /// Feedforward configuration for the given layer sizes.
    #[must_use]
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            num_inputs,
            num_outputs,
            ..Default::default()
        }
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`NeatError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.num_inputs < 1 {
            return Err(invalid("num_inputs must be at least 1"));
        }
        if self.num_outputs < 1 {
            return Err(invalid("num_outputs must be at least 1"));
        }
        if !(self.weight_range.is_finite() && self.weight_range > 0.0) {
            return Err(invalid("weight_range must be finite and positive"));
        }
        if !(self.weight_mutation_power.is_finite() && self.weight_mutation_power >= 0.0) {
            return Err(invalid("weight_mutation_power must be finite and non-negative"));
        }
        check_probability("weight_mutation_prob", self.weight_mutation_prob)?;
        check_probability("weight_replace_prob", self.weight_replace_prob)
    }
}

/// How to order two parents of equal fitness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParentTieBreak {
    /// The parent drawn first is treated as fitter.
    #[default]
    FirstDrawn,
    /// The parent with fewer enabled connections is treated as fitter.
    FewerConnections,
}

/// Run-level configuration for a population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeatConfig {
    /// Genome shape and weight settings.
    pub genome: GenomeConfig,
    /// Number of genomes per generation.
    pub population_size: usize,
    /// Probability of adding a connection to each child.
    pub add_connection_prob: f32,
    /// Probability of splitting a connection in each child.
    pub add_node_prob: f32,
    /// Probability that a matching gene disabled in exactly one parent is
    /// disabled in the child.
    pub disable_inheritance_prob: f32,
    /// Fraction of the ranking the first parent is drawn from.
    pub survival_threshold: f32,
    /// Parent order on equal fitness.
    pub tie_break: ParentTieBreak,
}

impl Default for NeatConfig {
    fn default() -> Self {
        Self {
            genome: GenomeConfig::default(),
            population_size: 150,
            add_connection_prob: 0.05,
            add_node_prob: 0.03,
            disable_inheritance_prob: 0.75,
            survival_threshold: 0.5,
            tie_break: ParentTieBreak::FirstDrawn,
        }
    }
}

impl NeatConfig {
    /// Default run configuration for the given layer sizes.
    #[must_use]
    pub fn new(num_inputs: usize, num_outputs: usize) -> Self {
        Self {
            genome: GenomeConfig::new(num_inputs, num_outputs),
            ..Default::default()
        }
    }

    /// Settings used by the XOR demo.
    #[must_use]
    pub fn xor() -> Self {
        Self {
            genome: GenomeConfig {
                squash: Activation::SteepSigmoid,
                weight_range: 2.0,
                weight_mutation_prob: 0.9,
                weight_mutation_power: 0.3,
                ..GenomeConfig::new(2, 1)
            },
            population_size: 150,
            add_connection_prob: 0.05,
            add_node_prob: 0.02,
            ..Default::default()
        }
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// [`NeatError::InvalidConfig`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.genome.validate()?;
        if self.population_size < 2 {
            return Err(invalid("population_size must be at least 2"));
        }
        check_probability("add_connection_prob", self.add_connection_prob)?;
        check_probability("add_node_prob", self.add_node_prob)?;
        check_probability("disable_inheritance_prob", self.disable_inheritance_prob)?;
        if !(self.survival_threshold > 0.0 && self.survival_threshold <= 1.0) {
            return Err(invalid("survival_threshold must be in (0, 1]"));
        }
        if self.population_size % 2 == 1 {
            tracing::debug!(
                population_size = self.population_size,
                "odd population size; pairing works best with even sizes"
            );
        }
        Ok(())
    }
}

fn invalid(message: &str) -> NeatError {
    NeatError::InvalidConfig(message.to_owned())
}

fn check_probability(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(NeatError::InvalidConfig(format!(
            "{name} must be in [0, 1], got {value}"
        )))
    }
}
