//! Error types for genome construction, propagation and evolution.

use thiserror::Error;

use crate::gene::{InnovationId, NodeId};

/// Errors raised by the NEAT core.
///
/// Only [`NeatError::MutationConflict`] is recovered locally: the probabilistic
/// mutation operators treat it as a no-op. Every other variant aborts the
/// enclosing `forward_prop` call or generation step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NeatError {
    /// The input vector does not match the number of input nodes.
    #[error("expected {expected} inputs, got {actual}")]
    InputShape {
        /// Number of input nodes in the genome.
        expected: usize,
        /// Length of the supplied input vector.
        actual: usize,
    },

    /// A connection references a node that is absent from its genome.
    #[error("connection {innovation} references node {node} which is not in the genome")]
    DanglingConnection {
        /// Marking of the offending connection.
        innovation: InnovationId,
        /// The missing endpoint.
        node: NodeId,
    },

    /// The registry's input/output layer was requested with a different shape.
    #[error("registry layout is {registered_inputs}x{registered_outputs}, requested {inputs}x{outputs}")]
    LayoutMismatch {
        /// Inputs fixed by the first request of this run.
        registered_inputs: usize,
        /// Outputs fixed by the first request of this run.
        registered_outputs: usize,
        /// Requested inputs.
        inputs: usize,
        /// Requested outputs.
        outputs: usize,
    },

    /// A requested connection is not allowed in this genome.
    #[error("cannot connect {from} -> {to}: {reason}")]
    MutationConflict {
        /// Source node.
        from: NodeId,
        /// Target node.
        to: NodeId,
        /// Why the edge was rejected.
        reason: ConflictReason,
    },

    /// A full propagation round activated no node.
    #[error("propagation deadlocked in round {round} with {pending} pending nodes")]
    PropagationDeadlock {
        /// Round in which no progress was made.
        round: usize,
        /// Nodes still waiting for a signal.
        pending: usize,
    },

    /// A genome's fitness was read before it was assigned.
    #[error("genome{} has no fitness assigned", position(.index))]
    UnscoredGenome {
        /// Position of the genome in its population, if known.
        index: Option<usize>,
    },

    /// A genome index is outside the population it refers to.
    #[error("genome index {index} out of range for population of {len}")]
    UnknownGenome {
        /// Requested index.
        index: usize,
        /// Population size.
        len: usize,
    },

    /// Fitness was assigned twice within one generation.
    #[error("fitness already assigned for this generation")]
    FitnessAlreadyAssigned,

    /// Hyperparameters failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why [`NeatError::MutationConflict`] was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConflictReason {
    /// One of the endpoints is not in the genome.
    #[error("unknown node")]
    UnknownNode,
    /// `from == to` while recurrence is disabled.
    #[error("self-loop")]
    SelfLoop,
    /// A connection with the same endpoints already exists.
    #[error("duplicate connection")]
    Duplicate,
    /// Input nodes only receive loop connections.
    #[error("input nodes cannot be targeted by feedforward connections")]
    InputTarget,
    /// The edge would close a cycle while recurrence is disabled.
    #[error("would create a cycle")]
    Cycle,
}

fn position(index: &Option<usize>) -> String {
    index.map_or_else(String::new, |i| format!(" {i}"))
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NeatError>;
