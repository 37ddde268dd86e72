//! Gene types for NEAT genomes.
//!
//! This module defines the fundamental building blocks of a genome's graph:
//! - [`NodeGene`]: a neuron, holding handles of its incident connections
//! - [`ConnectionGene`]: a weighted directed edge carrying a historical marking
//!
//! Two kinds of identifiers coexist. [`NodeId`] and [`InnovationId`] are
//! run-wide historical markings minted by the
//! [`InnovationRegistry`](crate::innovation::InnovationRegistry); they are what
//! crossover aligns on. [`NodeKey`] and [`ConnectionKey`] are arena handles
//! local to one genome and are never compared across genomes.

use std::fmt;

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Arena handle of a node within one genome.
    pub struct NodeKey;

    /// Arena handle of a connection within one genome.
    pub struct ConnectionKey;
}

/// Run-wide identifier of a node. Minted once by the registry, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

/// Historical marking of a structural change (a `from -> to` edge).
///
/// Connections sharing an `InnovationId` represent the same mutation, even when
/// they live in different genomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InnovationId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for InnovationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.0)
    }
}

/// The role of a node in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Input node - seeded with an external value.
    Input,
    /// Hidden node - added by splitting a connection.
    Hidden,
    /// Output node - its activation is part of the network's result.
    Output,
}

/// A node gene representing a neuron.
///
/// Adjacency is stored as connection handles in innovation order, so the graph
/// can be walked in both directions without owning references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGene {
    /// Run-wide identifier.
    pub id: NodeId,
    /// Role of this node.
    pub role: NodeRole,
    /// Connections ending at this node.
    pub incoming: Vec<ConnectionKey>,
    /// Connections starting at this node.
    pub outgoing: Vec<ConnectionKey>,
}

impl NodeGene {
    /// Create a node with no incident connections.
    #[must_use]
    pub fn new(id: NodeId, role: NodeRole) -> Self {
        Self {
            id,
            role,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Create a new input node.
    #[must_use]
    pub fn input(id: NodeId) -> Self {
        Self::new(id, NodeRole::Input)
    }

    /// Create a new output node.
    #[must_use]
    pub fn output(id: NodeId) -> Self {
        Self::new(id, NodeRole::Output)
    }

    /// Create a new hidden node.
    #[must_use]
    pub fn hidden(id: NodeId) -> Self {
        Self::new(id, NodeRole::Hidden)
    }
}

/// A connection gene representing a weighted link between two nodes of the
/// same genome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionGene {
    /// Historical marking assigned by the registry for `(from, to)`.
    pub innovation: InnovationId,
    /// Source node.
    pub from: NodeKey,
    /// Target node.
    pub to: NodeKey,
    /// The connection weight.
    pub weight: f32,
    /// Disabled connections never carry a signal but are kept for crossover.
    pub enabled: bool,
    /// Loop connection; exempt from the propagation readiness check.
    pub recurrent: bool,
}

impl ConnectionGene {
    /// Create a new enabled, feedforward connection.
    #[must_use]
    pub fn new(innovation: InnovationId, from: NodeKey, to: NodeKey, weight: f32) -> Self {
        Self {
            innovation,
            from,
            to,
            weight,
            enabled: true,
            recurrent: false,
        }
    }

    /// Mark this connection as a loop connection.
    #[must_use]
    pub fn with_recurrent(mut self, recurrent: bool) -> Self {
        self.recurrent = recurrent;
        self
    }
}
