//! # Nodal NEAT
//!
//! NeuroEvolution of Augmenting Topologies (NEAT) with registry-based
//! historical markings and a round-based propagation engine that evaluates
//! arbitrary, possibly recurrent, graphs.
//!
//! ## Features
//!
//! - **Innovation Registry**: run-wide, lock-guarded allocation of node ids and
//!   connection markings; identical structural changes in different genomes
//!   receive identical ids
//! - **Arena-Graph Model**: `SlotMap` storage for nodes and connections with
//!   bidirectional adjacency by handle
//! - **Alignment Crossover**: genes aligned by marking, with a per-generation
//!   index of carriers
//! - **Round-Based Propagation**: no precomputed topological order; loops are
//!   tolerated and unsatisfiable graphs are reported as deadlocks
//!
//! ## Quick Start
//!
//! ```rust
//! use nodal_neat::{NeatConfig, Population};
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//!
//! let mut rng = ChaCha8Rng::seed_from_u64(42);
//! let config = NeatConfig {
//!     population_size: 20,
//!     ..NeatConfig::xor()
//! };
//! let mut population = Population::new(config, &mut rng).unwrap();
//!
//! let xor: [([f32; 2], f32); 4] =
//!     [([0.0, 0.0], 0.0), ([0.0, 1.0], 1.0), ([1.0, 0.0], 1.0), ([1.0, 1.0], 0.0)];
//! for _ in 0..5 {
//!     population
//!         .next_generation(
//!             |genome| {
//!                 let error: f32 = xor
//!                     .iter()
//!                     .map(|(inputs, expected)| match genome.forward_prop(inputs) {
//!                         Ok(out) => (out[0] - expected).powi(2),
//!                         Err(_) => 1.0,
//!                     })
//!                     .sum();
//!                 4.0 - error
//!             },
//!             &mut rng,
//!         )
//!         .unwrap();
//! }
//!
//! let best = population.best().unwrap();
//! println!("best fitness: {}", best.fitness().unwrap());
//! ```
//!
//! ## Architecture
//!
//! ### Historical Markings
//!
//! The [`InnovationRegistry`] is the only shared mutable state of a run. It
//! hands out:
//!
//! - **Connections**: one [`InnovationId`] per `(from, to)` node pair
//! - **Split nodes**: one hidden [`NodeId`] per split connection
//! - **Input/output layer**: one set of node ids shared by every genome
//!
//! Share it behind an `Arc`; every method takes `&self`.
//!
//! ### Arena-Graph Model
//!
//! Nodes and connections are stored in flat `SlotMap` buffers:
//!
//! - Nodes hold handles of their incident connections, connections hold
//!   handles of their endpoints
//! - Ordered indices map run-wide ids back to handles
//! - Trivially serializable via Serde
//! - Per-call propagation state lives outside the genome

pub mod activation;
pub mod config;
pub mod crossover;
pub mod error;
pub mod gene;
pub mod genome;
pub mod innovation;
pub mod population;
pub mod propagation;
pub mod topology;

// Re-exports for convenience
pub use activation::Activation;
pub use config::{GenomeConfig, NeatConfig, ParentTieBreak};
pub use crossover::{crossover, AlignmentIndex};
pub use error::{ConflictReason, NeatError, Result};
pub use gene::{ConnectionGene, ConnectionKey, InnovationId, NodeGene, NodeId, NodeKey, NodeRole};
pub use genome::Genome;
pub use innovation::{InnovationRegistry, IoLayout};
pub use population::{GenerationStats, Population};
pub use propagation::{NodeState, PropagationReport, Propagator};
pub use topology::{EdgeFilter, GraphTopology};

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_serialization_roundtrip() {
        let registry = InnovationRegistry::new();
        let mut rng = ChaCha8Rng::seed_from_u64(123);
        let mut genome = Genome::initial(GenomeConfig::new(3, 2), &registry, &mut rng).unwrap();

        // Add some structure
        let innovation = genome.connections().next().unwrap().innovation;
        genome.add_node(innovation, &registry).unwrap();

        // Serialize
        let json = serde_json::to_string(&genome).expect("Serialization failed");

        // Deserialize
        let restored: Genome = serde_json::from_str(&json).expect("Deserialization failed");

        // Verify structure and behaviour preserved
        assert!(genome.same_structure(&restored));
        assert!(restored.is_consistent());
        let inputs = [0.3, -0.2, 0.9];
        assert_eq!(
            genome.forward_prop(&inputs).unwrap(),
            restored.forward_prop(&inputs).unwrap()
        );
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = NeatConfig::xor();
        let json = serde_json::to_string(&config).expect("Serialization failed");
        let restored: NeatConfig = serde_json::from_str(&json).expect("Deserialization failed");
        assert_eq!(config, restored);
    }
}
