//! Gene alignment and crossover.
//!
//! Connections of two parents are aligned by [`InnovationId`]. Genes carried
//! by both parents are *matching* and inherited from either parent at random;
//! genes carried only by the fitter parent (disjoint or excess) are inherited
//! unconditionally; genes carried only by the weaker parent are dropped. The
//! child therefore never leaves the fitter parent's structure, and its node
//! set is exactly the fitter parent's.
//!
//! [`AlignmentIndex`] is built once per generation so repeated crossovers do
//! not rescan parents to find matching genes.

use std::collections::HashMap;

use rand::Rng;
use tracing::debug;

use crate::error::{NeatError, Result};
use crate::gene::{ConnectionGene, ConnectionKey, InnovationId, NodeGene, NodeRole};
use crate::genome::Genome;
use crate::innovation::IoLayout;

/// Per-generation index from marking to the genomes carrying it.
#[derive(Debug, Clone, Default)]
pub struct AlignmentIndex {
    /// Carriers of each marking, ordered by genome index.
    genes: HashMap<InnovationId, Vec<(usize, ConnectionKey)>>,
    /// Size of the population the index was built from.
    genomes: usize,
}

impl AlignmentIndex {
    /// Index every connection of `population`.
    #[must_use]
    pub fn prepare(population: &[Genome]) -> Self {
        let mut genes: HashMap<InnovationId, Vec<(usize, ConnectionKey)>> = HashMap::new();
        for (idx, genome) in population.iter().enumerate() {
            for conn in genome.connections() {
                if let Some(key) = genome.connection_key(conn.innovation) {
                    genes.entry(conn.innovation).or_default().push((idx, key));
                }
            }
        }
        Self {
            genes,
            genomes: population.len(),
        }
    }

    /// Genomes carrying `innovation`, with the connection handle in each.
    #[must_use]
    pub fn carriers(&self, innovation: InnovationId) -> &[(usize, ConnectionKey)] {
        self.genes.get(&innovation).map_or(&[], Vec::as_slice)
    }

    /// Handle of `innovation` in genome `genome`, if it carries it.
    #[must_use]
    pub fn lookup(&self, innovation: InnovationId, genome: usize) -> Option<ConnectionKey> {
        let carriers = self.carriers(innovation);
        carriers
            .binary_search_by_key(&genome, |&(idx, _)| idx)
            .ok()
            .map(|pos| carriers[pos].1)
    }

    /// Fraction of the population carrying `innovation`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn prevalence(&self, innovation: InnovationId) -> f32 {
        if self.genomes == 0 {
            return 0.0;
        }
        self.carriers(innovation).len() as f32 / self.genomes as f32
    }

    /// Number of distinct markings in the population.
    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    /// Whether the indexed population had no connections at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Cross `population[fitter]` with `population[weaker]`.
    ///
    /// `population` must be the slice the index was prepared from.
    ///
    /// # Errors
    ///
    /// [`NeatError::UnknownGenome`] if an index is out of range, or
    /// [`NeatError::DanglingConnection`] if a parent is malformed.
    pub fn crossover<R: Rng>(
        &self,
        population: &[Genome],
        fitter: usize,
        weaker: usize,
        disable_prob: f32,
        rng: &mut R,
    ) -> Result<Genome> {
        let len = population.len().min(self.genomes);
        let parent = |index: usize| {
            if index < len {
                Ok(&population[index])
            } else {
                Err(NeatError::UnknownGenome { index, len })
            }
        };
        let (fitter_genome, weaker_genome) = (parent(fitter)?, parent(weaker)?);

        recombine(
            fitter_genome,
            |innovation| {
                self.lookup(innovation, weaker)
                    .and_then(|key| weaker_genome.connection_by_key(key))
            },
            disable_prob,
            rng,
        )
    }
}

/// Cross two parents, `fitter` first.
///
/// A matching gene disabled in both parents stays disabled; one disabled in
/// exactly one parent is disabled with probability `disable_prob`.
///
/// # Errors
///
/// [`NeatError::DanglingConnection`] if a parent is malformed.
pub fn crossover<R: Rng>(
    fitter: &Genome,
    weaker: &Genome,
    disable_prob: f32,
    rng: &mut R,
) -> Result<Genome> {
    recombine(
        fitter,
        |innovation| weaker.connection(innovation),
        disable_prob,
        rng,
    )
}

fn recombine<'w, R, F>(
    fitter: &Genome,
    matching: F,
    disable_prob: f32,
    rng: &mut R,
) -> Result<Genome>
where
    R: Rng,
    F: Fn(InnovationId) -> Option<&'w ConnectionGene>,
{
    let layout = IoLayout {
        inputs: fitter.input_ids().to_vec(),
        outputs: fitter.output_ids().to_vec(),
    };
    let mut child = Genome::empty(fitter.config.clone(), &layout);
    for node in fitter.nodes().filter(|n| n.role == NodeRole::Hidden) {
        child.insert_node(NodeGene::hidden(node.id));
    }

    let mut matched = 0usize;
    let mut inherited = 0usize;
    for conn in fitter.connections() {
        let Some((from, to)) = fitter.endpoints(conn) else {
            continue;
        };

        let (weight, enabled, recurrent) = match matching(conn.innovation) {
            Some(other) => {
                matched += 1;
                let weight = if rng.random::<bool>() {
                    conn.weight
                } else {
                    other.weight
                };
                let enabled = match (conn.enabled, other.enabled) {
                    (true, true) => true,
                    (false, false) => false,
                    _ => rng.random::<f32>() >= disable_prob,
                };
                // Only the fitter parent's flags keep the child's feedforward
                // edges acyclic.
                (weight, enabled, conn.recurrent)
            }
            None => {
                inherited += 1;
                (conn.weight, conn.enabled, conn.recurrent)
            }
        };

        child.insert_connection(conn.innovation, from, to, weight, enabled, recurrent)?;
    }

    debug!(matched, inherited, nodes = child.num_nodes(), "crossover");
    Ok(child)
}
