//! Generation controller: scoring, ranking, selection and reproduction.
//!
//! One step scores every genome with an external fitness function, ranks the
//! population, and fills a fresh population with mutated crossover children.
//! There is no elitism: every genome of the next generation is a new child.
//!
//! Scoring may run in parallel ([`Population::next_generation_par`]); the
//! reproduction phase that follows is sequential, so mutation never overlaps
//! with evaluation.

use std::cmp::Ordering;
use std::sync::Arc;

use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{NeatConfig, ParentTieBreak};
use crate::crossover::AlignmentIndex;
use crate::error::{NeatError, Result};
use crate::genome::Genome;
use crate::innovation::InnovationRegistry;

/// Summary of one scored generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Generation the scores belong to.
    pub generation: usize,
    /// Highest fitness.
    pub best_fitness: f32,
    /// Mean fitness.
    pub mean_fitness: f32,
    /// Lowest fitness.
    pub worst_fitness: f32,
    /// Mean number of enabled connections.
    pub mean_enabled_connections: f32,
    /// Mean number of hidden nodes.
    pub mean_hidden_nodes: f32,
}

impl GenerationStats {
    #[allow(clippy::cast_precision_loss)]
    fn collect(generation: usize, genomes: &[Genome], ranking: &[(usize, f32)]) -> Self {
        let n = genomes.len().max(1) as f32;
        let sum: f32 = ranking.iter().map(|&(_, fitness)| fitness).sum();
        let connections: usize = genomes.iter().map(Genome::num_enabled_connections).sum();
        let hidden: usize = genomes.iter().map(|g| g.hidden_ids().len()).sum();

        Self {
            generation,
            best_fitness: ranking.first().map_or(f32::NAN, |&(_, f)| f),
            mean_fitness: sum / n,
            worst_fitness: ranking.last().map_or(f32::NAN, |&(_, f)| f),
            mean_enabled_connections: connections as f32 / n,
            mean_hidden_nodes: hidden as f32 / n,
        }
    }
}

/// A population of genomes sharing one innovation registry.
#[derive(Debug)]
pub struct Population {
    config: NeatConfig,
    registry: Arc<InnovationRegistry>,
    genomes: Vec<Genome>,
    generation: usize,
    champion: Option<Genome>,
    stats: Option<GenerationStats>,
}

impl Population {
    /// Seed a population of minimal genomes.
    ///
    /// # Errors
    ///
    /// [`NeatError::InvalidConfig`] if `config` is invalid.
    pub fn new<R: Rng>(config: NeatConfig, rng: &mut R) -> Result<Self> {
        Self::with_registry(config, Arc::new(InnovationRegistry::new()), rng)
    }

    /// Seed a population that mints its markings from `registry`.
    ///
    /// # Errors
    ///
    /// [`NeatError::InvalidConfig`] if `config` is invalid, or
    /// [`NeatError::LayoutMismatch`] if `registry` already holds a different
    /// input/output layout.
    pub fn with_registry<R: Rng>(
        config: NeatConfig,
        registry: Arc<InnovationRegistry>,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let genomes = (0..config.population_size)
            .map(|_| Genome::initial(config.genome.clone(), &registry, rng))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            registry,
            genomes,
            generation: 0,
            champion: None,
            stats: None,
        })
    }

    /// Score every genome sequentially and replace the population with the
    /// next generation.
    ///
    /// # Errors
    ///
    /// [`NeatError::UnscoredGenome`] if a score is NaN. The population is
    /// left as it was.
    pub fn next_generation<F, R>(&mut self, mut fitness: F, rng: &mut R) -> Result<GenerationStats>
    where
        F: FnMut(&Genome) -> f32,
        R: Rng,
    {
        let scores: Vec<f32> = self.genomes.iter().map(&mut fitness).collect();
        self.advance(&scores, rng)
    }

    /// Like [`next_generation`](Self::next_generation), scoring genomes in
    /// parallel on the rayon thread pool.
    ///
    /// # Errors
    ///
    /// [`NeatError::UnscoredGenome`] if a score is NaN.
    pub fn next_generation_par<F, R>(&mut self, fitness: F, rng: &mut R) -> Result<GenerationStats>
    where
        F: Fn(&Genome) -> f32 + Sync,
        R: Rng,
    {
        let scores: Vec<f32> = self.genomes.par_iter().map(&fitness).collect();
        self.advance(&scores, rng)
    }

    fn advance<R: Rng>(&mut self, scores: &[f32], rng: &mut R) -> Result<GenerationStats> {
        if let Some(index) = scores.iter().position(|s| s.is_nan()) {
            return Err(NeatError::UnscoredGenome { index: Some(index) });
        }

        for (genome, &score) in self.genomes.iter_mut().zip(scores) {
            genome.clear_fitness();
            genome.set_fitness(score)?;
        }

        let ranking = rank(&self.genomes)?;
        let stats = GenerationStats::collect(self.generation, &self.genomes, &ranking);
        let index = AlignmentIndex::prepare(&self.genomes);

        let next = self.reproduce(&ranking, &index, rng)?;

        let champion = ranking
            .first()
            .map(|&(idx, _)| self.genomes[idx].clone());

        info!(
            generation = self.generation,
            best = stats.best_fitness,
            mean = stats.mean_fitness,
            connections = stats.mean_enabled_connections,
            hidden = stats.mean_hidden_nodes,
            innovations = self.registry.innovation_count(),
            "generation complete"
        );

        self.genomes = next;
        self.generation += 1;
        self.champion = champion;
        self.stats = Some(stats.clone());
        Ok(stats)
    }

    /// Build `population_size` children from the ranked population.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn reproduce<R: Rng>(
        &self,
        ranking: &[(usize, f32)],
        index: &AlignmentIndex,
        rng: &mut R,
    ) -> Result<Vec<Genome>> {
        let size = self.config.population_size;
        let survivors = ((ranking.len() as f32 * self.config.survival_threshold).ceil() as usize)
            .clamp(1, ranking.len());

        let mut next = Vec::with_capacity(size);
        while next.len() < size {
            let first = ranking[rng.random_range(0..survivors)];
            let second = ranking[rng.random_range(0..ranking.len())];
            let (fitter, weaker) =
                order_parents(first, second, &self.genomes, self.config.tie_break);

            let mut child = index.crossover(
                &self.genomes,
                fitter,
                weaker,
                self.config.disable_inheritance_prob,
                rng,
            )?;
            child.add_node_mutation(self.config.add_node_prob, &self.registry, rng);
            child.add_connection_mutation(self.config.add_connection_prob, &self.registry, rng);
            child.mutate_weights(rng);
            next.push(child);
        }
        Ok(next)
    }

    /// Genomes of the current generation.
    pub fn iter(&self) -> impl Iterator<Item = &Genome> + '_ {
        self.genomes.iter()
    }

    /// Genomes of the current generation.
    #[must_use]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    /// Population size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    /// Whether the population holds no genomes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    /// Number of completed generation steps.
    #[must_use]
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// The registry shared by every genome of this run.
    #[must_use]
    pub fn registry(&self) -> &Arc<InnovationRegistry> {
        &self.registry
    }

    /// Run configuration.
    #[must_use]
    pub fn config(&self) -> &NeatConfig {
        &self.config
    }

    /// Fittest genome of the last scored generation, with its fitness.
    #[must_use]
    pub fn best(&self) -> Option<&Genome> {
        self.champion.as_ref()
    }

    /// Summary of the last scored generation.
    #[must_use]
    pub fn stats(&self) -> Option<&GenerationStats> {
        self.stats.as_ref()
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a Genome;
    type IntoIter = std::slice::Iter<'a, Genome>;

    fn into_iter(self) -> Self::IntoIter {
        self.genomes.iter()
    }
}

/// `(index, fitness)` pairs by descending fitness. Equal fitness keeps
/// population order.
fn rank(genomes: &[Genome]) -> Result<Vec<(usize, f32)>> {
    let mut ranking = genomes
        .iter()
        .enumerate()
        .map(|(idx, genome)| {
            genome
                .fitness()
                .map(|fitness| (idx, fitness))
                .map_err(|_| NeatError::UnscoredGenome { index: Some(idx) })
        })
        .collect::<Result<Vec<_>>>()?;
    ranking.sort_by(|a, b| b.1.total_cmp(&a.1));
    Ok(ranking)
}

/// Order two drawn parents fitter first.
fn order_parents(
    first: (usize, f32),
    second: (usize, f32),
    genomes: &[Genome],
    tie_break: ParentTieBreak,
) -> (usize, usize) {
    match first.1.total_cmp(&second.1) {
        Ordering::Greater => (first.0, second.0),
        Ordering::Less => (second.0, first.0),
        Ordering::Equal => match tie_break {
            ParentTieBreak::FirstDrawn => (first.0, second.0),
            ParentTieBreak::FewerConnections => {
                let size = |idx: usize| genomes[idx].num_enabled_connections();
                if size(second.0) < size(first.0) {
                    (second.0, first.0)
                } else {
                    (first.0, second.0)
                }
            }
        },
    }
}
