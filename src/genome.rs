//! NEAT genome implementation with arena-allocated graph topology.
//!
//! A [`Genome`] stores its nodes and connections in `SlotMap` arenas. Nodes
//! keep the handles of their incident connections and connections keep the
//! handles of their endpoints, so the graph can be walked in both directions
//! without reference cycles. Ordered indices map the run-wide [`NodeId`] and
//! [`InnovationId`] markings back to arena handles.

use std::collections::{BTreeMap, HashSet};

use rand::Rng;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::trace;

use crate::config::GenomeConfig;
use crate::error::{ConflictReason, NeatError, Result};
use crate::gene::{
    ConnectionGene, ConnectionKey, InnovationId, NodeGene, NodeId, NodeKey, NodeRole,
};
use crate::innovation::{InnovationRegistry, IoLayout};
use crate::propagation::Propagator;
use crate::topology::{EdgeFilter, GraphTopology};

/// One individual: a directed graph of nodes and connections plus its fitness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genome {
    /// Arena storage for nodes.
    nodes: SlotMap<NodeKey, NodeGene>,
    /// Arena storage for connections.
    connections: SlotMap<ConnectionKey, ConnectionGene>,
    /// NodeId -> arena handle.
    node_index: BTreeMap<NodeId, NodeKey>,
    /// InnovationId -> arena handle.
    connection_index: BTreeMap<InnovationId, ConnectionKey>,
    /// Input node ids, ascending.
    input_ids: Vec<NodeId>,
    /// Output node ids, ascending.
    output_ids: Vec<NodeId>,
    /// Fitness assigned for the current generation.
    fitness: Option<f32>,
    /// Configuration used for this genome.
    pub config: GenomeConfig,
}

impl Genome {
    /// Create a genome holding only the input and output nodes of `layout`.
    #[must_use]
    pub fn empty(config: GenomeConfig, layout: &IoLayout) -> Self {
        let mut genome = Self {
            nodes: SlotMap::with_key(),
            connections: SlotMap::with_key(),
            node_index: BTreeMap::new(),
            connection_index: BTreeMap::new(),
            input_ids: layout.inputs.clone(),
            output_ids: layout.outputs.clone(),
            fitness: None,
            config,
        };

        for &id in &layout.inputs {
            genome.insert_node(NodeGene::input(id));
        }
        for &id in &layout.outputs {
            genome.insert_node(NodeGene::output(id));
        }
        genome.input_ids.sort_unstable();
        genome.output_ids.sort_unstable();
        genome
    }

    /// Create the minimal starting genome: every input connected to every
    /// output with a random weight.
    ///
    /// # Errors
    ///
    /// [`NeatError::InvalidConfig`] if `config` is invalid, or
    /// [`NeatError::LayoutMismatch`] if the registry was already used with a
    /// different shape.
    pub fn initial<R: Rng>(
        config: GenomeConfig,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) -> Result<Self> {
        config.validate()?;
        let layout = registry.io_layout(config.num_inputs, config.num_outputs)?;
        let mut genome = Self::empty(config, &layout);

        for &input in &layout.inputs {
            for &output in &layout.outputs {
                let innovation = registry.mark_connection(input, output);
                let weight = genome.random_weight(rng);
                genome.insert_connection(innovation, input, output, weight, true, false)?;
            }
        }

        Ok(genome)
    }

    /// Insert a node gene and index it. Returns the existing handle if the id
    /// is already present.
    pub(crate) fn insert_node(&mut self, node: NodeGene) -> NodeKey {
        if let Some(&key) = self.node_index.get(&node.id) {
            return key;
        }
        let id = node.id;
        let key = self.nodes.insert(node);
        self.node_index.insert(id, key);
        key
    }

    /// Insert a connection between two nodes of this genome and link it into
    /// both endpoints' adjacency lists (kept in innovation order).
    ///
    /// # Errors
    ///
    /// [`NeatError::DanglingConnection`] if either endpoint is absent, or
    /// [`NeatError::MutationConflict`] if the marking is already present.
    pub(crate) fn insert_connection(
        &mut self,
        innovation: InnovationId,
        from: NodeId,
        to: NodeId,
        weight: f32,
        enabled: bool,
        recurrent: bool,
    ) -> Result<ConnectionKey> {
        let from_key = self.resolve(innovation, from)?;
        let to_key = self.resolve(innovation, to)?;
        if self.connection_index.contains_key(&innovation) {
            return Err(NeatError::MutationConflict {
                from,
                to,
                reason: ConflictReason::Duplicate,
            });
        }

        let mut gene = ConnectionGene::new(innovation, from_key, to_key, weight)
            .with_recurrent(recurrent);
        gene.enabled = enabled;
        let key = self.connections.insert(gene);
        self.connection_index.insert(innovation, key);

        let connections = &self.connections;
        let position = |list: &[ConnectionKey]| {
            list.partition_point(|&k| connections[k].innovation < innovation)
        };
        let outgoing = &self.nodes[from_key].outgoing;
        let at = position(outgoing);
        self.nodes[from_key].outgoing.insert(at, key);
        let incoming = &self.nodes[to_key].incoming;
        let at = position(incoming);
        self.nodes[to_key].incoming.insert(at, key);

        Ok(key)
    }

    fn resolve(&self, innovation: InnovationId, node: NodeId) -> Result<NodeKey> {
        self.node_index
            .get(&node)
            .copied()
            .ok_or(NeatError::DanglingConnection { innovation, node })
    }

    fn random_weight<R: Rng>(&self, rng: &mut R) -> f32 {
        let range = self.config.weight_range;
        rng.random::<f32>() * 2.0 * range - range
    }

    /// Add a connection `from -> to` with a random weight.
    ///
    /// Self-loops, edges into input nodes and edges closing a cycle are
    /// admitted only when recurrence is allowed, and are then flagged
    /// recurrent.
    ///
    /// # Errors
    ///
    /// [`NeatError::MutationConflict`] if the edge is not allowed.
    pub fn add_connection<R: Rng>(
        &mut self,
        from: NodeId,
        to: NodeId,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) -> Result<InnovationId> {
        let conflict = |reason| NeatError::MutationConflict { from, to, reason };

        let (Some(&from_key), Some(&to_key)) = (self.node_index.get(&from), self.node_index.get(&to))
        else {
            return Err(conflict(ConflictReason::UnknownNode));
        };
        if self.has_connection_between(from_key, to_key) {
            return Err(conflict(ConflictReason::Duplicate));
        }

        let allow = self.config.allow_recurrence;
        let recurrent = if from == to {
            if !allow {
                return Err(conflict(ConflictReason::SelfLoop));
            }
            true
        } else if self.nodes[to_key].role == NodeRole::Input {
            if !allow {
                return Err(conflict(ConflictReason::InputTarget));
            }
            true
        } else {
            let topo = GraphTopology::from_genome(self, EdgeFilter::Structural);
            let closes_loop = topo.would_create_cycle(from_key, to_key);
            if closes_loop && !allow {
                return Err(conflict(ConflictReason::Cycle));
            }
            closes_loop
        };

        let innovation = registry.mark_connection(from, to);
        let weight = self.random_weight(rng);
        self.insert_connection(innovation, from, to, weight, true, recurrent)?;
        trace!(%from, %to, %innovation, recurrent, "added connection");
        Ok(innovation)
    }

    /// Split the enabled connection `innovation` with a new hidden node.
    ///
    /// The original connection is disabled (its weight is kept) and two new
    /// connections are created: `from -> new` with weight 1.0 and
    /// `new -> to` with the original weight. A recurrent connection keeps its
    /// loop flag on the `new -> to` half.
    ///
    /// Returns `None`, leaving the genome unchanged, if the connection doesn't
    /// exist, is disabled, or one of the two split markings is already carried.
    pub fn add_node(
        &mut self,
        innovation: InnovationId,
        registry: &InnovationRegistry,
    ) -> Option<NodeId> {
        let conn_key = *self.connection_index.get(&innovation)?;
        let conn = self.connections.get(conn_key)?;
        if !conn.enabled {
            return None;
        }
        let original_weight = conn.weight;
        let recurrent = conn.recurrent;
        let (from, to) = self.endpoints(conn)?;

        // A genome that re-split a re-enabled connection already owns the
        // shared split node; it gets a private one instead.
        let mut node_id = registry.split_node(innovation);
        if self.node_index.contains_key(&node_id) {
            node_id = registry.allocate_node_id();
        }

        // Nothing is touched until both halves are known to fit.
        let in_innovation = registry.mark_connection(from, node_id);
        let out_innovation = registry.mark_connection(node_id, to);
        if self.connection_index.contains_key(&in_innovation)
            || self.connection_index.contains_key(&out_innovation)
        {
            trace!(%innovation, node = %node_id, "split markings already present");
            return None;
        }

        self.insert_node(NodeGene::hidden(node_id));
        self.insert_connection(in_innovation, from, node_id, 1.0, true, false)
            .ok()?;
        self.insert_connection(out_innovation, node_id, to, original_weight, true, recurrent)
            .ok()?;
        self.connections[conn_key].enabled = false;

        trace!(%innovation, node = %node_id, "split connection");
        Some(node_id)
    }

    /// With probability `rate`, split a uniformly chosen enabled connection.
    ///
    /// Returns whether the genome changed.
    pub fn add_node_mutation<R: Rng>(
        &mut self,
        rate: f32,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) -> bool {
        if rng.random::<f32>() >= rate {
            return false;
        }

        let enabled: Vec<InnovationId> = self
            .connections()
            .filter(|c| c.enabled)
            .map(|c| c.innovation)
            .collect();
        if enabled.is_empty() {
            trace!("no enabled connection to split");
            return false;
        }

        let innovation = enabled[rng.random_range(0..enabled.len())];
        self.add_node(innovation, registry).is_some()
    }

    /// With probability `rate`, add a connection between a uniformly chosen
    /// pair of currently unconnected nodes.
    ///
    /// Disallowed pairs (see [`add_connection`](Self::add_connection)) are
    /// never candidates. If no candidate exists the mutation is a no-op.
    /// Returns whether the genome changed.
    pub fn add_connection_mutation<R: Rng>(
        &mut self,
        rate: f32,
        registry: &InnovationRegistry,
        rng: &mut R,
    ) -> bool {
        if rng.random::<f32>() >= rate {
            return false;
        }

        let candidates = self.connection_candidates();
        if candidates.is_empty() {
            trace!("no candidate pair for a new connection");
            return false;
        }

        let (from, to) = candidates[rng.random_range(0..candidates.len())];
        match self.add_connection(from, to, registry, rng) {
            Ok(_) => true,
            Err(err) => {
                trace!(%err, "connection mutation skipped");
                false
            }
        }
    }

    /// Every `(from, to)` pair a new connection may be added between.
    fn connection_candidates(&self) -> Vec<(NodeId, NodeId)> {
        let topo = GraphTopology::from_genome(self, EdgeFilter::Structural);
        let existing: HashSet<(NodeKey, NodeKey)> =
            self.connections.values().map(|c| (c.from, c.to)).collect();
        let allow = self.config.allow_recurrence;

        let mut candidates = Vec::new();
        for from_idx in 0..topo.node_count() {
            let Some(from_key) = topo.node_key(from_idx) else {
                continue;
            };
            let reaches_source = topo.ancestors(from_idx);
            for (to_idx, &closes_loop) in reaches_source.iter().enumerate() {
                let Some(to_key) = topo.node_key(to_idx) else {
                    continue;
                };
                if existing.contains(&(from_key, to_key)) {
                    continue;
                }
                let into_input = self.nodes[to_key].role == NodeRole::Input;
                if (closes_loop || into_input) && !allow {
                    continue;
                }
                candidates.push((self.nodes[from_key].id, self.nodes[to_key].id));
            }
        }
        candidates
    }

    /// Perturb or replace connection weights.
    ///
    /// Each weight is mutated with probability `weight_mutation_prob`; a
    /// mutated weight is replaced with probability `weight_replace_prob` and
    /// otherwise perturbed by up to `weight_mutation_power`.
    pub fn mutate_weights<R: Rng>(&mut self, rng: &mut R) {
        // Clamp to prevent unbounded growth over many generations
        let weight_limit = self.config.weight_range * 10.0;
        let range = self.config.weight_range;

        for conn in self.connections.values_mut() {
            if rng.random::<f32>() < self.config.weight_mutation_prob {
                if rng.random::<f32>() < self.config.weight_replace_prob {
                    conn.weight = rng.random::<f32>() * 2.0 * range - range;
                } else {
                    conn.weight +=
                        (rng.random::<f32>() * 2.0 - 1.0) * self.config.weight_mutation_power;
                }
                conn.weight = conn.weight.clamp(-weight_limit, weight_limit);
            }
        }
    }

    /// Evaluate the network for one input vector.
    ///
    /// Outputs are returned in ascending output [`NodeId`] order.
    ///
    /// # Errors
    ///
    /// [`NeatError::InputShape`] if `inputs` has the wrong length, or
    /// [`NeatError::PropagationDeadlock`] if some output can never activate.
    pub fn forward_prop(&self, inputs: &[f32]) -> Result<Vec<f32>> {
        Propagator::new(self).run(inputs).map(|report| report.outputs)
    }

    /// Fitness assigned for the current generation.
    ///
    /// # Errors
    ///
    /// [`NeatError::UnscoredGenome`] if no fitness was assigned yet.
    pub fn fitness(&self) -> Result<f32> {
        self.fitness.ok_or(NeatError::UnscoredGenome { index: None })
    }

    /// Whether a fitness has been assigned.
    #[must_use]
    pub fn is_scored(&self) -> bool {
        self.fitness.is_some()
    }

    /// Assign the fitness for the current generation.
    ///
    /// # Errors
    ///
    /// [`NeatError::FitnessAlreadyAssigned`] if a fitness is already set.
    pub fn set_fitness(&mut self, fitness: f32) -> Result<()> {
        if self.fitness.is_some() {
            return Err(NeatError::FitnessAlreadyAssigned);
        }
        self.fitness = Some(fitness);
        Ok(())
    }

    /// Forget the assigned fitness.
    pub fn clear_fitness(&mut self) {
        self.fitness = None;
    }

    /// Enable or disable the connection `innovation`.
    ///
    /// Returns the previous state, or `None` if the connection is absent.
    pub fn set_enabled(&mut self, innovation: InnovationId, enabled: bool) -> Option<bool> {
        let key = self.connection_index.get(&innovation)?;
        let conn = self.connections.get_mut(*key)?;
        Some(std::mem::replace(&mut conn.enabled, enabled))
    }

    /// Set the weight of the connection `innovation`.
    ///
    /// Returns the previous weight, or `None` if the connection is absent.
    pub fn set_weight(&mut self, innovation: InnovationId, weight: f32) -> Option<f32> {
        let key = self.connection_index.get(&innovation)?;
        let conn = self.connections.get_mut(*key)?;
        Some(std::mem::replace(&mut conn.weight, weight))
    }

    /// Input node ids in ascending order.
    #[must_use]
    pub fn input_ids(&self) -> &[NodeId] {
        &self.input_ids
    }

    /// Output node ids in ascending order.
    #[must_use]
    pub fn output_ids(&self) -> &[NodeId] {
        &self.output_ids
    }

    /// Get all hidden node ids, ascending.
    #[must_use]
    pub fn hidden_ids(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|n| n.role == NodeRole::Hidden)
            .map(|n| n.id)
            .collect()
    }

    /// Nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeGene> + '_ {
        self.node_index.values().map(|&key| &self.nodes[key])
    }

    /// Connections in ascending innovation order.
    pub fn connections(&self) -> impl Iterator<Item = &ConnectionGene> + '_ {
        self.connection_index
            .values()
            .map(|&key| &self.connections[key])
    }

    /// Node arena handles in ascending id order.
    pub(crate) fn node_keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.node_index.values().copied()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&NodeGene> {
        self.node_index.get(&id).and_then(|&key| self.nodes.get(key))
    }

    /// Arena handle of a node.
    #[must_use]
    pub fn node_key(&self, id: NodeId) -> Option<NodeKey> {
        self.node_index.get(&id).copied()
    }

    /// Look up a node by arena handle.
    #[must_use]
    pub fn node_by_key(&self, key: NodeKey) -> Option<&NodeGene> {
        self.nodes.get(key)
    }

    /// Look up a connection by its marking.
    #[must_use]
    pub fn connection(&self, innovation: InnovationId) -> Option<&ConnectionGene> {
        self.connection_index
            .get(&innovation)
            .and_then(|&key| self.connections.get(key))
    }

    /// Look up a connection by arena handle.
    #[must_use]
    pub fn connection_by_key(&self, key: ConnectionKey) -> Option<&ConnectionGene> {
        self.connections.get(key)
    }

    /// Arena handle of a connection.
    #[must_use]
    pub fn connection_key(&self, innovation: InnovationId) -> Option<ConnectionKey> {
        self.connection_index.get(&innovation).copied()
    }

    /// Endpoint ids of a connection.
    #[must_use]
    pub fn endpoints(&self, conn: &ConnectionGene) -> Option<(NodeId, NodeId)> {
        Some((self.nodes.get(conn.from)?.id, self.nodes.get(conn.to)?.id))
    }

    /// Number of nodes.
    #[must_use]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connections, enabled or not.
    #[must_use]
    pub fn num_connections(&self) -> usize {
        self.connections.len()
    }

    /// Get the number of enabled connections.
    #[must_use]
    pub fn num_enabled_connections(&self) -> usize {
        self.connections.values().filter(|c| c.enabled).count()
    }

    /// Highest innovation carried by this genome.
    #[must_use]
    pub fn max_innovation(&self) -> Option<InnovationId> {
        self.connection_index.keys().next_back().copied()
    }

    fn has_connection_between(&self, from: NodeKey, to: NodeKey) -> bool {
        self.nodes[from]
            .outgoing
            .iter()
            .any(|&key| self.connections[key].to == to)
    }

    /// Length in edges of the longest chain of enabled feedforward
    /// connections, or `None` if those connections form a cycle.
    #[must_use]
    pub fn depth(&self) -> Option<u32> {
        GraphTopology::from_genome(self, EdgeFilter::Active).longest_path()
    }

    /// Most propagation rounds one [`forward_prop`](Self::forward_prop) call
    /// can take, or `None` if the feedforward connections form a cycle.
    ///
    /// A node fires at most one round after the last signal it needs, so the
    /// chain of firings behind an output is a simple path from an input. It
    /// uses each enabled recurrent connection at most once, with at most
    /// [`depth`](Self::depth) feedforward connections around each. Every
    /// productive round also fires at least one non-input node.
    #[must_use]
    pub fn round_bound(&self) -> Option<usize> {
        let topo = GraphTopology::from_genome(self, EdgeFilter::Active);
        let depth = topo.longest_path()? as usize;
        let looped = self.num_enabled_connections() - topo.edge_count();
        let neurons = self.num_nodes() - self.input_ids.len();
        Some(((depth + 1) * (looped + 1) - 1).min(neurons))
    }

    /// Whether every connection's endpoints are in this genome and list the
    /// connection in their adjacency, both indices match the arenas, and the
    /// non-recurrent connections (enabled or not) are acyclic.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let linked = self.connections.iter().all(|(key, conn)| {
            matches!(
                (self.nodes.get(conn.from), self.nodes.get(conn.to)),
                (Some(from), Some(to)) if from.outgoing.contains(&key) && to.incoming.contains(&key)
            )
        });
        let indexed = self.node_index.len() == self.nodes.len()
            && self.connection_index.len() == self.connections.len()
            && self
                .node_index
                .iter()
                .all(|(id, &key)| self.nodes.get(key).is_some_and(|n| n.id == *id))
            && self
                .connection_index
                .iter()
                .all(|(id, &key)| self.connections.get(key).is_some_and(|c| c.innovation == *id));
        let acyclic = !GraphTopology::from_genome(self, EdgeFilter::Structural).has_cycle();
        linked && indexed && acyclic
    }

    /// Whether two genomes have the same nodes and connections (ids, roles,
    /// endpoints, weights, enabled and recurrent flags).
    #[must_use]
    pub fn same_structure(&self, other: &Genome) -> bool {
        let nodes_match = self.num_nodes() == other.num_nodes()
            && self
                .nodes()
                .zip(other.nodes())
                .all(|(a, b)| a.id == b.id && a.role == b.role);
        let connections_match = self.num_connections() == other.num_connections()
            && self.connections().zip(other.connections()).all(|(a, b)| {
                a.innovation == b.innovation
                    && self.endpoints(a) == other.endpoints(b)
                    && a.weight.to_bits() == b.weight.to_bits()
                    && a.enabled == b.enabled
                    && a.recurrent == b.recurrent
            });
        nodes_match && connections_match
    }

    /// Compute compatibility distance to another genome.
    ///
    /// `c_excess * E / N + c_disjoint * D / N + c_weight * W`, where `W` is
    /// the mean weight difference of matching genes and `N` the larger
    /// connection count.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compatibility_distance(
        &self,
        other: &Genome,
        c_excess: f32,
        c_disjoint: f32,
        c_weight: f32,
    ) -> f32 {
        let mut matching = 0;
        let mut disjoint = 0;
        let mut excess = 0;
        let mut weight_diff_sum = 0.0;

        let self_max = self.max_innovation();
        let other_max = other.max_innovation();

        for conn in self.connections() {
            if let Some(other_conn) = other.connection(conn.innovation) {
                matching += 1;
                weight_diff_sum += (conn.weight - other_conn.weight).abs();
            } else if Some(conn.innovation) > other_max {
                excess += 1;
            } else {
                disjoint += 1;
            }
        }

        for conn in other.connections() {
            if self.connection(conn.innovation).is_none() {
                if Some(conn.innovation) > self_max {
                    excess += 1;
                } else {
                    disjoint += 1;
                }
            }
        }

        let n = self.num_connections().max(other.num_connections()).max(1) as f32;
        let avg_weight_diff = if matching > 0 {
            weight_diff_sum / matching as f32
        } else {
            0.0
        };

        (c_excess * excess as f32 / n)
            + (c_disjoint * disjoint as f32 / n)
            + (c_weight * avg_weight_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn test_rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    fn recurrent_config(inputs: usize, outputs: usize) -> GenomeConfig {
        GenomeConfig {
            allow_recurrence: true,
            ..GenomeConfig::new(inputs, outputs)
        }
    }

    #[test]
    fn test_initial_genome() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let genome = Genome::initial(GenomeConfig::new(3, 2), &registry, &mut rng).unwrap();

        assert_eq!(genome.num_nodes(), 5);
        assert_eq!(genome.num_enabled_connections(), 6);
        assert_eq!(genome.input_ids().len(), 3);
        assert_eq!(genome.output_ids().len(), 2);
        assert!(genome.hidden_ids().is_empty());
        assert!(genome.is_consistent());

        let innovations: HashSet<InnovationId> =
            genome.connections().map(|c| c.innovation).collect();
        assert_eq!(innovations.len(), 6);
        for conn in genome.connections() {
            assert!(conn.weight.abs() <= genome.config.weight_range);
        }
    }

    #[test]
    fn test_initial_genomes_share_markings() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let a = Genome::initial(GenomeConfig::new(2, 2), &registry, &mut rng).unwrap();
        let b = Genome::initial(GenomeConfig::new(2, 2), &registry, &mut rng).unwrap();

        let marks_a: Vec<InnovationId> = a.connections().map(|c| c.innovation).collect();
        let marks_b: Vec<InnovationId> = b.connections().map(|c| c.innovation).collect();
        assert_eq!(marks_a, marks_b);
        assert_eq!(a.input_ids(), b.input_ids());
    }

    #[test]
    fn test_initial_rejects_invalid_config() {
        let registry = InnovationRegistry::new();
        let result = Genome::initial(GenomeConfig::new(0, 1), &registry, &mut test_rng());
        assert!(matches!(result, Err(NeatError::InvalidConfig(_))));
    }

    #[test]
    fn test_add_connection_rejects_duplicates_and_loops() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();
        let input = genome.input_ids()[0];
        let output = genome.output_ids()[0];

        let conflict = |result: Result<InnovationId>| match result {
            Err(NeatError::MutationConflict { reason, .. }) => Some(reason),
            _ => None,
        };

        assert_eq!(
            conflict(genome.add_connection(input, output, &registry, &mut rng)),
            Some(ConflictReason::Duplicate)
        );
        assert_eq!(
            conflict(genome.add_connection(output, output, &registry, &mut rng)),
            Some(ConflictReason::SelfLoop)
        );
        assert_eq!(
            conflict(genome.add_connection(output, input, &registry, &mut rng)),
            Some(ConflictReason::InputTarget)
        );
        assert_eq!(
            conflict(genome.add_connection(NodeId(999), output, &registry, &mut rng)),
            Some(ConflictReason::UnknownNode)
        );
    }

    #[test]
    fn test_add_connection_rejects_cycle_without_recurrence() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(1, 1), &registry, &mut rng).unwrap();
        let innovation = genome.connections().next().unwrap().innovation;
        let hidden = genome.add_node(innovation, &registry).unwrap();
        let output = genome.output_ids()[0];

        let result = genome.add_connection(output, hidden, &registry, &mut rng);
        assert!(matches!(
            result,
            Err(NeatError::MutationConflict {
                reason: ConflictReason::Cycle,
                ..
            })
        ));
    }

    #[test]
    fn test_add_connection_flags_recurrent_loops() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(recurrent_config(1, 1), &registry, &mut rng).unwrap();
        let output = genome.output_ids()[0];
        let input = genome.input_ids()[0];

        let self_loop = genome.add_connection(output, output, &registry, &mut rng).unwrap();
        assert!(genome.connection(self_loop).unwrap().recurrent);

        let back = genome.add_connection(output, input, &registry, &mut rng).unwrap();
        assert!(genome.connection(back).unwrap().recurrent);

        let forward = genome.connections().next().unwrap();
        assert!(!forward.recurrent);
        assert!(genome.is_consistent());
    }

    #[test]
    fn test_add_node() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();

        let initial_nodes = genome.num_nodes();
        let initial_conns = genome.num_connections();
        let split = genome.connections().next().unwrap().clone();
        let (from, to) = genome.endpoints(&split).unwrap();

        let hidden = genome.add_node(split.innovation, &registry).unwrap();

        assert_eq!(genome.num_nodes(), initial_nodes + 1);
        assert_eq!(genome.num_connections(), initial_conns + 2);
        assert_eq!(genome.num_enabled_connections(), initial_conns + 1);
        assert_eq!(genome.node(hidden).unwrap().role, NodeRole::Hidden);

        let original = genome.connection(split.innovation).unwrap();
        assert!(!original.enabled);
        assert!((original.weight - split.weight).abs() < 1e-9);

        let inbound = genome
            .connection(registry.mark_connection(from, hidden))
            .unwrap();
        assert!((inbound.weight - 1.0).abs() < 1e-9);
        let outbound = genome
            .connection(registry.mark_connection(hidden, to))
            .unwrap();
        assert!((outbound.weight - split.weight).abs() < 1e-9);

        // Splitting a disabled connection is refused.
        assert!(genome.add_node(split.innovation, &registry).is_none());
        assert!(genome.is_consistent());
    }

    #[test]
    fn test_independent_splits_converge() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut a = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();
        let mut b = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();
        let innovation = a.connections().next().unwrap().innovation;

        let node_a = a.add_node(innovation, &registry).unwrap();
        let node_b = b.add_node(innovation, &registry).unwrap();
        assert_eq!(node_a, node_b);

        let marks_a: Vec<InnovationId> = a.connections().map(|c| c.innovation).collect();
        let marks_b: Vec<InnovationId> = b.connections().map(|c| c.innovation).collect();
        assert_eq!(marks_a, marks_b);
    }

    #[test]
    fn test_resplit_uses_private_node() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(1, 1), &registry, &mut rng).unwrap();
        let innovation = genome.connections().next().unwrap().innovation;

        let first = genome.add_node(innovation, &registry).unwrap();
        genome.set_enabled(innovation, true);
        let second = genome.add_node(innovation, &registry).unwrap();

        assert_ne!(first, second);
        assert_eq!(genome.hidden_ids().len(), 2);
        assert!(genome.is_consistent());
    }

    #[test]
    fn test_split_with_taken_marking_leaves_genome_unchanged() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut a = Genome::initial(GenomeConfig::new(1, 1), &registry, &mut rng).unwrap();
        let mut b = Genome::initial(GenomeConfig::new(1, 1), &registry, &mut rng).unwrap();
        let [input, out] = [a.input_ids()[0], a.output_ids()[0]];
        let innovation = a.connections().next().unwrap().innovation;
        let hidden = a.add_node(innovation, &registry).unwrap();

        // `b` already carries the marking of the first split half.
        let taken = registry.mark_connection(input, hidden);
        b.insert_connection(taken, input, out, 0.2, false, false)
            .unwrap();

        assert!(b.add_node(innovation, &registry).is_none());
        assert!(b.connection(innovation).unwrap().enabled);
        assert_eq!(b.num_nodes(), 2);
        assert_eq!(b.num_connections(), 2);
        assert!(b.is_consistent());
    }

    #[test]
    fn test_node_mutation_rate_zero_is_noop() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();

        assert!(!genome.add_node_mutation(0.0, &registry, &mut rng));
        assert!(!genome.add_connection_mutation(0.0, &registry, &mut rng));
        assert_eq!(genome.num_nodes(), 3);
        assert_eq!(genome.num_connections(), 2);
    }

    #[test]
    fn test_connection_mutation_without_candidates_is_noop() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        // Fully connected 2x1 feedforward: every allowed pair already exists.
        let mut genome = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();
        assert!(genome.connection_candidates().is_empty());
        assert!(!genome.add_connection_mutation(1.0, &registry, &mut rng));
        assert_eq!(genome.num_connections(), 2);
    }

    #[test]
    fn test_connection_mutation_adds_one_connection() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();
        let innovation = genome.connections().next().unwrap().innovation;
        genome.add_node(innovation, &registry).unwrap();

        // The other input -> hidden is now a valid candidate.
        let before = genome.num_connections();
        assert!(genome.add_connection_mutation(1.0, &registry, &mut rng));
        assert_eq!(genome.num_connections(), before + 1);
        assert!(genome.is_consistent());
    }

    #[test]
    fn test_mutation_keeps_single_connection_per_pair() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(recurrent_config(2, 2), &registry, &mut rng).unwrap();

        for _ in 0..50 {
            genome.add_node_mutation(0.5, &registry, &mut rng);
            genome.add_connection_mutation(0.8, &registry, &mut rng);
        }

        let mut pairs = HashSet::new();
        for conn in genome.connections().filter(|c| c.enabled) {
            assert!(pairs.insert(genome.endpoints(conn).unwrap()));
        }
        assert!(genome.is_consistent());

        // Non-recurrent edges stay acyclic.
        let topo = GraphTopology::from_genome(&genome, EdgeFilter::Structural);
        assert!(!topo.has_cycle());
    }

    #[test]
    fn test_mutate_weights_respects_limits() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let config = GenomeConfig {
            weight_mutation_prob: 1.0,
            weight_mutation_power: 50.0,
            weight_replace_prob: 0.0,
            ..GenomeConfig::new(3, 3)
        };
        let mut genome = Genome::initial(config, &registry, &mut rng).unwrap();
        let before: Vec<f32> = genome.connections().map(|c| c.weight).collect();

        for _ in 0..20 {
            genome.mutate_weights(&mut rng);
        }

        let after: Vec<f32> = genome.connections().map(|c| c.weight).collect();
        assert_ne!(before, after);
        let limit = genome.config.weight_range * 10.0;
        assert!(after.iter().all(|w| w.abs() <= limit));
    }

    #[test]
    fn test_fitness_set_once() {
        let registry = InnovationRegistry::new();
        let mut genome =
            Genome::initial(GenomeConfig::new(1, 1), &registry, &mut test_rng()).unwrap();

        assert!(matches!(
            genome.fitness(),
            Err(NeatError::UnscoredGenome { .. })
        ));
        genome.set_fitness(2.5).unwrap();
        assert_eq!(genome.fitness().unwrap(), 2.5);
        assert_eq!(
            genome.set_fitness(3.0),
            Err(NeatError::FitnessAlreadyAssigned)
        );

        genome.clear_fitness();
        assert!(!genome.is_scored());
    }

    #[test]
    fn test_insert_connection_rejects_dangling() {
        let registry = InnovationRegistry::new();
        let mut genome =
            Genome::initial(GenomeConfig::new(1, 1), &registry, &mut test_rng()).unwrap();
        let result =
            genome.insert_connection(InnovationId(500), NodeId(0), NodeId(77), 0.1, true, false);
        assert_eq!(
            result,
            Err(NeatError::DanglingConnection {
                innovation: InnovationId(500),
                node: NodeId(77),
            })
        );
    }

    #[test]
    fn test_feedforward_cycle_is_inconsistent() {
        let registry = InnovationRegistry::new();
        let mut genome =
            Genome::initial(GenomeConfig::new(1, 1), &registry, &mut test_rng()).unwrap();
        let out = genome.output_ids()[0];
        let innovation = genome.connections().next().unwrap().innovation;
        let hidden = genome.add_node(innovation, &registry).unwrap();
        assert_eq!(genome.depth(), Some(2));
        assert_eq!(genome.round_bound(), Some(2));

        let back = registry.mark_connection(out, hidden);
        genome
            .insert_connection(back, out, hidden, 0.5, false, false)
            .unwrap();
        assert!(!genome.is_consistent());
        assert_eq!(genome.depth(), Some(2));

        genome.set_enabled(back, true);
        assert_eq!(genome.depth(), None);
        assert_eq!(genome.round_bound(), None);
    }

    #[test]
    fn test_adjacency_in_innovation_order() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let mut genome = Genome::initial(GenomeConfig::new(3, 1), &registry, &mut rng).unwrap();
        let first = genome.connections().next().unwrap().innovation;
        genome.add_node(first, &registry).unwrap();

        for node in genome.nodes() {
            for list in [&node.incoming, &node.outgoing] {
                let marks: Vec<InnovationId> = list
                    .iter()
                    .map(|&k| genome.connection_by_key(k).unwrap().innovation)
                    .collect();
                let mut sorted = marks.clone();
                sorted.sort_unstable();
                assert_eq!(marks, sorted);
            }
        }
    }

    #[test]
    fn test_compatibility_distance() {
        let registry = InnovationRegistry::new();
        let mut rng = test_rng();
        let a = Genome::initial(GenomeConfig::new(2, 1), &registry, &mut rng).unwrap();
        let mut b = a.clone();

        assert!(a.compatibility_distance(&a, 1.0, 1.0, 0.4).abs() < 1e-6);

        let innovation = b.connections().next().unwrap().innovation;
        b.add_node(innovation, &registry).unwrap();
        let ab = a.compatibility_distance(&b, 1.0, 1.0, 0.4);
        let ba = b.compatibility_distance(&a, 1.0, 1.0, 0.4);
        assert!(ab > 0.0);
        assert!((ab - ba).abs() < 1e-6);
    }
}
