//! Round-based forward propagation over arbitrary, possibly cyclic genomes.
//!
//! No topological order is precomputed. Inputs fire first and push their
//! successors onto a frontier; each round visits the frontier in ascending
//! [`NodeId`] order and fires every node whose enabled feedforward inputs all
//! carry a signal. Nodes still missing a signal become [`NodeState::Pending`]
//! and are retried next round. Recurrent connections are exempt from the
//! readiness check and contribute only if their source already fired during
//! this call.
//!
//! A round that fires nothing while some output is still unactivated is a
//! deadlock: no further round could change anything.
//!
//! All transient state lives in secondary maps owned by the [`Propagator`],
//! so evaluation borrows the genome immutably and every run starts clean.

use slotmap::SecondaryMap;
use tracing::debug;

use crate::error::{NeatError, Result};
use crate::gene::{ConnectionKey, NodeId, NodeKey, NodeRole};
use crate::genome::Genome;

/// Per-call state of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeState {
    /// Not reached yet.
    Unactivated,
    /// Reached but waiting for at least one incoming signal.
    Pending,
    /// Fired with the given value.
    Activated(f32),
}

/// Result of one propagation run.
#[derive(Debug, Clone, PartialEq)]
pub struct PropagationReport {
    /// Output values in ascending output [`NodeId`] order.
    pub outputs: Vec<f32>,
    /// Number of frontier rounds after the inputs fired.
    pub rounds: usize,
    /// How many times a node entered [`NodeState::Pending`] from
    /// [`NodeState::Unactivated`].
    pub pending_entries: usize,
}

enum Step {
    Fired,
    Waiting { entered: bool },
    Skipped,
}

/// Evaluator borrowing one genome.
#[derive(Debug)]
pub struct Propagator<'g> {
    genome: &'g Genome,
    states: SecondaryMap<NodeKey, NodeState>,
    signals: SecondaryMap<ConnectionKey, f32>,
}

impl<'g> Propagator<'g> {
    /// Create a propagator for `genome`.
    #[must_use]
    pub fn new(genome: &'g Genome) -> Self {
        Self {
            genome,
            states: SecondaryMap::new(),
            signals: SecondaryMap::new(),
        }
    }

    /// Evaluate the genome for one input vector.
    ///
    /// # Errors
    ///
    /// [`NeatError::InputShape`] if `inputs` has the wrong length, or
    /// [`NeatError::PropagationDeadlock`] if some output can never fire.
    pub fn run(&mut self, inputs: &[f32]) -> Result<PropagationReport> {
        let genome = self.genome;
        let input_ids = genome.input_ids();
        if inputs.len() != input_ids.len() {
            return Err(NeatError::InputShape {
                expected: input_ids.len(),
                actual: inputs.len(),
            });
        }

        self.reset();

        let mut next = Vec::new();
        for (&id, &seed) in input_ids.iter().zip(inputs) {
            if let Some(key) = genome.node_key(id) {
                self.activate_input(key, seed, &mut next);
            }
        }

        let mut rounds = 0;
        let mut pending_entries = 0;
        while !self.outputs_ready() {
            rounds += 1;
            let mut frontier = std::mem::take(&mut next);
            frontier.sort_unstable_by_key(|&key| genome.node_by_key(key).map(|n| n.id));
            frontier.dedup();

            let mut progressed = false;
            for key in frontier {
                match self.step(key, &mut next) {
                    Step::Fired => progressed = true,
                    Step::Waiting { entered } => {
                        pending_entries += usize::from(entered);
                        next.push(key);
                    }
                    Step::Skipped => {}
                }
            }

            if !progressed {
                return Err(self.deadlock(rounds));
            }
        }

        let outputs = genome
            .output_ids()
            .iter()
            .map(|&id| self.value(id))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| self.deadlock(rounds))?;

        Ok(PropagationReport {
            outputs,
            rounds,
            pending_entries,
        })
    }

    /// State of a node after the last run.
    #[must_use]
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        let key = self.genome.node_key(id)?;
        self.states.get(key).copied()
    }

    /// Value of an activated node after the last run.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<f32> {
        match self.state(id)? {
            NodeState::Activated(value) => Some(value),
            NodeState::Unactivated | NodeState::Pending => None,
        }
    }

    fn reset(&mut self) {
        self.states.clear();
        self.signals.clear();
        for key in self.genome.node_keys() {
            self.states.insert(key, NodeState::Unactivated);
        }
    }

    fn outputs_ready(&self) -> bool {
        self.genome
            .output_ids()
            .iter()
            .all(|&id| self.value(id).is_some())
    }

    fn step(&mut self, key: NodeKey, next: &mut Vec<NodeKey>) -> Step {
        let genome = self.genome;
        let Some(node) = genome.node_by_key(key) else {
            return Step::Skipped;
        };
        if matches!(self.states.get(key), Some(NodeState::Activated(_))) {
            return Step::Skipped;
        }

        match node.role {
            // Inputs fire before the first round.
            NodeRole::Input => Step::Skipped,
            NodeRole::Hidden | NodeRole::Output => self.activate_neuron(key, next),
        }
    }

    /// Fire an input node with `squash(seed + recurrent signals)`.
    fn activate_input(&mut self, key: NodeKey, seed: f32, next: &mut Vec<NodeKey>) {
        let genome = self.genome;
        let Some(node) = genome.node_by_key(key) else {
            return;
        };

        let looped: f32 = node
            .incoming
            .iter()
            .filter_map(|&ck| {
                let conn = genome.connection_by_key(ck)?;
                let signal = self.signals.get(ck)?;
                conn.enabled.then_some(*signal)
            })
            .sum();

        let value = genome.config.squash.apply(seed + looped);
        self.fire(key, value, next);
    }

    /// Fire a hidden or output node if every enabled feedforward input carries
    /// a signal; otherwise mark it pending.
    fn activate_neuron(&mut self, key: NodeKey, next: &mut Vec<NodeKey>) -> Step {
        let genome = self.genome;
        let Some(node) = genome.node_by_key(key) else {
            return Step::Skipped;
        };

        let mut sum = 0.0;
        for &ck in &node.incoming {
            let Some(conn) = genome.connection_by_key(ck) else {
                continue;
            };
            if !conn.enabled {
                continue;
            }
            match self.signals.get(ck) {
                Some(&signal) => sum += signal * conn.weight,
                None if conn.recurrent => {}
                None => {
                    let previous = self.states.insert(key, NodeState::Pending);
                    let entered = matches!(previous, None | Some(NodeState::Unactivated));
                    return Step::Waiting { entered };
                }
            }
        }

        let value = genome.config.squash.apply(sum);
        self.fire(key, value, next);
        Step::Fired
    }

    fn fire(&mut self, key: NodeKey, value: f32, next: &mut Vec<NodeKey>) {
        let genome = self.genome;
        self.states.insert(key, NodeState::Activated(value));
        let Some(node) = genome.node_by_key(key) else {
            return;
        };

        for &ck in &node.outgoing {
            let Some(conn) = genome.connection_by_key(ck) else {
                continue;
            };
            if !conn.enabled {
                continue;
            }
            self.signals.insert(ck, value);
            if !matches!(self.states.get(conn.to), Some(NodeState::Activated(_))) {
                next.push(conn.to);
            }
        }
    }

    fn deadlock(&self, round: usize) -> NeatError {
        let genome = self.genome;
        let pending = self
            .states
            .iter()
            .filter(|&(key, state)| match state {
                NodeState::Pending => true,
                NodeState::Unactivated => genome
                    .node_by_key(key)
                    .is_some_and(|n| n.role == NodeRole::Output),
                NodeState::Activated(_) => false,
            })
            .count();
        debug!(round, pending, "propagation deadlocked");
        NeatError::PropagationDeadlock { round, pending }
    }
}
