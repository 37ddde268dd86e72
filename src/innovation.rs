//! Innovation registry: run-wide allocation of node ids and historical markings.
//!
//! Every structural mutation asks the registry for the identifiers it needs.
//! The registry deduplicates by structural signature, so two genomes that
//! independently add the same `from -> to` edge receive the same
//! [`InnovationId`], and two genomes that split the same connection receive the
//! same hidden [`NodeId`] (and therefore the same two split markings). This is
//! what makes gene alignment during crossover meaningful.
//!
//! The registry is the only shared mutable state of a run. All methods take
//! `&self` and serialize through an internal lock, so it can be shared behind
//! an `Arc` by concurrent mutation workers.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{NeatError, Result};
use crate::gene::{InnovationId, NodeId};

/// Node ids of the fixed input/output layer, shared by every genome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoLayout {
    /// Input node ids in ascending order.
    pub inputs: Vec<NodeId>,
    /// Output node ids in ascending order.
    pub outputs: Vec<NodeId>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_node_id: u64,
    next_innovation: u64,
    connections: HashMap<(NodeId, NodeId), InnovationId>,
    splits: HashMap<InnovationId, NodeId>,
    layout: Option<IoLayout>,
}

impl RegistryState {
    fn mint_node(&mut self) -> NodeId {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        id
    }
}

/// Allocator of node ids and connection markings for one evolutionary run.
#[derive(Debug, Default)]
pub struct InnovationRegistry {
    state: Mutex<RegistryState>,
}

impl InnovationRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh node id. Ids are strictly increasing and never reused.
    pub fn allocate_node_id(&self) -> NodeId {
        self.state.lock().mint_node()
    }

    /// Historical marking for the edge `from -> to`.
    ///
    /// Returns the id minted the first time this signature was seen in the
    /// run, by any genome; otherwise mints and caches a new one.
    pub fn mark_connection(&self, from: NodeId, to: NodeId) -> InnovationId {
        let mut state = self.state.lock();
        if let Some(&innovation) = state.connections.get(&(from, to)) {
            return innovation;
        }
        let innovation = InnovationId(state.next_innovation);
        state.next_innovation += 1;
        state.connections.insert((from, to), innovation);
        innovation
    }

    /// Hidden node id for splitting the connection `innovation`.
    ///
    /// Every genome that splits the same connection gets the same node id.
    pub fn split_node(&self, innovation: InnovationId) -> NodeId {
        let mut state = self.state.lock();
        if let Some(&id) = state.splits.get(&innovation) {
            return id;
        }
        let id = state.mint_node();
        state.splits.insert(innovation, id);
        id
    }

    /// Node ids of the input/output layer.
    ///
    /// The first call of a run allocates `inputs` then `outputs` consecutive
    /// ids; later calls return the same layout.
    ///
    /// # Errors
    ///
    /// [`NeatError::LayoutMismatch`] if a different shape was registered earlier.
    pub fn io_layout(&self, inputs: usize, outputs: usize) -> Result<IoLayout> {
        let mut state = self.state.lock();
        if let Some(layout) = &state.layout {
            if layout.inputs.len() != inputs || layout.outputs.len() != outputs {
                return Err(NeatError::LayoutMismatch {
                    registered_inputs: layout.inputs.len(),
                    registered_outputs: layout.outputs.len(),
                    inputs,
                    outputs,
                });
            }
            return Ok(layout.clone());
        }

        let inputs: Vec<NodeId> = (0..inputs).map(|_| state.mint_node()).collect();
        let outputs: Vec<NodeId> = (0..outputs).map(|_| state.mint_node()).collect();
        let layout = IoLayout { inputs, outputs };
        state.layout = Some(layout.clone());
        Ok(layout)
    }

    /// Number of node ids minted so far.
    #[must_use]
    pub fn node_count(&self) -> u64 {
        self.state.lock().next_node_id
    }

    /// Number of connection markings minted so far.
    #[must_use]
    pub fn innovation_count(&self) -> u64 {
        self.state.lock().next_innovation
    }
}
