//! Graph topology analysis using CSR format.
//!
//! Mutation needs reachability queries (does `to` already reach `from`?);
//! [`Genome::depth`], [`Genome::round_bound`] and [`Genome::is_consistent`]
//! need longest-path depths and cycle detection. Both run over a compressed sparse row
//! snapshot of the genome instead of walking the arena repeatedly.
//!
//! Only non-recurrent connections are included: loop connections are exempt
//! from ordering by construction. [`EdgeFilter`] picks whether disabled
//! connections count.
//!
//! ## Determinism
//!
//! Nodes are indexed in ascending [`NodeId`](crate::gene::NodeId) order and
//! edges are inserted in ascending innovation order, so every traversal visits
//! nodes in the same order for structurally identical genomes.

use std::collections::VecDeque;

use slotmap::SecondaryMap;

use crate::gene::NodeKey;
use crate::genome::Genome;

/// Which connections become edges of a [`GraphTopology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeFilter {
    /// Every non-recurrent connection, enabled or disabled.
    ///
    /// Used when classifying new edges, so that re-enabling a disabled gene
    /// can never close a non-recurrent cycle.
    Structural,
    /// Enabled non-recurrent connections only; the graph signals flow along.
    Active,
}

/// CSR-format snapshot of a genome's non-recurrent connections.
#[derive(Debug, Clone)]
pub struct GraphTopology {
    /// Number of nodes in the graph.
    node_count: usize,
    /// Maps arena handle to dense index (0..node_count).
    node_to_idx: SecondaryMap<NodeKey, usize>,
    /// Maps dense index back to arena handle.
    idx_to_node: Vec<NodeKey>,
    /// CSR offsets for forward edges. Length = node_count + 1.
    fwd_offsets: Vec<usize>,
    /// fwd_targets[fwd_offsets[i]..fwd_offsets[i+1]] are successors of node i.
    fwd_targets: Vec<usize>,
    /// CSR offsets for reverse edges. Length = node_count + 1.
    rev_offsets: Vec<usize>,
    /// rev_sources[rev_offsets[i]..rev_offsets[i+1]] are predecessors of node i.
    rev_sources: Vec<usize>,
}

impl GraphTopology {
    /// Build topology from a genome.
    #[must_use]
    pub fn from_genome(genome: &Genome, filter: EdgeFilter) -> Self {
        let idx_to_node: Vec<NodeKey> = genome.node_keys().collect();
        let node_count = idx_to_node.len();

        let mut node_to_idx = SecondaryMap::with_capacity(node_count);
        for (idx, &key) in idx_to_node.iter().enumerate() {
            node_to_idx.insert(key, idx);
        }

        let edges: Vec<(usize, usize)> = genome
            .connections()
            .filter(|c| !c.recurrent && (filter == EdgeFilter::Structural || c.enabled))
            .filter_map(|c| Some((*node_to_idx.get(c.from)?, *node_to_idx.get(c.to)?)))
            .collect();

        let (fwd_offsets, fwd_targets) = build_csr(node_count, edges.iter().copied());
        let (rev_offsets, rev_sources) =
            build_csr(node_count, edges.iter().map(|&(from, to)| (to, from)));

        Self {
            node_count,
            node_to_idx,
            idx_to_node,
            fwd_offsets,
            fwd_targets,
            rev_offsets,
            rev_sources,
        }
    }

    /// Get the dense index for a node handle.
    #[inline]
    #[must_use]
    pub fn node_index(&self, key: NodeKey) -> Option<usize> {
        self.node_to_idx.get(key).copied()
    }

    /// Get the node handle for a dense index.
    #[inline]
    #[must_use]
    pub fn node_key(&self, idx: usize) -> Option<NodeKey> {
        self.idx_to_node.get(idx).copied()
    }

    /// Number of nodes in the topology.
    #[inline]
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Number of edges in the topology.
    #[inline]
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.fwd_targets.len()
    }

    /// Iterate over successors of a node (forward edges).
    #[inline]
    pub fn successors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.fwd_offsets[idx];
        let end = self.fwd_offsets[idx + 1];
        self.fwd_targets[start..end].iter().copied()
    }

    /// Iterate over predecessors of a node (reverse edges).
    #[inline]
    pub fn predecessors(&self, idx: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.rev_offsets[idx];
        let end = self.rev_offsets[idx + 1];
        self.rev_sources[start..end].iter().copied()
    }

    /// Every node that reaches `idx`, including `idx` itself.
    ///
    /// An edge `idx -> t` closes a cycle exactly when `ancestors(idx)[t]` holds.
    #[must_use]
    pub fn ancestors(&self, idx: usize) -> Vec<bool> {
        let mut visited = vec![false; self.node_count];
        let mut queue = VecDeque::new();
        visited[idx] = true;
        queue.push_back(idx);

        while let Some(current) = queue.pop_front() {
            for pred in self.predecessors(current) {
                if !visited[pred] {
                    visited[pred] = true;
                    queue.push_back(pred);
                }
            }
        }

        visited
    }

    /// Check if adding edge `from -> to` would create a cycle.
    ///
    /// BFS from `to` along forward edges; the edge closes a cycle if `from`
    /// is reachable. Unknown nodes never create cycles.
    #[must_use]
    pub fn would_create_cycle(&self, from: NodeKey, to: NodeKey) -> bool {
        let (Some(from_idx), Some(to_idx)) = (self.node_index(from), self.node_index(to)) else {
            return false;
        };

        if from_idx == to_idx {
            return true;
        }

        let mut visited = vec![false; self.node_count];
        let mut queue = VecDeque::new();
        queue.push_back(to_idx);
        visited[to_idx] = true;

        while let Some(current) = queue.pop_front() {
            for succ in self.successors(current) {
                if succ == from_idx {
                    return true;
                }
                if !visited[succ] {
                    visited[succ] = true;
                    queue.push_back(succ);
                }
            }
        }

        false
    }

    /// Detect if the graph contains any cycle using Kahn's algorithm.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        self.compute_depths().is_none()
    }

    /// Compute longest-path depths for all nodes using Kahn's algorithm.
    ///
    /// Nodes without predecessors have depth 0. Returns a vector indexed by
    /// dense node index, or `None` if a cycle is detected.
    #[must_use]
    pub fn compute_depths(&self) -> Option<Vec<u32>> {
        let mut in_degree: Vec<usize> = (0..self.node_count)
            .map(|idx| self.rev_offsets[idx + 1] - self.rev_offsets[idx])
            .collect();
        let mut depths = vec![0u32; self.node_count];

        let mut queue: VecDeque<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut processed = 0;
        while let Some(u) = queue.pop_front() {
            processed += 1;
            for v in self.successors(u) {
                let new_depth = depths[u].saturating_add(1);
                if new_depth > depths[v] {
                    depths[v] = new_depth;
                }

                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        (processed == self.node_count).then_some(depths)
    }

    /// Length in edges of the longest path, or `None` if the graph is cyclic.
    #[must_use]
    pub fn longest_path(&self) -> Option<u32> {
        self.compute_depths()
            .map(|depths| depths.into_iter().max().unwrap_or(0))
    }
}

/// Bucket `(row, col)` pairs into CSR offsets and columns, preserving the
/// relative order of pairs within a row.
fn build_csr(
    node_count: usize,
    pairs: impl Iterator<Item = (usize, usize)> + Clone,
) -> (Vec<usize>, Vec<usize>) {
    let mut counts = vec![0usize; node_count];
    for (row, _) in pairs.clone() {
        counts[row] += 1;
    }

    let mut offsets = Vec::with_capacity(node_count + 1);
    let mut running = 0;
    offsets.push(0);
    for &count in &counts {
        running += count;
        offsets.push(running);
    }

    let mut columns = vec![0usize; running];
    let mut write_pos = offsets[..node_count].to_vec();
    for (row, col) in pairs {
        columns[write_pos[row]] = col;
        write_pos[row] += 1;
    }

    (offsets, columns)
}
