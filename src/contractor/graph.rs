//! Mutable adjacency structure for contraction.
//!
//! The graph is symmetric: input edge `u -> v` is stored at `u` with its
//! direction flags and at `v` with the flags swapped, so a backward search
//! never needs a reverse index. Outgoing edges of a node live in one
//! contiguous list that is appended to in place and dropped as a whole when
//! the node is contracted.

use crate::contractor::edge::{ContractorEdge, ContractorEdgeData, InputEdge, NodeId, QueryEdge};

/// Access seam shared by the owned graph and its filtered views. The
/// contractor and the witness search are generic over it.
pub trait ContractionGraph: Sync {
    fn num_nodes(&self) -> usize;

    /// False once the node is logically deleted or excluded by the view.
    fn is_active(&self, node: NodeId) -> bool;

    /// Raw outgoing storage of a node, unfiltered.
    fn edge_slice(&self, node: NodeId) -> &[ContractorEdge];

    /// Append an edge; an existing entry with the same target and direction
    /// flags is replaced instead when the new weight is lower.
    fn insert_edge(&mut self, source: NodeId, target: NodeId, data: ContractorEdgeData);

    /// Logically remove all outgoing edges of a node. The entries become
    /// inaccessible to iteration, as do entries of other nodes pointing at
    /// it.
    fn delete_edges_from(&mut self, node: NodeId);

    /// Iterate the outgoing edges of a node, skipping edges that touch
    /// inactive endpoints.
    fn edges(&self, node: NodeId) -> impl Iterator<Item = &ContractorEdge> + '_ {
        let slice = if self.is_active(node) {
            self.edge_slice(node)
        } else {
            &[]
        };
        slice.iter().filter(move |edge| self.is_active(edge.target))
    }

    /// Locate an edge with matching direction flags.
    fn find_edge(
        &self,
        source: NodeId,
        target: NodeId,
        forward: bool,
        backward: bool,
    ) -> Option<ContractorEdgeData> {
        self.edges(source)
            .find(|edge| {
                edge.target == target
                    && edge.data.forward == forward
                    && edge.data.backward == backward
            })
            .map(|edge| edge.data)
    }
}

fn upsert(list: &mut Vec<ContractorEdge>, target: NodeId, data: ContractorEdgeData) {
    if let Some(edge) = list.iter_mut().find(|edge| {
        edge.target == target
            && edge.data.forward == data.forward
            && edge.data.backward == data.backward
    }) {
        if data.weight < edge.data.weight {
            edge.data = data;
        }
        return;
    }
    list.push(ContractorEdge { target, data });
}

/// The owned, mutable contraction graph.
#[derive(Debug)]
pub struct ContractorGraph {
    adjacency: Vec<Vec<ContractorEdge>>,
    deleted: Vec<bool>,
}

impl ContractorGraph {
    /// Build the symmetric graph from the edge-expanded edge list,
    /// consuming it. Parallel edges between the same pair are coalesced to
    /// the minimum weight per direction; forward and backward halves with
    /// identical attributes merge into one bidirectional entry.
    pub fn from_edges(num_nodes: usize, edges: Vec<InputEdge>) -> Self {
        let mut halves: Vec<(NodeId, NodeId, ContractorEdgeData)> =
            Vec::with_capacity(edges.len() * 2);
        for edge in &edges {
            if edge.source == edge.target {
                continue;
            }
            let data = ContractorEdgeData {
                weight: edge.weight,
                duration: edge.duration,
                id: edge.turn_id,
                originals: 1,
                shortcut: false,
                forward: edge.forward,
                backward: edge.backward,
            };
            halves.push((edge.source, edge.target, data));
            halves.push((
                edge.target,
                edge.source,
                ContractorEdgeData {
                    forward: edge.backward,
                    backward: edge.forward,
                    ..data
                },
            ));
        }
        drop(edges);

        halves.sort_unstable_by_key(|&(source, target, data)| {
            (
                source,
                target,
                data.weight,
                data.duration,
                data.id,
                data.forward,
                data.backward,
            )
        });

        let mut adjacency: Vec<Vec<ContractorEdge>> = vec![Vec::new(); num_nodes];
        let mut run_start = 0;
        while run_start < halves.len() {
            let (source, target, _) = halves[run_start];
            let mut run_end = run_start;
            let mut forward: Option<ContractorEdgeData> = None;
            let mut backward: Option<ContractorEdgeData> = None;
            while run_end < halves.len()
                && halves[run_end].0 == source
                && halves[run_end].1 == target
            {
                let data = halves[run_end].2;
                // the run is sorted by weight, so the first hit is minimal
                if data.forward && forward.is_none() {
                    forward = Some(ContractorEdgeData {
                        forward: true,
                        backward: false,
                        ..data
                    });
                }
                if data.backward && backward.is_none() {
                    backward = Some(ContractorEdgeData {
                        forward: false,
                        backward: true,
                        ..data
                    });
                }
                run_end += 1;
            }
            match (forward, backward) {
                (Some(fwd), Some(bwd))
                    if fwd.weight == bwd.weight
                        && fwd.duration == bwd.duration
                        && fwd.id == bwd.id =>
                {
                    adjacency[source as usize].push(ContractorEdge {
                        target,
                        data: ContractorEdgeData {
                            forward: true,
                            backward: true,
                            ..fwd
                        },
                    });
                }
                _ => {
                    if let Some(fwd) = forward {
                        adjacency[source as usize].push(ContractorEdge { target, data: fwd });
                    }
                    if let Some(bwd) = backward {
                        adjacency[source as usize].push(ContractorEdge { target, data: bwd });
                    }
                }
            }
            run_start = run_end;
        }

        Self {
            adjacency,
            deleted: vec![false; num_nodes],
        }
    }

    pub fn num_edge_entries(&self) -> usize {
        self.adjacency.iter().map(Vec::len).sum()
    }

    /// A view admitting only nodes with `allowed[node] == true`.
    pub fn filter(&self, allowed: Vec<bool>) -> FilteredGraph<'_> {
        FilteredGraph::new(self, allowed)
    }
}

impl ContractionGraph for ContractorGraph {
    fn num_nodes(&self) -> usize {
        self.adjacency.len()
    }

    fn is_active(&self, node: NodeId) -> bool {
        !self.deleted[node as usize]
    }

    fn edge_slice(&self, node: NodeId) -> &[ContractorEdge] {
        &self.adjacency[node as usize]
    }

    fn insert_edge(&mut self, source: NodeId, target: NodeId, data: ContractorEdgeData) {
        upsert(&mut self.adjacency[source as usize], target, data);
    }

    fn delete_edges_from(&mut self, node: NodeId) {
        // drop the allocation, not just the entries
        let _ = std::mem::take(&mut self.adjacency[node as usize]);
        self.deleted[node as usize] = true;
    }
}

/// Borrowed view of a [`ContractorGraph`] restricted by a node predicate.
///
/// Mutations are copy-on-write per node, so independent per-filter
/// contraction passes never write into the shared base graph.
pub struct FilteredGraph<'a> {
    base: &'a ContractorGraph,
    allowed: Vec<bool>,
    local: Vec<Option<Vec<ContractorEdge>>>,
    deleted: Vec<bool>,
}

impl<'a> FilteredGraph<'a> {
    pub fn new(base: &'a ContractorGraph, allowed: Vec<bool>) -> Self {
        assert_eq!(allowed.len(), base.num_nodes());
        let num_nodes = base.num_nodes();
        Self {
            base,
            allowed,
            local: vec![None; num_nodes],
            deleted: vec![false; num_nodes],
        }
    }

    /// A fresh view over the same base, admitting the intersection of this
    /// view's predicate and `predicate`. Only valid before this view has
    /// been mutated.
    pub fn restrict(&self, predicate: &[bool]) -> FilteredGraph<'a> {
        debug_assert!(self.local.iter().all(Option::is_none));
        assert_eq!(predicate.len(), self.allowed.len());
        let allowed = self
            .allowed
            .iter()
            .zip(predicate.iter())
            .map(|(&a, &b)| a && b)
            .collect();
        FilteredGraph::new(self.base, allowed)
    }

    fn materialize(&mut self, node: NodeId) -> &mut Vec<ContractorEdge> {
        let base = self.base;
        self.local[node as usize]
            .get_or_insert_with(|| base.adjacency[node as usize].clone())
    }
}

impl ContractionGraph for FilteredGraph<'_> {
    fn num_nodes(&self) -> usize {
        self.base.num_nodes()
    }

    fn is_active(&self, node: NodeId) -> bool {
        self.allowed[node as usize]
            && !self.deleted[node as usize]
            && !self.base.deleted[node as usize]
    }

    fn edge_slice(&self, node: NodeId) -> &[ContractorEdge] {
        match &self.local[node as usize] {
            Some(list) => list,
            None => &self.base.adjacency[node as usize],
        }
    }

    fn insert_edge(&mut self, source: NodeId, target: NodeId, data: ContractorEdgeData) {
        let list = self.materialize(source);
        upsert(list, target, data);
    }

    fn delete_edges_from(&mut self, node: NodeId) {
        self.local[node as usize] = Some(Vec::new());
        self.deleted[node as usize] = true;
    }
}

/// All edges still reachable through iteration, as query edges.
pub fn collect_active_edges<G: ContractionGraph>(graph: &G) -> Vec<QueryEdge> {
    let mut edges = Vec::new();
    for node in 0..graph.num_nodes() as NodeId {
        for edge in graph.edges(node) {
            edges.push(QueryEdge::new(node, edge.target, edge.data));
        }
    }
    edges
}
