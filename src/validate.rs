//! Hierarchy validation against a Dijkstra baseline.
//!
//! Loads the written hierarchy, replays seeded random source/target pairs
//! through a plain Dijkstra on the input graph and the bidirectional
//! hierarchy query, and tolerates zero mismatches. Only fully contracted
//! hierarchies (empty core marker) are eligible.

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::config::ContractorConfig;
use crate::contractor::edge::{EdgeWeight, InputEdge, NodeId, QueryEdge};
use crate::formats::{core as core_marker, hsgr, levels as level_file};
use crate::updater::Updater;

/// Forward adjacency of the raw input graph.
pub struct InputGraph {
    adjacency: Vec<Vec<(NodeId, EdgeWeight)>>,
}

impl InputGraph {
    pub fn from_edges(num_nodes: usize, edges: &[InputEdge]) -> Self {
        let mut adjacency: Vec<Vec<(NodeId, EdgeWeight)>> = vec![Vec::new(); num_nodes];
        for edge in edges {
            if edge.forward {
                adjacency[edge.source as usize].push((edge.target, edge.weight));
            }
            if edge.backward {
                adjacency[edge.target as usize].push((edge.source, edge.weight));
            }
        }
        Self { adjacency }
    }

    /// Plain Dijkstra; `None` when the target is unreachable.
    pub fn distance(&self, source: NodeId, target: NodeId) -> Option<EdgeWeight> {
        let mut dist = vec![EdgeWeight::MAX; self.adjacency.len()];
        let mut heap: BinaryHeap<Reverse<(EdgeWeight, NodeId)>> = BinaryHeap::new();
        dist[source as usize] = 0;
        heap.push(Reverse((0, source)));
        while let Some(Reverse((weight, node))) = heap.pop() {
            if node == target {
                return Some(weight);
            }
            if weight > dist[node as usize] {
                continue;
            }
            for &(next, edge_weight) in &self.adjacency[node as usize] {
                let candidate = weight.saturating_add(edge_weight);
                if candidate < dist[next as usize] {
                    dist[next as usize] = candidate;
                    heap.push(Reverse((candidate, next)));
                }
            }
        }
        None
    }
}

/// Bidirectional query over a fully contracted hierarchy: both searches
/// only climb towards higher levels and meet in the middle.
pub struct HierarchyQuery {
    up_forward: Vec<Vec<(NodeId, EdgeWeight)>>,
    up_backward: Vec<Vec<(NodeId, EdgeWeight)>>,
}

impl HierarchyQuery {
    pub fn new(num_nodes: usize, edges: &[QueryEdge], levels: &[f32]) -> Self {
        let mut up_forward: Vec<Vec<(NodeId, EdgeWeight)>> = vec![Vec::new(); num_nodes];
        let mut up_backward: Vec<Vec<(NodeId, EdgeWeight)>> = vec![Vec::new(); num_nodes];
        for edge in edges {
            if levels[edge.target as usize] <= levels[edge.source as usize] {
                continue;
            }
            if edge.data.forward {
                up_forward[edge.source as usize].push((edge.target, edge.data.weight));
            }
            if edge.data.backward {
                up_backward[edge.source as usize].push((edge.target, edge.data.weight));
            }
        }
        Self {
            up_forward,
            up_backward,
        }
    }

    pub fn distance(&self, source: NodeId, target: NodeId) -> Option<EdgeWeight> {
        let num_nodes = self.up_forward.len();
        let mut dist_forward = vec![EdgeWeight::MAX; num_nodes];
        let mut dist_backward = vec![EdgeWeight::MAX; num_nodes];
        let mut heap_forward: BinaryHeap<Reverse<(EdgeWeight, NodeId)>> = BinaryHeap::new();
        let mut heap_backward: BinaryHeap<Reverse<(EdgeWeight, NodeId)>> = BinaryHeap::new();

        dist_forward[source as usize] = 0;
        heap_forward.push(Reverse((0, source)));
        dist_backward[target as usize] = 0;
        heap_backward.push(Reverse((0, target)));

        let mut best = EdgeWeight::MAX;
        while !heap_forward.is_empty() || !heap_backward.is_empty() {
            let min_forward = heap_forward.peek().map(|Reverse((w, _))| *w);
            let min_backward = heap_backward.peek().map(|Reverse((w, _))| *w);
            match (min_forward, min_backward) {
                (Some(f), Some(b)) if f.min(b) >= best => break,
                (Some(f), None) if f >= best => break,
                (None, Some(b)) if b >= best => break,
                (None, None) => break,
                _ => {}
            }
            let forward_turn = match (min_forward, min_backward) {
                (Some(f), Some(b)) => f <= b,
                (Some(_), None) => true,
                _ => false,
            };
            if forward_turn {
                let Reverse((weight, node)) = heap_forward.pop().unwrap();
                if weight > dist_forward[node as usize] {
                    continue;
                }
                if dist_backward[node as usize] != EdgeWeight::MAX {
                    best = best.min(weight.saturating_add(dist_backward[node as usize]));
                }
                for &(next, edge_weight) in &self.up_forward[node as usize] {
                    let candidate = weight.saturating_add(edge_weight);
                    if candidate < dist_forward[next as usize] {
                        dist_forward[next as usize] = candidate;
                        heap_forward.push(Reverse((candidate, next)));
                    }
                }
            } else {
                let Reverse((weight, node)) = heap_backward.pop().unwrap();
                if weight > dist_backward[node as usize] {
                    continue;
                }
                if dist_forward[node as usize] != EdgeWeight::MAX {
                    best = best.min(weight.saturating_add(dist_forward[node as usize]));
                }
                for &(next, edge_weight) in &self.up_backward[node as usize] {
                    let candidate = weight.saturating_add(edge_weight);
                    if candidate < dist_backward[next as usize] {
                        dist_backward[next as usize] = candidate;
                        heap_backward.push(Reverse((candidate, next)));
                    }
                }
            }
        }
        (best != EdgeWeight::MAX).then_some(best)
    }
}

#[derive(Debug)]
pub struct ValidationReport {
    pub pairs: usize,
    pub reachable: usize,
    pub mismatches: usize,
}

pub fn validate_hierarchy(
    config: &ContractorConfig,
    num_pairs: usize,
    seed: u64,
) -> Result<ValidationReport> {
    println!("Loading hierarchy...");
    let query_graph = hsgr::read(config.path(".hsgr"))?;
    let levels = level_file::read(config.path(".level"))?;
    let core = core_marker::read(config.path(".core"))?;
    ensure!(
        core.iter().all(|&is_core| !is_core),
        "Hierarchy has a core; validation requires full contraction"
    );
    println!(
        "  ✓ {} nodes, {} edges",
        query_graph.num_nodes,
        query_graph.edges.len()
    );

    println!("Loading input graph...");
    let mut node_weights = vec![0; query_graph.num_nodes as usize];
    let updater = Updater::new(config.updater.clone());
    let (input_edges, max_node_id) = updater.load_and_update(&mut node_weights)?;
    let num_nodes = max_node_id as usize + 1;
    ensure!(
        num_nodes == query_graph.num_nodes as usize,
        "Input graph has {} nodes, hierarchy has {}",
        num_nodes,
        query_graph.num_nodes
    );
    ensure!(
        levels.len() == num_nodes,
        "Level count {} does not match node count {}",
        levels.len(),
        num_nodes
    );

    let input = InputGraph::from_edges(num_nodes, &input_edges);
    let query = HierarchyQuery::new(num_nodes, &query_graph.edges, &levels);

    let mut rng = StdRng::seed_from_u64(seed);
    let pairs: Vec<(NodeId, NodeId)> = (0..num_pairs)
        .map(|_| {
            (
                rng.gen_range(0..num_nodes as NodeId),
                rng.gen_range(0..num_nodes as NodeId),
            )
        })
        .collect();

    println!("Running {} query pairs...", num_pairs);
    let results: Vec<(bool, bool)> = pairs
        .par_iter()
        .map(|&(source, target)| {
            let expected = input.distance(source, target);
            let got = query.distance(source, target);
            (expected.is_some(), expected != got)
        })
        .collect();

    let reachable = results.iter().filter(|&&(reached, _)| reached).count();
    let mismatches = results.iter().filter(|&&(_, bad)| bad).count();
    for (&(source, target), _) in pairs
        .iter()
        .zip(results.iter())
        .filter(|(_, &(_, bad))| bad)
        .take(10)
    {
        println!(
            "  ✗ {} -> {}: hierarchy {:?}, baseline {:?}",
            source,
            target,
            query.distance(source, target),
            input.distance(source, target)
        );
    }
    ensure!(
        mismatches == 0,
        "{} of {} pairs disagree with the baseline",
        mismatches,
        num_pairs
    );
    println!("  ✓ {} pairs, {} reachable, no mismatches", num_pairs, reachable);
    Ok(ValidationReport {
        pairs: num_pairs,
        reachable,
        mismatches,
    })
}
