//! Priority-driven node contraction.
//!
//! One pass contracts a configurable fraction of the admissible nodes.
//! Rounds pop the minimum-priority band from the queue, thin it to an
//! independent set, re-check priorities lazily, enumerate the necessary
//! shortcuts for the survivors in parallel, and apply all mutations from
//! the single coordinator thread.

use anyhow::{ensure, Result};
use rayon::prelude::*;

use crate::contractor::edge::{
    ContractorEdgeData, EdgeWeight, NodeId, QueryEdge, INVALID_WEIGHT,
};
use crate::contractor::graph::ContractionGraph;
use crate::contractor::queue::NodePriorityQueue;
use crate::contractor::witness::{WitnessSearch, CHEAP_HOP_LIMIT, FULL_HOP_LIMIT};

// Priority coefficients. All three terms stay in play.
const EDGE_DIFFERENCE_COEFF: f32 = 1.0;
const DEPTH_COEFF: f32 = 1.0;
const ORIGINAL_EDGES_COEFF: f32 = 1.0;

/// Candidates within this slack of the round minimum form the band.
const BAND_SLACK: f32 = 1e-3;

/// A shortcut pending insertion, recorded by a worker.
#[derive(Debug, Clone, Copy)]
struct Shortcut {
    source: NodeId,
    target: NodeId,
    data: ContractorEdgeData,
}

struct NodeExamination {
    shortcuts: Vec<Shortcut>,
    necessary: usize,
    in_count: usize,
    out_count: usize,
}

/// Result of one contraction pass.
pub struct PassOutput {
    /// True for every node the pass left uncontracted (remaining
    /// admissible nodes and all non-admissible ones).
    pub is_core: Vec<bool>,
    /// Edge entries of contracted nodes, captured at contraction time.
    pub retired_edges: Vec<QueryEdge>,
    /// First level value after this pass.
    pub next_level: f32,
}

/// Contract `core_factor` of the admissible nodes of `graph` in place,
/// inserting shortcuts as needed. `levels` records the contraction order;
/// with `cached_order` the existing values seed the queue and the order is
/// replayed instead of recomputed. Nodes with an invalid node weight are
/// pinned to the core.
pub fn contract_graph<G: ContractionGraph>(
    graph: &mut G,
    admissible: &[bool],
    levels: &mut [f32],
    cached_order: bool,
    node_weights: &[EdgeWeight],
    core_factor: f64,
    level_base: f32,
) -> Result<PassOutput> {
    let num_nodes = graph.num_nodes();
    ensure!(
        admissible.len() == num_nodes && levels.len() == num_nodes,
        "Node mask length does not match graph size"
    );
    ensure!(
        node_weights.len() == num_nodes,
        "Node weight count {} does not match graph size {}",
        node_weights.len(),
        num_nodes
    );
    ensure!(
        (0.0..=1.0).contains(&core_factor),
        "Core factor must be between 0.0 and 1.0 (inclusive), got {}",
        core_factor
    );

    let workset: Vec<NodeId> = (0..num_nodes as NodeId)
        .filter(|&node| {
            admissible[node as usize]
                && graph.is_active(node)
                && node_weights[node as usize] != INVALID_WEIGHT
        })
        .collect();
    let contraction_target = (workset.len() as f64 * core_factor) as usize;

    let mut contracted = vec![false; num_nodes];
    let mut depth = vec![0u32; num_nodes];
    let mut queue = NodePriorityQueue::new();

    {
        let graph_ref: &G = graph;
        if cached_order {
            for &node in &workset {
                queue.push(node, levels[node as usize]);
            }
        } else {
            let initial: Vec<f32> = workset
                .par_iter()
                .map_init(
                    || WitnessSearch::new(num_nodes),
                    |search, &node| node_priority(graph_ref, search, &depth, node),
                )
                .collect();
            for (&node, &priority) in workset.iter().zip(initial.iter()) {
                queue.push(node, priority);
            }
        }
    }

    let mut retired_edges: Vec<QueryEdge> = Vec::new();
    let mut level_counter = level_base;
    let mut contracted_count = 0usize;
    let mut round_stamp = vec![0u32; num_nodes];
    let mut round: u32 = 0;

    while contracted_count < contraction_target {
        let Some(min_priority) = queue.peek_priority() else {
            break;
        };
        round += 1;

        // 1. pop the minimum priority band
        let mut band: Vec<(NodeId, f32)> = Vec::new();
        while let Some(priority) = queue.peek_priority() {
            if priority > min_priority + BAND_SLACK {
                break;
            }
            let Some(entry) = queue.pop() else {
                break;
            };
            band.push(entry);
        }

        // 2. thin the band to an independent set; band order is
        //    (priority, id), which makes the selection deterministic
        let mut selected: Vec<(NodeId, f32)> = Vec::new();
        for (node, priority) in band {
            if round_stamp[node as usize] == round {
                queue.push(node, priority);
                continue;
            }
            selected.push((node, priority));
            round_stamp[node as usize] = round;
            for edge in graph.edges(node) {
                round_stamp[edge.target as usize] = round;
                for second in graph.edges(edge.target) {
                    round_stamp[second.target as usize] = round;
                }
            }
        }

        // 3. lazy re-check against the queue's new minimum
        let mut survivors: Vec<(NodeId, f32)> = if cached_order {
            selected
        } else {
            let next_min = queue.peek_priority();
            let rechecked: Vec<f32> = {
                let graph_ref: &G = graph;
                selected
                    .par_iter()
                    .map_init(
                        || WitnessSearch::new(num_nodes),
                        |search, &(node, _)| node_priority(graph_ref, search, &depth, node),
                    )
                    .collect()
            };
            let mut kept = Vec::with_capacity(selected.len());
            for (&(node, _), &priority) in selected.iter().zip(rechecked.iter()) {
                match next_min {
                    Some(minimum) if priority > minimum + BAND_SLACK => {
                        queue.push(node, priority);
                    }
                    _ => kept.push((node, priority)),
                }
            }
            kept
        };

        // 4. never contract past the target
        let room = contraction_target - contracted_count;
        if survivors.len() > room {
            for &(node, priority) in &survivors[room..] {
                queue.push(node, priority);
            }
            survivors.truncate(room);
        }
        if survivors.is_empty() {
            continue;
        }

        // 5. enumerate necessary shortcuts in parallel, read-only
        let enumerated: Vec<(NodeId, Vec<Shortcut>)> = {
            let graph_ref: &G = graph;
            survivors
                .par_iter()
                .map_init(
                    || WitnessSearch::new(num_nodes),
                    |search, &(node, _)| {
                        (node, examine_node(graph_ref, search, node, true).shortcuts)
                    },
                )
                .collect()
        };

        // 6. apply: retire edges, delete, insert shortcuts, assign levels
        let mut touched: Vec<NodeId> = Vec::new();
        for (node, shortcuts) in enumerated {
            let mut neighbors: Vec<NodeId> = Vec::new();
            for edge in graph.edges(node) {
                neighbors.push(edge.target);
                retired_edges.push(QueryEdge::new(node, edge.target, edge.data));
            }
            graph.delete_edges_from(node);
            for shortcut in shortcuts {
                graph.insert_edge(shortcut.source, shortcut.target, shortcut.data);
                graph.insert_edge(
                    shortcut.target,
                    shortcut.source,
                    ContractorEdgeData {
                        forward: false,
                        backward: true,
                        ..shortcut.data
                    },
                );
            }
            contracted[node as usize] = true;
            contracted_count += 1;
            levels[node as usize] = level_counter;
            level_counter += 1.0;
            let next_depth = depth[node as usize] + 1;
            for &neighbor in &neighbors {
                if next_depth > depth[neighbor as usize] {
                    depth[neighbor as usize] = next_depth;
                }
                touched.push(neighbor);
            }
        }

        // 7. refresh priorities across the 2-hop neighborhood
        if !cached_order {
            let mut update: Vec<NodeId> = Vec::new();
            for &neighbor in &touched {
                update.push(neighbor);
                for edge in graph.edges(neighbor) {
                    update.push(edge.target);
                }
            }
            update.sort_unstable();
            update.dedup();
            update.retain(|&node| {
                admissible[node as usize]
                    && !contracted[node as usize]
                    && graph.is_active(node)
                    && node_weights[node as usize] != INVALID_WEIGHT
            });
            let refreshed: Vec<f32> = {
                let graph_ref: &G = graph;
                update
                    .par_iter()
                    .map_init(
                        || WitnessSearch::new(num_nodes),
                        |search, &node| node_priority(graph_ref, search, &depth, node),
                    )
                    .collect()
            };
            for (&node, &priority) in update.iter().zip(refreshed.iter()) {
                queue.push(node, priority);
            }
        }
    }

    Ok(PassOutput {
        is_core: contracted.iter().map(|&done| !done).collect(),
        retired_edges,
        next_level: level_counter,
    })
}

/// Priority of a candidate node against the current graph.
fn node_priority<G: ContractionGraph>(
    graph: &G,
    search: &mut WitnessSearch,
    depth: &[u32],
    node: NodeId,
) -> f32 {
    let examination = examine_node(graph, search, node, false);
    let edge_difference =
        examination.necessary as f32 - (examination.in_count + examination.out_count) as f32;
    let original_edges: u32 = graph
        .edges(node)
        .filter(|edge| edge.data.shortcut)
        .map(|edge| edge.data.originals)
        .sum();
    EDGE_DIFFERENCE_COEFF * edge_difference
        + DEPTH_COEFF * depth[node as usize] as f32
        + ORIGINAL_EDGES_COEFF * original_edges as f32
}

/// Enumerate the candidate shortcut pairs of `node` and decide, per pair,
/// whether a witness path makes the shortcut unnecessary. With `collect`
/// the surviving pairs are checked again at the deeper hop cap and
/// returned; without it only the count matters (priority evaluation).
fn examine_node<G: ContractionGraph>(
    graph: &G,
    search: &mut WitnessSearch,
    node: NodeId,
    collect: bool,
) -> NodeExamination {
    let mut in_edges: Vec<(NodeId, EdgeWeight, EdgeWeight, u32)> = Vec::new();
    let mut out_edges: Vec<(NodeId, EdgeWeight, EdgeWeight, u32)> = Vec::new();
    for edge in graph.edges(node) {
        if edge.data.backward {
            in_edges.push((
                edge.target,
                edge.data.weight,
                edge.data.duration,
                edge.data.originals,
            ));
        }
        if edge.data.forward {
            out_edges.push((
                edge.target,
                edge.data.weight,
                edge.data.duration,
                edge.data.originals,
            ));
        }
    }

    let mut examination = NodeExamination {
        shortcuts: Vec::new(),
        necessary: 0,
        in_count: in_edges.len(),
        out_count: out_edges.len(),
    };
    if in_edges.is_empty() || out_edges.is_empty() {
        return examination;
    }

    let targets: Vec<NodeId> = out_edges.iter().map(|&(target, ..)| target).collect();
    for &(source, in_weight, in_duration, in_originals) in &in_edges {
        let Some(max_out) = out_edges
            .iter()
            .filter(|&&(target, ..)| target != source)
            .map(|&(_, weight, ..)| weight)
            .max()
        else {
            continue;
        };
        let limit = in_weight.saturating_add(max_out);

        search.run(graph, source, node, limit, CHEAP_HOP_LIMIT, &targets);
        let mut pending: Vec<usize> = (0..out_edges.len())
            .filter(|&index| {
                let (target, out_weight, ..) = out_edges[index];
                target != source
                    && search.distance(target) > in_weight.saturating_add(out_weight)
            })
            .collect();

        if collect && !pending.is_empty() {
            // the cheap check was inconclusive; look deeper before
            // committing to a shortcut
            search.run(graph, source, node, limit, FULL_HOP_LIMIT, &targets);
            pending.retain(|&index| {
                let (target, out_weight, ..) = out_edges[index];
                search.distance(target) > in_weight.saturating_add(out_weight)
            });
        }

        examination.necessary += pending.len();
        if collect {
            for &index in &pending {
                let (target, out_weight, out_duration, out_originals) = out_edges[index];
                examination.shortcuts.push(Shortcut {
                    source,
                    target,
                    data: ContractorEdgeData {
                        weight: in_weight.saturating_add(out_weight),
                        duration: in_duration.saturating_add(out_duration),
                        id: node,
                        originals: in_originals + out_originals,
                        shortcut: true,
                        forward: true,
                        backward: false,
                    },
                });
            }
        }
    }
    examination
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contractor::edge::InputEdge;
    use crate::contractor::graph::{collect_active_edges, ContractorGraph};

    fn directed(source: NodeId, target: NodeId, weight: u32) -> InputEdge {
        InputEdge {
            source,
            target,
            weight,
            duration: weight,
            turn_id: source * 100 + target,
            forward: true,
            backward: false,
        }
    }

    fn contract_fully(
        graph: &mut ContractorGraph,
        levels: &mut [f32],
    ) -> PassOutput {
        let num_nodes = graph.num_nodes();
        let admissible = vec![true; num_nodes];
        let node_weights = vec![1; num_nodes];
        contract_graph(graph, &admissible, levels, false, &node_weights, 1.0, 0.0).unwrap()
    }

    /// All edges of the final hierarchy: retired plus whatever is left.
    fn hierarchy_edges(graph: &ContractorGraph, output: &PassOutput) -> Vec<QueryEdge> {
        let mut edges = output.retired_edges.clone();
        edges.extend(collect_active_edges(graph));
        edges.sort_unstable();
        edges.dedup();
        edges
    }

    #[test]
    fn test_line_graph_contracts_completely() {
        let mut graph = ContractorGraph::from_edges(
            5,
            vec![
                directed(0, 1, 1),
                directed(1, 2, 1),
                directed(2, 3, 1),
                directed(3, 4, 1),
            ],
        );
        let mut levels = vec![0.0; 5];
        let output = contract_fully(&mut graph, &mut levels);

        assert!(output.is_core.iter().all(|&core| !core));
        let edges = hierarchy_edges(&graph, &output);
        // every input edge survives in some orientation
        for (from, to) in [(0u32, 1u32), (1, 2), (2, 3), (3, 4)] {
            assert!(
                edges.iter().any(|edge| (edge.source == from
                    && edge.target == to
                    && edge.data.forward)
                    || (edge.source == to && edge.target == from && edge.data.backward)),
                "edge {}->{} lost",
                from,
                to
            );
        }
    }

    #[test]
    fn test_diamond_yields_single_shortcut() {
        let mut graph = ContractorGraph::from_edges(
            4,
            vec![
                directed(0, 1, 1),
                directed(0, 2, 1),
                directed(1, 3, 1),
                directed(2, 3, 1),
            ],
        );
        // contract the two middle nodes only
        let admissible = vec![false, true, true, false];
        let node_weights = vec![1; 4];
        let mut levels = vec![0.0; 4];
        let output = contract_graph(
            &mut graph,
            &admissible,
            &mut levels,
            false,
            &node_weights,
            1.0,
            0.0,
        )
        .unwrap();

        // the first middle still has the other path as a witness; only the
        // second contraction inserts 0->3, and the duplicate is dominated
        let edges = hierarchy_edges(&graph, &output);
        let forward_shortcuts: Vec<&QueryEdge> = edges
            .iter()
            .filter(|edge| edge.data.shortcut && edge.data.forward)
            .collect();
        assert_eq!(forward_shortcuts.len(), 1);
        let shortcut = forward_shortcuts[0];
        assert_eq!((shortcut.source, shortcut.target), (0, 3));
        assert_eq!(shortcut.data.weight, 2);
        // its reverse marker is the only other shortcut entry
        assert_eq!(
            edges.iter().filter(|edge| edge.data.shortcut).count(),
            2
        );
        assert_eq!(output.is_core, vec![true, false, false, true]);
    }

    #[test]
    fn test_shortcut_replaces_heavier_direct_edge() {
        // 0->1 weight 10 is undercut by the shortcut 0->2->1 of weight 2
        let mut graph = ContractorGraph::from_edges(
            3,
            vec![directed(0, 1, 10), directed(0, 2, 1), directed(2, 1, 1)],
        );
        let admissible = vec![false, false, true];
        let node_weights = vec![1; 3];
        let mut levels = vec![0.0; 3];
        let output = contract_graph(
            &mut graph,
            &admissible,
            &mut levels,
            false,
            &node_weights,
            1.0,
            0.0,
        )
        .unwrap();

        let edges = hierarchy_edges(&graph, &output);
        let forward: Vec<&QueryEdge> = edges
            .iter()
            .filter(|edge| edge.source == 0 && edge.target == 1 && edge.data.forward)
            .collect();
        assert_eq!(forward.len(), 1, "replacement must not add a parallel edge");
        assert_eq!(forward[0].data.weight, 2);
        assert!(forward[0].data.shortcut);
        assert_eq!(forward[0].data.id, 2);
    }

    #[test]
    fn test_no_shortcut_when_direct_edge_wins() {
        // direct 0->1 weight 1 is a witness; contracting 2 adds nothing
        let mut graph = ContractorGraph::from_edges(
            3,
            vec![directed(0, 1, 1), directed(0, 2, 1), directed(2, 1, 1)],
        );
        let admissible = vec![false, false, true];
        let node_weights = vec![1; 3];
        let mut levels = vec![0.0; 3];
        let output = contract_graph(
            &mut graph,
            &admissible,
            &mut levels,
            false,
            &node_weights,
            1.0,
            0.0,
        )
        .unwrap();

        let edges = hierarchy_edges(&graph, &output);
        assert!(edges.iter().all(|edge| !edge.data.shortcut));
        let direct = edges
            .iter()
            .find(|edge| edge.source == 0 && edge.target == 1 && edge.data.forward)
            .unwrap();
        assert_eq!(direct.data.weight, 1);
    }

    #[test]
    fn test_core_factor_leaves_exact_core() {
        // complete bidirectional K10 at factor 0.5: exactly 5 core nodes
        let mut edges = Vec::new();
        for source in 0..10u32 {
            for target in (source + 1)..10 {
                edges.push(InputEdge {
                    source,
                    target,
                    weight: 1,
                    duration: 1,
                    turn_id: source * 10 + target,
                    forward: true,
                    backward: true,
                });
            }
        }
        let mut graph = ContractorGraph::from_edges(10, edges);
        let admissible = vec![true; 10];
        let node_weights = vec![1; 10];
        let mut levels = vec![0.0; 10];
        let output = contract_graph(
            &mut graph,
            &admissible,
            &mut levels,
            false,
            &node_weights,
            0.5,
            0.0,
        )
        .unwrap();

        assert_eq!(output.is_core.iter().filter(|&&core| core).count(), 5);
    }

    #[test]
    fn test_pinned_nodes_stay_core() {
        let mut graph =
            ContractorGraph::from_edges(3, vec![directed(0, 1, 1), directed(1, 2, 1)]);
        let admissible = vec![true, false, true];
        let node_weights = vec![1; 3];
        let mut levels = vec![0.0; 3];
        let output = contract_graph(
            &mut graph,
            &admissible,
            &mut levels,
            false,
            &node_weights,
            1.0,
            0.0,
        )
        .unwrap();
        assert!(output.is_core[1]);
        assert!(!output.is_core[0]);
        assert!(!output.is_core[2]);
    }

    #[test]
    fn test_invalid_weight_pins_node() {
        let mut graph =
            ContractorGraph::from_edges(2, vec![directed(0, 1, 1)]);
        let admissible = vec![true; 2];
        let node_weights = vec![1, INVALID_WEIGHT];
        let mut levels = vec![0.0; 2];
        let output = contract_graph(
            &mut graph,
            &admissible,
            &mut levels,
            false,
            &node_weights,
            1.0,
            0.0,
        )
        .unwrap();
        assert!(output.is_core[1]);
    }

    #[test]
    fn test_shortcut_middles_contract_before_endpoints() {
        // P2: at the moment a middle is contracted its endpoints are still
        // uncontracted, so with the core left at the top every shortcut's
        // middle carries a smaller level than both endpoints
        let mut edges = Vec::new();
        let mut state = 0x2F6E2B1u64;
        let num_nodes = 60u32;
        for node in 1..num_nodes {
            // random predecessor keeps the graph connected
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let other = (state >> 33) as u32 % node;
            edges.push(InputEdge {
                source: other,
                target: node,
                weight: 1 + (state >> 17) as u32 % 9,
                duration: 1,
                turn_id: node,
                forward: true,
                backward: true,
            });
        }
        for extra in 0..num_nodes {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let source = (state >> 33) as u32 % num_nodes;
            let target = (state >> 13) as u32 % num_nodes;
            if source != target {
                edges.push(InputEdge {
                    source,
                    target,
                    weight: 1 + extra % 7,
                    duration: 1,
                    turn_id: num_nodes + extra,
                    forward: true,
                    backward: false,
                });
            }
        }
        let mut graph = ContractorGraph::from_edges(num_nodes as usize, edges);
        let mut levels = vec![0.0; num_nodes as usize];
        let output = contract_fully(&mut graph, &mut levels);
        // every node was contracted, so levels are all distinct
        let edges = hierarchy_edges(&graph, &output);
        for edge in edges.iter().filter(|edge| edge.data.shortcut) {
            let middle = edge.data.id as usize;
            assert!(
                levels[middle] < levels[edge.source as usize],
                "middle {} not below source {}",
                middle,
                edge.source
            );
            assert!(
                levels[middle] < levels[edge.target as usize],
                "middle {} not below target {}",
                middle,
                edge.target
            );
        }
    }

    #[test]
    fn test_contraction_is_deterministic() {
        let build = || {
            ContractorGraph::from_edges(
                6,
                vec![
                    directed(0, 1, 2),
                    directed(1, 2, 2),
                    directed(2, 3, 2),
                    directed(3, 4, 2),
                    directed(4, 5, 2),
                    directed(5, 0, 2),
                    directed(0, 3, 7),
                ],
            )
        };
        let run = || {
            let mut graph = build();
            let mut levels = vec![0.0; 6];
            let output = contract_fully(&mut graph, &mut levels);
            (hierarchy_edges(&graph, &output), levels)
        };
        assert_eq!(run(), run());
    }
}
