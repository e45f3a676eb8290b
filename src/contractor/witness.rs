//! Bounded witness search.
//!
//! Decides whether a candidate shortcut is necessary: a forward Dijkstra
//! from the shortcut's source that must avoid the node being contracted.
//! The search is pruned by a weight ceiling and a hop cap and stops as
//! soon as every target of interest has been settled. A path that slips
//! past the hop cap only costs a superfluous shortcut; a reported witness
//! is always a real path.
//!
//! All state is generation-stamped so one instance can serve thousands of
//! searches without reallocation. Workers keep their own instance.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::contractor::edge::{EdgeWeight, NodeId, INVALID_WEIGHT};
use crate::contractor::graph::ContractionGraph;

/// Hop cap for priority evaluation and the first contraction check.
pub const CHEAP_HOP_LIMIT: u32 = 5;
/// Hop cap for the deeper re-check before a shortcut is committed.
pub const FULL_HOP_LIMIT: u32 = 16;

pub struct WitnessSearch {
    dist: Vec<EdgeWeight>,
    hops: Vec<u32>,
    stamp: Vec<u32>,
    target_stamp: Vec<u32>,
    generation: u32,
    heap: BinaryHeap<Reverse<(EdgeWeight, NodeId)>>,
}

impl WitnessSearch {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            dist: vec![0; num_nodes],
            hops: vec![0; num_nodes],
            stamp: vec![0; num_nodes],
            target_stamp: vec![0; num_nodes],
            generation: 0,
            heap: BinaryHeap::new(),
        }
    }

    /// Forward Dijkstra from `source` that never enters `forbidden`,
    /// pruned at `limit` and `max_hops`. Halts once all `targets` are
    /// settled, the queue runs dry, or the minimum label exceeds the
    /// ceiling.
    pub fn run<G: ContractionGraph>(
        &mut self,
        graph: &G,
        source: NodeId,
        forbidden: NodeId,
        limit: EdgeWeight,
        max_hops: u32,
        targets: &[NodeId],
    ) {
        self.generation += 1;
        let generation = self.generation;
        self.heap.clear();

        let mut unsettled_targets = 0usize;
        for &target in targets {
            if self.target_stamp[target as usize] != generation {
                self.target_stamp[target as usize] = generation;
                unsettled_targets += 1;
            }
        }

        self.dist[source as usize] = 0;
        self.hops[source as usize] = 0;
        self.stamp[source as usize] = generation;
        self.heap.push(Reverse((0, source)));

        while let Some(Reverse((weight, node))) = self.heap.pop() {
            if weight > limit {
                break;
            }
            if weight > self.dist[node as usize] {
                continue; // stale label
            }
            if self.target_stamp[node as usize] == generation {
                self.target_stamp[node as usize] = 0;
                unsettled_targets -= 1;
                if unsettled_targets == 0 {
                    break;
                }
            }
            if self.hops[node as usize] >= max_hops {
                continue;
            }
            for edge in graph.edges(node) {
                if !edge.data.forward || edge.target == forbidden {
                    continue;
                }
                let target = edge.target as usize;
                let next = weight.saturating_add(edge.data.weight);
                if next > limit {
                    continue;
                }
                if self.stamp[target] != generation || next < self.dist[target] {
                    self.stamp[target] = generation;
                    self.dist[target] = next;
                    self.hops[target] = self.hops[node as usize] + 1;
                    self.heap.push(Reverse((next, edge.target)));
                }
            }
        }
    }

    /// Distance label from the last `run`, or `INVALID_WEIGHT` when the
    /// node was not reached within the bounds.
    pub fn distance(&self, node: NodeId) -> EdgeWeight {
        if self.stamp[node as usize] == self.generation {
            self.dist[node as usize]
        } else {
            INVALID_WEIGHT
        }
    }
}
