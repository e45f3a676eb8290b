//! Driver: load artifacts, contract, merge, checksum, write.

use anyhow::{ensure, Context, Result};
use std::time::Instant;

use crate::config::ContractorConfig;
use crate::contractor::container::{ContractedEdgeContainer, MAX_MERGED_LISTS};
use crate::contractor::contract::contract_graph;
use crate::contractor::edge::{EdgeWeight, QueryEdge};
use crate::contractor::graph::{collect_active_edges, ContractionGraph, ContractorGraph};
use crate::exclude;
use crate::formats::hsgr::QueryGraph;
use crate::formats::{core as core_marker, crc, ebg_nodes, enw, hsgr, levels as level_file, properties};
use crate::updater::Updater;

/// The shared base pass stops short of the configured factor so the
/// shared core does not become overly dense; the per-filter passes then
/// re-contract at the configured factor.
const BASE_CORE_FACTOR: f64 = 0.9;

#[derive(Debug)]
pub struct ContractionSummary {
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_filters: usize,
    pub checksum: u32,
}

pub fn run(config: &ContractorConfig) -> Result<ContractionSummary> {
    config.validate()?;
    let total_timer = Instant::now();

    println!("Reading node weights...");
    let mut node_weights = enw::read(config.path(".enw"))?;
    println!("  ✓ {} node weights", node_weights.len());

    println!("Loading edge-expanded graph...");
    let updater = Updater::new(config.updater.clone());
    let (edge_list, max_edge_id) = updater.load_and_update(&mut node_weights)?;
    let num_nodes = max_edge_id as usize + 1;
    println!("  ✓ {} edges over {} nodes", edge_list.len(), num_nodes);
    ensure!(
        node_weights.len() == num_nodes,
        "Node weight count {} does not match node count {}",
        node_weights.len(),
        num_nodes
    );

    let level_path = config.path(".level");
    let cached_order = config.use_cached_priority && level_path.exists();
    let mut levels: Vec<f32> = if cached_order {
        println!("Using cached node ordering from {}", level_path.display());
        let cached = level_file::read(&level_path)?;
        ensure!(
            cached.len() == num_nodes,
            "Cached level count {} does not match node count {} in {}",
            cached.len(),
            num_nodes,
            level_path.display()
        );
        cached
    } else {
        vec![0.0; num_nodes]
    };

    let filters = {
        let class_data = ebg_nodes::read(config.path(".ebg_nodes"))?;
        ensure!(
            class_data.len() == num_nodes,
            "Class data count {} does not match node count {}",
            class_data.len(),
            num_nodes
        );
        let profile = properties::read(config.path(".properties"))?;
        exclude::node_filters(num_nodes, &class_data, &profile.excludable_classes)
    };
    ensure!(
        filters.len() < MAX_MERGED_LISTS,
        "{} exclusion filters exceed the merge flag width (max {})",
        filters.len(),
        MAX_MERGED_LISTS - 1
    );
    println!("  ✓ {} exclusion filters", filters.len());

    let contraction_timer = Instant::now();
    let mut graph = ContractorGraph::from_edges(num_nodes, edge_list);
    println!(
        "Contracting with {} worker threads...",
        config.threads()
    );
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads())
        .build()
        .context("Failed to build worker thread pool")?;
    let (container, is_core) = pool.install(|| {
        contract_all(
            &mut graph,
            &filters,
            &mut levels,
            cached_order,
            &node_weights,
            config.core_factor,
        )
    })?;
    println!(
        "  ✓ Contraction took {:.1} s",
        contraction_timer.elapsed().as_secs_f64()
    );
    println!("Contracted graph has {} edges.", container.edges.len());

    let checksum = edge_checksum(&container.edges);
    let num_edges = container.edges.len();
    let num_filters = container.num_merged_lists();
    let edge_filters = container.make_edge_filters();
    let query_graph =
        QueryGraph::from_merged(num_nodes as u32, checksum, container.edges, edge_filters);

    hsgr::write(config.path(".hsgr"), &query_graph)?;
    core_marker::write(config.path(".core"), &is_core)?;
    if !cached_order {
        level_file::write(&level_path, &levels)?;
    }
    println!(
        "Preprocessing took {:.1} s (checksum 0x{:08X})",
        total_timer.elapsed().as_secs_f64(),
        checksum
    );

    Ok(ContractionSummary {
        num_nodes,
        num_edges,
        num_filters,
        checksum,
    })
}

/// The full contraction schedule: a base pass over the always-allowed
/// nodes builds the shared core, then every exclusion filter re-contracts
/// its admissible part of that core. With no filters a single pass over
/// the whole graph suffices and yields one flag column.
fn contract_all(
    graph: &mut ContractorGraph,
    filters: &[Vec<bool>],
    levels: &mut [f32],
    cached_order: bool,
    node_weights: &[EdgeWeight],
    core_factor: f64,
) -> Result<(ContractedEdgeContainer, Vec<bool>)> {
    let num_nodes = graph.num_nodes();
    let mut container = ContractedEdgeContainer::new();
    let mut core = vec![false; num_nodes];
    let mut ever_contracted = vec![false; num_nodes];
    let next_level;

    if filters.is_empty() {
        println!("Contracting full graph (no exclusion classes)...");
        let admissible = vec![true; num_nodes];
        let pass = contract_graph(
            graph,
            &admissible,
            levels,
            cached_order,
            node_weights,
            core_factor,
            0.0,
        )?;
        next_level = pass.next_level;
        let mut edges = pass.retired_edges;
        edges.extend(collect_active_edges(graph));
        sort_for_merge(&mut edges);
        container.merge(edges);
        for node in 0..num_nodes {
            if pass.is_core[node] {
                core[node] = true;
            } else {
                ever_contracted[node] = true;
            }
        }
    } else {
        let mut always_allowed = vec![true; num_nodes];
        for filter in filters {
            for node in 0..num_nodes {
                always_allowed[node] = always_allowed[node] && filter[node];
            }
        }

        println!("Base contraction pass (shared core)...");
        let base = contract_graph(
            graph,
            &always_allowed,
            levels,
            cached_order,
            node_weights,
            core_factor.min(BASE_CORE_FACTOR),
            0.0,
        )?;
        let is_shared_core = base.is_core;
        for node in 0..num_nodes {
            if !is_shared_core[node] {
                ever_contracted[node] = true;
            }
        }

        let mut non_core_edges = base.retired_edges;
        non_core_edges.retain(|edge| {
            !(is_shared_core[edge.source as usize] && is_shared_core[edge.target as usize])
        });
        sort_for_merge(&mut non_core_edges);
        container.merge(non_core_edges);

        let shared_core_graph = graph.filter(is_shared_core.clone());
        let mut level_cursor = base.next_level;
        for (index, filter) in filters.iter().enumerate() {
            println!("Contraction pass for exclusion filter {}...", index);
            let mut view = shared_core_graph.restrict(filter);
            let admissible: Vec<bool> = (0..num_nodes)
                .map(|node| is_shared_core[node] && filter[node])
                .collect();
            let pass = contract_graph(
                &mut view,
                &admissible,
                levels,
                cached_order,
                node_weights,
                core_factor,
                level_cursor,
            )?;
            level_cursor = pass.next_level;

            let mut edges = pass.retired_edges;
            edges.extend(collect_active_edges(&view));
            sort_for_merge(&mut edges);
            container.merge(edges);

            for node in 0..num_nodes {
                if admissible[node] && pass.is_core[node] {
                    core[node] = true;
                }
                if !pass.is_core[node] {
                    ever_contracted[node] = true;
                }
            }
        }
        next_level = level_cursor;

        // shared-core nodes no filter ever admits keep their edges
        for node in 0..num_nodes {
            if is_shared_core[node]
                && !ever_contracted[node]
                && !filters.iter().any(|filter| filter[node])
            {
                core[node] = true;
            }
        }
    }

    // the uncontracted remainder sits on top of every contracted node
    for node in 0..num_nodes {
        if !ever_contracted[node] {
            levels[node] = next_level;
        }
    }

    // a fully contracted hierarchy carries no core marker at all
    let core = if core_factor >= 1.0 { Vec::new() } else { core };
    Ok((container, core))
}

fn sort_for_merge(edges: &mut Vec<QueryEdge>) {
    edges.sort_unstable();
    edges.dedup();
}

/// CRC-32 over the packed merged edge sequence.
pub fn edge_checksum(edges: &[QueryEdge]) -> u32 {
    let mut digest = crc::Digest32::new();
    for edge in edges {
        digest.update(&edge.source.to_le_bytes());
        digest.update(&edge.target.to_le_bytes());
        digest.update(&edge.data.id.to_le_bytes());
        digest.update(&edge.data.weight.to_le_bytes());
        digest.update(&edge.data.duration.to_le_bytes());
        digest.update(&[edge.data.pack_flags()]);
    }
    digest.finalize()
}
