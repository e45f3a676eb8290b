//! Edge list loading with optional live weight patching.
//!
//! The contractor treats this as an opaque collaborator: it hands back the
//! edge-expanded edge list and the highest node id, and may rewrite edge
//! weights and node weights from a segment speed file before contraction
//! sees them.

use anyhow::{bail, ensure, Context, Result};
use std::fs;

use crate::config::UpdaterConfig;
use crate::contractor::edge::{EdgeWeight, InputEdge, NodeId};
use crate::formats::ebg;

pub struct Updater {
    config: UpdaterConfig,
}

impl Updater {
    pub fn new(config: UpdaterConfig) -> Self {
        Self { config }
    }

    /// Load the edge list, apply any configured weight patches, and return
    /// it together with the maximum node id.
    pub fn load_and_update(
        &self,
        node_weights: &mut [EdgeWeight],
    ) -> Result<(Vec<InputEdge>, NodeId)> {
        let mut edges = ebg::read(&self.config.ebg_path)?;
        ensure!(
            !edges.is_empty(),
            "Edge list {} is empty",
            self.config.ebg_path.display()
        );
        if let Some(path) = &self.config.segment_speeds {
            let patched = apply_segment_speeds(path, &mut edges, node_weights)?;
            println!("  ✓ Applied {} weight updates from {}", patched, path.display());
        }
        let max_node_id = edges
            .iter()
            .map(|edge| edge.source.max(edge.target))
            .max()
            .unwrap_or(0);
        Ok((edges, max_node_id))
    }
}

/// Plain-text patch file, one entry per line:
///
///   edge,<source>,<target>,<weight>,<duration>
///   node,<id>,<weight>
///
/// Blank lines and `#` comments are skipped.
fn apply_segment_speeds(
    path: &std::path::Path,
    edges: &mut [InputEdge],
    node_weights: &mut [EdgeWeight],
) -> Result<usize> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read segment speeds from {}", path.display()))?;
    let mut patched = 0usize;
    for (line_number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let context = || format!("Malformed entry at {}:{}", path.display(), line_number + 1);
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        match fields.as_slice() {
            ["edge", source, target, weight, duration] => {
                let source: NodeId = source.parse().with_context(context)?;
                let target: NodeId = target.parse().with_context(context)?;
                let weight: EdgeWeight = weight.parse().with_context(context)?;
                let duration: EdgeWeight = duration.parse().with_context(context)?;
                ensure!(weight > 0, "{}: zero weight", context());
                for edge in edges.iter_mut() {
                    if edge.source == source && edge.target == target {
                        edge.weight = weight;
                        edge.duration = duration;
                        patched += 1;
                    }
                }
            }
            ["node", id, weight] => {
                let id: usize = id.parse().with_context(context)?;
                let weight: EdgeWeight = weight.parse().with_context(context)?;
                ensure!(id < node_weights.len(), "{}: node id out of range", context());
                node_weights[id] = weight;
                patched += 1;
            }
            _ => bail!("{}: unknown entry kind", context()),
        }
    }
    Ok(patched)
}
