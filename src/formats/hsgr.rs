///! .hsgr format - the query-ready hierarchy graph
///!
///! Header count = node count. Body:
///!   checksum:  u32  // CRC-32 over the packed merged edge sequence
///!   n_edges:   u32
///!   n_filters: u32
///!   offsets:   (count + 1) x u32   // per-node first outgoing edge
///!   edges:     n_edges x 17 bytes  // target, id, weight, duration, flags
///!   filters:   n_filters packed bitsets of n_edges bits
///!
///! Edge flags: bit0 shortcut, bit1 forward, bit2 backward.

use anyhow::{ensure, Result};
use std::path::Path;

use super::frame::{FrameReader, FrameWriter};
use crate::contractor::edge::{NodeId, QueryEdge, QueryEdgeData};

const MAGIC: u32 = 0x48534752; // "HSGR"
const EDGE_RECORD_SIZE: usize = 17;

/// Compressed-sparse-row form of the merged hierarchy.
#[derive(Debug, Clone)]
pub struct QueryGraph {
    pub checksum: u32,
    pub num_nodes: u32,
    pub offsets: Vec<u32>,
    pub edges: Vec<QueryEdge>,
    pub filters: Vec<Vec<bool>>,
}

impl QueryGraph {
    /// Build the CSR index over an edge sequence sorted by source node.
    pub fn from_merged(
        num_nodes: u32,
        checksum: u32,
        edges: Vec<QueryEdge>,
        filters: Vec<Vec<bool>>,
    ) -> Self {
        debug_assert!(edges.windows(2).all(|w| w[0].source <= w[1].source));
        let mut offsets = vec![0u32; num_nodes as usize + 1];
        for edge in &edges {
            offsets[edge.source as usize + 1] += 1;
        }
        for node in 0..num_nodes as usize {
            offsets[node + 1] += offsets[node];
        }
        Self {
            checksum,
            num_nodes,
            offsets,
            edges,
            filters,
        }
    }
}

pub fn write<P: AsRef<Path>>(path: P, graph: &QueryGraph) -> Result<()> {
    let mut writer = FrameWriter::create(path, MAGIC, graph.num_nodes)?;
    writer.write(&graph.checksum.to_le_bytes())?;
    writer.write(&(graph.edges.len() as u32).to_le_bytes())?;
    writer.write(&(graph.filters.len() as u32).to_le_bytes())?;
    for &offset in &graph.offsets {
        writer.write(&offset.to_le_bytes())?;
    }
    let mut record = [0u8; EDGE_RECORD_SIZE];
    for edge in &graph.edges {
        record[0..4].copy_from_slice(&edge.target.to_le_bytes());
        record[4..8].copy_from_slice(&edge.data.id.to_le_bytes());
        record[8..12].copy_from_slice(&edge.data.weight.to_le_bytes());
        record[12..16].copy_from_slice(&edge.data.duration.to_le_bytes());
        record[16] = edge.data.pack_flags();
        writer.write(&record)?;
    }
    let bitset_len = graph.edges.len().div_ceil(8);
    for filter in &graph.filters {
        let mut bits = vec![0u8; bitset_len];
        for (index, &admitted) in filter.iter().enumerate() {
            if admitted {
                bits[index / 8] |= 1 << (index % 8);
            }
        }
        writer.write(&bits)?;
    }
    writer.finish()
}

pub fn read<P: AsRef<Path>>(path: P) -> Result<QueryGraph> {
    let mut reader = FrameReader::open(path, MAGIC)?;
    let num_nodes = reader.count();

    let mut word = [0u8; 4];
    reader.read(&mut word)?;
    let checksum = u32::from_le_bytes(word);
    reader.read(&mut word)?;
    let n_edges = u32::from_le_bytes(word) as usize;
    reader.read(&mut word)?;
    let n_filters = u32::from_le_bytes(word) as usize;

    let mut offsets = Vec::with_capacity(num_nodes as usize + 1);
    for _ in 0..=num_nodes {
        reader.read(&mut word)?;
        offsets.push(u32::from_le_bytes(word));
    }
    ensure!(
        offsets.last().copied() == Some(n_edges as u32),
        "Offset table does not cover the edge array in {}",
        reader.path().display()
    );

    let mut edges = Vec::with_capacity(n_edges);
    let mut record = [0u8; EDGE_RECORD_SIZE];
    let mut source: NodeId = 0;
    for index in 0..n_edges {
        while source < num_nodes && offsets[source as usize + 1] as usize <= index {
            source += 1;
        }
        reader.read(&mut record)?;
        let (shortcut, forward, backward) = QueryEdgeData::unpack_flags(record[16]);
        edges.push(QueryEdge {
            source,
            target: u32::from_le_bytes(record[0..4].try_into().unwrap()),
            data: QueryEdgeData {
                shortcut,
                id: u32::from_le_bytes(record[4..8].try_into().unwrap()),
                weight: u32::from_le_bytes(record[8..12].try_into().unwrap()),
                duration: u32::from_le_bytes(record[12..16].try_into().unwrap()),
                forward,
                backward,
            },
        });
    }

    let bitset_len = n_edges.div_ceil(8);
    let mut filters = Vec::with_capacity(n_filters);
    for _ in 0..n_filters {
        let mut bits = vec![0u8; bitset_len];
        reader.read(&mut bits)?;
        filters.push((0..n_edges).map(|e| bits[e / 8] & (1 << (e % 8)) != 0).collect());
    }

    reader.finish()?;
    Ok(QueryGraph {
        checksum,
        num_nodes,
        offsets,
        edges,
        filters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn edge(source: NodeId, target: NodeId, weight: u32, shortcut: bool) -> QueryEdge {
        QueryEdge {
            source,
            target,
            data: QueryEdgeData {
                shortcut,
                id: if shortcut { 1 } else { 17 },
                weight,
                duration: weight * 2,
                forward: true,
                backward: shortcut,
            },
        }
    }

    #[test]
    fn test_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.hsgr");
        let edges = vec![edge(0, 1, 4, false), edge(0, 2, 6, true), edge(2, 1, 2, false)];
        let filters = vec![vec![true, true, false], vec![false, true, true]];
        let graph = QueryGraph::from_merged(3, 0xABCD1234, edges.clone(), filters.clone());
        write(&path, &graph)?;

        let loaded = read(&path)?;
        assert_eq!(loaded.checksum, 0xABCD1234);
        assert_eq!(loaded.num_nodes, 3);
        assert_eq!(loaded.offsets, vec![0, 2, 2, 3]);
        assert_eq!(loaded.edges, edges);
        assert_eq!(loaded.filters, filters);
        Ok(())
    }

    #[test]
    fn test_empty_graph() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("test.hsgr");
        let graph = QueryGraph::from_merged(2, 0, Vec::new(), Vec::new());
        write(&path, &graph)?;
        let loaded = read(&path)?;
        assert!(loaded.edges.is_empty());
        assert_eq!(loaded.offsets, vec![0, 0, 0]);
        Ok(())
    }
}
