//! Edge types shared by the contraction core.

pub type NodeId = u32;
pub type EdgeWeight = u32;

pub const INVALID_NODE: NodeId = u32::MAX;
pub const INVALID_WEIGHT: EdgeWeight = u32::MAX;

/// Directed edge of the edge-expanded input graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub weight: EdgeWeight,
    pub duration: EdgeWeight,
    pub turn_id: u32,
    pub forward: bool,
    pub backward: bool,
}

/// Edge payload while the graph is being contracted.
///
/// `id` is the opaque turn id for original edges and the middle node once
/// the edge is a shortcut. `originals` counts how many input edges the
/// entry stands for (1 for originals, summed for shortcuts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractorEdgeData {
    pub weight: EdgeWeight,
    pub duration: EdgeWeight,
    pub id: u32,
    pub originals: u32,
    pub shortcut: bool,
    pub forward: bool,
    pub backward: bool,
}

/// Adjacency entry: the source node is implied by the list the entry
/// lives in.
#[derive(Debug, Clone, Copy)]
pub struct ContractorEdge {
    pub target: NodeId,
    pub data: ContractorEdgeData,
}

/// Edge payload of the final query graph.
///
/// Field order matters: the derived ordering of [`QueryEdge`] is the merge
/// key `(source, target, shortcut, id, weight, duration, forward,
/// backward)` used by the edge container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryEdgeData {
    pub shortcut: bool,
    pub id: u32,
    pub weight: EdgeWeight,
    pub duration: EdgeWeight,
    pub forward: bool,
    pub backward: bool,
}

impl QueryEdgeData {
    pub fn pack_flags(&self) -> u8 {
        (self.shortcut as u8) | (self.forward as u8) << 1 | (self.backward as u8) << 2
    }

    pub fn unpack_flags(flags: u8) -> (bool, bool, bool) {
        (flags & 1 != 0, flags & 2 != 0, flags & 4 != 0)
    }
}

/// Edge of the final query graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct QueryEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub data: QueryEdgeData,
}

impl QueryEdge {
    pub fn new(source: NodeId, target: NodeId, data: ContractorEdgeData) -> Self {
        Self {
            source,
            target,
            data: QueryEdgeData {
                shortcut: data.shortcut,
                id: data.id,
                weight: data.weight,
                duration: data.duration,
                forward: data.forward,
                backward: data.backward,
            },
        }
    }
}
