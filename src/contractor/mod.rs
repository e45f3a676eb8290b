//! The contraction core: graph, witness search, priority queue, the
//! contraction engine itself, the edge container, and the driver.

pub mod container;
pub mod contract;
pub mod edge;
pub mod graph;
pub mod queue;
pub mod run;
pub mod witness;

pub use container::ContractedEdgeContainer;
pub use contract::{contract_graph, PassOutput};
pub use edge::{InputEdge, NodeId, QueryEdge};
pub use graph::{ContractionGraph, ContractorGraph, FilteredGraph};
pub use run::ContractionSummary;
