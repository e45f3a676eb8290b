//! hierarch: contraction hierarchy preprocessor for edge-expanded road
//! graphs.
//!
//! Pipeline:
//! - Load per-node weights and the edge-expanded edge list (optionally
//!   patched by the updater)
//! - Derive one node filter per excludable class from node class data
//! - Base contraction pass over the always-allowed nodes, producing the
//!   shared core
//! - Per-filter contraction of the shared core on filtered views
//! - Merge every pass into one flagged edge sequence
//! - Checksum and write the query graph, core marker, and levels
//!
//! Key principle: contraction only ever removes a node after proving, per
//! neighbor pair, that no witness path preserves the distance without it.

pub mod cli;
pub mod config;
pub mod contractor;
pub mod exclude;
pub mod formats;
pub mod updater;
pub mod validate;

pub use config::ContractorConfig;
pub use contractor::{ContractedEdgeContainer, ContractorGraph, QueryEdge};
