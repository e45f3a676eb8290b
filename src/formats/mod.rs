///! Binary artifact formats

pub mod core;
pub mod crc;
pub mod ebg;
pub mod ebg_nodes;
pub mod enw;
pub mod frame;
pub mod hsgr;
pub mod levels;
pub mod properties;

pub use hsgr::QueryGraph;
pub use properties::ProfileProperties;
