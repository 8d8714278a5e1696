//! Topology model module.
//!
//! This module holds the in-memory topology model, the topology file parser
//! and the structural validation run before plan compilation.

pub mod types;
pub mod parser;
pub mod validation;

// Re-export key types and functions for easier access
pub use types::{
    EntityCategory, LinkPair, NodeRole, NodeSpec, OverlayLink, PointToPointSubnet, PropertyBag, Topology,
    VirtualSwitch,
};
pub use parser::{load_topology, parse_topology, FormatVersion, TopologyParseError};
pub use validation::{validate_topology, ValidationError};
