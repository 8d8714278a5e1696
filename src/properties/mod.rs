//! Property resolution module.
//!
//! Topologies that were not exported with pre-computed properties get their
//! loopbacks, link addressing, overlay addressing and service identifiers
//! generated here, deterministically from each entity's position in the
//! topology file. Generated values are written back into the entities'
//! property bags so every later consumer sees the same copy.

pub mod generator;
pub mod resolver;

pub use generator::{LinkProperties, OverlayProperties, PropertiesGenerator, VertexProperties, VsProperties};
pub use resolver::{PropertyResolver, ResolvedTopology};

use crate::ip::PoolExhausted;
use crate::topology::EntityCategory;

/// Property bag keys written by the resolver
pub mod keys {
    pub const LOOPBACK: &str = "loopback";
    pub const IP_LHS: &str = "ip_lhs";
    pub const IP_RHS: &str = "ip_rhs";
    pub const NET: &str = "net";
    pub const SERVICE_ID: &str = "service_id";
    pub const ENDPOINTS: &str = "endpoints";
}

/// Errors raised while resolving properties
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("Cannot resolve properties of {category} {entity}: {source}")]
    Exhausted {
        entity: String,
        category: EntityCategory,
        #[source]
        source: PoolExhausted,
    },

    #[error("{category} {entity} annotates {key} = {value}, which is already used by {owner}")]
    ConflictingAnnotation {
        entity: String,
        category: EntityCategory,
        key: &'static str,
        value: String,
        owner: String,
    },

    #[error("{category} {entity} has a malformed {key} annotation: {value}")]
    MalformedAnnotation {
        entity: String,
        category: EntityCategory,
        key: &'static str,
        value: String,
    },

    #[error("{category} {entity} is partially annotated, {key} is missing")]
    IncompleteAnnotation {
        entity: String,
        category: EntityCategory,
        key: &'static str,
    },

    #[error("{category} {entity} annotates {key} = {value}, outside its net {net}")]
    OutsideNet {
        entity: String,
        category: EntityCategory,
        key: &'static str,
        value: String,
        net: String,
    },

    #[error("{category} {entity} has no property bag in an autogenerated topology")]
    MissingAnnotation { entity: String, category: EntityCategory },
}
