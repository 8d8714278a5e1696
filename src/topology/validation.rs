//! Topology validation.
//!
//! Checks a parsed topology for structural problems before any build
//! operation is emitted: malformed or duplicate identifiers, references to
//! undeclared nodes, and subnets/overlays with too few endpoints.

use super::types::{EntityCategory, NodeRole, OverlayLink, Topology};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Topology validation errors. Every variant names the offending entity.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{category} {entity} references unknown node {id}")]
    UnknownNode {
        id: String,
        entity: String,
        category: EntityCategory,
    },

    #[error("Node {id} is not registered (lookup before its category was created)")]
    UnregisteredNode { id: String },

    #[error("Node {id} is declared more than once (as {first} and as {second})")]
    DuplicateNode {
        id: String,
        first: NodeRole,
        second: NodeRole,
    },

    #[error("Invalid identifier {id:?} for {category}")]
    InvalidIdentifier { id: String, category: EntityCategory },

    #[error("{category} {entity} needs at least {expected} endpoints, found {found}")]
    MissingEndpoints {
        entity: String,
        category: EntityCategory,
        expected: usize,
        found: usize,
    },

    #[error("{category} {entity} connects node {id} to itself")]
    SelfLoop {
        id: String,
        entity: String,
        category: EntityCategory,
    },

    #[error("{category} {entity} lists member {id} more than once")]
    DuplicateMember {
        id: String,
        entity: String,
        category: EntityCategory,
    },

    #[error("Link {pair} of subnet {entity} uses node {id} which is not part of the subnet")]
    ForeignLinkEndpoint {
        id: String,
        pair: String,
        entity: String,
    },

    #[error("Single-connection management needs a core router, but the topology has none")]
    NoManagementGateway,

    #[error("Management gateway {id} is not a core router")]
    InvalidManagementGateway { id: String },
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("identifier pattern is valid"))
}

/// Check whether a string is usable as a node identifier
pub fn is_valid_identifier(id: &str) -> bool {
    identifier_pattern().is_match(id)
}

/// Human-readable label for the n-th entry of a collection, e.g. `vll#2`
pub fn entity_label(category: EntityCategory, index: usize) -> String {
    let prefix = match category {
        EntityCategory::Node(_) => "node",
        EntityCategory::Subnet => "subnet",
        EntityCategory::Vll => "vll",
        EntityCategory::Pw => "pw",
        EntityCategory::Vs => "vs",
        EntityCategory::ManagementLink => "mgmt",
    };
    format!("{}#{}", prefix, index)
}

/// Validate a whole topology
///
/// # Returns
/// * `Ok(())` if every identifier is well formed and unique, and every
///   subnet, overlay and virtual switch references declared nodes only
/// * `Err(ValidationError)` describing the first problem found
pub fn validate_topology(topology: &Topology) -> Result<(), ValidationError> {
    let mut declared: HashMap<&str, NodeRole> = HashMap::new();
    for (role, node) in topology.all_nodes() {
        if !is_valid_identifier(&node.id) {
            return Err(ValidationError::InvalidIdentifier {
                id: node.id.clone(),
                category: EntityCategory::Node(role),
            });
        }
        if let Some(first) = declared.insert(node.id.as_str(), role) {
            return Err(ValidationError::DuplicateNode {
                id: node.id.clone(),
                first,
                second: role,
            });
        }
    }

    let check_known = |id: &str, entity: &str, category: EntityCategory| {
        if declared.contains_key(id) {
            Ok(())
        } else {
            Err(ValidationError::UnknownNode {
                id: id.to_string(),
                entity: entity.to_string(),
                category,
            })
        }
    };

    for (i, subnet) in topology.subnets.iter().enumerate() {
        let entity = entity_label(EntityCategory::Subnet, i);
        if subnet.links.is_empty() {
            return Err(ValidationError::MissingEndpoints {
                entity,
                category: EntityCategory::Subnet,
                expected: 2,
                found: 0,
            });
        }
        for node in &subnet.nodes {
            check_known(node.as_str(), &entity, EntityCategory::Subnet)?;
        }
        let members: HashSet<&str> = subnet.nodes.iter().map(String::as_str).collect();
        for pair in &subnet.links {
            for id in [&pair.0, &pair.1] {
                check_known(id.as_str(), &entity, EntityCategory::Subnet)?;
                if !members.is_empty() && !members.contains(id.as_str()) {
                    return Err(ValidationError::ForeignLinkEndpoint {
                        id: id.clone(),
                        pair: pair.to_string(),
                        entity,
                    });
                }
            }
            if pair.0 == pair.1 {
                return Err(ValidationError::SelfLoop {
                    id: pair.0.clone(),
                    entity,
                    category: EntityCategory::Subnet,
                });
            }
        }
    }

    for (category, overlays) in [
        (EntityCategory::Vll, &topology.vlls),
        (EntityCategory::Pw, &topology.pws),
    ] {
        for (i, overlay) in overlays.iter().enumerate() {
            validate_overlay(overlay, &entity_label(category, i), category, &check_known)?;
        }
    }

    for (i, vs) in topology.vss.iter().enumerate() {
        let entity = entity_label(EntityCategory::Vs, i);
        if vs.members.len() < 2 {
            return Err(ValidationError::MissingEndpoints {
                entity,
                category: EntityCategory::Vs,
                expected: 2,
                found: vs.members.len(),
            });
        }
        let mut seen = HashSet::new();
        for member in &vs.members {
            check_known(member.as_str(), &entity, EntityCategory::Vs)?;
            if !seen.insert(member.as_str()) {
                return Err(ValidationError::DuplicateMember {
                    id: member.clone(),
                    entity,
                    category: EntityCategory::Vs,
                });
            }
        }
    }

    Ok(())
}

fn validate_overlay<F>(
    overlay: &OverlayLink,
    entity: &str,
    category: EntityCategory,
    check_known: &F,
) -> Result<(), ValidationError>
where
    F: Fn(&str, &str, EntityCategory) -> Result<(), ValidationError>,
{
    let (lhs, rhs) = overlay.pair().ok_or_else(|| ValidationError::MissingEndpoints {
        entity: entity.to_string(),
        category,
        expected: 2,
        found: overlay.endpoints.len(),
    })?;
    check_known(lhs, entity, category)?;
    check_known(rhs, entity, category)?;
    if lhs == rhs {
        return Err(ValidationError::SelfLoop {
            id: lhs.to_string(),
            entity: entity.to_string(),
            category,
        });
    }
    Ok(())
}
