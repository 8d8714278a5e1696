//! Build operations and the ordered plan.

use crate::config::CoexistenceKind;
use crate::topology::{NodeRole, PropertyBag};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolved reference to a node registered in the reference index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub name: String,
    pub role: NodeRole,
    /// Registration order, starting at 0
    pub ordinal: usize,
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One self-contained step of a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum BuildOperation {
    CreateNode {
        node: NodeHandle,
        properties: PropertyBag,
    },
    CreateCoexistenceMechanism {
        kind: CoexistenceKind,
        id: u32,
    },
    CreateManagementLink {
        node: NodeHandle,
        management: NodeHandle,
        properties: PropertyBag,
    },
    CreateLink {
        lhs: NodeHandle,
        rhs: NodeHandle,
        properties: PropertyBag,
    },
    CreateVll {
        lhs: NodeHandle,
        rhs: NodeHandle,
        properties: PropertyBag,
    },
    CreatePw {
        lhs: NodeHandle,
        rhs: NodeHandle,
        properties: PropertyBag,
    },
    CreateVs {
        members: Vec<NodeHandle>,
        properties: PropertyBag,
    },
}

impl BuildOperation {
    /// Every node handle the operation refers to
    pub fn referenced_nodes(&self) -> Vec<&NodeHandle> {
        match self {
            BuildOperation::CreateNode { .. } | BuildOperation::CreateCoexistenceMechanism { .. } => Vec::new(),
            BuildOperation::CreateManagementLink { node, management, .. } => vec![node, management],
            BuildOperation::CreateLink { lhs, rhs, .. }
            | BuildOperation::CreateVll { lhs, rhs, .. }
            | BuildOperation::CreatePw { lhs, rhs, .. } => vec![lhs, rhs],
            BuildOperation::CreateVs { members, .. } => members.iter().collect(),
        }
    }
}

impl fmt::Display for BuildOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildOperation::CreateNode { node, .. } => write!(f, "create {} {}", node.role, node.name),
            BuildOperation::CreateCoexistenceMechanism { kind, id } => {
                write!(f, "create coexistence mechanism {} (id {})", kind, id)
            }
            BuildOperation::CreateManagementLink { node, management, .. } => {
                write!(f, "create management link {}-{}", node, management)
            }
            BuildOperation::CreateLink { lhs, rhs, .. } => write!(f, "create link {}-{}", lhs, rhs),
            BuildOperation::CreateVll { lhs, rhs, .. } => write!(f, "create VLL {}-{}", lhs, rhs),
            BuildOperation::CreatePw { lhs, rhs, .. } => write!(f, "create PW {}-{}", lhs, rhs),
            BuildOperation::CreateVs { members, .. } => {
                let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
                write!(f, "create VS [{}]", names.join(", "))
            }
        }
    }
}

/// Operation counts per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub nodes: usize,
    pub coexistence: usize,
    pub management_links: usize,
    pub links: usize,
    pub vlls: usize,
    pub pws: usize,
    pub vss: usize,
}

impl PlanSummary {
    pub fn total(&self) -> usize {
        self.nodes + self.coexistence + self.management_links + self.links + self.vlls + self.pws + self.vss
    }
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes, {} coexistence, {} management links, {} links, {} VLLs, {} PWs, {} VSs",
            self.nodes, self.coexistence, self.management_links, self.links, self.vlls, self.pws, self.vss
        )
    }
}

/// Ordered sequence of build operations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    pub operations: Vec<BuildOperation>,
}

impl BuildPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: BuildOperation) {
        log::debug!("Plan step {}: {}", self.operations.len(), operation);
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BuildOperation> {
        self.operations.iter()
    }

    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for operation in &self.operations {
            match operation {
                BuildOperation::CreateNode { .. } => summary.nodes += 1,
                BuildOperation::CreateCoexistenceMechanism { .. } => summary.coexistence += 1,
                BuildOperation::CreateManagementLink { .. } => summary.management_links += 1,
                BuildOperation::CreateLink { .. } => summary.links += 1,
                BuildOperation::CreateVll { .. } => summary.vlls += 1,
                BuildOperation::CreatePw { .. } => summary.pws += 1,
                BuildOperation::CreateVs { .. } => summary.vss += 1,
            }
        }
        summary
    }
}

impl<'a> IntoIterator for &'a BuildPlan {
    type Item = &'a BuildOperation;
    type IntoIter = std::slice::Iter<'a, BuildOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.operations.iter()
    }
}
