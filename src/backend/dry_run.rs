//! In-memory backend that records the network instead of building it.
//!
//! Used by `--dry-run` and by the tests. It enforces the same rules a
//! live backend would (unique node names, links between existing nodes)
//! and reports the recorded network from `start()`.

use super::{BackendError, EmulationBackend};
use crate::config::CoexistenceKind;
use crate::topology::{NodeRole, PropertyBag};
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

/// Node reference handed out by the dry-run backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunNode {
    pub name: String,
    pub role: NodeRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub role: NodeRole,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub lhs: String,
    pub rhs: String,
    /// True when one endpoint is the management node
    pub management: bool,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VsRecord {
    pub members: Vec<String>,
    pub properties: PropertyBag,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoexistenceRecord {
    pub kind: CoexistenceKind,
    pub id: u32,
}

/// Status document returned by `start()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub started_at: DateTime<Utc>,
    pub coexistence: Option<CoexistenceRecord>,
    pub nodes: Vec<NodeRecord>,
    pub links: Vec<LinkRecord>,
    pub vlls: Vec<LinkRecord>,
    pub pws: Vec<LinkRecord>,
    pub vss: Vec<VsRecord>,
}

#[derive(Debug, Default)]
pub struct DryRunBackend {
    nodes: Vec<NodeRecord>,
    coexistence: Option<CoexistenceRecord>,
    links: Vec<LinkRecord>,
    vlls: Vec<LinkRecord>,
    pws: Vec<LinkRecord>,
    vss: Vec<VsRecord>,
    started: bool,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name.as_str()).collect()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn add_node(&mut self, name: &str, role: NodeRole, properties: &PropertyBag) -> Result<DryRunNode, BackendError> {
        if self.nodes.iter().any(|n| n.name == name) {
            return Err(BackendError::DuplicateNode(name.to_string()));
        }
        self.nodes.push(NodeRecord {
            name: name.to_string(),
            role,
            properties: properties.clone(),
        });
        Ok(DryRunNode {
            name: name.to_string(),
            role,
        })
    }

    fn ensure_known(&self, node: &DryRunNode) -> Result<(), BackendError> {
        if self.nodes.iter().any(|n| n.name == node.name) {
            Ok(())
        } else {
            Err(BackendError::UnknownNode(node.name.clone()))
        }
    }

    fn pair_record(&self, lhs: &DryRunNode, rhs: &DryRunNode, properties: &PropertyBag) -> Result<LinkRecord, BackendError> {
        self.ensure_known(lhs)?;
        self.ensure_known(rhs)?;
        if lhs.name == rhs.name {
            return Err(BackendError::Rejected(format!("link from {} to itself", lhs.name)));
        }
        Ok(LinkRecord {
            lhs: lhs.name.clone(),
            rhs: rhs.name.clone(),
            management: lhs.role == NodeRole::Management || rhs.role == NodeRole::Management,
            properties: properties.clone(),
        })
    }
}

impl EmulationBackend for DryRunBackend {
    type Node = DryRunNode;

    fn add_core_router(&mut self, name: &str, properties: &PropertyBag) -> Result<DryRunNode, BackendError> {
        self.add_node(name, NodeRole::CoreRouter, properties)
    }

    fn add_edge_router(&mut self, name: &str, properties: &PropertyBag) -> Result<DryRunNode, BackendError> {
        self.add_node(name, NodeRole::EdgeRouter, properties)
    }

    fn add_customer_edge_router(&mut self, name: &str, properties: &PropertyBag) -> Result<DryRunNode, BackendError> {
        self.add_node(name, NodeRole::CustomerEdgeRouter, properties)
    }

    fn add_controller(&mut self, name: &str, properties: &PropertyBag) -> Result<DryRunNode, BackendError> {
        self.add_node(name, NodeRole::Controller, properties)
    }

    fn add_management(&mut self, name: &str) -> Result<DryRunNode, BackendError> {
        self.add_node(name, NodeRole::Management, &PropertyBag::new())
    }

    fn add_coexistence_mechanism(&mut self, kind: CoexistenceKind, id: u32) -> Result<(), BackendError> {
        if let Some(existing) = &self.coexistence {
            return Err(BackendError::Rejected(format!(
                "coexistence mechanism {} (id {}) is already installed",
                existing.kind, existing.id
            )));
        }
        self.coexistence = Some(CoexistenceRecord { kind, id });
        Ok(())
    }

    fn add_link(&mut self, lhs: &DryRunNode, rhs: &DryRunNode, properties: &PropertyBag) -> Result<(), BackendError> {
        let record = self.pair_record(lhs, rhs, properties)?;
        self.links.push(record);
        Ok(())
    }

    fn add_vll(&mut self, lhs: &DryRunNode, rhs: &DryRunNode, properties: &PropertyBag) -> Result<(), BackendError> {
        let record = self.pair_record(lhs, rhs, properties)?;
        self.vlls.push(record);
        Ok(())
    }

    fn add_pw(&mut self, lhs: &DryRunNode, rhs: &DryRunNode, properties: &PropertyBag) -> Result<(), BackendError> {
        let record = self.pair_record(lhs, rhs, properties)?;
        self.pws.push(record);
        Ok(())
    }

    fn add_vs(&mut self, members: &[DryRunNode], properties: &PropertyBag) -> Result<(), BackendError> {
        for member in members {
            self.ensure_known(member)?;
        }
        self.vss.push(VsRecord {
            members: members.iter().map(|m| m.name.clone()).collect(),
            properties: properties.clone(),
        });
        Ok(())
    }

    fn node_by_name(&self, name: &str) -> Option<DryRunNode> {
        self.nodes.iter().find(|n| n.name == name).map(|n| DryRunNode {
            name: n.name.clone(),
            role: n.role,
        })
    }

    fn start(&mut self) -> Result<serde_json::Value, BackendError> {
        if self.started {
            return Err(BackendError::AlreadyStarted);
        }
        self.started = true;
        info!(
            "Dry-run network started: {} nodes, {} links, {} VLLs, {} PWs, {} VSs",
            self.nodes.len(),
            self.links.len(),
            self.vlls.len(),
            self.pws.len(),
            self.vss.len()
        );

        let status = DeploymentStatus {
            started_at: Utc::now(),
            coexistence: self.coexistence,
            nodes: self.nodes.clone(),
            links: self.links.clone(),
            vlls: self.vlls.clone(),
            pws: self.pws.clone(),
            vss: self.vss.clone(),
        };
        serde_json::to_value(&status).map_err(|e| BackendError::Rejected(format!("cannot describe network: {}", e)))
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        info!("Stopping dry-run network ({} nodes)", self.nodes.len());
        *self = Self::default();
        Ok(())
    }
}
