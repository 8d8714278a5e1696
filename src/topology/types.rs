//! Topology model type definitions.
//!
//! The model mirrors what the topology file declares: four router/controller
//! categories, each node paired with its property bag, point-to-point
//! subnets, VLL/PW overlay links and virtual switches.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque per-entity property record, as found in (or written back to) the
/// topology file.
pub type PropertyBag = Map<String, Value>;

/// Role of a node in the emulated network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    CoreRouter,
    EdgeRouter,
    CustomerEdgeRouter,
    Controller,
    Management,
}

impl NodeRole {
    /// Whether nodes of this role get a loopback address
    pub fn needs_loopback(self) -> bool {
        matches!(self, NodeRole::CoreRouter | NodeRole::EdgeRouter)
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeRole::CoreRouter => "core router",
            NodeRole::EdgeRouter => "edge router",
            NodeRole::CustomerEdgeRouter => "customer edge router",
            NodeRole::Controller => "controller",
            NodeRole::Management => "management node",
        };
        f.write_str(name)
    }
}

/// Category of any entity that can be named in an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    Node(NodeRole),
    Subnet,
    Vll,
    Pw,
    Vs,
    ManagementLink,
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityCategory::Node(role) => write!(f, "{}", role),
            EntityCategory::Subnet => f.write_str("point-to-point subnet"),
            EntityCategory::Vll => f.write_str("VLL"),
            EntityCategory::Pw => f.write_str("PW"),
            EntityCategory::Vs => f.write_str("VS"),
            EntityCategory::ManagementLink => f.write_str("management link"),
        }
    }
}

/// A declared node and its property bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: String,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl NodeSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: PropertyBag::new(),
        }
    }
}

/// Endpoints of one physical link, serialized as `[a, b]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPair(pub String, pub String);

impl LinkPair {
    pub fn new(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        LinkPair(lhs.into(), rhs.into())
    }
}

impl fmt::Display for LinkPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.0, self.1)
    }
}

/// A point-to-point subnet.
///
/// `properties` runs parallel to `links`: entry `i` holds the link
/// properties of pair `i`. Subnets behind a legacy switch may list several
/// pairs, but only the first one is ever materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointToPointSubnet {
    pub nodes: Vec<String>,
    pub links: Vec<LinkPair>,
    #[serde(default)]
    pub properties: Vec<PropertyBag>,
}

/// A VLL or PW entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayLink {
    pub endpoints: Vec<String>,
    #[serde(default)]
    pub properties: PropertyBag,
}

impl OverlayLink {
    pub fn new(lhs: impl Into<String>, rhs: impl Into<String>) -> Self {
        Self {
            endpoints: vec![lhs.into(), rhs.into()],
            properties: PropertyBag::new(),
        }
    }

    /// The two endpoints, if the entry is well formed
    pub fn pair(&self) -> Option<(&str, &str)> {
        match self.endpoints.as_slice() {
            [lhs, rhs] => Some((lhs.as_str(), rhs.as_str())),
            _ => None,
        }
    }
}

/// A virtual switch: a member group sharing one property bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualSwitch {
    pub members: Vec<String>,
    #[serde(default)]
    pub properties: PropertyBag,
}

fn with_role(role: NodeRole, nodes: &[NodeSpec]) -> impl Iterator<Item = (NodeRole, &NodeSpec)> + '_ {
    nodes.iter().map(move |node| (role, node))
}

/// The parsed topology
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Topology {
    /// Properties were produced ahead of time and must be used as-is
    pub autogenerated: bool,
    pub core_routers: Vec<NodeSpec>,
    pub edge_routers: Vec<NodeSpec>,
    pub customer_edge_routers: Vec<NodeSpec>,
    pub controllers: Vec<NodeSpec>,
    pub subnets: Vec<PointToPointSubnet>,
    pub vlls: Vec<OverlayLink>,
    pub pws: Vec<OverlayLink>,
    pub vss: Vec<VirtualSwitch>,
}

impl Topology {
    /// Every declared node with its role, in category order
    /// (core routers, edge routers, customer edge routers, controllers).
    pub fn all_nodes(&self) -> impl Iterator<Item = (NodeRole, &NodeSpec)> {
        with_role(NodeRole::CoreRouter, &self.core_routers)
            .chain(with_role(NodeRole::EdgeRouter, &self.edge_routers))
            .chain(with_role(NodeRole::CustomerEdgeRouter, &self.customer_edge_routers))
            .chain(with_role(NodeRole::Controller, &self.controllers))
    }

    pub fn node_count(&self) -> usize {
        self.core_routers.len()
            + self.edge_routers.len()
            + self.customer_edge_routers.len()
            + self.controllers.len()
    }

    /// Look up a declared node by identifier
    pub fn find_node(&self, id: &str) -> Option<(NodeRole, &NodeSpec)> {
        self.all_nodes().find(|(_, node)| node.id == id)
    }
}
