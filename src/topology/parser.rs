//! Topology file parsing.
//!
//! Two on-disk formats are understood, selected by the declared format
//! version:
//!
//! - **Version 1** lists nodes per category and subnets/overlays explicitly,
//!   and deserializes straight into [`Topology`].
//! - **Version 2** is a graph export: typed vertices plus typed edges. Data
//!   edges become point-to-point subnets; every data edge touching the same
//!   legacy switch (`L2SW`) is folded into one multi-pair subnet.

use super::types::{LinkPair, NodeSpec, OverlayLink, PointToPointSubnet, PropertyBag, Topology, VirtualSwitch};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Topology file format version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatVersion {
    V1,
    V2,
}

impl TryFrom<u8> for FormatVersion {
    type Error = TopologyParseError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(FormatVersion::V1),
            2 => Ok(FormatVersion::V2),
            other => Err(TopologyParseError::UnsupportedVersion(other)),
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatVersion::V1 => f.write_str("1"),
            FormatVersion::V2 => f.write_str("2"),
        }
    }
}

/// Errors that can occur while reading a topology file
#[derive(Debug, thiserror::Error)]
pub enum TopologyParseError {
    #[error("Failed to read topology file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed topology JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported topology format version {0}")]
    UnsupportedVersion(u8),

    #[error("Edge {source_id} -> {target_id} connects two legacy switches")]
    SwitchToSwitch { source_id: String, target_id: String },

    #[error("Legacy switch {0} can only carry data edges")]
    SwitchOverlay(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum VertexType {
    #[serde(rename = "CR")]
    CoreRouter,
    #[serde(rename = "PE")]
    EdgeRouter,
    #[serde(rename = "CE")]
    CustomerEdgeRouter,
    #[serde(rename = "CTRL")]
    Controller,
    #[serde(rename = "L2SW")]
    LegacySwitch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum EdgeType {
    Data,
    #[serde(rename = "VLL")]
    Vll,
    #[serde(rename = "PW")]
    Pw,
}

#[derive(Debug, Deserialize)]
struct Vertex {
    id: String,
    #[serde(rename = "type")]
    vertex_type: VertexType,
    #[serde(default)]
    properties: PropertyBag,
}

#[derive(Debug, Deserialize)]
struct Edge {
    source: String,
    target: String,
    #[serde(rename = "type")]
    edge_type: EdgeType,
    #[serde(default)]
    properties: PropertyBag,
}

#[derive(Debug, Deserialize)]
struct GraphTopology {
    #[serde(default)]
    autogenerated: bool,
    #[serde(default)]
    vertices: Vec<Vertex>,
    #[serde(default)]
    edges: Vec<Edge>,
    #[serde(default)]
    vss: Vec<VirtualSwitch>,
}

/// Read and parse a topology file
pub fn load_topology(path: &Path, version: FormatVersion) -> Result<Topology, TopologyParseError> {
    log::info!("Loading topology from {:?} (format version {})", path, version);
    let content = fs::read_to_string(path).map_err(|source| TopologyParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_topology(&content, version)
}

/// Parse topology JSON according to the given format version
pub fn parse_topology(content: &str, version: FormatVersion) -> Result<Topology, TopologyParseError> {
    let topology = match version {
        FormatVersion::V1 => serde_json::from_str::<Topology>(content)?,
        FormatVersion::V2 => graph_to_topology(serde_json::from_str(content)?)?,
    };

    log::debug!(
        "Parsed topology: {} nodes, {} subnets, {} VLLs, {} PWs, {} VSs (autogenerated: {})",
        topology.node_count(),
        topology.subnets.len(),
        topology.vlls.len(),
        topology.pws.len(),
        topology.vss.len(),
        topology.autogenerated
    );
    Ok(topology)
}

fn graph_to_topology(graph: GraphTopology) -> Result<Topology, TopologyParseError> {
    let mut topology = Topology {
        autogenerated: graph.autogenerated,
        vss: graph.vss,
        ..Default::default()
    };

    let mut switches = HashSet::new();
    for vertex in graph.vertices {
        let node = NodeSpec {
            id: vertex.id,
            properties: vertex.properties,
        };
        match vertex.vertex_type {
            VertexType::CoreRouter => topology.core_routers.push(node),
            VertexType::EdgeRouter => topology.edge_routers.push(node),
            VertexType::CustomerEdgeRouter => topology.customer_edge_routers.push(node),
            VertexType::Controller => topology.controllers.push(node),
            VertexType::LegacySwitch => {
                switches.insert(node.id);
            }
        }
    }

    // switch id -> (subnet index, attached nodes with their edge properties)
    let mut switch_subnets: HashMap<String, (usize, Vec<(String, PropertyBag)>)> = HashMap::new();

    for edge in graph.edges {
        let source_is_switch = switches.contains(&edge.source);
        let target_is_switch = switches.contains(&edge.target);

        match edge.edge_type {
            EdgeType::Vll | EdgeType::Pw if source_is_switch || target_is_switch => {
                let switch = if source_is_switch { edge.source } else { edge.target };
                return Err(TopologyParseError::SwitchOverlay(switch));
            }
            EdgeType::Vll => topology.vlls.push(OverlayLink {
                endpoints: vec![edge.source, edge.target],
                properties: edge.properties,
            }),
            EdgeType::Pw => topology.pws.push(OverlayLink {
                endpoints: vec![edge.source, edge.target],
                properties: edge.properties,
            }),
            EdgeType::Data => match (source_is_switch, target_is_switch) {
                (true, true) => {
                    return Err(TopologyParseError::SwitchToSwitch {
                        source_id: edge.source,
                        target_id: edge.target,
                    });
                }
                (false, false) => topology.subnets.push(PointToPointSubnet {
                    nodes: vec![edge.source.clone(), edge.target.clone()],
                    links: vec![LinkPair(edge.source, edge.target)],
                    properties: vec![edge.properties],
                }),
                _ => {
                    let (switch, node) = if source_is_switch {
                        (edge.source, edge.target)
                    } else {
                        (edge.target, edge.source)
                    };
                    let next_index = topology.subnets.len();
                    let (_, attached) = switch_subnets.entry(switch).or_insert_with(|| {
                        // Reserve the slot so subnets keep their first-seen order
                        topology.subnets.push(PointToPointSubnet {
                            nodes: Vec::new(),
                            links: Vec::new(),
                            properties: Vec::new(),
                        });
                        (next_index, Vec::new())
                    });
                    attached.push((node, edge.properties));
                }
            },
        }
    }

    for (switch, (index, attached)) in switch_subnets {
        let subnet = &mut topology.subnets[index];
        subnet.nodes = attached.iter().map(|(node, _)| node.clone()).collect();
        for window in attached.windows(2) {
            subnet.links.push(LinkPair(window[0].0.clone(), window[1].0.clone()));
            subnet.properties.push(window[0].1.clone());
        }
        log::debug!(
            "Legacy switch {} folded into subnet {} with {} attached nodes",
            switch,
            index,
            subnet.nodes.len()
        );
    }

    Ok(topology)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_version1() {
        let json = r#"{
            "autogenerated": false,
            "core_routers": [{"id": "cro1"}, {"id": "cro2", "properties": {"loopback": "172.16.0.9"}}],
            "edge_routers": [{"id": "peo1"}],
            "subnets": [{"nodes": ["cro1", "cro2"], "links": [["cro1", "cro2"]]}],
            "vlls": [{"endpoints": ["peo1", "cro1"]}]
        }"#;

        let topology = parse_topology(json, FormatVersion::V1).unwrap();
        assert!(!topology.autogenerated);
        assert_eq!(topology.core_routers.len(), 2);
        assert_eq!(topology.core_routers[1].properties["loopback"], "172.16.0.9");
        assert_eq!(topology.subnets[0].links, vec![LinkPair::new("cro1", "cro2")]);
        assert!(topology.subnets[0].properties.is_empty());
        assert_eq!(topology.vlls[0].pair(), Some(("peo1", "cro1")));
        assert!(topology.pws.is_empty());
    }

    #[test]
    fn test_parse_version2_graph() {
        let json = r#"{
            "vertices": [
                {"id": "cro1", "type": "CR"},
                {"id": "peo1", "type": "PE"},
                {"id": "cer1", "type": "CE"},
                {"id": "ctr1", "type": "CTRL"}
            ],
            "edges": [
                {"source": "cro1", "target": "peo1", "type": "Data", "properties": {"bw": 10}},
                {"source": "cer1", "target": "peo1", "type": "VLL"},
                {"source": "cer1", "target": "cro1", "type": "PW"}
            ]
        }"#;

        let topology = parse_topology(json, FormatVersion::V2).unwrap();
        assert_eq!(topology.core_routers[0].id, "cro1");
        assert_eq!(topology.edge_routers[0].id, "peo1");
        assert_eq!(topology.customer_edge_routers[0].id, "cer1");
        assert_eq!(topology.controllers[0].id, "ctr1");
        assert_eq!(topology.subnets.len(), 1);
        assert_eq!(topology.subnets[0].properties[0]["bw"], 10);
        assert_eq!(topology.vlls.len(), 1);
        assert_eq!(topology.pws.len(), 1);
    }

    #[test]
    fn test_parse_version2_legacy_switch() {
        let json = r#"{
            "vertices": [
                {"id": "cro1", "type": "CR"},
                {"id": "cro2", "type": "CR"},
                {"id": "cro3", "type": "CR"},
                {"id": "sw1", "type": "L2SW"}
            ],
            "edges": [
                {"source": "cro1", "target": "cro2", "type": "Data"},
                {"source": "cro1", "target": "sw1", "type": "Data"},
                {"source": "sw1", "target": "cro2", "type": "Data"},
                {"source": "cro3", "target": "sw1", "type": "Data"}
            ]
        }"#;

        let topology = parse_topology(json, FormatVersion::V2).unwrap();
        assert_eq!(topology.subnets.len(), 2);
        let switched = &topology.subnets[1];
        assert_eq!(switched.nodes, vec!["cro1", "cro2", "cro3"]);
        assert_eq!(
            switched.links,
            vec![LinkPair::new("cro1", "cro2"), LinkPair::new("cro2", "cro3")]
        );
        assert_eq!(switched.properties.len(), 2);
    }

    #[test]
    fn test_parse_version2_switch_errors() {
        let json = r#"{
            "vertices": [{"id": "sw1", "type": "L2SW"}, {"id": "sw2", "type": "L2SW"}],
            "edges": [{"source": "sw1", "target": "sw2", "type": "Data"}]
        }"#;
        assert!(matches!(
            parse_topology(json, FormatVersion::V2),
            Err(TopologyParseError::SwitchToSwitch { .. })
        ));

        let json = r#"{
            "vertices": [{"id": "sw1", "type": "L2SW"}, {"id": "cer1", "type": "CE"}],
            "edges": [{"source": "cer1", "target": "sw1", "type": "VLL"}]
        }"#;
        assert!(matches!(
            parse_topology(json, FormatVersion::V2),
            Err(TopologyParseError::SwitchOverlay(switch)) if switch == "sw1"
        ));
    }

    #[test]
    fn test_unknown_vertex_type_is_rejected() {
        let json = r#"{"vertices": [{"id": "x1", "type": "ROADM"}]}"#;
        assert!(matches!(
            parse_topology(json, FormatVersion::V2),
            Err(TopologyParseError::Json(_))
        ));
    }

    #[test]
    fn test_format_version_from_u8() {
        assert_eq!(FormatVersion::try_from(1).unwrap(), FormatVersion::V1);
        assert_eq!(FormatVersion::try_from(2).unwrap(), FormatVersion::V2);
        assert!(matches!(
            FormatVersion::try_from(3),
            Err(TopologyParseError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_load_topology_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, r#"{{"core_routers": [{{"id": "cro1"}}]}}"#).unwrap();

        let topology = load_topology(temp_file.path(), FormatVersion::V1).unwrap();
        assert_eq!(topology.core_routers.len(), 1);

        let missing = load_topology(Path::new("/nonexistent/topology.json"), FormatVersion::V1);
        assert!(matches!(missing, Err(TopologyParseError::Io { .. })));
    }
}
