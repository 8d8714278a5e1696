//! Build plan compiler.
//!
//! Walks a resolved topology and emits the ordered build operations. Node
//! categories are registered in the reference index as their creation is
//! emitted, so every link step resolves its endpoints through the index.

use super::index::ReferenceIndex;
use super::management::{policy_for, WiringContext};
use super::operation::{BuildOperation, BuildPlan, NodeHandle};
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::properties::{PropertiesGenerator, ResolvedTopology};
use crate::topology::validation::entity_label;
use crate::topology::{
    validate_topology, EntityCategory, LinkPair, NodeRole, NodeSpec, OverlayLink, PropertyBag, Topology,
    ValidationError,
};
use log::{info, warn};

/// First link pair of a subnet; the only one that gets materialized
pub fn select_primary_link(pairs: &[LinkPair]) -> Option<&LinkPair> {
    pairs.first()
}

pub struct PlanCompiler {
    config: DeployConfig,
}

impl PlanCompiler {
    pub fn new(config: &DeployConfig) -> Self {
        Self { config: config.clone() }
    }

    /// Compile the resolved topology into a build plan.
    ///
    /// The topology is validated as a whole first; any error aborts
    /// compilation and no partial plan is returned.
    pub fn compile(&self, resolved: &ResolvedTopology, index: &mut ReferenceIndex) -> Result<BuildPlan, DeployError> {
        let topology = resolved.topology();
        validate_topology(topology)?;

        let mut plan = BuildPlan::new();

        self.emit_nodes(topology, &[NodeRole::CoreRouter, NodeRole::EdgeRouter], index, &mut plan)?;

        let coexistence = &self.config.coexistence;
        info!("*** Build coexistence mechanism {} (id {})", coexistence.kind, coexistence.id);
        plan.push(BuildOperation::CreateCoexistenceMechanism {
            kind: coexistence.kind,
            id: coexistence.id,
        });

        self.emit_nodes(
            topology,
            &[NodeRole::Controller, NodeRole::CustomerEdgeRouter],
            index,
            &mut plan,
        )?;

        let management = self.emit_management_node(index, &mut plan)?;
        self.emit_management_links(resolved, index, &management, &mut plan)?;

        info!("*** Build point-to-point links");
        for (i, subnet) in topology.subnets.iter().enumerate() {
            let entity = entity_label(EntityCategory::Subnet, i);
            let Some(pair) = select_primary_link(&subnet.links) else {
                return Err(ValidationError::MissingEndpoints {
                    entity,
                    category: EntityCategory::Subnet,
                    expected: 2,
                    found: 0,
                }
                .into());
            };
            if subnet.links.len() > 1 {
                warn!(
                    "{} has {} link pairs, only {} is created (multi-port switches are not supported)",
                    entity,
                    subnet.links.len(),
                    pair
                );
            }
            let lhs = index.lookup(&pair.0)?.clone();
            let rhs = index.lookup(&pair.1)?.clone();
            let properties = subnet.properties.first().cloned().unwrap_or_default();
            info!("*** Build link {}", pair);
            plan.push(BuildOperation::CreateLink { lhs, rhs, properties });
        }

        info!("*** Build VLLs");
        for (i, vll) in topology.vlls.iter().enumerate() {
            let (lhs, rhs, properties) = overlay_endpoints(vll, EntityCategory::Vll, i, index)?;
            info!("*** Build VLL {}-{}", lhs, rhs);
            plan.push(BuildOperation::CreateVll { lhs, rhs, properties });
        }

        info!("*** Build PWs");
        for (i, pw) in topology.pws.iter().enumerate() {
            let (lhs, rhs, properties) = overlay_endpoints(pw, EntityCategory::Pw, i, index)?;
            info!("*** Build PW {}-{}", lhs, rhs);
            plan.push(BuildOperation::CreatePw { lhs, rhs, properties });
        }

        info!("*** Build VSs");
        for vs in &topology.vss {
            let members = vs
                .members
                .iter()
                .map(|member| index.lookup(member).cloned())
                .collect::<Result<Vec<NodeHandle>, _>>()?;
            info!("*** Build VS {}", vs.members.join("-"));
            plan.push(BuildOperation::CreateVs {
                members,
                properties: vs.properties.clone(),
            });
        }

        info!("Compiled build plan: {}", plan.summary());
        Ok(plan)
    }

    fn emit_nodes(
        &self,
        topology: &Topology,
        roles: &[NodeRole],
        index: &mut ReferenceIndex,
        plan: &mut BuildPlan,
    ) -> Result<(), DeployError> {
        for &role in roles {
            info!("*** Build {}s", role);
            for node in nodes_of(topology, role) {
                let handle = index.register(&node.id, role)?;
                info!("*** Build {} {}", role, handle);
                plan.push(BuildOperation::CreateNode {
                    node: handle,
                    properties: node.properties.clone(),
                });
            }
        }
        Ok(())
    }

    fn emit_management_node(&self, index: &mut ReferenceIndex, plan: &mut BuildPlan) -> Result<NodeHandle, DeployError> {
        let handle = index.register(&self.config.management.node_name, NodeRole::Management)?;
        info!("*** Build management node {}", handle);
        plan.push(BuildOperation::CreateNode {
            node: handle.clone(),
            properties: PropertyBag::new(),
        });
        Ok(handle)
    }

    fn emit_management_links(
        &self,
        resolved: &ResolvedTopology,
        index: &ReferenceIndex,
        management: &NodeHandle,
        plan: &mut BuildPlan,
    ) -> Result<(), DeployError> {
        let policy = policy_for(&self.config.management);
        info!("*** Build management links ({} policy)", policy.name());
        let ctx = WiringContext {
            topology: resolved.topology(),
            index,
            management,
        };
        let mut generator = PropertiesGenerator::management(&self.config.addressing, resolved.registry().clone());
        for operation in policy.wire(&ctx, &mut generator)? {
            plan.push(operation);
        }
        Ok(())
    }
}

fn nodes_of(topology: &Topology, role: NodeRole) -> &[NodeSpec] {
    match role {
        NodeRole::CoreRouter => topology.core_routers.as_slice(),
        NodeRole::EdgeRouter => topology.edge_routers.as_slice(),
        NodeRole::CustomerEdgeRouter => topology.customer_edge_routers.as_slice(),
        NodeRole::Controller => topology.controllers.as_slice(),
        NodeRole::Management => &[],
    }
}

fn overlay_endpoints(
    overlay: &OverlayLink,
    category: EntityCategory,
    position: usize,
    index: &ReferenceIndex,
) -> Result<(NodeHandle, NodeHandle, PropertyBag), DeployError> {
    let (lhs, rhs) = overlay.pair().ok_or_else(|| ValidationError::MissingEndpoints {
        entity: entity_label(category, position),
        category,
        expected: 2,
        found: overlay.endpoints.len(),
    })?;
    Ok((
        index.lookup(lhs)?.clone(),
        index.lookup(rhs)?.clone(),
        overlay.properties.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CoexistenceKind, ManagementPolicy};
    use crate::properties::PropertyResolver;
    use crate::topology::{PointToPointSubnet, VirtualSwitch};
    use serde_json::json;
    use std::collections::HashSet;

    fn sample_topology() -> Topology {
        Topology {
            core_routers: vec![NodeSpec::new("cro1"), NodeSpec::new("cro2")],
            edge_routers: vec![NodeSpec::new("peo1")],
            customer_edge_routers: vec![NodeSpec::new("cer1"), NodeSpec::new("cer2")],
            controllers: vec![NodeSpec::new("ctr1")],
            subnets: vec![PointToPointSubnet {
                nodes: vec!["cro1".to_string(), "cro2".to_string(), "peo1".to_string()],
                links: vec![LinkPair::new("cro1", "cro2"), LinkPair::new("cro2", "peo1")],
                properties: Vec::new(),
            }],
            vlls: vec![OverlayLink::new("cer1", "cer2")],
            pws: vec![OverlayLink::new("cer2", "peo1")],
            vss: vec![VirtualSwitch {
                members: vec!["cer1".to_string(), "cer2".to_string(), "peo1".to_string()],
                properties: PropertyBag::new(),
            }],
            ..Default::default()
        }
    }

    fn compile(config: &DeployConfig, topology: Topology) -> Result<BuildPlan, DeployError> {
        let resolved = PropertyResolver::new(config).resolve(topology)?;
        PlanCompiler::new(config).compile(&resolved, &mut ReferenceIndex::new())
    }

    fn created_nodes(plan: &BuildPlan) -> Vec<(&str, NodeRole)> {
        plan.iter()
            .filter_map(|op| match op {
                BuildOperation::CreateNode { node, .. } => Some((node.name.as_str(), node.role)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_operation_order() {
        let plan = compile(&DeployConfig::default(), sample_topology()).unwrap();

        assert_eq!(
            created_nodes(&plan),
            vec![
                ("cro1", NodeRole::CoreRouter),
                ("cro2", NodeRole::CoreRouter),
                ("peo1", NodeRole::EdgeRouter),
                ("ctr1", NodeRole::Controller),
                ("cer1", NodeRole::CustomerEdgeRouter),
                ("cer2", NodeRole::CustomerEdgeRouter),
                ("mgm1", NodeRole::Management),
            ]
        );
        assert_eq!(
            plan.operations[3],
            BuildOperation::CreateCoexistenceMechanism {
                kind: CoexistenceKind::CoexH,
                id: 0
            }
        );

        let summary = plan.summary();
        assert_eq!(summary.management_links, 6);
        assert_eq!(summary.links, 1);
        assert_eq!(summary.vlls, 1);
        assert_eq!(summary.pws, 1);
        assert_eq!(summary.vss, 1);

        let tail: Vec<&str> = plan.operations[plan.len() - 4..]
            .iter()
            .map(|op| match op {
                BuildOperation::CreateLink { .. } => "link",
                BuildOperation::CreateVll { .. } => "vll",
                BuildOperation::CreatePw { .. } => "pw",
                BuildOperation::CreateVs { .. } => "vs",
                _ => "other",
            })
            .collect();
        assert_eq!(tail, vec!["link", "vll", "pw", "vs"]);
    }

    #[test]
    fn test_only_primary_link_is_created() {
        let plan = compile(&DeployConfig::default(), sample_topology()).unwrap();
        let links: Vec<_> = plan
            .iter()
            .filter_map(|op| match op {
                BuildOperation::CreateLink { lhs, rhs, properties } => Some((lhs, rhs, properties)),
                _ => None,
            })
            .collect();

        assert_eq!(links.len(), 1);
        let (lhs, rhs, properties) = links[0];
        assert_eq!(lhs.name, "cro1");
        assert_eq!(rhs.name, "cro2");
        assert_eq!(properties["net"], "10.0.0.0/24");
    }

    #[test]
    fn test_select_primary_link() {
        let pairs = vec![LinkPair::new("a", "b"), LinkPair::new("b", "c")];
        assert_eq!(select_primary_link(&pairs), Some(&pairs[0]));
        assert_eq!(select_primary_link(&[]), None);
    }

    #[test]
    fn test_single_connection_policy() {
        let mut config = DeployConfig::default();
        config.management.policy = ManagementPolicy::SingleConnection;

        let plan = compile(&config, sample_topology()).unwrap();
        assert_eq!(plan.summary().management_links, 1);
    }

    #[test]
    fn test_unknown_reference_yields_no_plan() {
        let mut topology = sample_topology();
        topology.vlls.push(OverlayLink::new("peo7", "peo8"));

        let err = compile(&DeployConfig::default(), topology).unwrap_err();
        match err {
            DeployError::Validation(ValidationError::UnknownNode { id, category, .. }) => {
                assert_eq!(id, "peo7");
                assert_eq!(category, EntityCategory::Vll);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_management_name_collision() {
        let mut config = DeployConfig::default();
        config.management.node_name = "cer1".to_string();

        let err = compile(&config, sample_topology()).unwrap_err();
        assert!(matches!(
            err,
            DeployError::Validation(ValidationError::DuplicateNode { second: NodeRole::Management, .. })
        ));
    }

    #[test]
    fn test_lookup_fails_before_category_is_emitted() {
        let topology = sample_topology();
        let compiler = PlanCompiler::new(&DeployConfig::default());
        let mut index = ReferenceIndex::new();
        let mut plan = BuildPlan::new();

        compiler
            .emit_nodes(&topology, &[NodeRole::CoreRouter, NodeRole::EdgeRouter], &mut index, &mut plan)
            .unwrap();
        assert!(index.lookup("peo1").is_ok());
        assert_eq!(
            index.lookup("cer1"),
            Err(ValidationError::UnregisteredNode { id: "cer1".to_string() })
        );

        compiler
            .emit_nodes(
                &topology,
                &[NodeRole::Controller, NodeRole::CustomerEdgeRouter],
                &mut index,
                &mut plan,
            )
            .unwrap();
        assert!(index.lookup("cer1").is_ok());
        assert_eq!(plan.len(), 6);
    }

    #[test]
    fn test_vs_members_are_resolved() {
        let plan = compile(&DeployConfig::default(), sample_topology()).unwrap();
        let vs = plan.operations.last().unwrap();
        match vs {
            BuildOperation::CreateVs { members, properties } => {
                let names: Vec<&str> = members.iter().map(|m| m.name.as_str()).collect();
                assert_eq!(names, vec!["cer1", "cer2", "peo1"]);
                assert_eq!(properties["service_id"], 3);
            }
            other => panic!("unexpected operation {:?}", other),
        }
    }

    /// Loopbacks plus both ends of every management link
    fn plan_addresses(plan: &BuildPlan) -> Vec<String> {
        let mut addresses = Vec::new();
        for op in plan {
            match op {
                BuildOperation::CreateNode { properties, .. } => {
                    addresses.extend(properties.get("loopback").and_then(|v| v.as_str()).map(String::from));
                }
                BuildOperation::CreateManagementLink { properties, .. } => {
                    addresses.push(properties["ip_lhs"].as_str().unwrap().to_string());
                    addresses.push(properties["ip_rhs"].as_str().unwrap().to_string());
                }
                _ => {}
            }
        }
        addresses
    }

    fn assert_unique(addresses: &[String]) {
        let mut seen = HashSet::new();
        for addr in addresses {
            assert!(seen.insert(addr), "{} is assigned twice", addr);
        }
    }

    #[test]
    fn test_management_links_avoid_annotated_addresses() {
        let mut topology = sample_topology();
        topology.core_routers[0].properties.insert("loopback".to_string(), json!("10.255.0.1"));

        let plan = compile(&DeployConfig::default(), topology).unwrap();
        let addresses = plan_addresses(&plan);
        assert!(addresses.contains(&"10.255.0.1".to_string()));
        assert_unique(&addresses);
    }

    #[test]
    fn test_management_links_avoid_autogenerated_addresses() {
        let topology = Topology {
            autogenerated: true,
            core_routers: vec![NodeSpec {
                id: "cro1".to_string(),
                properties: json!({"loopback": "10.255.0.2"}).as_object().unwrap().clone(),
            }],
            edge_routers: vec![NodeSpec {
                id: "peo1".to_string(),
                properties: json!({"loopback": "10.255.0.5"}).as_object().unwrap().clone(),
            }],
            ..Default::default()
        };

        let plan = compile(&DeployConfig::default(), topology).unwrap();
        let addresses = plan_addresses(&plan);
        assert_eq!(addresses.len(), 2 + 4);
        assert_unique(&addresses);
    }
}
