//! Property resolver.
//!
//! Resolution works in two passes over the topology. The first pass
//! reserves every value already annotated in the file, so generated values
//! can never collide with them. The second pass walks the collections in
//! file order and fills in whatever is missing.

use super::generator::PropertiesGenerator;
use super::{keys, ResolutionError};
use crate::config::{AddressingConfig, DeployConfig};
use crate::ip::{AllocationRegistry, Ipv4Subnet, PoolExhausted};
use crate::topology::validation::entity_label;
use crate::topology::{EntityCategory, NodeRole, NodeSpec, OverlayLink, PropertyBag, Topology};
use log::{debug, info};
use std::net::Ipv4Addr;

const LINK_KEYS: &[&str] = &[keys::NET, keys::IP_LHS, keys::IP_RHS];
const OVERLAY_KEYS: &[&str] = &[keys::SERVICE_ID, keys::NET, keys::IP_LHS, keys::IP_RHS];
const VS_KEYS: &[&str] = &[keys::SERVICE_ID, keys::NET, keys::ENDPOINTS];

/// A topology whose property bags are final, together with every value
/// those bags hold
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTopology {
    topology: Topology,
    registry: AllocationRegistry,
}

impl ResolvedTopology {
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Addresses, subnets and service ids used by the topology
    pub fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    pub fn into_inner(self) -> Topology {
        self.topology
    }
}

/// Fills in missing per-entity properties
#[derive(Debug, Clone)]
pub struct PropertyResolver {
    addressing: AddressingConfig,
}

impl PropertyResolver {
    pub fn new(config: &DeployConfig) -> Self {
        Self {
            addressing: config.addressing.clone(),
        }
    }

    /// Resolve every property bag of the topology.
    ///
    /// Autogenerated topologies are returned untouched. Otherwise values
    /// already present in a bag are kept and only missing ones are
    /// generated; a bag is either fully annotated or not at all.
    pub fn resolve(&self, topology: Topology) -> Result<ResolvedTopology, ResolutionError> {
        if topology.autogenerated {
            info!("Topology is autogenerated, using its properties as-is");
            check_autogenerated(&topology)?;
            let mut registry = AllocationRegistry::new();
            reserve_annotations(&topology, &mut registry, Mode::Lenient)?;
            return Ok(ResolvedTopology { topology, registry });
        }

        info!("Topology is not autogenerated, generating properties");
        let mut topology = topology;
        let mut generator = PropertiesGenerator::new(&self.addressing);
        reserve_annotations(&topology, generator.registry_mut(), Mode::Strict)?;

        info!("Build vertices properties");
        resolve_vertices(&mut topology.core_routers, NodeRole::CoreRouter, &mut generator)?;
        resolve_vertices(&mut topology.edge_routers, NodeRole::EdgeRouter, &mut generator)?;

        info!("Build point-to-point links properties");
        for (i, subnet) in topology.subnets.iter_mut().enumerate() {
            let entity = entity_label(EntityCategory::Subnet, i);
            while subnet.properties.len() < subnet.links.len() {
                subnet.properties.push(PropertyBag::new());
            }
            for (j, bag) in subnet.properties.iter_mut().take(subnet.links.len()).enumerate() {
                if bag.contains_key(keys::NET) {
                    continue;
                }
                let owner = link_owner(&entity, j);
                let properties = generator
                    .link_properties(&owner)
                    .map_err(|source| exhausted(&owner, EntityCategory::Subnet, source))?;
                annotate(bag, properties.to_bag());
                debug!("Link {} of {}: {:?}", subnet.links[j], entity, bag);
            }
        }

        info!("Build VLLs properties");
        resolve_overlays(&mut topology.vlls, EntityCategory::Vll, &mut generator)?;

        info!("Build PWs properties");
        resolve_overlays(&mut topology.pws, EntityCategory::Pw, &mut generator)?;

        info!("Build VSs properties");
        for (i, vs) in topology.vss.iter_mut().enumerate() {
            if vs.properties.contains_key(keys::NET) {
                continue;
            }
            let entity = entity_label(EntityCategory::Vs, i);
            let properties = generator
                .vs_properties(&vs.members, &entity)
                .map_err(|source| exhausted(&entity, EntityCategory::Vs, source))?;
            annotate(&mut vs.properties, properties.to_bag());
            debug!("{}: {:?}", entity, vs.properties);
        }

        let registry = generator.into_registry();
        info!(
            "Property resolution done: {} addresses, {} subnets, {} service ids in use",
            registry.address_count(),
            registry.subnet_count(),
            registry.service_id_count()
        );
        Ok(ResolvedTopology { topology, registry })
    }
}

fn link_owner(subnet: &str, pair: usize) -> String {
    format!("{}:{}", subnet, pair)
}

fn exhausted(entity: &str, category: EntityCategory, source: PoolExhausted) -> ResolutionError {
    ResolutionError::Exhausted {
        entity: entity.to_string(),
        category,
        source,
    }
}

/// Copy generated values into a bag without overriding existing ones
fn annotate(bag: &mut PropertyBag, generated: PropertyBag) {
    for (key, value) in generated {
        bag.entry(key).or_insert(value);
    }
}

fn resolve_vertices(
    nodes: &mut [NodeSpec],
    role: NodeRole,
    generator: &mut PropertiesGenerator,
) -> Result<(), ResolutionError> {
    let category = EntityCategory::Node(role);
    for node in nodes {
        if node.properties.contains_key(keys::LOOPBACK) {
            continue;
        }
        let properties = generator
            .vertex_properties(&node.id)
            .map_err(|source| exhausted(&node.id, category, source))?;
        annotate(&mut node.properties, properties.to_bag());
        debug!("{} - {:?}", node.id, node.properties);
    }
    Ok(())
}

fn resolve_overlays(
    overlays: &mut [OverlayLink],
    category: EntityCategory,
    generator: &mut PropertiesGenerator,
) -> Result<(), ResolutionError> {
    for (i, overlay) in overlays.iter_mut().enumerate() {
        if overlay.properties.contains_key(keys::NET) {
            continue;
        }
        let entity = entity_label(category, i);
        let properties = generator
            .overlay_properties(&entity)
            .map_err(|source| exhausted(&entity, category, source))?;
        annotate(&mut overlay.properties, properties.to_bag());
        debug!("{}: {:?}", entity, overlay.properties);
    }
    Ok(())
}

/// Autogenerated topologies must already carry a bag for every link that
/// will be materialized
fn check_autogenerated(topology: &Topology) -> Result<(), ResolutionError> {
    for (i, subnet) in topology.subnets.iter().enumerate() {
        if !subnet.links.is_empty() && subnet.properties.is_empty() {
            return Err(ResolutionError::MissingAnnotation {
                entity: entity_label(EntityCategory::Subnet, i),
                category: EntityCategory::Subnet,
            });
        }
    }
    Ok(())
}

/// How annotations that cannot be reserved are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Every annotation must be complete, well-formed and unique
    Strict,
    /// Reserve what can be reserved and skip the rest (autogenerated files)
    Lenient,
}

/// Reserve every value already annotated in the topology
fn reserve_annotations(topology: &Topology, registry: &mut AllocationRegistry, mode: Mode) -> Result<(), ResolutionError> {
    for (role, node) in topology.all_nodes() {
        let mut reserver = Reserver::new(registry, &node.id, EntityCategory::Node(role), mode);
        reserver.address(&node.properties, keys::LOOPBACK, None)?;
    }

    for (i, subnet) in topology.subnets.iter().enumerate() {
        let entity = entity_label(EntityCategory::Subnet, i);
        for (j, bag) in subnet.properties.iter().enumerate() {
            let owner = link_owner(&entity, j);
            let mut reserver = Reserver::new(registry, &owner, EntityCategory::Subnet, mode);
            reserver.complete(bag, LINK_KEYS)?;
            let net = reserver.net(bag)?;
            reserver.address(bag, keys::IP_LHS, net)?;
            reserver.address(bag, keys::IP_RHS, net)?;
        }
    }

    for (category, overlays) in [(EntityCategory::Vll, &topology.vlls), (EntityCategory::Pw, &topology.pws)] {
        for (i, overlay) in overlays.iter().enumerate() {
            let entity = entity_label(category, i);
            let mut reserver = Reserver::new(registry, &entity, category, mode);
            reserver.complete(&overlay.properties, OVERLAY_KEYS)?;
            reserver.service_id(&overlay.properties)?;
            let net = reserver.net(&overlay.properties)?;
            reserver.address(&overlay.properties, keys::IP_LHS, net)?;
            reserver.address(&overlay.properties, keys::IP_RHS, net)?;
        }
    }

    for (i, vs) in topology.vss.iter().enumerate() {
        let entity = entity_label(EntityCategory::Vs, i);
        let mut reserver = Reserver::new(registry, &entity, EntityCategory::Vs, mode);
        reserver.complete(&vs.properties, VS_KEYS)?;
        reserver.service_id(&vs.properties)?;
        let net = reserver.net(&vs.properties)?;
        reserver.endpoints(&vs.properties, net)?;
    }

    Ok(())
}

/// Reserves the annotations of one entity
struct Reserver<'a> {
    registry: &'a mut AllocationRegistry,
    owner: &'a str,
    category: EntityCategory,
    mode: Mode,
}

impl<'a> Reserver<'a> {
    fn new(registry: &'a mut AllocationRegistry, owner: &'a str, category: EntityCategory, mode: Mode) -> Self {
        Self {
            registry,
            owner,
            category,
            mode,
        }
    }

    /// In lenient mode a failed reservation is logged and skipped
    fn settle<T: Default>(&self, result: Result<T, ResolutionError>) -> Result<T, ResolutionError> {
        match result {
            Err(err) if self.mode == Mode::Lenient => {
                debug!("Not reserving annotation of {}: {}", self.owner, err);
                Ok(T::default())
            }
            other => other,
        }
    }

    fn malformed(&self, key: &str, value: &serde_json::Value) -> ResolutionError {
        ResolutionError::MalformedAnnotation {
            entity: self.owner.to_string(),
            category: self.category,
            key: static_key(key),
            value: value.to_string(),
        }
    }

    fn conflict(&self, key: &str, value: String, owner: String) -> ResolutionError {
        ResolutionError::ConflictingAnnotation {
            entity: self.owner.to_string(),
            category: self.category,
            key: static_key(key),
            value,
            owner,
        }
    }

    /// A bag annotating any of `required` must annotate all of them
    fn complete(&self, bag: &PropertyBag, required: &[&'static str]) -> Result<(), ResolutionError> {
        if !required.iter().any(|key| bag.contains_key(*key)) {
            return Ok(());
        }
        let result = match required.iter().copied().find(|key| !bag.contains_key(*key)) {
            Some(key) => Err(ResolutionError::IncompleteAnnotation {
                entity: self.owner.to_string(),
                category: self.category,
                key,
            }),
            None => Ok(()),
        };
        self.settle(result)
    }

    fn address(&mut self, bag: &PropertyBag, key: &str, net: Option<Ipv4Subnet>) -> Result<(), ResolutionError> {
        let result = self.reserve_address(bag, key, net);
        self.settle(result)
    }

    fn reserve_address(&mut self, bag: &PropertyBag, key: &str, net: Option<Ipv4Subnet>) -> Result<(), ResolutionError> {
        let Some(value) = bag.get(key) else {
            return Ok(());
        };
        let addr = value
            .as_str()
            .and_then(|raw| raw.parse::<Ipv4Addr>().ok())
            .ok_or_else(|| self.malformed(key, value))?;
        if let Some(net) = net.filter(|net| !net.contains(addr)) {
            return Err(ResolutionError::OutsideNet {
                entity: self.owner.to_string(),
                category: self.category,
                key: static_key(key),
                value: addr.to_string(),
                net: net.to_string(),
            });
        }
        self.registry
            .reserve_address(addr, self.owner)
            .map_err(|owner| self.conflict(key, addr.to_string(), owner))
    }

    fn net(&mut self, bag: &PropertyBag) -> Result<Option<Ipv4Subnet>, ResolutionError> {
        let result = self.reserve_net(bag);
        self.settle(result)
    }

    fn reserve_net(&mut self, bag: &PropertyBag) -> Result<Option<Ipv4Subnet>, ResolutionError> {
        let Some(value) = bag.get(keys::NET) else {
            return Ok(None);
        };
        let net = value
            .as_str()
            .and_then(|raw| raw.parse::<Ipv4Subnet>().ok())
            .ok_or_else(|| self.malformed(keys::NET, value))?;
        self.registry
            .reserve_subnet(net, self.owner)
            .map_err(|owner| self.conflict(keys::NET, net.to_string(), owner))?;
        Ok(Some(net))
    }

    fn service_id(&mut self, bag: &PropertyBag) -> Result<(), ResolutionError> {
        let result = self.reserve_service_id(bag);
        self.settle(result)
    }

    fn reserve_service_id(&mut self, bag: &PropertyBag) -> Result<(), ResolutionError> {
        let Some(value) = bag.get(keys::SERVICE_ID) else {
            return Ok(());
        };
        let id = value
            .as_u64()
            .and_then(|raw| u32::try_from(raw).ok())
            .ok_or_else(|| self.malformed(keys::SERVICE_ID, value))?;
        self.registry
            .reserve_service_id(id, self.owner)
            .map_err(|owner| self.conflict(keys::SERVICE_ID, id.to_string(), owner))
    }

    /// Virtual switch member addresses, keyed by member
    fn endpoints(&mut self, bag: &PropertyBag, net: Option<Ipv4Subnet>) -> Result<(), ResolutionError> {
        let Some(value) = bag.get(keys::ENDPOINTS) else {
            return Ok(());
        };
        let Some(endpoints) = value.as_object() else {
            let err = self.malformed(keys::ENDPOINTS, value);
            return self.settle(Err(err));
        };
        for member in endpoints.keys() {
            self.address(endpoints, member, net)?;
        }
        Ok(())
    }
}

/// Map a bag key onto its static name for error reporting; per-member
/// endpoint keys are reported as `endpoints`
fn static_key(key: &str) -> &'static str {
    match key {
        keys::LOOPBACK => keys::LOOPBACK,
        keys::IP_LHS => keys::IP_LHS,
        keys::IP_RHS => keys::IP_RHS,
        keys::NET => keys::NET,
        keys::SERVICE_ID => keys::SERVICE_ID,
        _ => keys::ENDPOINTS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LinkPair, PointToPointSubnet, VirtualSwitch};
    use serde_json::json;

    fn two_router_topology() -> Topology {
        Topology {
            core_routers: vec![NodeSpec::new("cro1"), NodeSpec::new("cro2")],
            edge_routers: vec![NodeSpec::new("peo1")],
            customer_edge_routers: vec![NodeSpec::new("cer1"), NodeSpec::new("cer2")],
            subnets: vec![PointToPointSubnet {
                nodes: vec!["cro1".to_string(), "cro2".to_string()],
                links: vec![LinkPair::new("cro1", "cro2")],
                properties: Vec::new(),
            }],
            vlls: vec![OverlayLink::new("cer1", "cer2")],
            pws: vec![OverlayLink::new("cer2", "cer1")],
            vss: vec![VirtualSwitch {
                members: vec!["cer1".to_string(), "cer2".to_string(), "peo1".to_string()],
                properties: PropertyBag::new(),
            }],
            ..Default::default()
        }
    }

    fn resolver() -> PropertyResolver {
        PropertyResolver::new(&DeployConfig::default())
    }

    #[test]
    fn test_generates_missing_properties() {
        let resolved = resolver().resolve(two_router_topology()).unwrap();
        let topology = resolved.topology();

        assert_eq!(topology.core_routers[0].properties[keys::LOOPBACK], "172.16.0.1");
        assert_eq!(topology.core_routers[1].properties[keys::LOOPBACK], "172.16.0.2");
        assert_eq!(topology.edge_routers[0].properties[keys::LOOPBACK], "172.16.0.3");
        assert!(topology.customer_edge_routers[0].properties.is_empty());

        let link = &topology.subnets[0].properties[0];
        assert_eq!(link[keys::NET], "10.0.0.0/24");
        assert_eq!(link[keys::IP_LHS], "10.0.0.1");
        assert_eq!(link[keys::IP_RHS], "10.0.0.2");

        assert_eq!(topology.vlls[0].properties[keys::SERVICE_ID], 1);
        assert_eq!(topology.pws[0].properties[keys::SERVICE_ID], 2);
        assert_eq!(topology.vss[0].properties[keys::SERVICE_ID], 3);
        assert_eq!(topology.vss[0].properties[keys::ENDPOINTS].as_object().unwrap().len(), 3);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let first = resolver().resolve(two_router_topology()).unwrap();
        let second = resolver().resolve(two_router_topology()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_autogenerated_is_untouched() {
        let mut topology = two_router_topology();
        topology.autogenerated = true;
        topology.core_routers[0].properties.insert("loopback".to_string(), json!("192.0.2.1"));
        topology.subnets[0].properties.push(json!({"ip_lhs": "x", "custom": [1, 2]}).as_object().unwrap().clone());

        let before = serde_json::to_string(&topology).unwrap();
        let resolved = resolver().resolve(topology).unwrap();
        let after = serde_json::to_string(resolved.topology()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_autogenerated_requires_link_bags() {
        let mut topology = two_router_topology();
        topology.autogenerated = true;

        let err = resolver().resolve(topology).unwrap_err();
        assert!(matches!(err, ResolutionError::MissingAnnotation { category: EntityCategory::Subnet, .. }));
    }

    #[test]
    fn test_existing_annotations_are_kept_and_reserved() {
        let mut topology = two_router_topology();
        topology.edge_routers[0]
            .properties
            .insert(keys::LOOPBACK.to_string(), json!("172.16.0.1"));
        topology.vlls[0].properties = json!({
            "service_id": 1, "net": "10.1.0.0/24", "ip_lhs": "10.1.0.10", "ip_rhs": "10.1.0.20"
        })
        .as_object()
        .unwrap()
        .clone();

        let resolved = resolver().resolve(topology).unwrap();
        let topology = resolved.topology();

        assert_eq!(topology.edge_routers[0].properties[keys::LOOPBACK], "172.16.0.1");
        assert_eq!(topology.core_routers[0].properties[keys::LOOPBACK], "172.16.0.2");
        assert_eq!(topology.core_routers[1].properties[keys::LOOPBACK], "172.16.0.3");
        assert_eq!(topology.vlls[0].properties[keys::IP_LHS], "10.1.0.10");
        assert_eq!(topology.pws[0].properties[keys::SERVICE_ID], 2);
        assert_eq!(topology.pws[0].properties[keys::NET], "10.1.1.0/24");
    }

    #[test]
    fn test_link_bag_without_net_is_rejected() {
        let mut topology = two_router_topology();
        topology.subnets[0].properties.push(json!({"ip_lhs": "10.0.0.1"}).as_object().unwrap().clone());

        let err = resolver().resolve(topology).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::IncompleteAnnotation {
                entity: "subnet#0:0".to_string(),
                category: EntityCategory::Subnet,
                key: keys::NET,
            }
        );
    }

    #[test]
    fn test_overlay_bag_without_service_id_is_rejected() {
        let mut topology = two_router_topology();
        topology.pws[0].properties = json!({"net": "10.1.5.0/24", "ip_lhs": "10.1.5.1", "ip_rhs": "10.1.5.2"})
            .as_object()
            .unwrap()
            .clone();

        let err = resolver().resolve(topology).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::IncompleteAnnotation {
                entity: "pw#0".to_string(),
                category: EntityCategory::Pw,
                key: keys::SERVICE_ID,
            }
        );
    }

    #[test]
    fn test_link_address_outside_net_is_rejected() {
        let mut topology = two_router_topology();
        topology.subnets[0].properties.push(
            json!({"ip_lhs": "10.0.0.1", "ip_rhs": "10.0.9.2", "net": "10.0.0.0/24"})
                .as_object()
                .unwrap()
                .clone(),
        );

        let err = resolver().resolve(topology).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::OutsideNet { key: keys::IP_RHS, category: EntityCategory::Subnet, .. }
        ));
    }

    #[test]
    fn test_non_address_keys_do_not_count_as_annotation() {
        let mut topology = two_router_topology();
        topology.vss[0].properties.insert("mtu".to_string(), json!(9000));

        let resolved = resolver().resolve(topology).unwrap();
        let vs = &resolved.topology().vss[0].properties;
        assert_eq!(vs["mtu"], 9000);
        assert_eq!(vs[keys::SERVICE_ID], 3);
    }

    #[test]
    fn test_registry_holds_every_resolved_value() {
        let resolved = resolver().resolve(two_router_topology()).unwrap();
        let registry = resolved.registry();

        // generated links and overlays are held as whole subnets
        assert_eq!(registry.address_count(), 3);
        assert_eq!(registry.subnet_count(), 4);
        assert_eq!(registry.service_id_count(), 3);
    }

    #[test]
    fn test_autogenerated_registry_skips_unusable_values() {
        let mut topology = two_router_topology();
        topology.autogenerated = true;
        topology.core_routers[0].properties.insert(keys::LOOPBACK.to_string(), json!("10.255.0.1"));
        topology.core_routers[1].properties.insert(keys::LOOPBACK.to_string(), json!("10.255.0.1"));
        topology.subnets[0].properties.push(json!({"ip_lhs": "x"}).as_object().unwrap().clone());

        let resolved = resolver().resolve(topology).unwrap();
        let mut registry = resolved.registry().clone();
        assert_eq!(registry.address_count(), 1);
        assert_eq!(
            registry.reserve_address("10.255.0.1".parse().unwrap(), "mgmt#0"),
            Err("cro1".to_string())
        );
    }

    #[test]
    fn test_conflicting_annotations() {
        let mut topology = two_router_topology();
        topology.core_routers[0].properties.insert(keys::LOOPBACK.to_string(), json!("172.16.0.9"));
        topology.core_routers[1].properties.insert(keys::LOOPBACK.to_string(), json!("172.16.0.9"));

        let err = resolver().resolve(topology).unwrap_err();
        assert_eq!(
            err,
            ResolutionError::ConflictingAnnotation {
                entity: "cro2".to_string(),
                category: EntityCategory::Node(NodeRole::CoreRouter),
                key: keys::LOOPBACK,
                value: "172.16.0.9".to_string(),
                owner: "cro1".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_annotation() {
        let mut topology = two_router_topology();
        topology.vss[0].properties.insert(keys::SERVICE_ID.to_string(), json!("seven"));

        let err = resolver().resolve(topology).unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::MalformedAnnotation { key: keys::SERVICE_ID, category: EntityCategory::Vs, .. }
        ));
    }

    #[test]
    fn test_loopback_pool_exhaustion_names_entity() {
        let mut config = DeployConfig::default();
        config.addressing.loopback_pool = "172.16.0.0/30".parse().unwrap();

        let err = PropertyResolver::new(&config).resolve(two_router_topology()).unwrap_err();
        match err {
            ResolutionError::Exhausted { entity, category, source } => {
                assert_eq!(entity, "peo1");
                assert_eq!(category, EntityCategory::Node(NodeRole::EdgeRouter));
                assert_eq!(source.pool, "loopback");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_every_link_pair_gets_properties() {
        let mut topology = two_router_topology();
        topology.subnets[0].nodes.push("peo1".to_string());
        topology.subnets[0].links.push(LinkPair::new("cro2", "peo1"));

        let resolved = resolver().resolve(topology).unwrap();
        let subnet = &resolved.topology().subnets[0];
        assert_eq!(subnet.properties.len(), 2);
        assert_eq!(subnet.properties[1][keys::NET], "10.0.1.0/24");
    }
}
