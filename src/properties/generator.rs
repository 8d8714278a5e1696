//! Deterministic property generation.
//!
//! The generator turns allocation requests into typed property records.
//! Each record knows how to render itself into the opaque property bag
//! stored next to its entity.

use super::keys;
use crate::config::AddressingConfig;
use crate::ip::{AllocationRegistry, HostAllocator, Ipv4Subnet, PoolExhausted, ServiceIdAllocator, SubnetAllocator};
use crate::topology::PropertyBag;
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Properties of a router
#[derive(Debug, Clone, PartialEq)]
pub struct VertexProperties {
    pub loopback: Ipv4Addr,
}

/// Properties of a point-to-point or management link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkProperties {
    pub ip_lhs: Ipv4Addr,
    pub ip_rhs: Ipv4Addr,
    pub net: Ipv4Subnet,
}

/// Properties of a VLL or PW
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayProperties {
    pub service_id: u32,
    pub ip_lhs: Ipv4Addr,
    pub ip_rhs: Ipv4Addr,
    pub net: Ipv4Subnet,
}

/// Shared properties of a virtual switch
#[derive(Debug, Clone, PartialEq)]
pub struct VsProperties {
    pub service_id: u32,
    pub net: Ipv4Subnet,
    pub endpoints: BTreeMap<String, Ipv4Addr>,
}

fn address(addr: Ipv4Addr) -> Value {
    Value::String(addr.to_string())
}

impl VertexProperties {
    pub fn to_bag(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert(keys::LOOPBACK.to_string(), address(self.loopback));
        bag
    }
}

impl LinkProperties {
    pub fn to_bag(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert(keys::IP_LHS.to_string(), address(self.ip_lhs));
        bag.insert(keys::IP_RHS.to_string(), address(self.ip_rhs));
        bag.insert(keys::NET.to_string(), Value::String(self.net.to_string()));
        bag
    }
}

impl OverlayProperties {
    pub fn to_bag(&self) -> PropertyBag {
        let mut bag = PropertyBag::new();
        bag.insert(keys::SERVICE_ID.to_string(), Value::from(self.service_id));
        bag.insert(keys::IP_LHS.to_string(), address(self.ip_lhs));
        bag.insert(keys::IP_RHS.to_string(), address(self.ip_rhs));
        bag.insert(keys::NET.to_string(), Value::String(self.net.to_string()));
        bag
    }
}

impl VsProperties {
    pub fn to_bag(&self) -> PropertyBag {
        let endpoints = self
            .endpoints
            .iter()
            .map(|(member, addr)| (member.clone(), address(*addr)))
            .collect::<PropertyBag>();

        let mut bag = PropertyBag::new();
        bag.insert(keys::SERVICE_ID.to_string(), Value::from(self.service_id));
        bag.insert(keys::NET.to_string(), Value::String(self.net.to_string()));
        bag.insert(keys::ENDPOINTS.to_string(), Value::Object(endpoints));
        bag
    }
}

/// Allocates properties for one resolution pass.
///
/// A fresh generator always yields the same sequence for the same sequence
/// of requests.
#[derive(Debug)]
pub struct PropertiesGenerator {
    registry: AllocationRegistry,
    loopbacks: HostAllocator,
    links: SubnetAllocator,
    overlays: SubnetAllocator,
    service_ids: ServiceIdAllocator,
}

impl PropertiesGenerator {
    /// Generator for topology entities (loopbacks, data links, overlays)
    pub fn new(addressing: &AddressingConfig) -> Self {
        Self::with_link_pool(
            addressing,
            AllocationRegistry::new(),
            "link",
            addressing.link_pool,
            addressing.link_prefix_len,
        )
    }

    /// Generator whose links come from the management pool.
    ///
    /// `registry` holds every value already used by the topology, so
    /// management addressing never reuses one of them.
    pub fn management(addressing: &AddressingConfig, registry: AllocationRegistry) -> Self {
        Self::with_link_pool(
            addressing,
            registry,
            "management",
            addressing.management_pool,
            addressing.management_prefix_len,
        )
    }

    fn with_link_pool(
        addressing: &AddressingConfig,
        registry: AllocationRegistry,
        name: &'static str,
        pool: Ipv4Subnet,
        prefix_len: u8,
    ) -> Self {
        Self {
            registry,
            loopbacks: HostAllocator::new("loopback", addressing.loopback_pool),
            links: SubnetAllocator::new(name, pool, prefix_len),
            overlays: SubnetAllocator::new("overlay", addressing.overlay_pool, addressing.overlay_prefix_len),
            service_ids: ServiceIdAllocator::new(addressing.max_service_id),
        }
    }

    /// Registry backing this generator, used to reserve pre-existing
    /// annotations before anything is generated
    pub fn registry_mut(&mut self) -> &mut AllocationRegistry {
        &mut self.registry
    }

    pub fn registry(&self) -> &AllocationRegistry {
        &self.registry
    }

    pub fn into_registry(self) -> AllocationRegistry {
        self.registry
    }

    pub fn vertex_properties(&mut self, owner: &str) -> Result<VertexProperties, PoolExhausted> {
        let loopback = self.loopbacks.allocate(&mut self.registry, owner)?;
        Ok(VertexProperties { loopback })
    }

    pub fn link_properties(&mut self, owner: &str) -> Result<LinkProperties, PoolExhausted> {
        let net = self.links.allocate(&mut self.registry, owner)?;
        let (ip_lhs, ip_rhs) = first_two_hosts(net)?;
        Ok(LinkProperties { ip_lhs, ip_rhs, net })
    }

    pub fn overlay_properties(&mut self, owner: &str) -> Result<OverlayProperties, PoolExhausted> {
        let service_id = self.service_ids.allocate(&mut self.registry, owner)?;
        let net = self.overlays.allocate(&mut self.registry, owner)?;
        let (ip_lhs, ip_rhs) = first_two_hosts(net)?;
        Ok(OverlayProperties {
            service_id,
            ip_lhs,
            ip_rhs,
            net,
        })
    }

    pub fn vs_properties(&mut self, members: &[String], owner: &str) -> Result<VsProperties, PoolExhausted> {
        let service_id = self.service_ids.allocate(&mut self.registry, owner)?;
        let net = self.overlays.allocate(&mut self.registry, owner)?;
        let mut endpoints = BTreeMap::new();
        for (i, member) in members.iter().enumerate() {
            let addr = net.host(i as u64 + 1).ok_or_else(|| PoolExhausted {
                pool: "virtual switch endpoint",
                range: net.to_string(),
            })?;
            endpoints.insert(member.clone(), addr);
        }
        Ok(VsProperties {
            service_id,
            net,
            endpoints,
        })
    }
}

fn first_two_hosts(net: Ipv4Subnet) -> Result<(Ipv4Addr, Ipv4Addr), PoolExhausted> {
    match (net.host(1), net.host(2)) {
        (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
        _ => Err(PoolExhausted {
            pool: "link endpoint",
            range: net.to_string(),
        }),
    }
}
