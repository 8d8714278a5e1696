//! Allocation registry.
//!
//! This file tracks every address, subnet and service identifier handed
//! out (or found pre-annotated) during one resolution pass, so no value is
//! ever assigned to two entities.

use super::subnet::Ipv4Subnet;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Central registry for all values assigned during one resolution pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AllocationRegistry {
    /// Address -> owning entity
    addresses: HashMap<Ipv4Addr, String>,
    /// Reserved subnets and their owning entity
    subnets: Vec<(Ipv4Subnet, String)>,
    /// Service identifier -> owning entity
    service_ids: HashMap<u32, String>,
}

impl AllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address for an entity.
    ///
    /// Registering the same address twice for the same entity is fine; for a
    /// different entity the current owner is returned as the error.
    pub fn reserve_address(&mut self, addr: Ipv4Addr, owner: &str) -> Result<(), String> {
        match self.addresses.get(&addr) {
            Some(existing) if existing != owner => Err(existing.clone()),
            Some(_) => Ok(()),
            None => {
                self.addresses.insert(addr, owner.to_string());
                Ok(())
            }
        }
    }

    /// Register a subnet for an entity; overlapping another entity's subnet
    /// returns that entity as the error
    pub fn reserve_subnet(&mut self, subnet: Ipv4Subnet, owner: &str) -> Result<(), String> {
        if let Some((_, existing)) = self
            .subnets
            .iter()
            .find(|(reserved, existing)| reserved.overlaps(&subnet) && existing != owner)
        {
            return Err(existing.clone());
        }
        if !self.subnets.iter().any(|(reserved, _)| *reserved == subnet) {
            self.subnets.push((subnet, owner.to_string()));
        }
        Ok(())
    }

    pub fn reserve_service_id(&mut self, id: u32, owner: &str) -> Result<(), String> {
        match self.service_ids.get(&id) {
            Some(existing) if existing != owner => Err(existing.clone()),
            Some(_) => Ok(()),
            None => {
                self.service_ids.insert(id, owner.to_string());
                Ok(())
            }
        }
    }

    /// A subnet is free if it overlaps no reserved subnet and contains no
    /// assigned address
    pub fn is_subnet_free(&self, subnet: &Ipv4Subnet) -> bool {
        !self.subnets.iter().any(|(reserved, _)| reserved.overlaps(subnet))
            && !self.addresses.keys().any(|addr| subnet.contains(*addr))
    }

    pub fn address_count(&self) -> usize {
        self.addresses.len()
    }

    pub fn subnet_count(&self) -> usize {
        self.subnets.len()
    }

    pub fn service_id_count(&self) -> usize {
        self.service_ids.len()
    }
}
