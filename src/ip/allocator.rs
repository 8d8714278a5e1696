//! Sequential address allocation.
//!
//! Allocators walk their pool in address order and hand out the first value
//! not already held in the [`AllocationRegistry`]. Walking order only
//! depends on the order of requests, so the same topology always gets the
//! same assignment.

use super::registry::AllocationRegistry;
use super::subnet::Ipv4Subnet;
use std::net::Ipv4Addr;

/// Raised when a pool has no free value left
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{pool} pool {range} is exhausted")]
pub struct PoolExhausted {
    pub pool: &'static str,
    pub range: String,
}

/// Hands out single host addresses (loopbacks)
#[derive(Debug)]
pub struct HostAllocator {
    name: &'static str,
    pool: Ipv4Subnet,
    next: u64,
}

impl HostAllocator {
    pub fn new(name: &'static str, pool: Ipv4Subnet) -> Self {
        Self { name, pool, next: 0 }
    }

    pub fn allocate(&mut self, registry: &mut AllocationRegistry, owner: &str) -> Result<Ipv4Addr, PoolExhausted> {
        while self.next < self.pool.host_count() {
            self.next += 1;
            if let Some(addr) = self.pool.host(self.next) {
                if registry.reserve_address(addr, owner).is_ok() {
                    return Ok(addr);
                }
            }
        }
        Err(PoolExhausted {
            pool: self.name,
            range: self.pool.to_string(),
        })
    }
}

/// Carves fixed-length subnets out of a pool (link and overlay addressing)
#[derive(Debug)]
pub struct SubnetAllocator {
    name: &'static str,
    pool: Ipv4Subnet,
    prefix_len: u8,
    next: u64,
}

impl SubnetAllocator {
    pub fn new(name: &'static str, pool: Ipv4Subnet, prefix_len: u8) -> Self {
        Self {
            name,
            pool,
            prefix_len,
            next: 0,
        }
    }

    pub fn allocate(&mut self, registry: &mut AllocationRegistry, owner: &str) -> Result<Ipv4Subnet, PoolExhausted> {
        while let Some(candidate) = self.pool.nth_subnet(self.next, self.prefix_len) {
            self.next += 1;
            if registry.is_subnet_free(&candidate) && registry.reserve_subnet(candidate, owner).is_ok() {
                return Ok(candidate);
            }
            log::debug!("Skipping {} subnet {}: already in use", self.name, candidate);
        }
        Err(PoolExhausted {
            pool: self.name,
            range: format!("{} (/{} subnets)", self.pool, self.prefix_len),
        })
    }
}

/// Hands out service identifiers starting at 1
#[derive(Debug)]
pub struct ServiceIdAllocator {
    next: u32,
    max: u32,
}

impl ServiceIdAllocator {
    pub fn new(max: u32) -> Self {
        Self { next: 0, max }
    }

    pub fn allocate(&mut self, registry: &mut AllocationRegistry, owner: &str) -> Result<u32, PoolExhausted> {
        while self.next < self.max {
            self.next += 1;
            if registry.reserve_service_id(self.next, owner).is_ok() {
                return Ok(self.next);
            }
        }
        Err(PoolExhausted {
            pool: "service id",
            range: format!("1-{}", self.max),
        })
    }
}
