//! IPv4 subnet arithmetic.
//!
//! A small CIDR type used to describe address pools and to carve
//! fixed-size link subnets out of them.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Errors that can occur when parsing or building a subnet
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubnetError {
    #[error("Malformed subnet {0:?}, expected a.b.c.d/len")]
    Malformed(String),

    #[error("Prefix length {0} is longer than 32")]
    PrefixTooLong(u8),

    #[error("Subnet {0} has host bits set")]
    HostBitsSet(String),
}

/// An IPv4 network in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ipv4Subnet {
    network: Ipv4Addr,
    prefix_len: u8,
}

fn mask(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    }
}

impl Ipv4Subnet {
    pub fn new(network: Ipv4Addr, prefix_len: u8) -> Result<Self, SubnetError> {
        if prefix_len > 32 {
            return Err(SubnetError::PrefixTooLong(prefix_len));
        }
        if u32::from(network) & !mask(prefix_len) != 0 {
            return Err(SubnetError::HostBitsSet(format!("{}/{}", network, prefix_len)));
        }
        Ok(Self { network, prefix_len })
    }

    /// Build a subnet whose network address is known to be aligned to
    /// `prefix_len`. Only meant for built-in constants.
    pub(crate) const fn aligned(network: Ipv4Addr, prefix_len: u8) -> Self {
        Self { network, prefix_len }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Total number of addresses, network and broadcast included
    pub fn size(&self) -> u64 {
        1u64 << (32 - u32::from(self.prefix_len))
    }

    /// Number of assignable host addresses (zero for /31 and /32)
    pub fn host_count(&self) -> u64 {
        if self.prefix_len >= 31 {
            0
        } else {
            self.size() - 2
        }
    }

    /// The n-th host address, 1-based
    pub fn host(&self, n: u64) -> Option<Ipv4Addr> {
        if n == 0 || n > self.host_count() {
            return None;
        }
        Some(Ipv4Addr::from(u32::from(self.network) + n as u32))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask(self.prefix_len) == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &Ipv4Subnet) -> bool {
        let common = mask(self.prefix_len.min(other.prefix_len));
        u32::from(self.network) & common == u32::from(other.network) & common
    }

    /// How many subnets of `prefix_len` fit in this one
    pub fn subnet_count(&self, prefix_len: u8) -> u64 {
        if prefix_len < self.prefix_len || prefix_len > 32 {
            0
        } else {
            1u64 << u32::from(prefix_len - self.prefix_len)
        }
    }

    /// The `index`-th subnet of length `prefix_len`, in address order
    pub fn nth_subnet(&self, index: u64, prefix_len: u8) -> Option<Ipv4Subnet> {
        if index >= self.subnet_count(prefix_len) {
            return None;
        }
        let step = 1u64 << (32 - u32::from(prefix_len));
        let network = u64::from(u32::from(self.network)) + index * step;
        Some(Ipv4Subnet {
            network: Ipv4Addr::from(network as u32),
            prefix_len,
        })
    }
}

impl fmt::Display for Ipv4Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Ipv4Subnet {
    type Err = SubnetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SubnetError::Malformed(s.to_string());
        let (addr, len) = s.trim().split_once('/').ok_or_else(malformed)?;
        let network = addr.parse::<Ipv4Addr>().map_err(|_| malformed())?;
        let prefix_len = len.parse::<u8>().map_err(|_| malformed())?;
        Ipv4Subnet::new(network, prefix_len)
    }
}

impl Serialize for Ipv4Subnet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Ipv4Subnet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
