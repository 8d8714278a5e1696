//! IP address allocation and management module.
//!
//! This module handles address pools, sequential allocation of loopbacks,
//! link subnets and service identifiers, and the registry that keeps every
//! assigned value unique within one resolution pass.

pub mod subnet;
pub mod registry;
pub mod allocator;

// Re-export commonly used types
pub use subnet::{Ipv4Subnet, SubnetError};
pub use registry::AllocationRegistry;
pub use allocator::{HostAllocator, PoolExhausted, ServiceIdAllocator, SubnetAllocator};
