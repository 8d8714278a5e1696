use crate::ip::Ipv4Subnet;
use crate::topology::validation::is_valid_identifier;
use crate::topology::{FormatVersion, TopologyParseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;

/// Default location of the status snapshot consumed by the web GUI
pub const DEFAULT_NODEINFO_PATH: &str = "/tmp/overall_info.json";

/// Name of the synthetic management node
pub const DEFAULT_MANAGEMENT_NODE: &str = "mgm1";

/// How nodes are connected to the management node
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ManagementPolicy {
    /// Every node gets its own out-of-band link to the management node
    #[default]
    Distributed,
    /// One core router acts as the management gateway for everyone else
    SingleConnection,
}

impl fmt::Display for ManagementPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManagementPolicy::Distributed => f.write_str("distributed"),
            ManagementPolicy::SingleConnection => f.write_str("single-connection"),
        }
    }
}

/// Coexistence mechanism flavours understood by the emulation backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoexistenceKind {
    #[serde(rename = "COEXA")]
    CoexA,
    #[serde(rename = "COEXB")]
    CoexB,
    #[default]
    #[serde(rename = "COEXH")]
    CoexH,
}

impl fmt::Display for CoexistenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoexistenceKind::CoexA => f.write_str("COEXA"),
            CoexistenceKind::CoexB => f.write_str("COEXB"),
            CoexistenceKind::CoexH => f.write_str("COEXH"),
        }
    }
}

/// Deployer configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DeployConfig {
    /// Topology file format version (1 or 2)
    pub topology_version: u8,
    /// Where the status snapshot is written after a successful deployment
    pub nodeinfo_path: PathBuf,
    pub management: ManagementConfig,
    pub addressing: AddressingConfig,
    pub coexistence: CoexistenceConfig,
}

/// Management network settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ManagementConfig {
    pub policy: ManagementPolicy,
    pub node_name: String,
    /// Core router used as gateway by the single-connection policy.
    /// Defaults to the last core router of the topology file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
}

/// Address pools used by the property resolver
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AddressingConfig {
    pub loopback_pool: Ipv4Subnet,
    pub link_pool: Ipv4Subnet,
    pub link_prefix_len: u8,
    pub management_pool: Ipv4Subnet,
    pub management_prefix_len: u8,
    pub overlay_pool: Ipv4Subnet,
    pub overlay_prefix_len: u8,
    /// Highest service identifier handed to VLLs, PWs and VSs
    pub max_service_id: u32,
}

/// The singleton coexistence mechanism
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct CoexistenceConfig {
    pub kind: CoexistenceKind,
    pub id: u32,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid topology format version: {0}")]
    InvalidTopologyVersion(#[from] TopologyParseError),

    #[error("Invalid management configuration: {0}")]
    InvalidManagement(String),

    #[error("Invalid addressing configuration: {0}")]
    InvalidAddressing(String),
}

impl DeployConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.format_version()?;

        if !is_valid_identifier(&self.management.node_name) {
            return Err(ConfigError::InvalidManagement(format!(
                "management node name {:?} is not a valid identifier",
                self.management.node_name
            )));
        }
        if let Some(gateway) = &self.management.gateway {
            if !is_valid_identifier(gateway) {
                return Err(ConfigError::InvalidManagement(format!(
                    "gateway {:?} is not a valid identifier",
                    gateway
                )));
            }
            if self.management.policy != ManagementPolicy::SingleConnection {
                log::warn!("Management gateway {} is ignored by the {} policy", gateway, self.management.policy);
            }
        }

        self.addressing.validate()
    }

    /// The declared topology format version
    pub fn format_version(&self) -> Result<FormatVersion, TopologyParseError> {
        FormatVersion::try_from(self.topology_version)
    }
}

impl AddressingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, pool, prefix_len) in [
            ("link", &self.link_pool, self.link_prefix_len),
            ("management", &self.management_pool, self.management_prefix_len),
            ("overlay", &self.overlay_pool, self.overlay_prefix_len),
        ] {
            if prefix_len < pool.prefix_len() || prefix_len > 30 {
                return Err(ConfigError::InvalidAddressing(format!(
                    "{} prefix length /{} must lie between /{} and /30",
                    name,
                    prefix_len,
                    pool.prefix_len()
                )));
            }
        }

        if self.loopback_pool.host_count() == 0 {
            return Err(ConfigError::InvalidAddressing(format!(
                "loopback pool {} has no host addresses",
                self.loopback_pool
            )));
        }

        let pools = [
            ("loopback", &self.loopback_pool),
            ("link", &self.link_pool),
            ("management", &self.management_pool),
            ("overlay", &self.overlay_pool),
        ];
        for (i, (name_a, a)) in pools.iter().enumerate() {
            for (name_b, b) in &pools[i + 1..] {
                if a.overlaps(b) {
                    return Err(ConfigError::InvalidAddressing(format!(
                        "{} pool {} overlaps {} pool {}",
                        name_a, a, name_b, b
                    )));
                }
            }
        }

        if self.max_service_id == 0 {
            return Err(ConfigError::InvalidAddressing(
                "max_service_id must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default implementations
impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            topology_version: 1,
            nodeinfo_path: PathBuf::from(DEFAULT_NODEINFO_PATH),
            management: ManagementConfig::default(),
            addressing: AddressingConfig::default(),
            coexistence: CoexistenceConfig::default(),
        }
    }
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            policy: ManagementPolicy::Distributed,
            node_name: DEFAULT_MANAGEMENT_NODE.to_string(),
            gateway: None,
        }
    }
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            loopback_pool: Ipv4Subnet::aligned(Ipv4Addr::new(172, 16, 0, 0), 16),
            link_pool: Ipv4Subnet::aligned(Ipv4Addr::new(10, 0, 0, 0), 16),
            link_prefix_len: 24,
            management_pool: Ipv4Subnet::aligned(Ipv4Addr::new(10, 255, 0, 0), 16),
            management_prefix_len: 30,
            overlay_pool: Ipv4Subnet::aligned(Ipv4Addr::new(10, 1, 0, 0), 16),
            overlay_prefix_len: 24,
            max_service_id: 4094,
        }
    }
}
