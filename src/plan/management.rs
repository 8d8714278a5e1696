//! Management network wiring policies.
//!
//! Every deployment has one synthetic management node. A policy decides
//! which nodes get an out-of-band link to it.

use super::index::ReferenceIndex;
use super::operation::{BuildOperation, NodeHandle};
use crate::config::{ManagementConfig, ManagementPolicy};
use crate::error::DeployError;
use crate::properties::{PropertiesGenerator, ResolutionError};
use crate::topology::validation::entity_label;
use crate::topology::{EntityCategory, Topology, ValidationError};
use log::info;

/// Everything a policy may look at while wiring
pub struct WiringContext<'a> {
    pub topology: &'a Topology,
    pub index: &'a ReferenceIndex,
    pub management: &'a NodeHandle,
}

pub trait ManagementWiringPolicy {
    fn name(&self) -> &'static str;

    /// Emit the management link operations, in order
    fn wire(
        &self,
        ctx: &WiringContext<'_>,
        generator: &mut PropertiesGenerator,
    ) -> Result<Vec<BuildOperation>, DeployError>;
}

/// Select the policy named by the configuration
pub fn policy_for(config: &ManagementConfig) -> Box<dyn ManagementWiringPolicy> {
    match config.policy {
        ManagementPolicy::Distributed => Box::new(Distributed),
        ManagementPolicy::SingleConnection => Box::new(SingleConnection {
            gateway: config.gateway.clone(),
        }),
    }
}

fn management_link(
    ordinal: usize,
    node: &NodeHandle,
    ctx: &WiringContext<'_>,
    generator: &mut PropertiesGenerator,
) -> Result<BuildOperation, DeployError> {
    let entity = entity_label(EntityCategory::ManagementLink, ordinal);
    let properties = generator
        .link_properties(&entity)
        .map_err(|source| ResolutionError::Exhausted {
            entity: entity.clone(),
            category: EntityCategory::ManagementLink,
            source,
        })?;
    info!("*** Build management link {}-{}", node, ctx.management);
    Ok(BuildOperation::CreateManagementLink {
        node: node.clone(),
        management: ctx.management.clone(),
        properties: properties.to_bag(),
    })
}

/// One management link per node
#[derive(Debug, Clone, Copy, Default)]
pub struct Distributed;

impl ManagementWiringPolicy for Distributed {
    fn name(&self) -> &'static str {
        "distributed"
    }

    fn wire(
        &self,
        ctx: &WiringContext<'_>,
        generator: &mut PropertiesGenerator,
    ) -> Result<Vec<BuildOperation>, DeployError> {
        let mut operations = Vec::with_capacity(ctx.topology.node_count());
        for (i, (_, node)) in ctx.topology.all_nodes().enumerate() {
            let handle = ctx.index.lookup(&node.id)?;
            operations.push(management_link(i, handle, ctx, generator)?);
        }
        Ok(operations)
    }
}

/// A single core router acts as gateway to the management node
#[derive(Debug, Clone, Default)]
pub struct SingleConnection {
    /// Configured gateway; the last core router when unset
    pub gateway: Option<String>,
}

impl SingleConnection {
    /// Pick the gateway core router
    pub fn gateway<'a>(&'a self, topology: &'a Topology) -> Result<&'a str, ValidationError> {
        match &self.gateway {
            Some(id) => {
                if topology.core_routers.iter().any(|cr| &cr.id == id) {
                    Ok(id.as_str())
                } else {
                    Err(ValidationError::InvalidManagementGateway { id: id.clone() })
                }
            }
            None => topology
                .core_routers
                .last()
                .map(|cr| cr.id.as_str())
                .ok_or(ValidationError::NoManagementGateway),
        }
    }
}

impl ManagementWiringPolicy for SingleConnection {
    fn name(&self) -> &'static str {
        "single-connection"
    }

    fn wire(
        &self,
        ctx: &WiringContext<'_>,
        generator: &mut PropertiesGenerator,
    ) -> Result<Vec<BuildOperation>, DeployError> {
        let gateway = self.gateway(ctx.topology)?;
        let handle = ctx.index.lookup(gateway)?;
        Ok(vec![management_link(0, handle, ctx, generator)?])
    }
}
