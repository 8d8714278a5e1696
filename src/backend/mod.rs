//! Emulation backend interface and plan execution.
//!
//! A backend owns the live emulated network. The core only talks to it
//! through [`EmulationBackend`]; [`execute`] feeds it a compiled plan in
//! order and stops at the first rejected operation.

pub mod dry_run;

pub use dry_run::{DeploymentStatus, DryRunBackend};

use crate::config::CoexistenceKind;
use crate::plan::{BuildOperation, BuildPlan, NodeHandle};
use crate::topology::{NodeRole, PropertyBag};
use log::{debug, info};

/// Errors reported by a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Node {0} already exists")]
    DuplicateNode(String),

    #[error("Node {0} does not exist")]
    UnknownNode(String),

    #[error("Backend is already started")]
    AlreadyStarted,

    #[error("Backend rejected the request: {0}")]
    Rejected(String),

    #[error("Operation #{index} ({operation}) failed: {source}")]
    Operation {
        index: usize,
        operation: String,
        #[source]
        source: Box<BackendError>,
    },
}

/// Constructors and lifecycle of an emulated network
pub trait EmulationBackend {
    /// Backend-side node reference
    type Node: Clone;

    fn add_core_router(&mut self, name: &str, properties: &PropertyBag) -> Result<Self::Node, BackendError>;
    fn add_edge_router(&mut self, name: &str, properties: &PropertyBag) -> Result<Self::Node, BackendError>;
    fn add_customer_edge_router(&mut self, name: &str, properties: &PropertyBag) -> Result<Self::Node, BackendError>;
    fn add_controller(&mut self, name: &str, properties: &PropertyBag) -> Result<Self::Node, BackendError>;
    fn add_management(&mut self, name: &str) -> Result<Self::Node, BackendError>;

    fn add_coexistence_mechanism(&mut self, kind: CoexistenceKind, id: u32) -> Result<(), BackendError>;

    fn add_link(&mut self, lhs: &Self::Node, rhs: &Self::Node, properties: &PropertyBag) -> Result<(), BackendError>;
    fn add_vll(&mut self, lhs: &Self::Node, rhs: &Self::Node, properties: &PropertyBag) -> Result<(), BackendError>;
    fn add_pw(&mut self, lhs: &Self::Node, rhs: &Self::Node, properties: &PropertyBag) -> Result<(), BackendError>;
    fn add_vs(&mut self, members: &[Self::Node], properties: &PropertyBag) -> Result<(), BackendError>;

    fn node_by_name(&self, name: &str) -> Option<Self::Node>;

    /// Start the network and describe what is running
    fn start(&mut self) -> Result<serde_json::Value, BackendError>;

    /// Tear everything down. Stopping an idle backend is not an error.
    fn stop(&mut self) -> Result<(), BackendError>;
}

/// Apply every operation of the plan, in order
pub fn execute<B: EmulationBackend>(plan: &BuildPlan, backend: &mut B) -> Result<(), BackendError> {
    info!("Executing {} build operations", plan.len());
    for (index, operation) in plan.iter().enumerate() {
        debug!("Applying operation #{}: {}", index, operation);
        apply(operation, backend).map_err(|source| BackendError::Operation {
            index,
            operation: operation.to_string(),
            source: Box::new(source),
        })?;
    }
    Ok(())
}

fn resolve<B: EmulationBackend>(backend: &B, handle: &NodeHandle) -> Result<B::Node, BackendError> {
    backend
        .node_by_name(&handle.name)
        .ok_or_else(|| BackendError::UnknownNode(handle.name.clone()))
}

fn apply<B: EmulationBackend>(operation: &BuildOperation, backend: &mut B) -> Result<(), BackendError> {
    match operation {
        BuildOperation::CreateNode { node, properties } => {
            let name = node.name.as_str();
            match node.role {
                NodeRole::CoreRouter => backend.add_core_router(name, properties)?,
                NodeRole::EdgeRouter => backend.add_edge_router(name, properties)?,
                NodeRole::CustomerEdgeRouter => backend.add_customer_edge_router(name, properties)?,
                NodeRole::Controller => backend.add_controller(name, properties)?,
                NodeRole::Management => backend.add_management(name)?,
            };
            Ok(())
        }
        BuildOperation::CreateCoexistenceMechanism { kind, id } => backend.add_coexistence_mechanism(*kind, *id),
        BuildOperation::CreateManagementLink {
            node,
            management,
            properties,
        } => {
            let node = resolve(backend, node)?;
            let management = resolve(backend, management)?;
            backend.add_link(&node, &management, properties)
        }
        BuildOperation::CreateLink { lhs, rhs, properties } => {
            let lhs = resolve(backend, lhs)?;
            let rhs = resolve(backend, rhs)?;
            backend.add_link(&lhs, &rhs, properties)
        }
        BuildOperation::CreateVll { lhs, rhs, properties } => {
            let lhs = resolve(backend, lhs)?;
            let rhs = resolve(backend, rhs)?;
            backend.add_vll(&lhs, &rhs, properties)
        }
        BuildOperation::CreatePw { lhs, rhs, properties } => {
            let lhs = resolve(backend, lhs)?;
            let rhs = resolve(backend, rhs)?;
            backend.add_pw(&lhs, &rhs, properties)
        }
        BuildOperation::CreateVs { members, properties } => {
            let members = members
                .iter()
                .map(|member| resolve(backend, member))
                .collect::<Result<Vec<_>, _>>()?;
            backend.add_vs(&members, properties)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str, role: NodeRole, ordinal: usize) -> NodeHandle {
        NodeHandle {
            name: name.to_string(),
            role,
            ordinal,
        }
    }

    fn create(name: &str, role: NodeRole, ordinal: usize) -> BuildOperation {
        BuildOperation::CreateNode {
            node: handle(name, role, ordinal),
            properties: PropertyBag::new(),
        }
    }

    #[test]
    fn test_execute_in_order() {
        let mut plan = BuildPlan::new();
        plan.push(create("cro1", NodeRole::CoreRouter, 0));
        plan.push(create("peo1", NodeRole::EdgeRouter, 1));
        plan.push(BuildOperation::CreateLink {
            lhs: handle("cro1", NodeRole::CoreRouter, 0),
            rhs: handle("peo1", NodeRole::EdgeRouter, 1),
            properties: PropertyBag::new(),
        });

        let mut backend = DryRunBackend::new();
        execute(&plan, &mut backend).unwrap();
        assert_eq!(backend.node_names(), vec!["cro1", "peo1"]);
        assert_eq!(backend.link_count(), 1);
    }

    #[test]
    fn test_execute_stops_at_first_failure() {
        let mut plan = BuildPlan::new();
        plan.push(create("cro1", NodeRole::CoreRouter, 0));
        plan.push(BuildOperation::CreateVll {
            lhs: handle("cro1", NodeRole::CoreRouter, 0),
            rhs: handle("cer9", NodeRole::CustomerEdgeRouter, 5),
            properties: PropertyBag::new(),
        });
        plan.push(create("cro2", NodeRole::CoreRouter, 1));

        let mut backend = DryRunBackend::new();
        let err = execute(&plan, &mut backend).unwrap_err();
        match err {
            BackendError::Operation { index, operation, source } => {
                assert_eq!(index, 1);
                assert_eq!(operation, "create VLL cro1-cer9");
                assert!(matches!(*source, BackendError::UnknownNode(ref name) if name == "cer9"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(backend.node_names(), vec!["cro1"]);
    }
}
