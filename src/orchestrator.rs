//! Deployment orchestrator.
//!
//! This module coordinates the whole deployment: topology parsing, property
//! resolution, plan compilation, backend execution and the status snapshot.

use crate::backend::{self, EmulationBackend};
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::plan::{BuildPlan, PlanCompiler, ReferenceIndex};
use crate::properties::PropertyResolver;
use crate::snapshot;
use crate::topology::{load_topology, validate_topology};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use serde_json::Value;
use std::path::Path;

/// Parse, validate, resolve and compile a topology file without touching a
/// backend
pub fn compile_plan(config: &DeployConfig, topology_path: &Path) -> Result<BuildPlan> {
    let version = config.format_version().map_err(DeployError::from)?;
    let topology = load_topology(topology_path, version)
        .map_err(DeployError::from)
        .wrap_err_with(|| format!("Failed to load topology '{}'", topology_path.display()))?;
    info!("Topology has {} nodes", topology.node_count());
    validate_topology(&topology).map_err(DeployError::from)?;

    let resolved = PropertyResolver::new(config)
        .resolve(topology)
        .map_err(DeployError::from)?;

    let mut index = ReferenceIndex::new();
    let plan = PlanCompiler::new(config).compile(&resolved, &mut index)?;
    Ok(plan)
}

/// Deploy a topology on `backend` and persist its status.
///
/// Returns the status document reported by the started backend. A snapshot
/// failure is reported without stopping the running network.
pub fn deploy<B: EmulationBackend>(config: &DeployConfig, topology_path: &Path, backend: &mut B) -> Result<Value> {
    let plan = compile_plan(config, topology_path)?;

    backend::execute(&plan, backend)
        .map_err(DeployError::from)
        .wrap_err("Deployment aborted by the backend")?;

    let status = backend
        .start()
        .map_err(DeployError::from)
        .wrap_err("Failed to start the emulated network")?;

    snapshot::write(&config.nodeinfo_path, &status)
        .map_err(DeployError::from)
        .wrap_err("Network is running but its node info could not be saved")?;

    info!("Deployment completed: {}", plan.summary());
    Ok(status)
}

/// Tear down whatever the backend is running, building nothing
pub fn clean_all<B: EmulationBackend>(backend: &mut B) -> Result<()> {
    info!("Cleaning all emulation state");
    backend
        .stop()
        .map_err(DeployError::from)
        .wrap_err("Failed to clean the emulation environment")?;
    Ok(())
}
