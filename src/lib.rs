//! # topodeploy - Build plans for emulated network topologies
//!
//! This library turns a declarative JSON topology (routers, controllers,
//! point-to-point subnets, VLLs, pseudowires and virtual switches) into an
//! ordered, fully property-resolved build plan, and executes that plan on an
//! emulation backend.
//!
//! ## Overview
//!
//! A deployment is a strict, single-threaded sequence:
//!
//! 1. **Parse** the topology file (`topology`), in either the categorised
//!    (version 1) or the graph (version 2) format.
//! 2. **Resolve** missing properties (`properties`): loopbacks, link
//!    addressing, overlay addressing and service identifiers. Topologies
//!    exported as "autogenerated" are used as-is.
//! 3. **Compile** the build plan (`plan`): node creation, the coexistence
//!    mechanism, management wiring, links and overlays, with every node
//!    reference resolved through the reference index.
//! 4. **Execute** the plan on an `EmulationBackend` (`backend`).
//! 5. **Persist** the backend's status document (`snapshot`).
//!
//! Any validation or resolution failure stops the sequence before a single
//! operation reaches the backend.
//!
//! ## Architecture
//!
//! - `config`: `DeployConfig` and its YAML representation
//! - `config_loader`: configuration file loading and CLI overrides
//! - `topology`: topology model, file parser and structural validation
//! - `ip`: subnet arithmetic, allocation registry and pool allocators
//! - `properties`: deterministic property generation and resolution
//! - `plan`: build operations, reference index, management policies, compiler
//! - `backend`: the backend trait, plan execution and the dry-run backend
//! - `snapshot`: status snapshot persistence
//! - `orchestrator`: the end-to-end deployment flow
//! - `error`: the crate-wide `DeployError`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use topodeploy::backend::DryRunBackend;
//! use topodeploy::{config_loader, orchestrator};
//!
//! let config = config_loader::load_config(Path::new("topodeploy.yaml"))?;
//! let mut backend = DryRunBackend::new();
//! let status = orchestrator::deploy(&config, Path::new("topo/version2.json"), &mut backend)?;
//! println!("{}", status);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Configuration Format
//!
//! ```yaml
//! topology_version: 2
//! nodeinfo_path: /tmp/overall_info.json
//! management:
//!   policy: distributed        # or single_connection
//!   node_name: mgm1
//! addressing:
//!   loopback_pool: "172.16.0.0/16"
//!   link_pool: "10.0.0.0/16"
//!   link_prefix_len: 24
//! coexistence:
//!   kind: COEXH
//!   id: 0
//! ```
//!
//! ## Error Handling
//!
//! Each stage has its own `thiserror` enum, gathered in `DeployError`. The
//! orchestration layer and the binary report errors through `color_eyre`
//! with context.

pub mod config;
pub mod config_loader;
pub mod error;

pub mod topology;
pub mod ip;
pub mod properties;
pub mod plan;
pub mod backend;
pub mod snapshot;
pub mod orchestrator;

pub use error::DeployError;
