//! Build plan module.
//!
//! Turns a resolved topology into an ordered list of self-contained build
//! operations. Node references go through the reference index only, and
//! the management network is wired by a configurable policy.

pub mod operation;
pub mod index;
pub mod management;
pub mod compiler;

pub use compiler::{select_primary_link, PlanCompiler};
pub use index::ReferenceIndex;
pub use management::{policy_for, Distributed, ManagementWiringPolicy, SingleConnection, WiringContext};
pub use operation::{BuildOperation, BuildPlan, NodeHandle, PlanSummary};
