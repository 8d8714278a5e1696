//! Crate-wide error type.
//!
//! Each stage of the pipeline owns its own error enum; `DeployError` is the
//! single type the library hands back when a caller drives several stages.

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::properties::ResolutionError;
use crate::snapshot::PersistenceError;
use crate::topology::{TopologyParseError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Parse(#[from] TopologyParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Topology validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Property resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
