//! Status snapshot persistence.
//!
//! After a successful deployment the backend's status document is written
//! to a single JSON file (one document, one trailing newline) that the web
//! GUI polls.

use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Failed to remove previous snapshot {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {path} is not valid JSON: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Replace the snapshot at `path` with `status`
pub fn write(path: &Path, status: &Value) -> Result<(), PersistenceError> {
    let serialized = serde_json::to_string(status).map_err(|source| PersistenceError::Serde {
        path: path.to_path_buf(),
        source,
    })?;

    if path.exists() {
        fs::remove_file(path).map_err(|source| PersistenceError::Remove {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = fs::File::create(path).map_err(write_err)?;
    writeln!(file, "{}", serialized).map_err(write_err)?;
    log::info!("Node info written to {}", path.display());
    Ok(())
}

pub fn read(path: &Path) -> Result<Value, PersistenceError> {
    let content = fs::read_to_string(path).map_err(|source| PersistenceError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| PersistenceError::Serde {
        path: path.to_path_buf(),
        source,
    })
}
