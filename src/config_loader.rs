use crate::config::{DeployConfig, ManagementPolicy};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and validate a deployer configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<DeployConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration file '{}'", config_path.display()))?;

    let config: DeployConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration file '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// Load the configuration file when one is given, the defaults otherwise
pub fn load_or_default(config_path: Option<&Path>) -> Result<DeployConfig> {
    match config_path {
        Some(path) => load_config(path),
        None => {
            info!("No configuration file given, using defaults");
            Ok(DeployConfig::default())
        }
    }
}

/// Command line settings that take precedence over the YAML file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub topology_version: Option<u8>,
    pub nodeinfo_path: Option<PathBuf>,
    pub single_connection: bool,
}

/// Apply CLI overrides to a configuration
pub fn apply_cli_overrides(config: &mut DeployConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(version) = overrides.topology_version {
        info!("Topology format version overridden from the command line: {}", version);
        config.topology_version = version;
    }

    if let Some(path) = &overrides.nodeinfo_path {
        info!("Node info file overridden from the command line: {:?}", path);
        config.nodeinfo_path = path.clone();
    }

    if overrides.single_connection {
        info!("Using single-connection management wiring");
        config.management.policy = ManagementPolicy::SingleConnection;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}
