use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use topodeploy::backend::{DryRunBackend, EmulationBackend};
use topodeploy::config_loader::{self, CliOverrides};
use topodeploy::orchestrator;

/// Deploy an emulated network described by a JSON topology file
#[derive(Parser, Debug)]
#[command(author, about, long_about = None, disable_version_flag = true)]
struct Args {
    /// Topology file to deploy
    #[arg(long, default_value = "topo/version2.json")]
    topology: PathBuf,

    /// File that stores the node info consumed by the web GUI
    #[arg(long)]
    nodeinfo: Option<PathBuf>,

    /// Topology file format version (1 or 2)
    #[arg(long)]
    version: Option<u8>,

    /// Optional deployer configuration YAML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connect only one core router to the management node
    #[arg(long)]
    single_connection: bool,

    /// Clean the whole emulation environment and exit
    #[arg(long)]
    stop_all: bool,

    /// Do not open the operator console after deployment
    #[arg(long)]
    no_cli: bool,

    /// Print the compiled build plan as JSON and exit
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            topology_version: self.version,
            nodeinfo_path: self.nodeinfo.clone(),
            single_connection: self.single_connection,
        }
    }
}

/// Block until the operator presses Enter
fn operator_console() -> Result<()> {
    print!("Network is up. Press Enter to stop it... ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).wrap_err("Failed to read from the console")?;
    Ok(())
}

/// Tear down the network held by `backend`; returns whether there was one
fn stop_all(backend: &mut DryRunBackend) -> Result<bool> {
    if !backend.is_started() {
        warn!("No emulated network is running in this process, there is nothing to clean");
        return Ok(false);
    }
    orchestrator::clean_all(backend)?;
    Ok(true)
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let mut backend = DryRunBackend::new();

    if args.stop_all {
        stop_all(&mut backend)?;
        return Ok(());
    }

    let mut config = config_loader::load_or_default(args.config.as_deref())?;
    config_loader::apply_cli_overrides(&mut config, &args.overrides())?;

    info!("Topology file: {:?}", args.topology);
    info!("NodeInfo file: {:?}", config.nodeinfo_path);
    info!("Management policy: {}", config.management.policy);

    if args.dry_run {
        let plan = orchestrator::compile_plan(&config, &args.topology)?;
        let json = serde_json::to_string_pretty(&plan).wrap_err("Failed to serialize the build plan")?;
        println!("{}", json);
        info!("Build plan: {}", plan.summary());
        return Ok(());
    }

    orchestrator::deploy(&config, &args.topology, &mut backend)?;

    if !args.no_cli {
        operator_console()?;
        backend.stop().wrap_err("Failed to stop the emulated network")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let args = Args::parse_from(["topodeploy"]);

        assert_eq!(args.topology, PathBuf::from("topo/version2.json"));
        assert_eq!(args.nodeinfo, None);
        assert_eq!(args.version, None);
        assert!(!args.stop_all);
        assert!(!args.no_cli);
        assert!(!args.single_connection);
    }

    #[test]
    fn test_cli_flags() {
        let args = Args::parse_from([
            "topodeploy",
            "--topology", "topo/custom.json",
            "--nodeinfo", "/tmp/info.json",
            "--version", "2",
            "--single-connection",
            "--no-cli",
        ]);

        assert_eq!(args.topology, PathBuf::from("topo/custom.json"));
        let overrides = args.overrides();
        assert_eq!(overrides.topology_version, Some(2));
        assert_eq!(overrides.nodeinfo_path, Some(PathBuf::from("/tmp/info.json")));
        assert!(overrides.single_connection);
        assert!(args.no_cli);
    }

    #[test]
    fn test_stop_all_flag() {
        let args = Args::parse_from(["topodeploy", "--stop-all"]);
        assert!(args.stop_all);
    }

    #[test]
    fn test_stop_all_without_running_network() {
        let mut backend = DryRunBackend::new();
        assert!(!stop_all(&mut backend).unwrap());
        assert!(!backend.is_started());

        backend.start().unwrap();
        assert!(stop_all(&mut backend).unwrap());
        assert!(!backend.is_started());
    }
}
