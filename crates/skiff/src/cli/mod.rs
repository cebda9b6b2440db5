//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use skiff_common::{ResourceQuantity, SkiffPaths};
use skiff_network::NetworkManager;

use crate::cgroup::ResourceConfig;
use crate::runtime::RunOptions;

/// skiff - minimal container runtime
#[derive(Parser)]
#[command(name = "skiff")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Root directory for skiff data
    #[arg(long, global = true, env = "SKIFF_ROOT")]
    pub root: Option<PathBuf>,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Create and start a container
    Run {
        /// Image providing the root filesystem
        image: String,

        /// Command to run inside the container
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,

        /// Attach a pseudo-terminal
        #[arg(short = 't', long)]
        tty: bool,

        /// Run detached
        #[arg(short, long)]
        detach: bool,

        /// Memory limit (e.g. 100m)
        #[arg(short, long)]
        memory: Option<String>,

        /// Relative CPU weight
        #[arg(long)]
        cpushare: Option<u64>,

        /// CPUs the container may use (e.g. 0-2)
        #[arg(long)]
        cpuset: Option<String>,

        /// Container name (defaults to the generated ID)
        #[arg(long)]
        name: Option<String>,

        /// Volume spec, hostPath:containerPath
        #[arg(short, long)]
        volume: Option<String>,

        /// Environment entries, KEY=VALUE
        #[arg(short, long)]
        env: Vec<String>,

        /// Network to attach the container to
        #[arg(long)]
        net: Option<String>,

        /// Port mappings, hostPort:containerPort
        #[arg(short, long = "port")]
        port: Vec<String>,
    },

    /// Init the container process (internal, invoked by run)
    #[command(hide = true)]
    Init,

    /// Stop a running container
    Stop {
        /// Container name
        name: String,
    },

    /// Remove a stopped container
    #[command(alias = "rm")]
    Remove {
        /// Container name
        name: String,
    },

    /// List containers
    #[command(alias = "ps")]
    List,

    /// Print a container's log
    Logs {
        /// Container name
        name: String,
    },

    /// Run a command inside a running container
    Exec {
        /// Container name
        name: String,

        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },

    /// Package a container's filesystem into an image tarball
    Commit {
        /// Container name
        name: String,

        /// Target image name
        image: String,
    },

    /// Manage container networks
    Network {
        /// Network operation.
        #[command(subcommand)]
        command: NetworkCommands,
    },
}

/// Network subcommands.
#[derive(Subcommand)]
pub enum NetworkCommands {
    /// Define a network
    Create {
        /// Network name
        name: String,

        /// Subnet in CIDR notation (e.g. 172.18.0.0/24)
        #[arg(long)]
        subnet: String,

        /// Network driver
        #[arg(long, default_value = "bridge")]
        driver: String,
    },

    /// List defined networks
    List,

    /// Remove a defined network
    #[command(alias = "rm")]
    Remove {
        /// Network name
        name: String,
    },
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        let paths = match &self.root {
            Some(root) => SkiffPaths::with_root(root.clone()),
            None => SkiffPaths::new(),
        };

        match self.command {
            Commands::Run {
                image,
                command,
                tty,
                detach,
                memory,
                cpushare,
                cpuset,
                name,
                volume,
                env,
                net,
                port,
            } => {
                // tty and detach are mutually exclusive; detach wins.
                let tty = tty && !detach;

                let memory = memory
                    .as_deref()
                    .map(ResourceQuantity::parse)
                    .transpose()
                    .map_err(|e| eyre!("invalid memory limit: {e}"))?;

                let opts = RunOptions {
                    tty,
                    command,
                    env,
                    port_mappings: port,
                    resources: ResourceConfig {
                        memory,
                        cpu_shares: cpushare,
                        cpuset,
                    },
                    name,
                    volume: volume.unwrap_or_default(),
                    image,
                    network: net.unwrap_or_default(),
                };

                crate::runtime::run(&paths, opts)
                    .await
                    .map_err(|e| eyre!("Failed to run container: {e}"))
            }

            Commands::Init => crate::exec::run_container_init()
                .map_err(|e| eyre!("Container init failed: {e}")),

            Commands::Stop { name } => crate::runtime::stop(&paths, &name)
                .map_err(|e| eyre!("Failed to stop container: {e}")),

            Commands::Remove { name } => crate::runtime::remove(&paths, &name)
                .map_err(|e| eyre!("Failed to remove container: {e}")),

            Commands::List => {
                crate::runtime::list(&paths).map_err(|e| eyre!("Failed to list containers: {e}"))
            }

            Commands::Logs { name } => {
                crate::runtime::logs(&paths, &name).map_err(|e| eyre!("Failed to read logs: {e}"))
            }

            Commands::Exec { name, command } => crate::runtime::exec(&paths, &name, &command)
                .map_err(|e| eyre!("Failed to exec in container: {e}")),

            Commands::Commit { name, image } => crate::runtime::commit(&paths, &name, &image)
                .map_err(|e| eyre!("Failed to commit container: {e}")),

            Commands::Network { command } => execute_network(&paths, command),
        }
    }
}

fn execute_network(paths: &SkiffPaths, command: NetworkCommands) -> Result<()> {
    let mut manager =
        NetworkManager::new(paths).map_err(|e| eyre!("Failed to load networks: {e}"))?;

    match command {
        NetworkCommands::Create {
            name,
            subnet,
            driver,
        } => {
            manager
                .create_network(&driver, &subnet, &name)
                .map_err(|e| eyre!("Failed to create network: {e}"))?;
            println!("Network {name} created");
            Ok(())
        }

        NetworkCommands::List => {
            println!("{:<16} {:<20} {}", "NAME", "IPRANGE", "DRIVER");
            for network in manager.networks() {
                println!(
                    "{:<16} {:<20} {}",
                    network.name, network.ip_range, network.driver
                );
            }
            Ok(())
        }

        NetworkCommands::Remove { name } => {
            manager
                .delete_network(&name)
                .map_err(|e| eyre!("Failed to remove network: {e}"))?;
            println!("Network {name} removed");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_flags_parse() {
        let cli = Cli::parse_from([
            "skiff", "run", "-t", "--memory", "100m", "--name", "web", "-v", "/a:/b", "--net",
            "testnet", "-p", "8080:80", "busybox", "sh", "-c", "top",
        ]);
        match cli.command {
            Commands::Run {
                image,
                command,
                tty,
                memory,
                name,
                volume,
                net,
                port,
                ..
            } => {
                assert_eq!(image, "busybox");
                assert_eq!(command, vec!["sh", "-c", "top"]);
                assert!(tty);
                assert_eq!(memory.as_deref(), Some("100m"));
                assert_eq!(name.as_deref(), Some("web"));
                assert_eq!(volume.as_deref(), Some("/a:/b"));
                assert_eq!(net.as_deref(), Some("testnet"));
                assert_eq!(port, vec!["8080:80"]);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn remove_alias_parses() {
        let cli = Cli::parse_from(["skiff", "rm", "web"]);
        assert!(matches!(cli.command, Commands::Remove { .. }));
    }

    #[test]
    fn network_create_parses() {
        let cli = Cli::parse_from([
            "skiff", "network", "create", "testnet", "--subnet", "172.18.0.0/24",
        ]);
        match cli.command {
            Commands::Network {
                command: NetworkCommands::Create { name, subnet, driver },
            } => {
                assert_eq!(name, "testnet");
                assert_eq!(subnet, "172.18.0.0/24");
                assert_eq!(driver, "bridge");
            }
            _ => panic!("expected network create"),
        }
    }
}
