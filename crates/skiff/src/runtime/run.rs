//! The `run` orchestration: workspace, launch, limits, network, record.

use std::fs::File;
use std::io::Write;

use skiff_common::{ContainerId, SkiffError, SkiffPaths, SkiffResult};
use skiff_network::NetworkManager;

use crate::cgroup::{CgroupManager, ResourceConfig};
use crate::exec;
use crate::filesystem;

use super::record::{ContainerRecord, Status};
use super::store::RecordStore;

/// Everything the run command collects from its flags.
#[derive(Debug, Default)]
pub struct RunOptions {
    /// Attach the caller's terminal to the container.
    pub tty: bool,
    /// Command line to run inside the container.
    pub command: Vec<String>,
    /// Extra `KEY=VALUE` environment entries.
    pub env: Vec<String>,
    /// `hostPort:containerPort` forwarding entries.
    pub port_mappings: Vec<String>,
    /// Resource limits.
    pub resources: ResourceConfig,
    /// Container name; defaults to the generated ID.
    pub name: Option<String>,
    /// `hostPath:containerPath` volume spec, or empty.
    pub volume: String,
    /// Image providing the read-only layer.
    pub image: String,
    /// Network to attach to, or empty.
    pub network: String,
}

/// Destroys the control group when the orchestration scope exits, on
/// every path.
struct CgroupGuard(CgroupManager);

impl Drop for CgroupGuard {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

/// Create and start a container.
///
/// Attached runs (`tty`) block until the container exits and then tear
/// everything down; detached runs return as soon as the record is
/// persisted and leave lifecycle completion to `stop`/`remove`.
pub async fn run(paths: &SkiffPaths, opts: RunOptions) -> SkiffResult<()> {
    if opts.command.is_empty() {
        return Err(SkiffError::Config {
            message: "missing container command".to_string(),
        });
    }
    paths.create_dirs()?;

    let id = ContainerId::generate();
    let name = opts
        .name
        .clone()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| id.to_string());

    let store = RecordStore::new(paths);
    if store.exists(&name) {
        return Err(SkiffError::Config {
            message: format!("container name {name} is already in use"),
        });
    }

    let (mut child, pipe) =
        exec::launch(paths, opts.tty, &name, &opts.volume, &opts.image, &opts.env)?;
    let pid = child.id();

    let mut record = ContainerRecord {
        pid: pid.to_string(),
        id: id.to_string(),
        name: name.clone(),
        command: opts.command.join(" "),
        created_time: chrono::Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
        status: Status::Running,
        volume: opts.volume.clone(),
        network: opts.network.clone(),
        ipaddress: String::new(),
        portmapping: opts.port_mappings.clone(),
    };

    let cgroups = CgroupGuard(CgroupManager::new(format!("skiff-{name}")));
    cgroups.0.set(&opts.resources)?;
    cgroups.0.apply(pid)?;

    let mut networks = None;
    if !opts.network.is_empty() {
        let mut manager = NetworkManager::new(paths)?;
        let ip = manager.connect(&opts.network, &record.id, &record.pid, &record.portmapping)?;
        record.ipaddress = ip.to_string();
        networks = Some(manager);
    }

    store.save(&record)?;

    send_startup_command(&opts.command, pipe)?;

    if opts.tty {
        let status = tokio::task::spawn_blocking(move || child.wait())
            .await
            .map_err(|e| SkiffError::Internal {
                message: format!("wait task failed: {e}"),
            })??;
        tracing::info!(name = %record.name, code = ?status.code(), "Container exited");

        record.status = Status::Exited;
        record.pid = String::new();
        store.save(&record)?;

        if let Some(manager) = networks.as_mut() {
            manager.release(&record.network, &record.ipaddress, &record.portmapping);
        }
        filesystem::teardown(paths, &opts.volume, &record.name, &opts.image);
        store.delete(&record.name)?;
    }

    Ok(())
}

/// Write the command line down the startup pipe and close it, which
/// unblocks the init role's read.
fn send_startup_command(command: &[String], mut pipe: File) -> SkiffResult<()> {
    let line = command.join(" ");
    tracing::info!(command = %line, "Sending startup command");
    pipe.write_all(line.as_bytes())?;
    Ok(())
}
