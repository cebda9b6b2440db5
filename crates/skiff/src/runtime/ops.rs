#![allow(unsafe_code)]
//! Lifecycle operations over persisted container records.

use std::fs::File;

use skiff_common::{SkiffError, SkiffPaths, SkiffResult};
use skiff_network::NetworkManager;

use crate::exec::{ENV_EXEC_CMD, ENV_EXEC_PID};

use super::record::Status;
use super::store::RecordStore;

/// Stop a container: SIGTERM its init process and mark the record
/// stopped with a blank pid.
pub fn stop(paths: &SkiffPaths, name: &str) -> SkiffResult<()> {
    let store = RecordStore::new(paths);
    let mut record = store.load(name)?;

    let pid: i32 = record
        .pid
        .trim()
        .parse()
        .map_err(|_| SkiffError::Config {
            message: format!("container {name} has no recorded pid"),
        })?;

    // Safety: plain signal send to a recorded pid.
    if unsafe { libc::kill(pid, libc::SIGTERM) } != 0 {
        return Err(SkiffError::Io(std::io::Error::last_os_error()));
    }

    record.status = Status::Stopped;
    record.pid = String::new();
    store.save(&record)?;

    tracing::info!(name, "Container stopped");
    Ok(())
}

/// Remove a stopped container: release its network allocation and
/// delete its record.
pub fn remove(paths: &SkiffPaths, name: &str) -> SkiffResult<()> {
    let store = RecordStore::new(paths);
    let record = store.load(name)?;

    if record.status != Status::Stopped {
        return Err(SkiffError::Config {
            message: format!("cannot remove {name}: container is {}", record.status),
        });
    }

    if !record.network.is_empty() {
        let mut manager = NetworkManager::new(paths)?;
        manager.release(&record.network, &record.ipaddress, &record.portmapping);
    }

    store.delete(name)?;
    tracing::info!(name, "Container removed");
    Ok(())
}

/// Print a container's log file.
pub fn logs(paths: &SkiffPaths, name: &str) -> SkiffResult<()> {
    let path = paths.container_log(name);
    if !path.exists() {
        return Err(SkiffError::ContainerNotFound {
            name: name.to_string(),
        });
    }
    let content = std::fs::read_to_string(&path)?;
    print!("{content}");
    Ok(())
}

/// Print the table of known containers.
pub fn list(paths: &SkiffPaths) -> SkiffResult<()> {
    let records = RecordStore::new(paths).list()?;

    println!(
        "{:<14} {:<16} {:<8} {:<9} {:<16} {:<24} {}",
        "ID", "NAME", "PID", "STATUS", "IP", "COMMAND", "CREATED"
    );
    for r in records {
        println!(
            "{:<14} {:<16} {:<8} {:<9} {:<16} {:<24} {}",
            r.id, r.name, r.pid, r.status, r.ipaddress, r.command, r.created_time
        );
    }
    Ok(())
}

/// Package a container's merged filesystem into an image tarball.
pub fn commit(paths: &SkiffPaths, name: &str, image: &str) -> SkiffResult<()> {
    let merged = paths.container_merged(name);
    if !merged.exists() {
        return Err(SkiffError::ContainerNotFound {
            name: name.to_string(),
        });
    }

    std::fs::create_dir_all(paths.images())?;
    let tar_path = paths.image_tar(image);

    let file = File::create(&tar_path)?;
    let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.append_dir_all(".", &merged)?;
    builder.into_inner()?.finish()?;

    tracing::info!(name, image, tar = %tar_path.display(), "Container committed");
    Ok(())
}

/// Run a command inside an existing container by re-executing the
/// binary with the exec environment set; the re-executed process joins
/// the container's namespaces before doing anything else.
pub fn exec(paths: &SkiffPaths, name: &str, command: &[String]) -> SkiffResult<()> {
    let record = RecordStore::new(paths).load(name)?;
    if record.pid.trim().is_empty() {
        return Err(SkiffError::Config {
            message: format!("container {name} is not running"),
        });
    }

    let cmd_line = command.join(" ");
    tracing::info!(name, pid = %record.pid, command = %cmd_line, "Entering container");

    let status = std::process::Command::new("/proc/self/exe")
        .arg("exec")
        .env(ENV_EXEC_PID, record.pid.trim())
        .env(ENV_EXEC_CMD, &cmd_line)
        .status()?;

    if !status.success() {
        tracing::error!(name, %status, "Command in container failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::record::ContainerRecord;

    fn record(name: &str, status: Status) -> ContainerRecord {
        ContainerRecord {
            pid: "100".to_string(),
            id: "1a2b3c4d5e6f".to_string(),
            name: name.to_string(),
            command: "top".to_string(),
            created_time: "2026/08/07 12:00:00".to_string(),
            status,
            volume: String::new(),
            network: String::new(),
            ipaddress: String::new(),
            portmapping: Vec::new(),
        }
    }

    #[test]
    fn remove_refuses_running_container() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SkiffPaths::with_root(dir.path());
        let store = RecordStore::new(&paths);
        store.save(&record("web", Status::Running)).unwrap();

        assert!(remove(&paths, "web").is_err());
        assert!(store.exists("web"));
    }

    #[test]
    fn remove_deletes_stopped_container() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SkiffPaths::with_root(dir.path());
        let store = RecordStore::new(&paths);
        store.save(&record("web", Status::Stopped)).unwrap();

        remove(&paths, "web").unwrap();
        assert!(!store.exists("web"));
    }

    #[test]
    fn stop_requires_a_known_container() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SkiffPaths::with_root(dir.path());

        assert!(matches!(
            stop(&paths, "ghost"),
            Err(SkiffError::ContainerNotFound { .. })
        ));
    }
}
