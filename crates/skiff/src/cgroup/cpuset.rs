//! Cpuset controller.

use skiff_common::SkiffResult;

use super::hierarchy::cgroup_path;
use super::{ResourceConfig, Subsystem};

/// Pins the group to a set of CPUs through `cpuset.cpus`.
#[derive(Debug, Default)]
pub struct CpusetSubsystem;

impl Subsystem for CpusetSubsystem {
    fn name(&self) -> &str {
        "cpuset"
    }

    fn set(&self, path: &str, res: &ResourceConfig) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, true)?;
        if let Some(cpus) = &res.cpuset {
            // A fresh cpuset group refuses tasks until both cpus and
            // mems are populated.
            std::fs::write(group.join("cpuset.cpus"), cpus)?;
            std::fs::write(group.join("cpuset.mems"), "0")?;
            tracing::debug!(path, cpus = %cpus, "Set cpuset");
        }
        Ok(())
    }

    fn apply(&self, path: &str, pid: u32) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, false)?;
        std::fs::write(group.join("tasks"), pid.to_string())?;
        tracing::debug!(path, pid, "Added process to cpuset cgroup");
        Ok(())
    }

    fn remove(&self, path: &str) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, false)?;
        if group.exists() {
            std::fs::remove_dir(group)?;
        }
        Ok(())
    }
}
