//! CPU share controller.

use skiff_common::SkiffResult;

use super::hierarchy::cgroup_path;
use super::{ResourceConfig, Subsystem};

/// Sets the relative CPU weight through `cpu.shares`.
#[derive(Debug, Default)]
pub struct CpuSubsystem;

impl Subsystem for CpuSubsystem {
    fn name(&self) -> &str {
        "cpu"
    }

    fn set(&self, path: &str, res: &ResourceConfig) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, true)?;
        if let Some(shares) = res.cpu_shares {
            std::fs::write(group.join("cpu.shares"), shares.to_string())?;
            tracing::debug!(path, shares, "Set CPU shares");
        }
        Ok(())
    }

    fn apply(&self, path: &str, pid: u32) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, false)?;
        std::fs::write(group.join("tasks"), pid.to_string())?;
        tracing::debug!(path, pid, "Added process to cpu cgroup");
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
