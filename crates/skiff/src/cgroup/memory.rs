//! Memory controller.

use skiff_common::SkiffResult;

use super::hierarchy::cgroup_path;
use super::{ResourceConfig, Subsystem};

/// Limits memory usage through `memory.limit_in_bytes`.
#[derive(Debug, Default)]
pub struct MemorySubsystem;

impl Subsystem for MemorySubsystem {
    fn name(&self) -> &str {
        "memory"
    }

    fn set(&self, path: &str, res: &ResourceConfig) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, true)?;
        if let Some(memory) = res.memory {
            std::fs::write(
                group.join("memory.limit_in_bytes"),
                memory.as_bytes().to_string(),
            )?;
            tracing::debug!(path, limit = memory.as_bytes(), "Set memory limit");
        }
        Ok(())
    }

    fn apply(&self, path: &str, pid: u32) -> SkiffResult<()> {
        let group = cgroup_path(self.name(), path, false)?;
        std::fs::write(group.join("tasks"), pid.to_string())?;
        tracing::debug!(path, pid, "Added process to memory cgroup");
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
