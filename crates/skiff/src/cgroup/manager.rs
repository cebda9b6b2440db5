//! Fan-out manager over the registered cgroup subsystems.

use skiff_common::SkiffResult;

use super::{CpuSubsystem, CpusetSubsystem, MemorySubsystem, ResourceConfig, Subsystem};

/// Applies and removes resource limits across every registered
/// controller for one named control group.
pub struct CgroupManager {
    /// Control-group path, relative to each hierarchy root.
    path: String,
    /// Registered controllers. Additional subsystems slot in here.
    subsystems: Vec<Box<dyn Subsystem>>,
}

impl CgroupManager {
    /// Create a manager for the control group at `path`, with the
    /// default controllers registered.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_subsystems(
            path,
            vec![
                Box::new(MemorySubsystem),
                Box::new(CpuSubsystem),
                Box::new(CpusetSubsystem),
            ],
        )
    }

    /// Create a manager with a custom subsystem set.
    pub fn with_subsystems(path: impl Into<String>, subsystems: Vec<Box<dyn Subsystem>>) -> Self {
        Self {
            path: path.into(),
            subsystems,
        }
    }

    /// The control-group path this manager operates on.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Write the limits from `res` into every subsystem. A failed
    /// write is logged and does not stop the container from starting.
    pub fn set(&self, res: &ResourceConfig) -> SkiffResult<()> {
        for subsystem in &self.subsystems {
            if let Err(err) = subsystem.set(&self.path, res) {
                tracing::warn!(
                    subsystem = subsystem.name(),
                    path = %self.path,
                    %err,
                    "Failed to set resource limit"
                );
            }
        }
        Ok(())
    }

    /// Add `pid` to the control group in every subsystem.
    pub fn apply(&self, pid: u32) -> SkiffResult<()> {
        for subsystem in &self.subsystems {
            if let Err(err) = subsystem.apply(&self.path, pid) {
                tracing::warn!(
                    subsystem = subsystem.name(),
                    path = %self.path,
                    pid,
                    %err,
                    "Failed to apply cgroup"
                );
            }
        }
        Ok(())
    }

    /// Remove the control group from every subsystem. Best-effort: a
    /// failing subsystem is logged and the rest are still removed.
    pub fn destroy(&self) {
        for subsystem in &self.subsystems {
            if let Err(err) = subsystem.remove(&self.path) {
                tracing::warn!(
                    subsystem = subsystem.name(),
                    path = %self.path,
                    %err,
                    "Failed to remove cgroup"
                );
            }
        }
    }
}
