//! The persisted container record.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The init process is running.
    Running,
    /// Stopped by `skiff stop`.
    Stopped,
    /// The process exited on its own.
    Exited,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Running => "running",
            Status::Stopped => "stopped",
            Status::Exited => "exited",
        };
        write!(f, "{s}")
    }
}

/// Everything the lifecycle commands need to know about a container,
/// persisted as one JSON file per container. The file is the durable
/// source of truth consumed by stop, remove and exec.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Host PID of the init process; blank once the container stopped.
    pub pid: String,
    /// Generated container ID.
    pub id: String,
    /// Human name; defaults to the ID.
    pub name: String,
    /// Command line running inside the container.
    pub command: String,
    /// Creation timestamp.
    #[serde(rename = "createTime")]
    pub created_time: String,
    /// Current lifecycle state.
    pub status: Status,
    /// `hostPath:containerPath` volume spec, or empty.
    pub volume: String,
    /// Name of the attached network, or empty.
    pub network: String,
    /// Address allocated on the network, or empty.
    pub ipaddress: String,
    /// `hostPort:containerPort` forwarding entries.
    pub portmapping: Vec<String>,
}
