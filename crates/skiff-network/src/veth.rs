//! Virtual ethernet pair management.

use std::process::Command;

use serde::{Deserialize, Serialize};
use skiff_common::{SkiffError, SkiffResult};

/// A virtual ethernet pair: one end stays on the host (attached to a
/// bridge), the peer is moved into a container's network namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VethPair {
    /// Host-side interface name.
    pub host: String,
    /// Container-side peer name.
    pub peer: String,
}

impl VethPair {
    /// Derive the pair's interface names from an endpoint ID.
    #[must_use]
    pub fn for_endpoint(endpoint_id: &str) -> Self {
        let stem: String = endpoint_id.chars().take(5).collect();
        Self {
            peer: format!("cif-{stem}"),
            host: stem,
        }
    }

    /// Create the pair on the host.
    pub fn create(&self) -> SkiffResult<()> {
        tracing::debug!(host = %self.host, peer = %self.peer, "Creating veth pair");
        run_ip(&[
            "link", "add", &self.host, "type", "veth", "peer", "name", &self.peer,
        ])
    }

    /// Enslave the host side to a bridge.
    pub fn set_master(&self, bridge: &str) -> SkiffResult<()> {
        run_ip(&["link", "set", &self.host, "master", bridge])
    }

    /// Bring the host side up.
    pub fn up(&self) -> SkiffResult<()> {
        run_ip(&["link", "set", &self.host, "up"])
    }

    /// Move the peer into the network namespace of `pid`.
    pub fn move_peer_to_netns(&self, pid: &str) -> SkiffResult<()> {
        tracing::debug!(peer = %self.peer, pid, "Moving peer into container netns");
        run_ip(&["link", "set", &self.peer, "netns", pid])
    }

    /// Delete the pair. Removing the host side tears down the peer too.
    pub fn delete(&self) -> SkiffResult<()> {
        run_ip(&["link", "delete", &self.host])
    }
}

/// Run `ip` with the given arguments, mapping failures to [`SkiffError`].
pub(crate) fn run_ip(args: &[&str]) -> SkiffResult<()> {
    let output = Command::new("ip")
        .args(args)
        .output()
        .map_err(|e| SkiffError::Command {
            program: "ip".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SkiffError::Command {
            program: "ip".to_string(),
            message: format!(
                "`ip {}` exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

/// Check whether a link with the given name exists.
pub(crate) fn link_exists(name: &str) -> bool {
    Command::new("ip")
        .args(["link", "show", name])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derived_from_endpoint_id() {
        let veth = VethPair::for_endpoint("1a2b3c4d5e6f-testnet");
        assert_eq!(veth.host, "1a2b3");
        assert_eq!(veth.peer, "cif-1a2b3");
    }

    #[test]
    fn short_endpoint_ids_are_kept_whole() {
        let veth = VethPair::for_endpoint("ab");
        assert_eq!(veth.host, "ab");
        assert_eq!(veth.peer, "cif-ab");
    }

    #[test]
    fn missing_link_is_reported_absent() {
        assert!(!link_exists("skiff-does-not-exist-0"));
    }
}
