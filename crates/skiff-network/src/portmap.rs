//! Port forwarding via iptables DNAT rules.

use std::net::Ipv4Addr;
use std::process::Command;
use std::str::FromStr;

use skiff_common::{SkiffError, SkiffResult};

/// A `hostPort:containerPort` mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    /// Port on the host receiving inbound traffic.
    pub host_port: u16,
    /// Destination port inside the container.
    pub container_port: u16,
}

impl FromStr for PortMapping {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SkiffError::Config {
            message: format!("invalid port mapping {s:?}, expected hostPort:containerPort"),
        };
        let (host, container) = s.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            host_port: host.parse().map_err(|_| invalid())?,
            container_port: container.parse().map_err(|_| invalid())?,
        })
    }
}

/// Install a DNAT rule for every well-formed mapping, routing inbound
/// TCP on the host port to `ip:containerPort`. Malformed entries are
/// logged and skipped.
pub fn install(mappings: &[String], ip: Ipv4Addr) -> SkiffResult<()> {
    apply(mappings, ip, "-A")
}

/// Delete the DNAT rules previously installed for these mappings.
pub fn remove(mappings: &[String], ip: Ipv4Addr) -> SkiffResult<()> {
    apply(mappings, ip, "-D")
}

fn apply(mappings: &[String], ip: Ipv4Addr, action: &str) -> SkiffResult<()> {
    for raw in mappings {
        let mapping: PortMapping = match raw.parse() {
            Ok(m) => m,
            Err(err) => {
                tracing::error!(mapping = %raw, %err, "Skipping malformed port mapping");
                continue;
            }
        };

        let host_port = mapping.host_port.to_string();
        let destination = format!("{ip}:{}", mapping.container_port);
        run_iptables(&[
            "-t",
            "nat",
            action,
            "PREROUTING",
            "-p",
            "tcp",
            "-m",
            "tcp",
            "--dport",
            &host_port,
            "-j",
            "DNAT",
            "--to-destination",
            &destination,
        ])?;

        tracing::debug!(
            host_port = mapping.host_port,
            container_port = mapping.container_port,
            container_ip = %ip,
            action,
            "Updated port forwarding rule"
        );
    }
    Ok(())
}

/// Run `iptables` with the given arguments.
pub(crate) fn run_iptables(args: &[&str]) -> SkiffResult<()> {
    let output = Command::new("iptables")
        .args(args)
        .output()
        .map_err(|e| SkiffError::Command {
            program: "iptables".to_string(),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SkiffError::Command {
            program: "iptables".to_string(),
            message: format!(
                "`iptables {}` exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_mapping() {
        let mapping: PortMapping = "8080:80".parse().unwrap();
        assert_eq!(mapping.host_port, 8080);
        assert_eq!(mapping.container_port, 80);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("8080".parse::<PortMapping>().is_err());
        assert!("8080:".parse::<PortMapping>().is_err());
        assert!(":80".parse::<PortMapping>().is_err());
        assert!("a:b".parse::<PortMapping>().is_err());
        assert!("70000:80".parse::<PortMapping>().is_err());
    }
}
