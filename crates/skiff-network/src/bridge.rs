//! The bridge network driver.
//!
//! Backs a network with a Linux bridge device named after the network:
//! the bridge carries the subnet's gateway address, containers attach
//! through veth pairs enslaved to it, and a NAT masquerade rule lets
//! their traffic leave the subnet.

use ipnetwork::Ipv4Network;
use skiff_common::{SkiffError, SkiffResult};

use crate::manager::{Endpoint, Network, NetworkDriver};
use crate::portmap::run_iptables;
use crate::veth::{link_exists, run_ip};

/// Driver creating virtual bridge networks.
#[derive(Debug, Default)]
pub struct BridgeDriver;

impl NetworkDriver for BridgeDriver {
    fn name(&self) -> &str {
        "bridge"
    }

    fn create(&self, subnet: Ipv4Network, name: &str) -> SkiffResult<Network> {
        let subnet = Ipv4Network::new(subnet.network(), subnet.prefix()).map_err(|_| {
            SkiffError::InvalidSubnet {
                value: subnet.to_string(),
            }
        })?;

        let network = Network {
            name: name.to_string(),
            ip_range: subnet,
            driver: self.name().to_string(),
        };

        init_bridge(&network)?;
        Ok(network)
    }

    fn delete(&self, network: &Network) -> SkiffResult<()> {
        tracing::debug!(bridge = %network.name, "Deleting bridge device");
        run_ip(&["link", "delete", &network.name])
    }

    fn connect(&self, network: &Network, endpoint: &Endpoint) -> SkiffResult<()> {
        endpoint.veth.create()?;
        endpoint.veth.set_master(&network.name)?;
        endpoint.veth.up()?;
        tracing::debug!(
            bridge = %network.name,
            host_if = %endpoint.veth.host,
            "Endpoint attached to bridge"
        );
        Ok(())
    }

    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> SkiffResult<()> {
        tracing::debug!(
            bridge = %network.name,
            host_if = %endpoint.veth.host,
            "Detaching endpoint"
        );
        endpoint.veth.delete()
    }
}

/// Create and configure the bridge device for a network: the device
/// itself (if absent), the gateway address, link state, and the
/// masquerade rule for traffic leaving the subnet.
fn init_bridge(network: &Network) -> SkiffResult<()> {
    let bridge = network.name.as_str();

    if !link_exists(bridge) {
        run_ip(&["link", "add", "name", bridge, "type", "bridge"])?;
        tracing::debug!(bridge, "Bridge device created");
    }

    let gateway = format!("{}/{}", network.gateway()?, network.ip_range.prefix());
    run_ip(&["addr", "add", &gateway, "dev", bridge])?;
    run_ip(&["link", "set", bridge, "up"])?;

    let subnet = network.ip_range.to_string();
    run_iptables(&[
        "-t",
        "nat",
        "-A",
        "POSTROUTING",
        "-s",
        &subnet,
        "!",
        "-o",
        bridge,
        "-j",
        "MASQUERADE",
    ])?;

    tracing::info!(bridge, gateway = %gateway, "Bridge initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn driver_reports_its_name() {
        assert_eq!(BridgeDriver.name(), "bridge");
    }

    #[test]
    #[ignore = "requires root and the ip/iptables tools"]
    fn create_and_delete_bridge() {
        let driver = BridgeDriver;
        let network = driver
            .create("10.99.0.0/24".parse().unwrap(), "skiff-test0")
            .unwrap();
        assert!(link_exists("skiff-test0"));
        driver.delete(&network).unwrap();
        assert!(!link_exists("skiff-test0"));
    }
}
