//! Network registry and container attachment.
//!
//! [`NetworkManager`] owns the set of defined networks (one JSON file
//! per network on disk), the registered drivers, and the IP allocator.
//! It is constructed once per process and passed by reference; it is
//! not safe for concurrent use from multiple processes.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use skiff_common::{SkiffError, SkiffPaths, SkiffResult};

use crate::bridge::BridgeDriver;
use crate::ipam::IpAllocator;
use crate::netns;
use crate::portmap;
use crate::veth::{run_ip, VethPair};

/// A defined container network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    /// Network name; doubles as the bridge device name and the
    /// persisted file name.
    #[serde(rename = "Name")]
    pub name: String,
    /// The network's address range.
    #[serde(rename = "IPRange", with = "cidr")]
    pub ip_range: Ipv4Network,
    /// Name of the driver managing this network.
    #[serde(rename = "Driver")]
    pub driver: String,
}

impl Network {
    /// The gateway address: the first host address of the range,
    /// assigned to the bridge device at creation time.
    ///
    /// # Errors
    ///
    /// Fails for degenerate ranges (/31, /32) with no host addresses.
    pub fn gateway(&self) -> SkiffResult<Ipv4Addr> {
        self.ip_range.nth(1).ok_or_else(|| SkiffError::InvalidSubnet {
            value: self.ip_range.to_string(),
        })
    }

    /// Persist this network as `<dir>/<name>`.
    pub(crate) fn dump(&self, dir: &Path) -> SkiffResult<()> {
        std::fs::create_dir_all(dir)?;
        let json = serde_json::to_string(self)?;
        std::fs::write(dir.join(&self.name), json)?;
        Ok(())
    }

    /// Load a network from its persisted file.
    pub(crate) fn load(path: &Path) -> SkiffResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// A container's attachment point to a network. Built per connect call
/// and not persisted on its own; the network is referenced by name and
/// resolved through the registry when needed.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// `<containerId>-<networkName>`.
    pub id: String,
    /// The veth pair backing this endpoint.
    pub veth: VethPair,
    /// Address allocated to the container.
    pub ip: Ipv4Addr,
    /// MAC assigned to the container-side interface.
    pub mac: String,
    /// `hostPort:containerPort` strings.
    pub port_mappings: Vec<String>,
    /// Name of the network this endpoint belongs to.
    pub network_name: String,
}

impl Endpoint {
    fn new(container_id: &str, network_name: &str, ip: Ipv4Addr, ports: &[String]) -> Self {
        let id = format!("{container_id}-{network_name}");
        Self {
            veth: VethPair::for_endpoint(&id),
            id,
            ip,
            mac: derive_mac(ip),
            port_mappings: ports.to_vec(),
            network_name: network_name.to_string(),
        }
    }
}

/// Capability contract every network driver implements.
pub trait NetworkDriver {
    /// Driver name used as the registry key.
    fn name(&self) -> &str;
    /// Create the backing devices for a network.
    fn create(&self, subnet: Ipv4Network, name: &str) -> SkiffResult<Network>;
    /// Delete a network's backing devices.
    fn delete(&self, network: &Network) -> SkiffResult<()>;
    /// Wire an endpoint's host side into the network.
    fn connect(&self, network: &Network, endpoint: &Endpoint) -> SkiffResult<()>;
    /// Detach an endpoint from the network.
    fn disconnect(&self, network: &Network, endpoint: &Endpoint) -> SkiffResult<()>;
}

/// Registry of defined networks, drivers and the address allocator.
pub struct NetworkManager {
    config_dir: PathBuf,
    ipam: IpAllocator,
    drivers: HashMap<String, Box<dyn NetworkDriver>>,
    networks: HashMap<String, Network>,
}

impl NetworkManager {
    /// Build the registry: register the bridge driver and load every
    /// network definition from the config directory.
    pub fn new(paths: &SkiffPaths) -> SkiffResult<Self> {
        let mut drivers: HashMap<String, Box<dyn NetworkDriver>> = HashMap::new();
        let bridge = BridgeDriver;
        drivers.insert(bridge.name().to_string(), Box::new(bridge));

        let config_dir = paths.networks();
        std::fs::create_dir_all(&config_dir)?;

        let mut networks = HashMap::new();
        for entry in std::fs::read_dir(&config_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            match Network::load(&path) {
                Ok(network) => {
                    networks.insert(network.name.clone(), network);
                }
                Err(err) => {
                    tracing::error!(path = %path.display(), %err, "Failed to load network");
                }
            }
        }

        tracing::debug!(count = networks.len(), "Loaded network registry");

        Ok(Self {
            config_dir,
            ipam: IpAllocator::new(paths.ipam_file()),
            drivers,
            networks,
        })
    }

    /// Define a new network and persist it.
    pub fn create_network(&mut self, driver: &str, subnet: &str, name: &str) -> SkiffResult<()> {
        let subnet: Ipv4Network = subnet.parse().map_err(|_| SkiffError::InvalidSubnet {
            value: subnet.to_string(),
        })?;
        let driver = self
            .drivers
            .get(driver)
            .ok_or_else(|| SkiffError::UnknownDriver {
                name: driver.to_string(),
            })?;

        let network = driver.create(subnet, name)?;
        network.dump(&self.config_dir)?;
        tracing::info!(name, subnet = %network.ip_range, "Network created");
        self.networks.insert(name.to_string(), network);
        Ok(())
    }

    /// Delete a defined network, its devices and its persisted file.
    pub fn delete_network(&mut self, name: &str) -> SkiffResult<()> {
        let network = self
            .networks
            .remove(name)
            .ok_or_else(|| SkiffError::NetworkNotFound {
                name: name.to_string(),
            })?;

        if let Some(driver) = self.drivers.get(&network.driver) {
            driver.delete(&network)?;
        }

        let path = self.config_dir.join(name);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        tracing::info!(name, "Network deleted");
        Ok(())
    }

    /// All defined networks, sorted by name.
    #[must_use]
    pub fn networks(&self) -> Vec<&Network> {
        let mut list: Vec<&Network> = self.networks.values().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Look up a network by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Network> {
        self.networks.get(name)
    }

    /// Attach a container to a network: allocate an address, build the
    /// endpoint, wire it to the bridge, configure the container side and
    /// install port forwarding. Returns the allocated address.
    pub fn connect(
        &mut self,
        network_name: &str,
        container_id: &str,
        pid: &str,
        port_mappings: &[String],
    ) -> SkiffResult<Ipv4Addr> {
        let network = self
            .networks
            .get(network_name)
            .ok_or_else(|| SkiffError::NetworkNotFound {
                name: network_name.to_string(),
            })?;
        let driver = self
            .drivers
            .get(&network.driver)
            .ok_or_else(|| SkiffError::UnknownDriver {
                name: network.driver.clone(),
            })?;

        let ip = self.ipam.allocate(network.ip_range)?;
        let endpoint = Endpoint::new(container_id, network_name, ip, port_mappings);

        driver.connect(network, &endpoint)?;
        configure_endpoint(&endpoint, network, pid)?;
        portmap::install(&endpoint.port_mappings, ip)?;

        tracing::info!(
            container = container_id,
            network = network_name,
            ip = %ip,
            "Container connected to network"
        );
        Ok(ip)
    }

    /// Release a container's network resources: return the address to
    /// the pool and drop its forwarding rules. Best-effort; each step
    /// logs its own failure and the rest still runs.
    pub fn release(&mut self, network_name: &str, ip: &str, port_mappings: &[String]) {
        let Some(network) = self.networks.get(network_name) else {
            tracing::error!(network = network_name, "Cannot release: no such network");
            return;
        };

        let ip: Ipv4Addr = match ip.parse() {
            Ok(ip) => ip,
            Err(_) => {
                tracing::error!(network = network_name, ip, "Cannot release: bad address");
                return;
            }
        };

        if let Err(err) = self.ipam.release(network.ip_range, ip) {
            tracing::warn!(%err, "Failed to release address");
        }
        if let Err(err) = portmap::remove(port_mappings, ip) {
            tracing::warn!(%err, "Failed to remove port forwarding rules");
        }
    }
}

/// Configure the container side of an endpoint from inside its network
/// namespace: set the MAC and address on the peer, bring peer and
/// loopback up, and route everything through the gateway.
fn configure_endpoint(endpoint: &Endpoint, network: &Network, pid: &str) -> SkiffResult<()> {
    endpoint.veth.move_peer_to_netns(pid)?;

    let peer = endpoint.veth.peer.as_str();
    let addr = format!("{}/{}", endpoint.ip, network.ip_range.prefix());
    let gateway = network.gateway()?.to_string();
    let mac = endpoint.mac.as_str();

    netns::with_netns(pid, || {
        run_ip(&["link", "set", "dev", peer, "address", mac])?;
        run_ip(&["addr", "add", &addr, "dev", peer])?;
        run_ip(&["link", "set", peer, "up"])?;
        run_ip(&["link", "set", "lo", "up"])?;
        run_ip(&["route", "add", "default", "via", &gateway])?;
        Ok(())
    })
}

/// Stable, locally-administered MAC derived from the address.
fn derive_mac(ip: Ipv4Addr) -> String {
    let o = ip.octets();
    format!("02:42:{:02x}:{:02x}:{:02x}:{:02x}", o[0], o[1], o[2], o[3])
}

/// Serialize CIDR ranges as their string notation.
mod cidr {
    use ipnetwork::Ipv4Network;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(net: &Ipv4Network, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&net.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Ipv4Network, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths(dir: &tempfile::TempDir) -> SkiffPaths {
        SkiffPaths::with_root(dir.path())
    }

    #[test]
    fn network_persists_with_stable_keys() {
        let network = Network {
            name: "testnet".to_string(),
            ip_range: "172.18.0.0/24".parse().unwrap(),
            driver: "bridge".to_string(),
        };

        let json = serde_json::to_string(&network).unwrap();
        assert!(json.contains("\"Name\":\"testnet\""));
        assert!(json.contains("\"IPRange\":\"172.18.0.0/24\""));
        assert!(json.contains("\"Driver\":\"bridge\""));

        let back: Network = serde_json::from_str(&json).unwrap();
        assert_eq!(back.ip_range, network.ip_range);
    }

    #[test]
    fn dump_and_reload_through_registry() {
        let dir = tempfile::tempdir().unwrap();
        let paths = test_paths(&dir);

        let network = Network {
            name: "backend".to_string(),
            ip_range: "10.42.0.0/16".parse().unwrap(),
            driver: "bridge".to_string(),
        };
        network.dump(&paths.networks()).unwrap();

        let manager = NetworkManager::new(&paths).unwrap();
        let loaded = manager.get("backend").expect("network should be loaded");
        assert_eq!(loaded.ip_range.to_string(), "10.42.0.0/16");
        assert_eq!(loaded.driver, "bridge");
    }

    #[test]
    fn gateway_is_first_host_address() {
        let network = Network {
            name: "testnet".to_string(),
            ip_range: "172.18.0.0/24".parse().unwrap(),
            driver: "bridge".to_string(),
        };
        assert_eq!(network.gateway().unwrap().to_string(), "172.18.0.1");
    }

    #[test]
    fn unknown_network_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut manager = NetworkManager::new(&test_paths(&dir)).unwrap();

        let result = manager.connect("ghost", "abc123", "1", &[]);
        assert!(matches!(result, Err(SkiffError::NetworkNotFound { .. })));
        assert!(matches!(
            manager.delete_network("ghost"),
            Err(SkiffError::NetworkNotFound { .. })
        ));
    }

    #[test]
    fn endpoint_mac_is_derived_from_ip() {
        let endpoint = Endpoint::new("abc123", "testnet", "172.18.0.2".parse().unwrap(), &[]);
        assert_eq!(endpoint.mac, "02:42:ac:12:00:02");
        assert_eq!(endpoint.id, "abc123-testnet");
        assert_eq!(endpoint.network_name, "testnet");
    }
}
