//! # skiff-network
//!
//! The network subsystem of the skiff container runtime:
//!
//! - [`NetworkManager`]: the per-process registry of defined networks
//!   and drivers, backed by one JSON file per network
//! - [`bridge::BridgeDriver`]: virtual bridge devices and NAT masquerade
//! - [`IpAllocator`]: persisted bitmap allocator for container IPs
//! - [`veth::VethPair`]: virtual ethernet pairs
//! - [`netns`]: scoped network-namespace switching
//! - [`portmap`]: DNAT port forwarding

#![warn(missing_docs)]

pub mod bridge;
pub mod ipam;
pub mod manager;
pub mod netns;
pub mod portmap;
pub mod veth;

pub use bridge::BridgeDriver;
pub use ipam::IpAllocator;
pub use manager::{Endpoint, Network, NetworkDriver, NetworkManager};
pub use portmap::PortMapping;
pub use veth::VethPair;
