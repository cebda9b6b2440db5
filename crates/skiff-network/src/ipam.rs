//! Persisted bitmap IP address allocator.
//!
//! Allocation state is a JSON document mapping each subnet (in CIDR
//! notation) to a string of `'0'`/`'1'` characters, one per address in
//! the subnet. The file is re-read before and rewritten after every
//! operation; nothing is cached across calls. Concurrent mutation of
//! the same file from independent processes is not serialized here and
//! must be avoided by the caller.
//!
//! Bitmap index `i` maps to host offset `i + 1`, so index 0 names the
//! subnet's gateway address (base + 1). A fresh bitmap is created with
//! index 0 already marked allocated: the gateway is assigned by the
//! bridge driver at network-creation time and can never be handed out
//! or released through the allocator. The last two indices, which
//! would map to the broadcast address and past the subnet, are never
//! scanned.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use ipnetwork::Ipv4Network;
use skiff_common::{SkiffError, SkiffResult};

/// Bitmap allocator handing out IPv4 addresses within subnets.
#[derive(Debug)]
pub struct IpAllocator {
    /// Path of the persisted allocation file.
    path: PathBuf,
}

impl IpAllocator {
    /// Create an allocator backed by the given state file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Allocate a free address in `subnet`.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::SubnetExhausted`] when every usable address
    /// is taken, or an I/O error if the state file cannot be read or
    /// written.
    pub fn allocate(&self, subnet: Ipv4Network) -> SkiffResult<Ipv4Addr> {
        let subnet = normalize(subnet);
        let key = subnet.to_string();

        let mut subnets = self.load()?;
        let bitmap = subnets
            .entry(key.clone())
            .or_insert_with(|| fresh_bitmap(subnet.prefix()));

        let mut bits = std::mem::take(bitmap).into_bytes();
        let scan_end = bits.len().saturating_sub(2);
        let index = bits[..scan_end].iter().position(|&b| b == b'0');

        let Some(index) = index else {
            return Err(SkiffError::SubnetExhausted { subnet: key });
        };
        bits[index] = b'1';
        *bitmap = String::from_utf8(bits).map_err(|_| SkiffError::Internal {
            message: format!("allocation bitmap for {key} is not valid UTF-8"),
        })?;

        self.store(&subnets)?;

        let ip = offset_to_ip(subnet, index as u32 + 1);
        tracing::debug!(subnet = %key, ip = %ip, "Allocated address");
        Ok(ip)
    }

    /// Return `ip` to the pool of `subnet`.
    ///
    /// # Errors
    ///
    /// Returns an error if `ip` is outside the subnet, names the gateway
    /// or network address, or the subnet has no recorded allocations.
    pub fn release(&self, subnet: Ipv4Network, ip: Ipv4Addr) -> SkiffResult<()> {
        let subnet = normalize(subnet);
        let key = subnet.to_string();

        let offset = u32::from(ip)
            .checked_sub(u32::from(subnet.network()))
            .filter(|_| subnet.contains(ip))
            .ok_or_else(|| SkiffError::InvalidSubnet {
                value: format!("{ip} is not inside {key}"),
            })?;
        if offset <= 1 {
            return Err(SkiffError::Config {
                message: format!("refusing to release reserved address {ip} in {key}"),
            });
        }
        let index = (offset - 1) as usize;

        let mut subnets = self.load()?;
        let bitmap = subnets.get_mut(&key).ok_or_else(|| SkiffError::Config {
            message: format!("no allocation state for subnet {key}"),
        })?;

        let mut bits = std::mem::take(bitmap).into_bytes();
        if index >= bits.len() {
            return Err(SkiffError::InvalidSubnet {
                value: format!("{ip} is not inside {key}"),
            });
        }
        bits[index] = b'0';
        *bitmap = String::from_utf8(bits).map_err(|_| SkiffError::Internal {
            message: format!("allocation bitmap for {key} is not valid UTF-8"),
        })?;

        self.store(&subnets)?;
        tracing::debug!(subnet = %key, ip = %ip, "Released address");
        Ok(())
    }

    /// Load the full allocation map. A missing file means no subnet has
    /// been touched yet.
    fn load(&self) -> SkiffResult<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let json = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Rewrite the allocation file in full.
    fn store(&self, subnets: &HashMap<String, String>) -> SkiffResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(subnets)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Reduce a CIDR to its network base so "172.18.0.3/24" and
/// "172.18.0.0/24" key the same bitmap.
fn normalize(subnet: Ipv4Network) -> Ipv4Network {
    Ipv4Network::new(subnet.network(), subnet.prefix()).unwrap_or(subnet)
}

/// One character per address, gateway slot pre-reserved.
fn fresh_bitmap(prefix: u8) -> String {
    let size = 1u64 << (32 - u32::from(prefix));
    let mut bitmap = String::with_capacity(size as usize);
    bitmap.push('1');
    for _ in 1..size {
        bitmap.push('0');
    }
    bitmap
}

fn offset_to_ip(subnet: Ipv4Network, offset: u32) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(subnet.network()) + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn allocator() -> (tempfile::TempDir, IpAllocator) {
        let dir = tempfile::tempdir().unwrap();
        let ipam = IpAllocator::new(dir.path().join("subnet.json"));
        (dir, ipam)
    }

    fn subnet(s: &str) -> Ipv4Network {
        s.parse().unwrap()
    }

    #[test]
    fn first_allocation_skips_gateway() {
        let (_dir, ipam) = allocator();
        let ip = ipam.allocate(subnet("192.168.0.0/24")).unwrap();
        assert_eq!(ip, "192.168.0.2".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn allocations_are_unique_and_inside_subnet() {
        let (_dir, ipam) = allocator();
        let net = subnet("10.0.0.0/28");
        let gateway: Ipv4Addr = "10.0.0.1".parse().unwrap();

        // 16 addresses; gateway, broadcast and the two reserved tail
        // slots leave 13 allocatable ones.
        let mut seen = HashSet::new();
        for _ in 0..13 {
            let ip = ipam.allocate(net).unwrap();
            assert!(net.contains(ip), "{ip} escaped the subnet");
            assert_ne!(ip, gateway);
            assert!(seen.insert(ip), "duplicate allocation {ip}");
        }
        assert!(matches!(
            ipam.allocate(net),
            Err(SkiffError::SubnetExhausted { .. })
        ));
    }

    #[test]
    fn release_round_trip() {
        let (_dir, ipam) = allocator();
        let net = subnet("172.18.0.0/24");

        let first = ipam.allocate(net).unwrap();
        let second = ipam.allocate(net).unwrap();
        assert_ne!(first, second);

        ipam.release(net, first).unwrap();
        let again = ipam.allocate(net).unwrap();
        assert_eq!(again, first);
    }

    #[test]
    fn bitmap_length_is_power_of_two() {
        let (dir, ipam) = allocator();
        ipam.allocate(subnet("172.18.0.0/24")).unwrap();
        ipam.allocate(subnet("10.1.0.0/30")).unwrap();

        let json = std::fs::read_to_string(dir.path().join("subnet.json")).unwrap();
        let map: HashMap<String, String> = serde_json::from_str(&json).unwrap();
        assert_eq!(map["172.18.0.0/24"].len(), 256);
        assert_eq!(map["10.1.0.0/30"].len(), 4);
    }

    #[test]
    fn gateway_release_is_rejected() {
        let (_dir, ipam) = allocator();
        let net = subnet("172.18.0.0/24");
        ipam.allocate(net).unwrap();

        let gateway: Ipv4Addr = "172.18.0.1".parse().unwrap();
        assert!(ipam.release(net, gateway).is_err());
    }

    #[test]
    fn release_outside_subnet_is_rejected() {
        let (_dir, ipam) = allocator();
        let net = subnet("172.18.0.0/24");
        ipam.allocate(net).unwrap();

        let stranger: Ipv4Addr = "10.0.0.5".parse().unwrap();
        assert!(ipam.release(net, stranger).is_err());
    }

    #[test]
    fn state_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subnet.json");
        let net = subnet("192.168.10.0/24");

        let first = IpAllocator::new(&path).allocate(net).unwrap();
        // A fresh allocator over the same file sees the earlier grant.
        let second = IpAllocator::new(&path).allocate(net).unwrap();
        assert_ne!(first, second);
    }
}
