//! Bijective, bounded mapping between domain names and synthetic IPv4
//! addresses drawn from a configured CIDR.
//!
//! Grounded on `component/fakeip/fakeip.go`: capacity is `2^hostbits - 3`
//! (network, broadcast, and interface address excluded), `Put` reuses the
//! LRU tail's IP once full, otherwise advances a monotonic cursor that wraps
//! to the network address on overflow.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::lru::Lru;

pub struct FakeIp {
    lru: Lru<String, u32>,
    net: Ipv4Net,
    network_addr: u32,
    broadcast_addr: u32,
    iface_addr: u32,
    next_ip: u32,
}

fn host_bits(net: &Ipv4Net) -> u32 {
    32 - net.prefix_len() as u32
}

fn capacity_for(net: &Ipv4Net) -> usize {
    let bits = host_bits(net);
    let room = 1u64 << bits;
    room.saturating_sub(3).max(1) as usize
}

impl FakeIp {
    /// `iface_cidr` is `ifaceAddr/prefix`, e.g. `198.18.0.1/30`: the address
    /// part is the interface address, the network part the pool's CIDR.
    pub fn new(iface_cidr: Ipv4Net) -> Self {
        Self::with_capacity(iface_cidr, capacity_for(&iface_cidr))
    }

    /// Test/embedding hook: override the computed LRU capacity.
    pub fn with_capacity(iface_cidr: Ipv4Net, capacity: usize) -> Self {
        let network = iface_cidr.network();
        let broadcast = iface_cidr.broadcast();
        let iface_addr = iface_cidr.addr();
        Self {
            lru: Lru::new(capacity),
            net: iface_cidr,
            network_addr: u32::from(network),
            broadcast_addr: u32::from(broadcast),
            iface_addr: u32::from(iface_addr),
            next_ip: u32::from(network),
        }
    }

    pub fn get_ip_by_domain(&mut self, domain: &str) -> Option<Ipv4Addr> {
        self.lru.get(&domain.to_string()).map(Ipv4Addr::from)
    }

    pub fn get_domain_by_ip(&mut self, ip: Ipv4Addr) -> Option<String> {
        if !self.net.contains(&ip) {
            return None;
        }
        self.lru.get_key_from_value(&u32::from(ip))
    }

    /// Allocates (or returns the existing) IP for `domain`.
    pub fn put(&mut self, domain: &str) -> Ipv4Addr {
        if let Some(existing) = self.lru.get(&domain.to_string()) {
            return Ipv4Addr::from(existing);
        }

        if self.lru.is_full() {
            let (_, ip) = self
                .lru
                .replace_last_key(domain.to_string())
                .expect("full lru has a tail");
            return Ipv4Addr::from(ip);
        }

        let ip = loop {
            self.next_ip = self.next_ip.wrapping_add(1);
            let candidate = Ipv4Addr::from(self.next_ip);
            if !self.net.contains(&candidate) {
                self.next_ip = self.network_addr;
                continue;
            }
            if self.next_ip == self.iface_addr || self.next_ip == self.broadcast_addr {
                continue;
            }
            if self.lru.get_key_from_value(&self.next_ip).is_none() {
                break candidate;
            }
        };

        self.lru.put(domain.to_string(), u32::from(ip));
        ip
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_ip_wrap_scenario() {
        // CIDR 198.18.0.0/30, interface 198.18.0.1, capacity = 2^2 - 3 = 1.
        let cidr: Ipv4Net = "198.18.0.1/30".parse().unwrap();
        let mut pool = FakeIp::new(cidr);

        let a = pool.put("a");
        assert_eq!(a, "198.18.0.2".parse::<Ipv4Addr>().unwrap());

        let b = pool.put("b");
        assert_eq!(b, a, "pool at capacity must reuse the tail IP");

        assert_eq!(pool.get_ip_by_domain("a"), None);
        assert_eq!(pool.get_domain_by_ip(a), Some("b".to_string()));
    }

    #[test]
    fn bijection_invariant_resident_entry() {
        let cidr: Ipv4Net = "10.0.0.1/24".parse().unwrap();
        let mut pool = FakeIp::new(cidr);
        let ip = pool.put("example.com");
        assert_eq!(pool.get_domain_by_ip(ip).as_deref(), Some("example.com"));
    }

    #[test]
    fn never_allocates_reserved_addresses() {
        let cidr: Ipv4Net = "10.0.0.1/27".parse().unwrap();
        let mut pool = FakeIp::with_capacity(cidr, 8);
        for i in 0..8 {
            let ip = pool.put(&format!("d{i}"));
            assert_ne!(ip, cidr.network());
            assert_ne!(ip, cidr.broadcast());
            assert_ne!(ip, cidr.addr());
        }
    }
}
