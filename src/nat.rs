//! NAT tables.
//!
//! Two distinct shapes, grounded on two distinct sources:
//! - [`TunNat`]: the TUN ingress's per-protocol `real <-> mapped` address
//!   table (`ingress/tun/tun.go`'s `natEntry`/`tcpNat`/`udpNat`). Entries are
//!   never expired — see DESIGN.md's open-question ledger entry.
//! - [`UdpNat`]: the general egress's client-address -> upstream-socket table
//!   for UDP full-cone semantics (`component/nat/nat.go`).

use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;

use crate::proxy::ShadowedPacket;

/// A TUN NAT entry: the original destination the application believed it was
/// talking to, and the address this entry is keyed from on the other side.
#[derive(Debug, Clone, Copy)]
pub struct NatEntry {
    pub real_dst: SocketAddr,
    pub to: SocketAddr,
}

/// Bidirectional `real <-> mapped` address table for one protocol (TCP or
/// UDP) on the TUN ingress. No eviction: see the TUN NAT open question in
/// SPEC_FULL.md §9.
#[derive(Default)]
pub struct TunNat {
    table: DashMap<SocketAddr, NatEntry>,
}

impl TunNat {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<NatEntry> {
        self.table.get(addr).map(|e| *e)
    }

    /// Stores both the forward entry (`src_addr -> (real_dst, mapped_addr)`)
    /// and its reverse (`mapped_addr -> (real_dst, src_addr)`) so a lookup
    /// from either side recovers both endpoints. The reverse entry is
    /// guaranteed to exist before this call returns (invariant 5, §8).
    pub fn insert_pair(&self, src_addr: SocketAddr, real_dst: SocketAddr, mapped_addr: SocketAddr) {
        self.table.insert(
            src_addr,
            NatEntry {
                real_dst,
                to: mapped_addr,
            },
        );
        self.table.insert(
            mapped_addr,
            NatEntry {
                real_dst,
                to: src_addr,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// The general ingress's UDP full-cone NAT: maps a client address string to
/// the shadowed upstream packet conn dialed for that client and the
/// upstream's remote peer, so later datagrams from the same client reuse the
/// same egress socket instead of dialing again.
#[derive(Default)]
pub struct UdpNat {
    table: DashMap<String, (Arc<ShadowedPacket>, SocketAddr)>,
}

impl UdpNat {
    pub fn new() -> Self {
        Self {
            table: DashMap::new(),
        }
    }

    pub fn get(&self, client: &str) -> Option<(Arc<ShadowedPacket>, SocketAddr)> {
        self.table.get(client).map(|e| e.clone())
    }

    pub fn set(&self, client: String, socket: Arc<ShadowedPacket>, remote: SocketAddr) {
        self.table.insert(client, (socket, remote));
    }

    pub fn delete(&self, client: &str) {
        self.table.remove(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse_entry_exists_after_insert() {
        let nat = TunNat::new();
        let src: SocketAddr = "10.0.0.5:50000".parse().unwrap();
        let real_dst: SocketAddr = "1.2.3.4:80".parse().unwrap();
        let mapped: SocketAddr = "198.18.0.2:50000".parse().unwrap();

        nat.insert_pair(src, real_dst, mapped);

        let fwd = nat.get(&src).unwrap();
        assert_eq!(fwd.real_dst, real_dst);
        assert_eq!(fwd.to, mapped);

        let rev = nat.get(&mapped).unwrap();
        assert_eq!(rev.real_dst, real_dst);
        assert_eq!(rev.to, src);
    }
}
