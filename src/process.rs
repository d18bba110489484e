//! Process-lookup contract: resolves a socket 5-tuple to the owning
//! process's `(name, path)`. OS-specific in the original; this crate only
//! specifies the contract and a no-op default, since the underlying facility
//! is not implemented here.

use std::net::IpAddr;

#[derive(Debug, Clone, Copy)]
pub struct FiveTuple {
    pub protocol: crate::packet::Protocol,
    pub local_ip: IpAddr,
    pub local_port: u16,
    pub remote_ip: IpAddr,
    pub remote_port: u16,
}

pub trait ProcessLookup: Send + Sync {
    fn lookup(&self, five_tuple: &FiveTuple) -> Option<(String, String)>;
}

#[derive(Debug, Default)]
pub struct NoProcessLookup;

impl ProcessLookup for NoProcessLookup {
    fn lookup(&self, _five_tuple: &FiveTuple) -> Option<(String, String)> {
        None
    }
}
