//! GeoIP contract: an external collaborator reached only through a narrow
//! trait. The MMDB download/verify lifecycle is out of scope; this crate
//! only specifies the contract and a no-op default so a real MMDB-backed
//! implementation can be swapped in without touching the rule engine.

use std::net::IpAddr;

pub trait GeoIpLookup: Send + Sync {
    /// Returns the ISO 3166-1 alpha-2 country code for `ip`, or `None` on a
    /// miss. Never an error: a GeoIP miss is routing information, not a
    /// failure.
    fn lookup(&self, ip: IpAddr) -> Option<String>;
}

/// Always misses. Used when no `geoip.path` is configured.
#[derive(Debug, Default)]
pub struct NoGeoIp;

impl GeoIpLookup for NoGeoIp {
    fn lookup(&self, _ip: IpAddr) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_geoip_always_misses() {
        let g = NoGeoIp;
        assert_eq!(g.lookup("1.1.1.1".parse().unwrap()), None);
    }
}
