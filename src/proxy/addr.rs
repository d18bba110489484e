//! SOCKS-style address header: `ATYP(1) | addr | port(2, big-endian)`,
//! shared by the SOCKS5 handshake and the Shadowsocks address header
//! (SPEC_FULL.md §4.3/§4.4).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::error::CodecError;
use crate::metadata::Metadata;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x03;
pub const ATYP_IPV6: u8 = 0x04;

#[derive(Debug, Clone)]
pub enum Address {
    Ip(IpAddr),
    Domain(String),
}

#[derive(Debug, Clone)]
pub struct AddressHeader {
    pub address: Address,
    pub port: u16,
}

impl AddressHeader {
    pub fn from_metadata(m: &Metadata) -> Option<Self> {
        if let Some(domain) = &m.domain {
            return Some(Self {
                address: Address::Domain(domain.clone()),
                port: m.remote_port,
            });
        }
        m.remote_ip.map(|ip| Self {
            address: Address::Ip(ip),
            port: m.remote_port,
        })
    }

    pub fn apply_to_metadata(&self, m: &mut Metadata) {
        match &self.address {
            Address::Ip(ip) => m.remote_ip = Some(*ip),
            Address::Domain(d) => m.domain = Some(d.clone()),
        }
        m.remote_port = self.port;
    }

    /// Encodes `ATYP | addr | port` into `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match &self.address {
            Address::Ip(IpAddr::V4(v4)) => {
                out.push(ATYP_IPV4);
                out.extend_from_slice(&v4.octets());
            }
            Address::Ip(IpAddr::V6(v6)) => {
                out.push(ATYP_IPV6);
                out.extend_from_slice(&v6.octets());
            }
            Address::Domain(d) => {
                out.push(ATYP_DOMAIN);
                out.push(d.len() as u8);
                out.extend_from_slice(d.as_bytes());
            }
        }
        out.extend_from_slice(&self.port.to_be_bytes());
    }

    /// Decodes an address header from the front of `buf`, returning the
    /// header and the number of bytes consumed.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize), CodecError> {
        if buf.is_empty() {
            return Err(CodecError::MalformedAddress);
        }
        let atyp = buf[0];
        let mut offset = 1;
        let address = match atyp {
            ATYP_IPV4 => {
                if buf.len() < offset + 4 {
                    return Err(CodecError::MalformedAddress);
                }
                let mut o = [0u8; 4];
                o.copy_from_slice(&buf[offset..offset + 4]);
                offset += 4;
                Address::Ip(IpAddr::V4(Ipv4Addr::from(o)))
            }
            ATYP_IPV6 => {
                if buf.len() < offset + 16 {
                    return Err(CodecError::MalformedAddress);
                }
                let mut o = [0u8; 16];
                o.copy_from_slice(&buf[offset..offset + 16]);
                offset += 16;
                Address::Ip(IpAddr::V6(Ipv6Addr::from(o)))
            }
            ATYP_DOMAIN => {
                if buf.len() < offset + 1 {
                    return Err(CodecError::MalformedAddress);
                }
                let len = buf[offset] as usize;
                offset += 1;
                if buf.len() < offset + len {
                    return Err(CodecError::MalformedAddress);
                }
                let domain = String::from_utf8_lossy(&buf[offset..offset + len]).into_owned();
                offset += len;
                Address::Domain(domain)
            }
            _ => return Err(CodecError::MalformedAddress),
        };
        if buf.len() < offset + 2 {
            return Err(CodecError::MalformedAddress);
        }
        let port = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        offset += 2;
        Ok((Self { address, port }, offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_atyp_variants() {
        let cases = vec![
            AddressHeader {
                address: Address::Ip("1.2.3.4".parse().unwrap()),
                port: 443,
            },
            AddressHeader {
                address: Address::Ip("::1".parse().unwrap()),
                port: 80,
            },
            AddressHeader {
                address: Address::Domain("example.com".to_string()),
                port: 443,
            },
        ];
        for header in cases {
            let mut buf = Vec::new();
            header.encode(&mut buf);
            let (decoded, consumed) = AddressHeader::decode(&buf).unwrap();
            assert_eq!(consumed, buf.len());
            assert_eq!(decoded.port, header.port);
            match (&decoded.address, &header.address) {
                (Address::Ip(a), Address::Ip(b)) => assert_eq!(a, b),
                (Address::Domain(a), Address::Domain(b)) => assert_eq!(a, b),
                _ => panic!("address kind mismatch"),
            }
        }
    }
}
