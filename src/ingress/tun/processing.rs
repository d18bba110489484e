//! Pure per-packet transforms, shared verbatim by the real device and the
//! packet-file mock so the NAT/checksum logic can be exercised without
//! `/dev/net/tun` or root. Grounded on `ingress/tun/tun.go`'s `process*`
//! functions.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};

use crate::error::PacketError;
use crate::fakeip::FakeIp;
use crate::nat::TunNat;
use crate::packet::{IcmpPacket, IpPacket, Protocol, TcpSegment, UdpDatagram};

/// Answers an ICMP echo in place: swap addresses, set type 0 (echo reply),
/// recompute both checksums. Returns `false` if the packet was not an echo
/// request.
pub fn process_icmp(buf: &mut [u8]) -> Result<bool, PacketError> {
    let ihl = IpPacket::new(buf)?.ihl();
    let (src, dst) = {
        let ip = IpPacket::new(buf)?;
        (ip.src_ip(), ip.dst_ip())
    };

    let (ip_part, l4_part) = buf.split_at_mut(ihl);
    {
        let mut icmp = IcmpPacket::new(l4_part)?;
        if icmp.icmp_type() != 8 {
            return Ok(false);
        }
        icmp.set_echo_reply();
        icmp.update_checksum();
    }
    let _ = ip_part;

    let mut ip = IpPacket::new(buf)?;
    ip.set_src_ip(dst)?;
    ip.set_dst_ip(src)?;
    ip.update_checksum();
    Ok(true)
}

/// Rewrites an outbound TCP/UDP packet per the TUN NAT rule: allocates (or
/// reuses) a mapped IP keyed by the packet's destination, stores both NAT
/// directions, and rewrites `src_ip`/`dst_ip`/`dst_port` to route the packet
/// to the in-process relay.
pub fn process_outbound(
    buf: &mut [u8],
    nat: &TunNat,
    mapped_pool: &mut FakeIp,
    relay_ip: Ipv4Addr,
    relay_tcp_port: u16,
    relay_udp_port: u16,
) -> Result<(), PacketError> {
    let (protocol, src_ip, dst_ip, ihl) = {
        let ip = IpPacket::new(buf)?;
        (ip.protocol(), ip.src_ip(), ip.dst_ip(), ip.ihl())
    };

    if !matches!(protocol, Protocol::Tcp | Protocol::Udp) {
        return Ok(());
    }

    let (src_port, dst_port) = {
        let (_, l4_part) = buf.split_at_mut(ihl);
        match protocol {
            Protocol::Tcp => {
                let seg = TcpSegment::new(l4_part)?;
                (seg.src_port(), seg.dst_port())
            }
            Protocol::Udp => {
                let dg = UdpDatagram::new(l4_part)?;
                (dg.src_port(), dg.dst_port())
            }
            _ => unreachable!(),
        }
    };
    let relay_port = match protocol {
        Protocol::Tcp => relay_tcp_port,
        Protocol::Udp => relay_udp_port,
        _ => unreachable!(),
    };

    let src_addr = SocketAddr::V4(SocketAddrV4::new(to_v4(src_ip)?, src_port));
    let dst_addr = SocketAddr::V4(SocketAddrV4::new(to_v4(dst_ip)?, dst_port));

    let mapped_addr = match nat.get(&src_addr) {
        Some(entry) => entry.to,
        None => {
            let mapped_ip = mapped_pool.put(&dst_addr.to_string());
            let mapped = SocketAddr::V4(SocketAddrV4::new(mapped_ip, src_port));
            nat.insert_pair(src_addr, dst_addr, mapped);
            mapped
        }
    };
    let mapped_ip = match mapped_addr.ip() {
        IpAddr::V4(v4) => v4,
        IpAddr::V6(_) => return Err(PacketError::AddressFamily),
    };

    {
        let mut ip = IpPacket::new(buf)?;
        ip.set_src_ip(IpAddr::V4(mapped_ip))?;
        ip.set_dst_ip(IpAddr::V4(relay_ip))?;
    }
    {
        let (_, l4_part) = buf.split_at_mut(ihl);
        match protocol {
            Protocol::Tcp => TcpSegment::new(l4_part)?.set_dst_port(relay_port),
            Protocol::Udp => UdpDatagram::new(l4_part)?.set_dst_port(relay_port),
            _ => unreachable!(),
        }
    }

    recompute_l4_checksum(buf, protocol, ihl)
}

/// Rewrites a return packet from the relay (`src = relay_ip:relay_port`)
/// back to the original endpoints recovered from the NAT table.
pub fn process_return(buf: &mut [u8], nat: &TunNat) -> Result<(), PacketError> {
    let (protocol, dst_ip, ihl) = {
        let ip = IpPacket::new(buf)?;
        (ip.protocol(), ip.dst_ip(), ip.ihl())
    };

    if !matches!(protocol, Protocol::Tcp | Protocol::Udp) {
        return Ok(());
    }

    let dst_port = {
        let (_, l4_part) = buf.split_at_mut(ihl);
        match protocol {
            Protocol::Tcp => TcpSegment::new(l4_part)?.dst_port(),
            Protocol::Udp => UdpDatagram::new(l4_part)?.dst_port(),
            _ => unreachable!(),
        }
    };

    let dst_addr = SocketAddr::V4(SocketAddrV4::new(to_v4(dst_ip)?, dst_port));
    let entry = nat.get(&dst_addr).ok_or(PacketError::AddressFamily)?;

    {
        let mut ip = IpPacket::new(buf)?;
        ip.set_src_ip(entry.real_dst.ip())?;
        ip.set_dst_ip(entry.to.ip())?;
    }
    {
        let (_, l4_part) = buf.split_at_mut(ihl);
        match protocol {
            Protocol::Tcp => {
                let mut seg = TcpSegment::new(l4_part)?;
                seg.set_src_port(entry.real_dst.port());
                seg.set_dst_port(entry.to.port());
            }
            Protocol::Udp => {
                let mut dg = UdpDatagram::new(l4_part)?;
                dg.set_src_port(entry.real_dst.port());
                dg.set_dst_port(entry.to.port());
            }
            _ => unreachable!(),
        }
    }

    recompute_l4_checksum(buf, protocol, ihl)
}

fn recompute_l4_checksum(buf: &mut [u8], protocol: Protocol, ihl: usize) -> Result<(), PacketError> {
    let (ip_part, l4_part) = buf.split_at_mut(ihl);
    let ip = IpPacket::new(ip_part)?;
    match protocol {
        Protocol::Tcp => TcpSegment::new(l4_part)?.update_checksum(&ip),
        Protocol::Udp => UdpDatagram::new(l4_part)?.update_checksum(&ip),
        _ => {}
    }
    drop(ip);
    IpPacket::new(buf)?.update_checksum();
    Ok(())
}

fn to_v4(ip: IpAddr) -> Result<Ipv4Addr, PacketError> {
    match ip {
        IpAddr::V4(v4) => Ok(v4),
        IpAddr::V6(_) => Err(PacketError::AddressFamily),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tcp_packet(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16) -> Vec<u8> {
        let mut p = vec![0u8; 40];
        p[0] = 0x45;
        p[9] = 6;
        p[12..16].copy_from_slice(&src);
        p[16..20].copy_from_slice(&dst);
        p[20..22].copy_from_slice(&src_port.to_be_bytes());
        p[22..24].copy_from_slice(&dst_port.to_be_bytes());
        {
            let (ip_part, l4_part) = p.split_at_mut(20);
            let ip = IpPacket::new(ip_part).unwrap();
            TcpSegment::new(l4_part).unwrap().update_checksum(&ip);
        }
        IpPacket::new(&mut p).unwrap().update_checksum();
        p
    }

    #[test]
    fn outbound_rewrite_then_return_rewrite_round_trips() {
        let nat = TunNat::new();
        let cidr: ipnet::Ipv4Net = "198.18.0.1/16".parse().unwrap();
        let mut pool = FakeIp::new(cidr);
        let relay_ip: Ipv4Addr = "198.18.0.1".parse().unwrap();

        let mut pkt = sample_tcp_packet([10, 0, 0, 5], [1, 2, 3, 4], 50000, 80);
        process_outbound(&mut pkt, &nat, &mut pool, relay_ip, 12345, 12346).unwrap();

        let ip = IpPacket::new(&mut pkt).unwrap();
        assert_eq!(ip.dst_ip(), IpAddr::V4(relay_ip));
        let mapped_src = ip.src_ip();
        drop(ip);

        let mut seg = TcpSegment::new(&mut pkt[20..]).unwrap();
        assert_eq!(seg.dst_port(), 12345);
        assert_eq!(seg.src_port(), 50000);
        drop(seg);

        // simulate a reply packet coming back from the relay
        let mapped_ip = match mapped_src {
            IpAddr::V4(v4) => v4.octets(),
            _ => unreachable!(),
        };
        let mut reply = sample_tcp_packet(
            relay_ip.octets(),
            mapped_ip,
            12345,
            50000,
        );
        process_return(&mut reply, &nat).unwrap();
        let ip = IpPacket::new(&mut reply).unwrap();
        assert_eq!(ip.src_ip(), "1.2.3.4".parse::<IpAddr>().unwrap());
        assert_eq!(ip.dst_ip(), "10.0.0.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn icmp_echo_request_is_answered() {
        let mut p = vec![0u8; 28];
        p[0] = 0x45;
        p[9] = 1; // icmp
        p[12..16].copy_from_slice(&[10, 0, 0, 5]);
        p[16..20].copy_from_slice(&[198, 18, 0, 1]);
        p[20] = 8; // echo request
        IpPacket::new(&mut p).unwrap().update_checksum();

        let answered = process_icmp(&mut p).unwrap();
        assert!(answered);
        let ip = IpPacket::new(&mut p).unwrap();
        assert_eq!(ip.src_ip(), "198.18.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(ip.dst_ip(), "10.0.0.5".parse::<IpAddr>().unwrap());
        drop(ip);
        assert_eq!(IcmpPacket::new(&mut p[20..]).unwrap().icmp_type(), 0);
    }
}
