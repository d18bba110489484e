//! The TUN ingress: opens a layer-3 device, installs host routing, pumps
//! packets through the NAT rewrite in [`processing`], and runs the
//! per-protocol relay listeners the NAT redirects every flow to. Grounded
//! on `ingress/tun/tun.go`.

pub mod device;
pub mod processing;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Command;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, UdpSocket};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use self::device::TunDevice;
use super::Ingress;
use crate::dns::{Handler, SharedFakeIp};
use crate::egress::{relay, EgressRegistry};
use crate::error::{Error, PacketError, TunError};
use crate::fakeip::FakeIp;
use crate::metadata::Metadata;
use crate::nat::TunNat;
use crate::packet::{IpPacket, Protocol, UdpDatagram};
use crate::proxy::ShadowedStream;
use crate::router::Router;

const ROUTING_TABLE: &str = "100";

/// One (up, down) pair of host commands executed in order on start; the
/// down commands run in reverse on shutdown, or immediately to unwind a
/// startup failure.
struct ControlPlaneCommand {
    up: Vec<String>,
    down: Vec<String>,
}

fn cmd(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

fn control_plane_commands(device: &str, address: Ipv4Addr, netmask: Ipv4Addr, mtu: u32) -> Vec<ControlPlaneCommand> {
    let prefix = u32::from(netmask).count_ones();
    let addr_cidr = format!("{address}/{prefix}");
    let mtu = mtu.to_string();
    vec![
        ControlPlaneCommand {
            up: cmd(&["ip", "addr", "add", &addr_cidr, "dev", device]),
            down: cmd(&["ip", "addr", "del", &addr_cidr, "dev", device]),
        },
        ControlPlaneCommand {
            up: cmd(&["ip", "link", "set", "dev", device, "mtu", &mtu]),
            down: vec![],
        },
        ControlPlaneCommand {
            up: cmd(&["ip", "link", "set", "dev", device, "up"]),
            down: cmd(&["ip", "link", "set", "dev", device, "down"]),
        },
        ControlPlaneCommand {
            up: cmd(&["ip", "route", "add", "default", "dev", device, "table", ROUTING_TABLE]),
            down: cmd(&["ip", "route", "del", "default", "dev", device, "table", ROUTING_TABLE]),
        },
        ControlPlaneCommand {
            up: cmd(&["ip", "rule", "add", "not", "dport", "53", "table", "main", "priority", "100"]),
            down: cmd(&["ip", "rule", "del", "not", "dport", "53", "table", "main", "priority", "100"]),
        },
    ]
}

fn ipv4_ihl(pkt: &[u8]) -> Result<usize, PacketError> {
    if pkt.is_empty() {
        return Err(PacketError::TooShort { need: 1, got: 0 });
    }
    Ok(usize::from(pkt[0] & 0x0f) * 4)
}

fn ipv4_src(pkt: &[u8]) -> Ipv4Addr {
    Ipv4Addr::new(pkt[12], pkt[13], pkt[14], pkt[15])
}

fn run_command(args: &[String]) -> std::io::Result<()> {
    let status = Command::new(&args[0]).args(&args[1..]).status()?;
    if !status.success() {
        return Err(std::io::Error::other(format!("{:?} exited with {status}", args)));
    }
    Ok(())
}

pub struct TunIngress {
    name: String,
    device: Arc<dyn TunDevice>,
    device_name: String,
    address: Ipv4Addr,
    netmask: Ipv4Addr,
    mtu: usize,
    is_mock: bool,
    relay_ip: Ipv4Addr,
    tcp_listener: TcpListener,
    udp_socket: Arc<UdpSocket>,
    relay_tcp_port: u16,
    relay_udp_port: u16,
    tcp_nat: Arc<TunNat>,
    udp_nat: Arc<TunNat>,
    mapped_pool: Arc<AsyncMutex<FakeIp>>,
    dns_pool: Option<SharedFakeIp>,
    dns_handler: Option<Arc<dyn Handler>>,
    router: Arc<dyn Router>,
    egress_registry: Arc<EgressRegistry>,
}

impl TunIngress {
    #[allow(clippy::too_many_arguments)]
    pub async fn new(
        name: impl Into<String>,
        device_name: impl Into<String>,
        address: Ipv4Addr,
        netmask: Ipv4Addr,
        mtu: u32,
        packet_file: Option<String>,
        mapped_cidr: ipnet::Ipv4Net,
        dns_pool: Option<SharedFakeIp>,
        dns_handler: Option<Arc<dyn Handler>>,
        router: Arc<dyn Router>,
        egress_registry: Arc<EgressRegistry>,
    ) -> Result<Self, Error> {
        let device_name = device_name.into();
        let is_mock = packet_file.is_some();
        let device: Arc<dyn TunDevice> = if let Some(path) = packet_file {
            Arc::new(device::MockTunDevice::open(&path)?)
        } else {
            Arc::new(device::RealTunDevice::open(&device_name, address, netmask, mtu)?)
        };

        let tcp_listener = TcpListener::bind((IpAddr::V4(address), 0)).await?;
        let relay_tcp_port = tcp_listener.local_addr()?.port();
        let udp_socket = UdpSocket::bind((IpAddr::V4(address), 0)).await?;
        let relay_udp_port = udp_socket.local_addr()?.port();

        Ok(Self {
            name: name.into(),
            device,
            device_name,
            address,
            netmask,
            mtu: mtu as usize,
            is_mock,
            relay_ip: address,
            tcp_listener,
            udp_socket: Arc::new(udp_socket),
            relay_tcp_port,
            relay_udp_port,
            tcp_nat: Arc::new(TunNat::new()),
            udp_nat: Arc::new(TunNat::new()),
            mapped_pool: Arc::new(AsyncMutex::new(FakeIp::new(mapped_cidr))),
            dns_pool,
            dns_handler,
            router,
            egress_registry,
        })
    }

    fn install_routing(&self) -> Result<(), TunError> {
        if self.is_mock {
            return Ok(());
        }
        let commands = control_plane_commands(&self.device_name, self.address, self.netmask, self.mtu as u32);
        let mut applied = Vec::new();
        for cmd in &commands {
            if let Err(e) = run_command(&cmd.up) {
                warn!(error = %e, cmd = ?cmd.up, "tun control plane command failed, unwinding");
                for done in applied.iter().rev() {
                    let down: &Vec<String> = done;
                    if !down.is_empty() {
                        let _ = run_command(down);
                    }
                }
                return Err(TunError::ControlPlane {
                    cmd: cmd.up.join(" "),
                    source: std::io::Error::other(e.to_string()),
                });
            }
            applied.push(cmd.down.clone());
        }
        Ok(())
    }

    fn teardown_routing(&self) {
        if self.is_mock {
            return;
        }
        let commands = control_plane_commands(&self.device_name, self.address, self.netmask, self.mtu as u32);
        for cmd in commands.iter().rev() {
            if cmd.down.is_empty() {
                continue;
            }
            if let Err(e) = run_command(&cmd.down) {
                warn!(error = %e, cmd = ?cmd.down, "tun teardown command failed");
            }
        }
    }

    async fn run_packet_pump(&self) -> Result<(), Error> {
        let mut buf = vec![0u8; self.mtu.max(1500)];
        loop {
            let n = self
                .device
                .recv(&mut buf)
                .await
                .map_err(|e| Error::Tun(TunError::Io(e)))?;
            if let Err(e) = self.handle_packet(&mut buf[..n]).await {
                debug!(error = %e, "dropping unhandled tun packet");
            }
        }
    }

    async fn handle_packet(&self, pkt: &mut [u8]) -> Result<(), PacketError> {
        let protocol = IpPacket::new(pkt)?.protocol();
        match protocol {
            Protocol::Icmp => {
                if processing::process_icmp(pkt)? {
                    let _ = self.device.send(pkt).await;
                }
                Ok(())
            }
            Protocol::Udp if self.is_dns_hijack(pkt)? => {
                if let Some(reply) = self.handle_dns_hijack(pkt).await? {
                    let _ = self.device.send(&reply).await;
                }
                Ok(())
            }
            Protocol::Tcp | Protocol::Udp => {
                let is_return = self.is_return_packet(pkt, protocol)?;
                if is_return {
                    let nat = if protocol == Protocol::Tcp { &self.tcp_nat } else { &self.udp_nat };
                    processing::process_return(pkt, nat)?;
                } else {
                    let nat = if protocol == Protocol::Tcp { &self.tcp_nat } else { &self.udp_nat };
                    let mut pool = self.mapped_pool.lock().await;
                    processing::process_outbound(
                        pkt,
                        nat,
                        &mut pool,
                        self.relay_ip,
                        self.relay_tcp_port,
                        self.relay_udp_port,
                    )?;
                }
                let _ = self.device.send(pkt).await;
                Ok(())
            }
            Protocol::Other(_) => Ok(()),
        }
    }

    fn is_return_packet(&self, pkt: &[u8], protocol: Protocol) -> Result<bool, PacketError> {
        // IPv4 only on the TUN path: header length and address fields are
        // read directly rather than through an `IpPacket` view, which would
        // otherwise require a throwaway mutable copy just to read.
        let ihl = ipv4_ihl(pkt)?;
        let src_ip = ipv4_src(pkt);
        let src_port = u16::from_be_bytes([pkt[ihl], pkt[ihl + 1]]);
        let relay_port = if protocol == Protocol::Tcp { self.relay_tcp_port } else { self.relay_udp_port };
        Ok(src_ip == self.relay_ip && src_port == relay_port)
    }

    fn is_dns_hijack(&self, pkt: &[u8]) -> Result<bool, PacketError> {
        let ihl = ipv4_ihl(pkt)?;
        if pkt.len() < ihl + 4 {
            return Ok(false);
        }
        let dst_port = u16::from_be_bytes([pkt[ihl + 2], pkt[ihl + 3]]);
        let src_ip = ipv4_src(pkt);
        // never hijack the relay's own return traffic.
        let relay_match = src_ip == self.relay_ip && dst_port == self.relay_udp_port;
        Ok(dst_port == 53 && !relay_match && self.dns_handler.is_some())
    }

    async fn handle_dns_hijack(&self, pkt: &[u8]) -> Result<Option<Vec<u8>>, PacketError> {
        let Some(handler) = &self.dns_handler else {
            return Ok(None);
        };
        let ihl = ipv4_ihl(pkt)?;
        let query = &pkt[ihl + 8..];
        let response = match handler.handle(query).await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "dns hijack query failed");
                return Ok(None);
            }
        };
        Ok(Some(build_dns_reply(pkt, ihl, &response)?))
    }

    async fn run_tcp_relay(&self) {
        loop {
            let (stream, peer) = match self.tcp_listener.accept().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "tun tcp relay accept failed");
                    continue;
                }
            };
            let Some(entry) = self.tcp_nat.get(&peer) else {
                debug!(%peer, "tun tcp relay accept with no nat entry");
                continue;
            };

            let metadata = self.build_metadata(entry.real_dst).await;
            let router = self.router.clone();
            let egress_registry = self.egress_registry.clone();
            tokio::spawn(async move {
                let action = router.dispatch(&metadata);
                let Some(egress) = egress_registry.get(&action.egress) else {
                    warn!(egress = %action.egress, "tun dispatch named an unregistered egress");
                    return;
                };
                let outbound = match egress.dial_stream(&metadata).await {
                    Ok(s) => s,
                    Err(e) => {
                        debug!(error = %e, "tun egress dial failed");
                        return;
                    }
                };
                if let Err(e) = relay(ShadowedStream::Plain(stream), outbound).await {
                    debug!(error = %e, %peer, "tun relay ended");
                }
            });
        }
    }

    async fn run_udp_relay(&self) {
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let (n, peer) = match self.udp_socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "tun udp relay recv failed");
                    continue;
                }
            };
            let Some(entry) = self.udp_nat.get(&peer) else {
                debug!(%peer, "tun udp relay datagram with no nat entry");
                continue;
            };
            let metadata = self.build_metadata(entry.real_dst).await;
            let payload = buf[..n].to_vec();
            let socket = self.udp_socket.clone();
            let egress_registry = self.egress_registry.clone();
            let action = self.router.dispatch(&metadata);
            tokio::spawn(async move {
                let Some(egress) = egress_registry.get(&action.egress) else {
                    warn!(egress = %action.egress, "tun dispatch named an unregistered egress");
                    return;
                };
                let outbound = match egress.dial_packet(&metadata).await {
                    Ok(s) => s,
                    Err(e) => {
                        debug!(error = %e, "tun udp egress dial failed");
                        return;
                    }
                };
                let msg = crate::proxy::Message {
                    payload,
                    metadata: metadata.clone(),
                };
                let target = SocketAddr::new(metadata.remote_ip.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)), metadata.remote_port);
                if let Err(e) = outbound.write_msg_to(&msg, target).await {
                    debug!(error = %e, "tun udp egress send failed");
                    return;
                }
                if let Ok((reply, _)) = outbound.read_msg_from().await {
                    let _ = socket.send_to(&reply.payload, peer).await;
                }
            });
        }
    }

    /// Builds flow metadata for a TUN-relayed connection, substituting the
    /// fake-IP destination back to the original domain when the DNS-level
    /// pool recognises it.
    async fn build_metadata(&self, real_dst: SocketAddr) -> Metadata {
        let mut metadata = Metadata::new()
            .with_remote_ip(real_dst.ip())
            .with_remote_port(real_dst.port())
            .with_ingress(self.name.clone());

        if let (Some(pool), IpAddr::V4(v4)) = (&self.dns_pool, real_dst.ip()) {
            if let Some(domain) = pool.lock().await.get_domain_by_ip(v4) {
                metadata = metadata.with_domain(domain);
            }
        }
        metadata
    }
}

/// Builds a reply UDP/IP packet (swapped src/dst) carrying `payload`,
/// recomputing both checksums. IPv4 only, matching the TUN ingress's scope.
fn build_dns_reply(query_packet: &[u8], ihl: usize, payload: &[u8]) -> Result<Vec<u8>, PacketError> {
    let src_ip = query_packet[12..16].to_vec();
    let dst_ip = query_packet[16..20].to_vec();
    let src_port = [query_packet[ihl], query_packet[ihl + 1]];
    let dst_port = [query_packet[ihl + 2], query_packet[ihl + 3]];

    let udp_len = 8 + payload.len();
    let total_len = ihl + udp_len;
    let mut out = vec![0u8; total_len];
    out[..ihl].copy_from_slice(&query_packet[..ihl]);
    out[12..16].copy_from_slice(&dst_ip);
    out[16..20].copy_from_slice(&src_ip);
    out[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
    out[ihl..ihl + 2].copy_from_slice(&dst_port);
    out[ihl + 2..ihl + 4].copy_from_slice(&src_port);
    out[ihl + 4..ihl + 6].copy_from_slice(&(udp_len as u16).to_be_bytes());
    out[ihl + 8..].copy_from_slice(payload);

    {
        let (ip_part, l4_part) = out.split_at_mut(ihl);
        let ip = IpPacket::new(ip_part)?;
        UdpDatagram::new(l4_part)?.update_checksum(&ip);
    }
    IpPacket::new(&mut out)?.update_checksum();
    Ok(out)
}

#[async_trait]
impl Ingress for TunIngress {
    fn name(&self) -> &str {
        &self.name
    }

    async fn serve(&self) -> Result<(), Error> {
        self.install_routing()?;
        info!(ingress = %self.name, device = %self.device_name, "tun ingress listening");

        let result = tokio::select! {
            r = self.run_packet_pump() => r,
            _ = self.run_tcp_relay() => Ok(()),
            _ = self.run_udp_relay() => Ok(()),
        };

        self.teardown_routing();
        result
    }
}
