//! Accepts TCP connections, runs the server-side proxy handshake, dispatches
//! the resulting metadata through the router, dials the chosen egress, and
//! relays. Also runs a UDP packet relay on the same listen address: each
//! configured proxy codec frames datagrams through [`crate::proxy::ShadowedPacket`],
//! and a per-client-address [`UdpNat`] entry pins repeat datagrams from the
//! same peer to the same dialed egress socket. Grounded on
//! `ingress/general/general.go`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpListener, UdpSocket};
use tracing::{debug, info, warn};

use super::Ingress;
use crate::egress::{relay, EgressRegistry};
use crate::error::Error;
use crate::nat::UdpNat;
use crate::proxy::{CodecInput, Proxy, ShadowedPacket};
use crate::router::Router;

pub struct GeneralIngress {
    name: String,
    listen: String,
    proxy: Arc<dyn Proxy>,
    router: Arc<dyn Router>,
    egress_registry: Arc<EgressRegistry>,
    udp_nat: Arc<UdpNat>,
}

impl GeneralIngress {
    pub fn new(
        name: impl Into<String>,
        listen: impl Into<String>,
        proxy: Arc<dyn Proxy>,
        router: Arc<dyn Router>,
        egress_registry: Arc<EgressRegistry>,
    ) -> Self {
        Self {
            name: name.into(),
            listen: listen.into(),
            proxy,
            router,
            egress_registry,
            udp_nat: Arc::new(UdpNat::new()),
        }
    }

    async fn serve_tcp(&self) -> Result<(), Error> {
        let listener = TcpListener::bind(&self.listen).await?;
        info!(ingress = %self.name, listen = %self.listen, "general ingress listening");

        loop {
            let (stream, peer) = listener.accept().await?;
            let name = self.name.clone();
            let proxy = self.proxy.clone();
            let router = self.router.clone();
            let egress_registry = self.egress_registry.clone();

            tokio::spawn(async move {
                let conn = match proxy.shadow_stream(stream, CodecInput::IngressName(&name)).await {
                    Ok(conn) => conn,
                    Err(e) => {
                        debug!(error = %e, %peer, "ingress handshake failed");
                        return;
                    }
                };

                let action = router.dispatch(&conn.metadata);
                let egress = match egress_registry.get(&action.egress) {
                    Some(e) => e,
                    None => {
                        warn!(egress = %action.egress, "dispatch named an unregistered egress");
                        return;
                    }
                };

                let outbound = match egress.dial_stream(&conn.metadata).await {
                    Ok(s) => s,
                    Err(e) => {
                        debug!(error = %e, egress = %action.egress, "egress dial failed");
                        return;
                    }
                };

                if let Err(e) = relay(conn.stream, outbound).await {
                    debug!(error = %e, %peer, "relay ended");
                }
            });
        }
    }

    /// Binds a UDP packet conn on the same listen address, shadows it once
    /// with this ingress's proxy codec, then relays datagrams keyed by
    /// client address. A `None` proxy frames no address header, so datagrams
    /// through it carry no dispatchable destination and are dropped.
    async fn serve_udp(&self) -> Result<(), Error> {
        let addr: SocketAddr = self.listen.parse().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid general ingress listen address: {}", self.listen),
            )
        })?;
        let socket = UdpSocket::bind(addr).await?;
        let shadowed = Arc::new(
            self.proxy
                .shadow_packet(socket, CodecInput::IngressName(&self.name))
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?,
        );

        loop {
            let (msg, peer) = match shadowed.read_msg_from().await {
                Ok(v) => v,
                Err(e) => {
                    debug!(error = %e, "udp relay recv failed");
                    continue;
                }
            };

            let Some(remote_ip) = msg.metadata.remote_ip else {
                debug!(%peer, "udp datagram carries no destination, dropping");
                continue;
            };
            let remote_addr = SocketAddr::new(remote_ip, msg.metadata.remote_port);
            let metadata = msg.metadata.clone().with_ingress(self.name.clone());

            let client = peer.to_string();
            let upstream = match self.udp_nat.get(&client) {
                Some((upstream, _)) => upstream,
                None => {
                    let action = self.router.dispatch(&metadata);
                    let Some(egress) = self.egress_registry.get(&action.egress) else {
                        warn!(egress = %action.egress, "udp dispatch named an unregistered egress");
                        continue;
                    };
                    let upstream = match egress.dial_packet(&metadata).await {
                        Ok(p) => Arc::new(p),
                        Err(e) => {
                            debug!(error = %e, egress = %action.egress, "udp egress dial failed");
                            continue;
                        }
                    };
                    self.udp_nat.set(client.clone(), upstream.clone(), remote_addr);
                    spawn_udp_return(
                        self.udp_nat.clone(),
                        shadowed.clone(),
                        upstream.clone(),
                        peer,
                        remote_addr,
                        client.clone(),
                    );
                    upstream
                }
            };

            if let Err(e) = upstream.write_msg_to(&msg, remote_addr).await {
                debug!(error = %e, "udp egress send failed");
                self.udp_nat.delete(&client);
            }
        }
    }
}

/// One task per NAT entry, pumping replies from the dialed egress socket
/// back to the client through the ingress's shadowed packet conn. Exits
/// (and evicts the NAT entry) on the first read error or write failure.
///
/// The egress codec's own `read_msg_from` may not stamp a remote address
/// into the reply's metadata (a [`ShadowedPacket::Plain`] upstream never
/// does), so the reply is always tagged with this NAT entry's known
/// `remote_addr` before being framed back to the client. Correct as long as
/// a client's UDP association talks to a single remote, which is all this
/// NAT table models.
fn spawn_udp_return(
    nat: Arc<UdpNat>,
    ingress: Arc<ShadowedPacket>,
    upstream: Arc<ShadowedPacket>,
    client_addr: SocketAddr,
    remote_addr: SocketAddr,
    client_key: String,
) {
    tokio::spawn(async move {
        loop {
            match upstream.read_msg_from().await {
                Ok((mut reply, _)) => {
                    reply.metadata.remote_ip = Some(remote_addr.ip());
                    reply.metadata.remote_port = remote_addr.port();
                    if ingress.write_msg_to(&reply, client_addr).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        nat.delete(&client_key);
    });
}

#[async_trait]
impl Ingress for GeneralIngress {
    fn name(&self) -> &str {
        &self.name
    }

    async fn serve(&self) -> Result<(), Error> {
        tokio::try_join!(self.serve_tcp(), self.serve_udp())?;
        Ok(())
    }
}
