//! The DNS relay: a fake-IP handler for A queries (when `dns.fakeip.enable`)
//! and a pass-through handler fanning queries out to configured upstreams.
//! Grounded on `dns/dns.go`.

pub mod default_handler;
pub mod fakeip_handler;
pub mod resolve;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::DnsError;
use crate::fakeip::FakeIp;
use tokio::sync::Mutex;

#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles one raw DNS wire-format query, returning the raw wire-format
    /// response.
    async fn handle(&self, query: &[u8]) -> Result<Vec<u8>, DnsError>;
}

pub struct DnsServer {
    socket: UdpSocket,
    handler: Arc<dyn Handler>,
}

impl DnsServer {
    pub async fn bind(listen: SocketAddr, handler: Arc<dyn Handler>) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(listen).await?;
        Ok(Self { socket, handler })
    }

    /// Serves queries until cancelled. Each query is answered independently;
    /// one malformed query never blocks subsequent ones.
    pub async fn serve(self) {
        let socket = Arc::new(self.socket);
        loop {
            let mut buf = vec![0u8; 512];
            let (n, peer) = match socket.recv_from(&mut buf).await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "dns socket recv failed");
                    continue;
                }
            };
            buf.truncate(n);
            let handler = self.handler.clone();
            let socket = socket.clone();
            tokio::spawn(async move {
                match handler.handle(&buf).await {
                    Ok(resp) => {
                        if let Err(e) = socket.send_to(&resp, peer).await {
                            warn!(error = %e, %peer, "dns response send failed");
                        }
                    }
                    Err(e) => debug!(error = %e, %peer, "dns query failed"),
                }
            });
        }
    }
}

/// Wraps the fake-IP pool in a mutex: the pool's LRU is mutated on every
/// `Put`/lookup and is shared across every DNS query task.
pub type SharedFakeIp = Arc<Mutex<FakeIp>>;
