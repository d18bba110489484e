//! Dials a configured upstream server and wraps it with a client-side
//! [`Proxy`] codec (SOCKS5 or Shadowsocks). Grounded on
//! `egress/general/general.go`.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};

use super::Egress;
use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::{CodecInput, Proxy, ShadowedPacket, ShadowedStream};

pub struct GeneralEgress {
    name: String,
    server_addr: SocketAddr,
    proxy: Arc<dyn Proxy>,
}

impl GeneralEgress {
    pub fn new(name: impl Into<String>, server_addr: SocketAddr, proxy: Arc<dyn Proxy>) -> Self {
        Self {
            name: name.into(),
            server_addr,
            proxy,
        }
    }
}

#[async_trait]
impl Egress for GeneralEgress {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dial_stream(&self, target: &Metadata) -> Result<ShadowedStream, CodecError> {
        let stream = TcpStream::connect(self.server_addr).await?;
        let conn = self
            .proxy
            .shadow_stream(stream, CodecInput::Target(target))
            .await?;
        Ok(conn.stream)
    }

    async fn dial_packet(&self, target: &Metadata) -> Result<ShadowedPacket, CodecError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(self.server_addr).await?;
        self.proxy
            .shadow_packet(socket, CodecInput::Target(target))
            .await
    }
}
