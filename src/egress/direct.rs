//! Dials the metadata's resolved remote address directly, no codec.
//! Grounded on `egress/direct/direct.go`.

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};

use super::Egress;
use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::{ShadowedPacket, ShadowedStream};

pub struct DirectEgress {
    name: String,
}

impl DirectEgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Egress for DirectEgress {
    fn name(&self) -> &str {
        &self.name
    }

    async fn dial_stream(&self, target: &Metadata) -> Result<ShadowedStream, CodecError> {
        let ip = target.remote_ip.ok_or(CodecError::MalformedAddress)?;
        let stream = TcpStream::connect((ip, target.remote_port)).await?;
        Ok(ShadowedStream::Plain(stream))
    }

    async fn dial_packet(&self, target: &Metadata) -> Result<ShadowedPacket, CodecError> {
        let local: std::net::SocketAddr = if target.remote_ip.map_or(true, |ip| ip.is_ipv4()) {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(ShadowedPacket::Plain(socket))
    }
}
