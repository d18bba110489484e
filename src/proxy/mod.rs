//! The proxy codec seam: narrow capability set `{kind, shadow_stream,
//! shadow_packet, tcp_mux}` with concrete variants `{None, Socks,
//! Shadowsocks}` — see SPEC_FULL.md §9 ("polymorphic proxy and transport").
//! Grounded on `component/proxy/proxy.go`'s `Proxy` interface.

pub mod addr;
pub mod none;
pub mod shadowsocks;
pub mod socks;

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};

use crate::error::CodecError;
use crate::metadata::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    None,
    Socks,
    Shadowsocks,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    Server,
    Client,
}

/// Replaces the distilled design's variadic `extra ...any` codec parameter
/// with a tagged variant the caller cannot misuse: a server-side shadow
/// needs only the ingress name to stamp into metadata, a client-side shadow
/// needs the dial target to encode as the address header.
pub enum CodecInput<'a> {
    IngressName(&'a str),
    Target(&'a Metadata),
}

/// A framed message read from or to be written to a packet-oriented flow.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    pub metadata: Metadata,
}

/// A shadowed (possibly AEAD-framed) stream, plus the metadata the handshake
/// discovered (the remote address header, for a server-side accept).
pub struct StreamConn {
    pub stream: ShadowedStream,
    pub metadata: Metadata,
    pub local_addr: SocketAddr,
    pub remote_addr: SocketAddr,
}

pub enum ShadowedStream {
    Plain(TcpStream),
    Shadowsocks(shadowsocks::stream::ShadowsocksStream),
}

impl ShadowedStream {
    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        use tokio::io::AsyncReadExt;
        match self {
            ShadowedStream::Plain(s) => s.read(buf).await,
            ShadowedStream::Shadowsocks(s) => s.read(buf).await,
        }
    }

    pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;
        match self {
            ShadowedStream::Plain(s) => s.write_all(data).await,
            ShadowedStream::Shadowsocks(s) => s.write_all(data).await,
        }
    }
}

/// A shadowed packet conn bound to one local socket, producing/consuming
/// framed [`Message`]s tagged with the remote peer's address.
pub enum ShadowedPacket {
    Plain(UdpSocket),
    Socks(socks::packet::SocksPacket),
    Shadowsocks(shadowsocks::packet::ShadowsocksPacket),
}

impl ShadowedPacket {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match self {
            ShadowedPacket::Plain(s) => s.local_addr(),
            ShadowedPacket::Socks(s) => s.local_addr(),
            ShadowedPacket::Shadowsocks(s) => s.local_addr(),
        }
    }

    pub async fn read_msg_from(&self) -> std::io::Result<(Message, SocketAddr)> {
        match self {
            ShadowedPacket::Plain(s) => {
                let mut buf = vec![0u8; 64 * 1024];
                let (n, peer) = s.recv_from(&mut buf).await?;
                buf.truncate(n);
                Ok((
                    Message {
                        payload: buf,
                        metadata: Metadata::new(),
                    },
                    peer,
                ))
            }
            ShadowedPacket::Socks(s) => s.read_msg_from().await,
            ShadowedPacket::Shadowsocks(s) => s.read_msg_from().await,
        }
    }

    pub async fn write_msg_to(&self, msg: &Message, addr: SocketAddr) -> std::io::Result<()> {
        match self {
            ShadowedPacket::Plain(s) => {
                s.send_to(&msg.payload, addr).await?;
                Ok(())
            }
            ShadowedPacket::Socks(s) => s.write_msg_to(msg, addr).await,
            ShadowedPacket::Shadowsocks(s) => s.write_msg_to(msg, addr).await,
        }
    }
}

/// Capability set exposed by every proxy implementation.
#[async_trait]
pub trait Proxy: Send + Sync {
    fn kind(&self) -> ProxyKind;

    /// Whether a single connection can carry multiple independent messages
    /// (not supported by any current implementation; see `TcpMux` in
    /// SPEC_FULL.md §9).
    fn tcp_mux(&self) -> bool {
        false
    }

    async fn shadow_stream(
        &self,
        stream: TcpStream,
        input: CodecInput<'_>,
    ) -> Result<StreamConn, CodecError>;

    async fn shadow_packet(
        &self,
        socket: UdpSocket,
        input: CodecInput<'_>,
    ) -> Result<ShadowedPacket, CodecError>;
}
