//! The pass-through proxy: no codec, no handshake. Grounded on
//! `component/proxy/none/none.go`.

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};

use super::{CodecInput, Proxy, ProxyKind, ProxyMode, ShadowedPacket, ShadowedStream, StreamConn};
use crate::error::CodecError;
use crate::metadata::Metadata;

pub struct NoneProxy {
    mode: ProxyMode,
}

impl NoneProxy {
    pub fn new(mode: ProxyMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Proxy for NoneProxy {
    fn kind(&self) -> ProxyKind {
        ProxyKind::None
    }

    async fn shadow_stream(
        &self,
        stream: TcpStream,
        input: CodecInput<'_>,
    ) -> Result<StreamConn, CodecError> {
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;
        let mut metadata = Metadata::new();
        match (self.mode, input) {
            (ProxyMode::Server, CodecInput::IngressName(name)) => {
                metadata = metadata.with_ingress(name);
            }
            (ProxyMode::Client, CodecInput::Target(target)) => {
                metadata = target.clone();
            }
            _ => {}
        }
        Ok(StreamConn {
            stream: ShadowedStream::Plain(stream),
            metadata,
            local_addr,
            remote_addr,
        })
    }

    async fn shadow_packet(
        &self,
        socket: UdpSocket,
        _input: CodecInput<'_>,
    ) -> Result<ShadowedPacket, CodecError> {
        Ok(ShadowedPacket::Plain(socket))
    }
}
