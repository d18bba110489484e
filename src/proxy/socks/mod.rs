//! The SOCKS5 proxy: CONNECT and UDP ASSOCIATE. Grounded on
//! `component/proxy/socks/socks.go`.

pub mod packet;
pub mod protocol;
pub mod stream;

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};

use self::stream::SocksRequest;
use super::{CodecInput, Proxy, ProxyKind, ProxyMode, ShadowedPacket, ShadowedStream, StreamConn};
use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::addr::AddressHeader;

pub struct SocksProxy {
    mode: ProxyMode,
}

impl SocksProxy {
    pub fn new(mode: ProxyMode) -> Self {
        Self { mode }
    }
}

#[async_trait]
impl Proxy for SocksProxy {
    fn kind(&self) -> ProxyKind {
        ProxyKind::Socks
    }

    async fn shadow_stream(
        &self,
        mut stream: TcpStream,
        input: CodecInput<'_>,
    ) -> Result<StreamConn, CodecError> {
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;
        let mut metadata = Metadata::new();

        match self.mode {
            ProxyMode::Server => {
                match stream::server_handshake(&mut stream, local_addr).await? {
                    SocksRequest::Connect(target) => {
                        target.apply_to_metadata(&mut metadata);
                        if let CodecInput::IngressName(name) = input {
                            metadata = metadata.with_ingress(name);
                        }
                    }
                    SocksRequest::UdpAssociate(_) => {
                        return Err(CodecError::UnsupportedCommand(
                            protocol::CMD_UDP_ASSOCIATE,
                        ));
                    }
                }
            }
            ProxyMode::Client => {
                let target = match input {
                    CodecInput::Target(m) => m.clone(),
                    CodecInput::IngressName(_) => {
                        return Err(CodecError::MalformedAddress);
                    }
                };
                let header = AddressHeader::from_metadata(&target)
                    .ok_or(CodecError::MalformedAddress)?;
                stream::client_connect(&mut stream, &header).await?;
                metadata = target;
            }
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
        Ok(ShadowedPacket::Socks(packet::SocksPacket::new(socket)))
    }
}
