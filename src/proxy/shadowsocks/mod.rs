//! The Shadowsocks AEAD proxy. Grounded on
//! `component/proxy/shadowsocks/shadowsocks.go`.

pub mod cipher;
pub mod packet;
pub mod stream;

use async_trait::async_trait;
use tokio::net::{TcpStream, UdpSocket};

use self::cipher::CipherKind;
use super::{CodecInput, Proxy, ProxyKind, ProxyMode, ShadowedPacket, ShadowedStream, StreamConn};
use crate::error::CodecError;

pub struct ShadowsocksProxy {
    mode: ProxyMode,
    kind: CipherKind,
    master_key: Vec<u8>,
}

impl ShadowsocksProxy {
    pub fn new(mode: ProxyMode, cipher_name: &str, password: &str) -> Result<Self, CodecError> {
        let kind = CipherKind::from_name(cipher_name)?;
        let master_key = cipher::derive_master_key(password, kind.key_len());
        Ok(Self {
            mode,
            kind,
            master_key,
        })
    }
}

#[async_trait]
impl Proxy for ShadowsocksProxy {
    fn kind(&self) -> ProxyKind {
        ProxyKind::Shadowsocks
    }

    async fn shadow_stream(
        &self,
        stream: TcpStream,
        input: CodecInput<'_>,
    ) -> Result<StreamConn, CodecError> {
        let local_addr = stream.local_addr()?;
        let remote_addr = stream.peer_addr()?;

        let (inner, metadata) = match self.mode {
            ProxyMode::Server => {
                let ingress = match input {
                    CodecInput::IngressName(name) => Some(name),
                    CodecInput::Target(_) => None,
                };
                let (shadowed, mut metadata) =
                    stream::server_handshake(stream, self.kind, &self.master_key).await?;
                if let Some(name) = ingress {
                    metadata = metadata.with_ingress(name);
                }
                (shadowed, metadata)
            }
            ProxyMode::Client => {
                let target = match input {
                    CodecInput::Target(m) => m.clone(),
                    CodecInput::IngressName(_) => {
                        return Err(CodecError::MalformedAddress);
                    }
                };
                let shadowed =
                    stream::client_handshake(stream, self.kind, &self.master_key, &target)
                        .await?;
                (shadowed, target)
            }
        };

        Ok(StreamConn {
            stream: ShadowedStream::Shadowsocks(inner),
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
        Ok(ShadowedPacket::Shadowsocks(packet::ShadowsocksPacket::new(
            socket,
            self.kind,
            self.master_key.clone(),
        )))
    }
}
