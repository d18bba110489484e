//! The Shadowsocks AEAD packet codec: `random salt(32) || AEAD-seal(address
//! header || payload)` per datagram, zero nonce since each datagram gets a
//! fresh per-packet subkey. Grounded on
//! `component/proxy/shadowsocks/packetConn.go`.

use std::net::SocketAddr;

use rand::RngCore;
use tokio::net::UdpSocket;

use super::cipher::{derive_subkey, AeadCipher, CipherKind, SALT_LEN, TAG_LEN};
use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::addr::AddressHeader;
use crate::proxy::Message;

pub struct ShadowsocksPacket {
    socket: UdpSocket,
    kind: CipherKind,
    master_key: Vec<u8>,
}

impl ShadowsocksPacket {
    pub fn new(socket: UdpSocket, kind: CipherKind, master_key: Vec<u8>) -> Self {
        Self {
            socket,
            kind,
            master_key,
        }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub async fn read_msg_from(&self) -> std::io::Result<(Message, SocketAddr)> {
        let mut buf = vec![0u8; 64 * 1024];
        let (n, peer) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        let plaintext = self
            .open_packet(&buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let mut metadata = Metadata::new();
        let payload = match AddressHeader::decode(&plaintext) {
            Ok((header, consumed)) => {
                header.apply_to_metadata(&mut metadata);
                plaintext[consumed..].to_vec()
            }
            Err(_) => Vec::new(),
        };
        Ok((Message { payload, metadata }, peer))
    }

    pub async fn write_msg_to(&self, msg: &Message, addr: SocketAddr) -> std::io::Result<()> {
        let mut plaintext = Vec::new();
        if let Some(header) = AddressHeader::from_metadata(&msg.metadata) {
            header.encode(&mut plaintext);
        }
        plaintext.extend_from_slice(&msg.payload);
        let sealed = self.seal_packet(&plaintext);
        self.socket.send_to(&sealed, addr).await?;
        Ok(())
    }

    fn seal_packet(&self, plaintext: &[u8]) -> Vec<u8> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        let key = derive_subkey(&self.master_key, &salt, self.kind.key_len());
        let mut cipher = AeadCipher::new(self.kind, &key);
        let ciphertext = cipher.seal(plaintext);
        let mut out = Vec::with_capacity(SALT_LEN + ciphertext.len());
        out.extend_from_slice(&salt);
        out.extend_from_slice(&ciphertext);
        out
    }

    fn open_packet(&self, packet: &[u8]) -> Result<Vec<u8>, CodecError> {
        if packet.len() < SALT_LEN + TAG_LEN {
            return Err(CodecError::ShortRead);
        }
        let salt = &packet[..SALT_LEN];
        let key = derive_subkey(&self.master_key, salt, self.kind.key_len());
        let mut cipher = AeadCipher::new(self.kind, &key);
        cipher.open(&packet[SALT_LEN..])
    }
}
