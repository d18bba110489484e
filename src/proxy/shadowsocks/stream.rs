//! The Shadowsocks AEAD stream: per-direction random salt, length-prefixed
//! chunk framing, an address header riding the first chunk. Grounded on
//! `component/proxy/shadowsocks/streamConn.go`.
//!
//! The Go original kept a `lLeft`/`rLeft` pair tracking, respectively, bytes
//! already handed to the caller and bytes decrypted but not yet consumed,
//! with `lLeft` initialized from the wrong variable on the first chunk after
//! the address header — see SPEC_FULL.md §9. Here a single `pending` buffer
//! plus `pending_pos` plays both roles: `pending_pos <= pending.len()`
//! always holds, by construction, because `pending_pos` only ever advances
//! by the number of bytes actually copied out in [`ShadowsocksStream::read`].

use rand::RngCore;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::cipher::{AeadCipher, CipherKind, derive_subkey, SALT_LEN, TAG_LEN};
use crate::error::CodecError;
use crate::metadata::Metadata;
use crate::proxy::addr::AddressHeader;

const MAX_PAYLOAD: usize = 0x3fff;
const MAX_HEADER_ATTEMPTS: usize = 4;

pub struct ShadowsocksStream {
    inner: TcpStream,
    read_cipher: AeadCipher,
    write_cipher: AeadCipher,
    pending: Vec<u8>,
    pending_pos: usize,
    write_prefix: Option<Vec<u8>>,
}

impl ShadowsocksStream {
    async fn fill_chunk(&mut self) -> Result<(), CodecError> {
        let mut len_ct = vec![0u8; 2 + TAG_LEN];
        self.inner.read_exact(&mut len_ct).await?;
        let len_pt = self.read_cipher.open(&len_ct)?;
        let n = u16::from_be_bytes([len_pt[0], len_pt[1]]) as usize;

        let mut payload_ct = vec![0u8; n + TAG_LEN];
        self.inner.read_exact(&mut payload_ct).await?;
        let payload_pt = self.read_cipher.open(&payload_ct)?;

        if self.pending_pos == self.pending.len() {
            self.pending.clear();
            self.pending_pos = 0;
        }
        self.pending.extend_from_slice(&payload_pt);
        Ok(())
    }

    async fn read_address_header(&mut self) -> Result<AddressHeader, CodecError> {
        for _ in 0..MAX_HEADER_ATTEMPTS {
            if self.pending_pos < self.pending.len() {
                if let Ok((header, consumed)) = AddressHeader::decode(&self.pending[self.pending_pos..]) {
                    self.pending_pos += consumed;
                    return Ok(header);
                }
            }
            self.fill_chunk().await?;
        }
        Err(CodecError::MalformedAddress)
    }

    async fn write_chunk(&mut self, payload: &[u8]) -> std::io::Result<()> {
        let len_pt = (payload.len() as u16).to_be_bytes();
        let len_ct = self.write_cipher.seal(&len_pt);
        let payload_ct = self.write_cipher.seal(payload);
        self.inner.write_all(&len_ct).await?;
        self.inner.write_all(&payload_ct).await?;
        Ok(())
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.pending_pos >= self.pending.len() {
            self.fill_chunk()
                .await
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        }
        let available = self.pending.len() - self.pending_pos;
        let n = available.min(buf.len());
        buf[..n].copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
        self.pending_pos += n;
        Ok(n)
    }

    pub async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        let mut buf = Vec::new();
        if let Some(prefix) = self.write_prefix.take() {
            buf.extend_from_slice(&prefix);
        }
        buf.extend_from_slice(data);
        for chunk in buf.chunks(MAX_PAYLOAD) {
            self.write_chunk(chunk).await?;
        }
        Ok(())
    }
}

fn random_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Server accept: read the client's salt, reply with our own, then read the
/// address header riding the first decrypted chunk(s).
pub async fn server_handshake(
    mut inner: TcpStream,
    kind: CipherKind,
    master_key: &[u8],
) -> Result<(ShadowsocksStream, Metadata), CodecError> {
    let key_len = kind.key_len();

    let mut client_salt = [0u8; SALT_LEN];
    inner.read_exact(&mut client_salt).await?;
    let read_cipher = AeadCipher::new(kind, &derive_subkey(master_key, &client_salt, key_len));

    let server_salt = random_salt();
    inner.write_all(&server_salt).await?;
    let write_cipher = AeadCipher::new(kind, &derive_subkey(master_key, &server_salt, key_len));

    let mut stream = ShadowsocksStream {
        inner,
        read_cipher,
        write_cipher,
        pending: Vec::new(),
        pending_pos: 0,
        write_prefix: None,
    };

    let header = stream.read_address_header().await?;
    let mut metadata = Metadata::new();
    header.apply_to_metadata(&mut metadata);
    Ok((stream, metadata))
}

/// Client dial: write our salt, read the server's, stash the target's
/// address header to ride the first `write_all` call's chunk.
pub async fn client_handshake(
    mut inner: TcpStream,
    kind: CipherKind,
    master_key: &[u8],
    target: &Metadata,
) -> Result<ShadowsocksStream, CodecError> {
    let key_len = kind.key_len();

    let client_salt = random_salt();
    inner.write_all(&client_salt).await?;
    let write_cipher = AeadCipher::new(kind, &derive_subkey(master_key, &client_salt, key_len));

    let mut server_salt = [0u8; SALT_LEN];
    inner.read_exact(&mut server_salt).await?;
    let read_cipher = AeadCipher::new(kind, &derive_subkey(master_key, &server_salt, key_len));

    let header = AddressHeader::from_metadata(target).ok_or(CodecError::MalformedAddress)?;
    let mut prefix = Vec::new();
    header.encode(&mut prefix);

    Ok(ShadowsocksStream {
        inner,
        read_cipher,
        write_cipher,
        pending: Vec::new(),
        pending_pos: 0,
        write_prefix: Some(prefix),
    })
}
