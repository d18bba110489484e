//! AEAD-2022-style cipher suite table, key derivation and framing nonce
//! bookkeeping. Grounded on `component/proxy/shadowsocks/cipher.go`.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use chacha20poly1305::ChaCha20Poly1305;
use hkdf::Hkdf;
use md5::{Digest, Md5};
use sha1::Sha1;

use crate::error::CodecError;

pub const SALT_LEN: usize = 32;
pub const TAG_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    Aes128Gcm,
    Aes256Gcm,
    Chacha20Poly1305,
}

impl CipherKind {
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "aes-128-gcm" => Ok(Self::Aes128Gcm),
            "aes-256-gcm" => Ok(Self::Aes256Gcm),
            "chacha20-ietf-poly1305" | "chacha20-poly1305" => Ok(Self::Chacha20Poly1305),
            other => Err(CodecError::UnsupportedCipher(other.to_string())),
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            CipherKind::Aes128Gcm => 16,
            CipherKind::Aes256Gcm => 32,
            CipherKind::Chacha20Poly1305 => 32,
        }
    }
}

/// Password -> master key via the MD5 chain (OpenSSL's `EVP_BytesToKey`
/// with no salt/IV), matching the shadowsocks reference derivation.
pub fn derive_master_key(password: &str, key_len: usize) -> Vec<u8> {
    let password = password.as_bytes();
    let mut key = Vec::with_capacity(key_len);
    let mut prev: Vec<u8> = Vec::new();
    while key.len() < key_len {
        let mut hasher = Md5::new();
        hasher.update(&prev);
        hasher.update(password);
        let digest = hasher.finalize();
        key.extend_from_slice(&digest);
        prev = digest.to_vec();
    }
    key.truncate(key_len);
    key
}

/// Master key + per-session salt -> per-session subkey via HKDF-SHA1 with
/// info `"ss-subkey"`.
pub fn derive_subkey(master_key: &[u8], salt: &[u8], key_len: usize) -> Vec<u8> {
    let hk = Hkdf::<Sha1>::new(Some(salt), master_key);
    let mut okm = vec![0u8; key_len];
    hk.expand(b"ss-subkey", &mut okm)
        .expect("key_len is within HKDF-SHA1's output limit");
    okm
}

enum Inner {
    Aes128Gcm(Aes128Gcm),
    Aes256Gcm(Aes256Gcm),
    Chacha20Poly1305(ChaCha20Poly1305),
}

/// A bound AEAD instance for one direction of one session, plus the
/// monotonic counter used to build each frame's nonce.
pub struct AeadCipher {
    inner: Inner,
    counter: u64,
}

fn nonce_bytes(counter: u64) -> [u8; NONCE_LEN] {
    let mut n = [0u8; NONCE_LEN];
    n[..8].copy_from_slice(&counter.to_le_bytes());
    n
}

impl AeadCipher {
    pub fn new(kind: CipherKind, key: &[u8]) -> Self {
        let inner = match kind {
            CipherKind::Aes128Gcm => Inner::Aes128Gcm(Aes128Gcm::new_from_slice(key).unwrap()),
            CipherKind::Aes256Gcm => Inner::Aes256Gcm(Aes256Gcm::new_from_slice(key).unwrap()),
            CipherKind::Chacha20Poly1305 => {
                Inner::Chacha20Poly1305(ChaCha20Poly1305::new_from_slice(key).unwrap())
            }
        };
        Self { inner, counter: 0 }
    }

    /// Seals `plaintext`, returning `ciphertext || tag`, and advances the
    /// nonce counter.
    pub fn seal(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let nonce_bytes = nonce_bytes(self.counter);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let payload = Payload {
            msg: plaintext,
            aad: &[],
        };
        let out = match &self.inner {
            Inner::Aes128Gcm(c) => c.encrypt(nonce, payload),
            Inner::Aes256Gcm(c) => c.encrypt(nonce, payload),
            Inner::Chacha20Poly1305(c) => c.encrypt(nonce, payload),
        }
        .expect("AEAD seal over a bounded buffer cannot fail");
        self.counter += 1;
        out
    }

    /// Opens `sealed` (`ciphertext || tag`), advancing the nonce counter on
    /// success. The counter is not advanced on failure so a caller may retry
    /// with a resynced stream position if it chooses to.
    pub fn open(&mut self, sealed: &[u8]) -> Result<Vec<u8>, CodecError> {
        let nonce_bytes = nonce_bytes(self.counter);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let payload = Payload {
            msg: sealed,
            aad: &[],
        };
        let out = match &self.inner {
            Inner::Aes128Gcm(c) => c.decrypt(nonce, payload),
            Inner::Aes256Gcm(c) => c.decrypt(nonce, payload),
            Inner::Chacha20Poly1305(c) => c.decrypt(nonce, payload),
        }
        .map_err(|_| CodecError::AeadOpen)?;
        self.counter += 1;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_round_trips() {
        let key = derive_master_key("hunter2", CipherKind::Aes128Gcm.key_len());
        let mut sealer = AeadCipher::new(CipherKind::Aes128Gcm, &key);
        let mut opener = AeadCipher::new(CipherKind::Aes128Gcm, &key);
        let pt = b"hello shadowsocks";
        let ct = sealer.seal(pt);
        let back = opener.open(&ct).unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn tampered_ciphertext_fails_to_open() {
        let key = derive_master_key("hunter2", CipherKind::Chacha20Poly1305.key_len());
        let mut sealer = AeadCipher::new(CipherKind::Chacha20Poly1305, &key);
        let mut opener = AeadCipher::new(CipherKind::Chacha20Poly1305, &key);
        let mut ct = sealer.seal(b"payload");
        let last = ct.len() - 1;
        ct[last] ^= 0xff;
        assert!(opener.open(&ct).is_err());
    }

    #[test]
    fn subkeys_differ_across_salts() {
        let master = derive_master_key("pw", 32);
        let a = derive_subkey(&master, &[1u8; SALT_LEN], 32);
        let b = derive_subkey(&master, &[2u8; SALT_LEN], 32);
        assert_ne!(a, b);
    }
}
