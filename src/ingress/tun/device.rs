//! The layer-3 packet source: a real async TUN device, or a mock that
//! replays hex-encoded packets from a file for host-less testing. Both
//! drive the exact same [`super::processing`] functions. Grounded on
//! `tun/mod.rs`'s dual real/mock split.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::net::Ipv4Addr;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::TunError;

#[async_trait]
pub trait TunDevice: Send + Sync {
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize>;
}

pub struct RealTunDevice {
    inner: tun_rs::AsyncDevice,
}

impl RealTunDevice {
    pub fn open(name: &str, address: Ipv4Addr, netmask: Ipv4Addr, mtu: u32) -> Result<Self, TunError> {
        let inner = tun_rs::DeviceBuilder::new()
            .name(name)
            .ipv4(address, netmask, None)
            .mtu(mtu as u16)
            .build_async()
            .map_err(|e| TunError::Open(e.to_string()))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl TunDevice for RealTunDevice {
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.recv(buf).await
    }

    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.send(buf).await
    }
}

/// Replays packets from a file of hex-encoded lines (blank lines and `#`
/// comments skipped) and appends every packet handed to `send` as a hex
/// line in `<path>_out.txt`, mirroring the teacher's packet-file loop
/// exactly so the NAT/checksum logic is exercised without a real device.
pub struct MockTunDevice {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    out_file: Mutex<File>,
}

impl MockTunDevice {
    pub fn open(path: &str) -> Result<Self, TunError> {
        let file = File::open(path).map_err(|e| TunError::Open(e.to_string()))?;
        let reader = BufReader::new(file);
        let (tx, rx) = mpsc::unbounded_channel();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| TunError::Open(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match hex::decode(line) {
                Ok(bytes) => {
                    let _ = tx.send(bytes);
                }
                Err(e) => warn!(line = idx + 1, error = %e, "failed to decode mock packet line"),
            }
        }

        let out_path = format!("{path}_out.txt");
        let out_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&out_path)
            .map_err(|e| TunError::Open(e.to_string()))?;

        Ok(Self {
            inbound: Mutex::new(rx),
            out_file: Mutex::new(out_file),
        })
    }
}

#[async_trait]
impl TunDevice for MockTunDevice {
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        let packet = {
            let mut rx = self.inbound.lock().unwrap();
            rx.recv().await
        };
        match packet {
            Some(bytes) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                Ok(n)
            }
            // No more packets queued: block forever, like a real device with
            // nothing left to read, rather than spinning the caller's loop.
            None => std::future::pending().await,
        }
    }

    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        let line = hex::encode(buf);
        let mut out = self.out_file.lock().unwrap();
        writeln!(out, "{line}")?;
        Ok(buf.len())
    }
}
