use super::{checksum, ip::IpPacket, require_len, sum16};
use crate::error::PacketError;

/// A mutable view over a TCP segment (the IP payload).
pub struct TcpSegment<'a> {
    buf: &'a mut [u8],
}

impl<'a> TcpSegment<'a> {
    pub fn new(buf: &'a mut [u8]) -> Result<Self, PacketError> {
        require_len(buf, 18)?;
        Ok(Self { buf })
    }

    pub fn src_port(&self) -> u16 {
        u16::from_be_bytes([self.buf[0], self.buf[1]])
    }

    pub fn dst_port(&self) -> u16 {
        u16::from_be_bytes([self.buf[2], self.buf[3]])
    }

    pub fn set_src_port(&mut self, port: u16) {
        self.buf[0..2].copy_from_slice(&port.to_be_bytes());
    }

    pub fn set_dst_port(&mut self, port: u16) {
        self.buf[2..4].copy_from_slice(&port.to_be_bytes());
    }

    /// Recomputes the TCP checksum, folding in the IP pseudo-header.
    pub fn update_checksum(&mut self, ip: &IpPacket) {
        self.buf[16] = 0;
        self.buf[17] = 0;
        let sum = checksum(&[
            ip.pseudo_sum(),
            sum16(self.buf),
            ip.protocol_number(),
            self.buf.len() as u32,
        ]);
        self.buf[16..18].copy_from_slice(&sum.to_be_bytes());
    }
}
